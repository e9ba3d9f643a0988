//! Build phase task execution

use std::path::Path;

use crate::config::BenchConfig;

use super::discovery::BuildTask;
use super::process::{ProcessRunner, TaskOutcome};

/// Runs a variant's build script in the variant directory.
pub struct Builder<'a> {
    config: &'a BenchConfig,
    process: &'a dyn ProcessRunner,
}

impl<'a> Builder<'a> {
    pub fn new(config: &'a BenchConfig, process: &'a dyn ProcessRunner) -> Self {
        Self { config, process }
    }

    /// Run one build script. Success means the script exited 0.
    pub fn build(&self, task: &BuildTask) -> TaskOutcome {
        let cwd: &Path = task.variant.working_dir(&self.config.invocation_dir);
        let _span =
            tracing::info_span!("build", variant = %task.variant.name(), label = %task.label).entered();
        let outcome = TaskOutcome::from(self.process.run(&task.script, &[], cwd));
        tracing::debug!(kind = ?outcome.kind, exit_code = ?outcome.exit_code, "build finished");
        outcome
    }
}
