//! Run phase task execution
//!
//! Every runner receives the same argument set, in this order:
//!
//! ```text
//! --frames <N> --profile <N> --silent --headless --turbo <workload>
//! ```

use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;

use crate::config::BenchConfig;

use super::discovery::RunTask;
use super::metric::extract_metric_line;
use super::process::{ProcessRunner, TaskOutcome};
use super::report::BenchmarkResult;

/// Standardized benchmark arguments for `task`, with the workload path as the runner must see it.
pub fn benchmark_args(task: &RunTask, workload: &Path) -> Vec<OsString> {
    vec![
        "--frames".into(),
        task.frames.to_string().into(),
        "--profile".into(),
        task.profile.to_string().into(),
        "--silent".into(),
        "--headless".into(),
        "--turbo".into(),
        workload.as_os_str().to_owned(),
    ]
}

/// Invokes a runner with the standardized arguments and surfaces its metric line.
///
/// Owns `Arc` handles so a copy can move onto a run-phase worker.
#[derive(Clone)]
pub struct BenchmarkRunner {
    config: Arc<BenchConfig>,
    process: Arc<dyn ProcessRunner>,
}

impl BenchmarkRunner {
    pub fn new(config: Arc<BenchConfig>, process: Arc<dyn ProcessRunner>) -> Self {
        Self { config, process }
    }

    pub fn run(&self, task: &RunTask) -> BenchmarkResult {
        let cwd = task.variant.working_dir(&self.config.invocation_dir);
        let workload = if task.workload.is_absolute() || cwd == self.config.invocation_dir {
            task.workload.clone()
        } else {
            self.config.invocation_dir.join(&task.workload)
        };
        let args = benchmark_args(task, &workload);

        let _span = tracing::info_span!("run", variant = %task.variant.name(), label = %task.label).entered();
        let outcome = TaskOutcome::from(self.process.run(&task.runner, &args, cwd));
        let metric_line = if outcome.is_success() {
            extract_metric_line(&outcome.output).to_string()
        } else {
            String::new()
        };
        tracing::debug!(kind = ?outcome.kind, exit_code = ?outcome.exit_code, metric = %metric_line, "run finished");

        BenchmarkResult {
            variant: task.variant.name(),
            label: task.label.clone(),
            outcome,
            metric_line,
        }
    }
}
