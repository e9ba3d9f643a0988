//! External process execution
//!
//! [`ProcessRunner`] is the only place the harness touches `std::process`. It runs one command to completion with
//! stdout and stderr merged into a single pipe, and reports the exit code alongside the captured text. A non-zero
//! exit is an ordinary result; only a failure to start the process at all is an error ([`LaunchError`]).

use std::ffi::OsString;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use thiserror::Error;

/// The process could not be started.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("{} not found", .program.display())]
    NotFound { program: PathBuf },

    #[error("permission denied running {}", .program.display())]
    PermissionDenied { program: PathBuf },

    #[error("failed to run {}: {source}", .program.display())]
    Io {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LaunchError {
    fn classify(program: &Path, source: io::Error) -> Self {
        let program = program.to_path_buf();
        match source.kind() {
            io::ErrorKind::NotFound => LaunchError::NotFound { program },
            io::ErrorKind::PermissionDenied => LaunchError::PermissionDenied { program },
            _ => LaunchError::Io { program, source },
        }
    }
}

/// Exit code and merged stdout/stderr of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub output: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Execute one external command and capture its output.
///
/// Implementations must be shareable across run-phase workers.
pub trait ProcessRunner: Send + Sync {
    fn run(&self, program: &Path, args: &[OsString], cwd: &Path) -> Result<ProcessOutput, LaunchError>;
}

/// `std::process` backed runner (current behavior).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, program: &Path, args: &[OsString], cwd: &Path) -> Result<ProcessOutput, LaunchError> {
        tracing::debug!(program = %program.display(), ?args, cwd = %cwd.display(), "launching");

        let (mut reader, writer) = io::pipe().map_err(|e| LaunchError::classify(program, e))?;
        let writer_err = writer.try_clone().map_err(|e| LaunchError::classify(program, e))?;

        let mut command = Command::new(program);
        command.args(args).current_dir(cwd).stdout(writer).stderr(writer_err);

        let mut child = command.spawn().map_err(|e| LaunchError::classify(program, e))?;
        // The command still holds the write ends; drop them or the read below never sees EOF
        drop(command);

        let mut raw = Vec::new();
        let read_result = reader.read_to_end(&mut raw);
        let status = child.wait().map_err(|e| LaunchError::classify(program, e))?;
        if let Err(e) = read_result {
            tracing::warn!(program = %program.display(), error = %e, "output capture truncated");
        }

        Ok(ProcessOutput {
            exit_code: status.code(),
            output: String::from_utf8_lossy(&raw).into_owned(),
        })
    }
}

// ============================================================================
// Task outcomes
// ============================================================================

/// Diagnostic classification of a finished task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Exited with status 0
    Succeeded,
    /// Ran, but exited non-zero or was killed by a signal
    Failed,
    /// Could not be started at all
    LaunchFailed,
}

/// Result of one build or run task: classification, exit code and captured output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskOutcome {
    pub kind: OutcomeKind,
    pub exit_code: Option<i32>,
    /// Merged process output, or the launch error message for [`OutcomeKind::LaunchFailed`]
    pub output: String,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        self.kind == OutcomeKind::Succeeded
    }

    /// A task whose worker died before the process result could be recorded.
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Failed,
            exit_code: None,
            output: reason.into(),
        }
    }

    pub fn launch_failed(error: &LaunchError) -> Self {
        Self {
            kind: OutcomeKind::LaunchFailed,
            exit_code: None,
            output: error.to_string(),
        }
    }
}

impl From<ProcessOutput> for TaskOutcome {
    fn from(out: ProcessOutput) -> Self {
        let kind = if out.success() {
            OutcomeKind::Succeeded
        } else {
            OutcomeKind::Failed
        };
        Self {
            kind,
            exit_code: out.exit_code,
            output: out.output,
        }
    }
}

impl From<Result<ProcessOutput, LaunchError>> for TaskOutcome {
    fn from(result: Result<ProcessOutput, LaunchError>) -> Self {
        match result {
            Ok(out) => out.into(),
            Err(e) => {
                tracing::warn!(error = %e, "launch failed");
                TaskOutcome::launch_failed(&e)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_zero_exit() {
        let outcome = TaskOutcome::from(ProcessOutput {
            exit_code: Some(0),
            output: "ok".to_string(),
        });
        assert!(outcome.is_success());
        assert_eq!(outcome.exit_code, Some(0));
    }

    #[test]
    fn test_outcome_from_nonzero_and_signal() {
        let failed = TaskOutcome::from(ProcessOutput {
            exit_code: Some(2),
            output: String::new(),
        });
        assert_eq!(failed.kind, OutcomeKind::Failed);

        let killed = TaskOutcome::from(ProcessOutput {
            exit_code: None,
            output: String::new(),
        });
        assert_eq!(killed.kind, OutcomeKind::Failed);
    }

    #[test]
    fn test_launch_error_classification() {
        let program = Path::new("/nowhere/rosettaboy");
        let err = LaunchError::classify(program, io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, LaunchError::NotFound { .. }));
        let err = LaunchError::classify(program, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, LaunchError::PermissionDenied { .. }));

        let outcome = TaskOutcome::from(Err::<ProcessOutput, _>(err));
        assert_eq!(outcome.kind, OutcomeKind::LaunchFailed);
        assert!(outcome.output.contains("permission denied"));
    }

    #[test]
    fn test_missing_program_is_launch_error() {
        let result = SystemProcessRunner.run(
            Path::new("/definitely/not/a/program"),
            &[],
            &std::env::temp_dir(),
        );
        assert!(matches!(result, Err(LaunchError::NotFound { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_merges_stdout_and_stderr() {
        let args: Vec<OsString> = vec!["-c".into(), "echo out; echo err 1>&2; exit 3".into()];
        let out = SystemProcessRunner
            .run(Path::new("/bin/sh"), &args, &std::env::temp_dir())
            .unwrap();
        assert_eq!(out.exit_code, Some(3));
        assert!(out.output.contains("out"));
        assert!(out.output.contains("err"));
    }
}
