//! Fatal harness errors
//!
//! Task-level failures (a build or run exiting non-zero, or failing to launch) are never represented here: they are
//! captured as [`TaskOutcome`](super::process::TaskOutcome) values. Everything in [`HarnessError`] aborts the whole
//! invocation.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum HarnessError {
    #[error("failed to fetch workload from {url} to {}: {reason}", .path.display())]
    #[diagnostic(
        code(rosettabench::workload_fetch),
        help("download the ROM manually and pass it with --test_rom, or set GB_DEFAULT_BENCH_ROM")
    )]
    WorkloadFetch { url: String, path: PathBuf, reason: String },

    #[error("cannot determine the invocation directory: {0}")]
    #[diagnostic(code(rosettabench::cwd))]
    CurrentDir(#[source] std::io::Error),

    #[error("failed to start the run-phase worker pool: {0}")]
    #[diagnostic(code(rosettabench::runtime))]
    Runtime(#[source] std::io::Error),

    #[error("run-phase worker aborted: {0}")]
    #[diagnostic(code(rosettabench::worker))]
    Worker(String),
}

/// Result alias for whole-run operations.
pub type HarnessResult<T> = Result<T, HarnessError>;
