#![forbid(unsafe_code)]
//! rosettabench: a cross-implementation benchmark harness
//!
//! Given a set of variant roots (one directory per implementation, or a literal runner
//! executable), the harness builds every variant with its `build*.sh` scripts, runs every
//! discovered `rosettaboy*` executable against a shared workload ROM, surfaces the metric
//! line each run prints, and folds the run outcomes into a single exit status.
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` and `harness`
//!   modules enforce `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **Task failures are values**: a build or run that exits non-zero, or cannot be launched at all, becomes a
//!   [`harness::process::TaskOutcome`]. Only workload acquisition and configuration errors abort the run.

pub mod cli;
pub mod config;
pub mod harness;
pub mod version;

pub use config::BenchConfig;
pub use harness::discovery::{BuildTask, Discovery, RunTask, Variant, discover, discover_builds, discover_runs};
pub use harness::error::HarnessError;
pub use harness::metric::extract_metric_line;
pub use harness::process::{ProcessOutput, ProcessRunner, SystemProcessRunner, TaskOutcome};
pub use harness::report::{BenchmarkResult, aggregate};
pub use harness::scheduler::Scheduler;
