//! CLI module for rosettabench
//!
//! ## Usage
//!
//! ```text
//! rosettabench [--default] [--threads N] [--frames N] [--profile N] [--test_rom ROM] [LANGS]...
//! ```
//!
//! With no `LANGS`, every sub-directory of the current directory holding a `build.sh` is benchmarked.
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros. Flags are resolved once into an immutable
//! [`BenchConfig`]. Command functions return `CliResult<T>` instead of calling `process::exit`; only the top-level
//! `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::env;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;

use crate::config::{BenchConfig, DEFAULT_WORKLOAD, WORKLOAD_ENV};
use crate::harness::error::HarnessError;
use crate::harness::process::SystemProcessRunner;
use crate::harness::report::{ConsoleReporter, JsonReporter, Reporter};
use crate::harness::scheduler::Scheduler;
use crate::harness::workload::HttpFetcher;
use crate::version::HARNESS_VERSION;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<HarnessError> for CliError {
    fn from(err: HarnessError) -> Self {
        // miette renders the code and help text
        CliError::failure(format!("{:?}", miette::Report::new(err)))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Build and benchmark every rosettaboy variant against one test ROM
#[derive(Parser, Debug)]
#[command(name = "rosettabench")]
#[command(version = HARNESS_VERSION)]
#[command(about = "Build and benchmark rosettaboy variants", long_about = None)]
pub struct Cli {
    /// Only run the default build.sh / release runner, not variants
    #[arg(long = "default")]
    pub default_only: bool,

    /// How many benchmarks to run in parallel
    #[arg(long, value_name = "N", default_value = "1")]
    pub threads: NonZeroUsize,

    /// Run for this many frames
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub frames: u32,

    /// Run for this many seconds
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub profile: u32,

    /// Which test ROM to run
    #[arg(long = "test_rom", value_name = "ROM", env = WORKLOAD_ENV, default_value = DEFAULT_WORKLOAD)]
    pub test_rom: PathBuf,

    /// Skip the build phase and benchmark whatever binaries already exist
    #[arg(long = "no-build")]
    pub no_build: bool,

    /// Emit one JSON object per result instead of status lines
    #[arg(long)]
    pub json: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    pub verbose: bool,

    /// Which languages to test (directories or runner executables)
    #[arg(value_name = "LANGS")]
    pub langs: Vec<PathBuf>,
}

impl Cli {
    /// Resolve parsed flags into the immutable harness configuration.
    pub fn into_config(self, invocation_dir: PathBuf) -> BenchConfig {
        BenchConfig::new(invocation_dir)
            .with_default_only(self.default_only)
            .with_threads(self.threads)
            .with_duration(self.frames, self.profile)
            .with_workload(self.test_rom)
            .with_roots(self.langs)
            .with_skip_build(self.no_build)
    }
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called.
pub fn run() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

fn init_tracing(verbose: bool) {
    // Status lines are the default output; logs stay quiet unless asked for
    let fallback = if verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback)),
        )
        .try_init();
}

/// Execute a harness session and map its outcome to an exit code.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    let invocation_dir = env::current_dir().map_err(HarnessError::CurrentDir)?;
    let json = cli.json;
    let config = cli.into_config(invocation_dir);
    tracing::debug!(?config, "resolved configuration");

    let mut reporter: Box<dyn Reporter> = if json {
        Box::new(JsonReporter::stdout())
    } else {
        Box::new(ConsoleReporter::stdout())
    };

    let scheduler = Scheduler::new(Arc::new(config), Arc::new(SystemProcessRunner));
    let summary = scheduler.execute(&HttpFetcher::new(), reporter.as_mut())?;

    Ok(ExitCode(summary.exit_status()))
}

// ============================================================================
// Tests
// ============================================================================
