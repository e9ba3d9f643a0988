//! Result aggregation and reporting
//!
//! ## Reporter Trait
//!
//! The scheduler hands every finished task to a [`Reporter`] so presentation stays separate from execution.
//! [`ConsoleReporter`] prints the operator-facing status lines; [`JsonReporter`] prints one JSON object per run for
//! scripts and CI.

use std::io::{self, Write};
use std::time::Duration;

use serde::Serialize;

use super::discovery::{BuildTask, SubVariant};
use super::process::{OutcomeKind, TaskOutcome};

/// Outcome of one run task. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BenchmarkResult {
    pub variant: String,
    pub label: SubVariant,
    pub outcome: TaskOutcome,
    /// Last metric line of a successful run, empty otherwise
    pub metric_line: String,
}

impl BenchmarkResult {
    pub fn success(&self) -> bool {
        self.outcome.is_success()
    }
}

// ============================================================================
// Aggregation
// ============================================================================

/// Overall harness success: logical AND over every run outcome, vacuously true.
pub fn aggregate<I>(flags: I) -> bool
where
    I: IntoIterator<Item = bool>,
{
    flags.into_iter().all(|ok| ok)
}

/// Process exit status for an overall outcome.
pub fn exit_status(overall: bool) -> i32 {
    if overall { 0 } else { 1 }
}

/// Counts for a finished session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSummary {
    pub built: usize,
    pub build_failed: usize,
    pub passed: usize,
    pub failed: usize,
    pub launch_failed: usize,
    #[serde(serialize_with = "as_secs_f64")]
    pub duration: Duration,
    pub success: bool,
}

impl SessionSummary {
    pub fn new(builds: &[TaskOutcome], runs: &[BenchmarkResult], duration: Duration) -> Self {
        let count = |kind: OutcomeKind| runs.iter().filter(|r| r.outcome.kind == kind).count();
        let built = builds.iter().filter(|b| b.is_success()).count();
        Self {
            built,
            build_failed: builds.len() - built,
            passed: count(OutcomeKind::Succeeded),
            failed: count(OutcomeKind::Failed),
            launch_failed: count(OutcomeKind::LaunchFailed),
            duration,
            success: aggregate(runs.iter().map(BenchmarkResult::success)),
        }
    }

    pub fn exit_status(&self) -> i32 {
        exit_status(self.success)
    }
}

fn as_secs_f64<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

// ============================================================================
// Reporter Trait
// ============================================================================

/// Receives task results as the scheduler produces them.
pub trait Reporter {
    /// Called after each build script finishes, in build order
    fn on_build_complete(&mut self, task: &BuildTask, outcome: &TaskOutcome);

    /// Called as each run finishes, in completion order
    fn on_run_complete(&mut self, result: &BenchmarkResult);

    /// Called once after every run has finished
    fn on_session_complete(&mut self, _summary: &SessionSummary) {}
}

/// `<variant> / <label>: <status>` with the variant right-aligned to 5 columns and the label padded to 7.
pub fn status_line(variant: &str, label: &SubVariant, status: &str) -> String {
    format!("{variant:>5} / {label:7}: {status}")
}

fn failure_status(outcome: &TaskOutcome) -> String {
    match outcome.kind {
        OutcomeKind::LaunchFailed => format!("Failed to launch: {}", outcome.output),
        _ => format!("Failed\n{}", outcome.output),
    }
}

/// Human-readable reporter: status lines on `out`, the closing summary on `summary`.
pub struct ConsoleReporter<W: Write = io::Stdout, E: Write = io::Stderr> {
    out: W,
    summary: E,
}

impl ConsoleReporter<io::Stdout, io::Stderr> {
    pub fn stdout() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl<W: Write, E: Write> ConsoleReporter<W, E> {
    pub fn new(out: W, summary: E) -> Self {
        Self { out, summary }
    }

    /// The status-line writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn into_parts(self) -> (W, E) {
        (self.out, self.summary)
    }

    fn line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{line}").and_then(|_| self.out.flush()) {
            tracing::warn!(error = %e, "failed to write status line");
        }
    }
}

impl<W: Write, E: Write> Reporter for ConsoleReporter<W, E> {
    fn on_build_complete(&mut self, task: &BuildTask, outcome: &TaskOutcome) {
        let status = if outcome.is_success() {
            "Built".to_string()
        } else {
            failure_status(outcome)
        };
        self.line(&status_line(&task.variant.name(), &task.label, &status));
    }

    fn on_run_complete(&mut self, result: &BenchmarkResult) {
        let status = if result.success() {
            result.metric_line.clone()
        } else {
            failure_status(&result.outcome)
        };
        self.line(&status_line(&result.variant, &result.label, &status));
    }

    fn on_session_complete(&mut self, summary: &SessionSummary) {
        let mut parts = Vec::new();
        if summary.passed > 0 {
            parts.push(format!("\x1b[32m{} passed\x1b[0m", summary.passed));
        }
        if summary.failed > 0 {
            parts.push(format!("\x1b[31m{} failed\x1b[0m", summary.failed));
        }
        if summary.launch_failed > 0 {
            parts.push(format!("\x1b[31m{} failed to launch\x1b[0m", summary.launch_failed));
        }
        if summary.build_failed > 0 {
            parts.push(format!("\x1b[33m{} build(s) failed\x1b[0m", summary.build_failed));
        }
        if parts.is_empty() {
            parts.push("no benchmarks run".to_string());
        }
        let line = format!("====== {} in {:.2}s ======", parts.join(", "), summary.duration.as_secs_f64());
        if let Err(e) = writeln!(self.summary, "{line}").and_then(|_| self.summary.flush()) {
            tracing::warn!(error = %e, "failed to write summary");
        }
    }
}

/// Machine-readable reporter: one JSON object per line.
pub struct JsonReporter<W: Write = io::Stdout> {
    out: W,
}

impl JsonReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, value: serde_json::Value) {
        if let Err(e) = writeln!(self.out, "{value}") {
            tracing::warn!(error = %e, "failed to write JSON record");
        }
    }
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn on_build_complete(&mut self, task: &BuildTask, outcome: &TaskOutcome) {
        self.emit(serde_json::json!({
            "event": "build",
            "variant": task.variant.name(),
            "label": task.label,
            "outcome": outcome,
        }));
    }

    fn on_run_complete(&mut self, result: &BenchmarkResult) {
        self.emit(serde_json::json!({
            "event": "run",
            "result": result,
        }));
    }

    fn on_session_complete(&mut self, summary: &SessionSummary) {
        self.emit(serde_json::json!({
            "event": "summary",
            "version": crate::version::HARNESS_VERSION,
            "summary": summary,
        }));
    }
}
