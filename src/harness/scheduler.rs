//! Two-phase scheduling
//!
//! ```text
//! Idle -> Building -> Running -> Aggregating -> Done
//! ```
//!
//! - **Building**: build tasks run one at a time in discovery order, since build scripts may share build
//!   directories. A failed build is reported and the phase moves on.
//! - **Running**: run tasks are submitted to a worker pool bounded by `BenchConfig::threads`. Each task owns its
//!   process and output buffer. Results are reported in completion order but collected by task index, so the
//!   returned list lines up with the submitted task list.
//!
//! Run tasks are discovered after the build phase finishes, so runners a build script produced are benchmarked.
//! A variant's run task executes even if that variant's build just failed. The runner may then benchmark a binary
//! left over from an earlier build; this matches the established harness behavior and is covered by tests.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::BenchConfig;

use super::builder::Builder;
use super::discovery::{BuildTask, RunTask, discover_builds, discover_runs};
use super::error::{HarnessError, HarnessResult};
use super::process::{ProcessRunner, TaskOutcome};
use super::report::{BenchmarkResult, Reporter, SessionSummary};
use super::runner::BenchmarkRunner;
use super::workload::{TEST_ROM_URL, WorkloadFetcher, ensure_workload};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Building,
    Running,
    Aggregating,
    Done,
}

fn enter(phase: Phase) {
    tracing::debug!(?phase, "scheduler phase");
}

/// Drives the build and run phases for one harness invocation.
pub struct Scheduler {
    config: Arc<BenchConfig>,
    process: Arc<dyn ProcessRunner>,
}

impl Scheduler {
    pub fn new(config: Arc<BenchConfig>, process: Arc<dyn ProcessRunner>) -> Self {
        Self { config, process }
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Acquire the workload, build, discover runners, run, and summarize.
    ///
    /// Only workload acquisition and runtime setup failures return `Err`; task failures are in the summary.
    pub fn execute(&self, fetcher: &dyn WorkloadFetcher, reporter: &mut dyn Reporter) -> HarnessResult<SessionSummary> {
        let started = Instant::now();
        enter(Phase::Idle);

        ensure_workload(&self.config.workload_path(), TEST_ROM_URL, fetcher)?;

        let builds = if self.config.skip_build {
            tracing::info!("build phase skipped");
            Vec::new()
        } else {
            let tasks = discover_builds(&self.config);
            tracing::info!(builds = tasks.len(), "discovered build tasks");
            self.build_phase(&tasks, reporter)
        };

        let tasks = discover_runs(&self.config);
        tracing::info!(runs = tasks.len(), "discovered run tasks");
        let runs = self.run_phase(tasks, reporter)?;

        enter(Phase::Aggregating);
        let summary = SessionSummary::new(&builds, &runs, started.elapsed());
        reporter.on_session_complete(&summary);

        enter(Phase::Done);
        Ok(summary)
    }

    /// Run every build task sequentially. Outcomes are returned in task order.
    #[tracing::instrument(skip_all, fields(tasks = tasks.len()))]
    pub fn build_phase(&self, tasks: &[BuildTask], reporter: &mut dyn Reporter) -> Vec<TaskOutcome> {
        enter(Phase::Building);
        let builder = Builder::new(&self.config, self.process.as_ref());
        tasks
            .iter()
            .map(|task| {
                let outcome = builder.build(task);
                reporter.on_build_complete(task, &outcome);
                outcome
            })
            .collect()
    }

    /// Run every run task through the bounded worker pool. Results are returned in task order.
    #[tracing::instrument(skip_all, fields(tasks = tasks.len(), threads = self.config.threads.get()))]
    pub fn run_phase(&self, tasks: Vec<RunTask>, reporter: &mut dyn Reporter) -> HarnessResult<Vec<BenchmarkResult>> {
        enter(Phase::Running);
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(HarnessError::Runtime)?;
        runtime.block_on(self.run_pool(tasks, reporter))
    }

    async fn run_pool(&self, tasks: Vec<RunTask>, reporter: &mut dyn Reporter) -> HarnessResult<Vec<BenchmarkResult>> {
        let permits = Arc::new(Semaphore::new(self.config.threads.get().min(Semaphore::MAX_PERMITS)));
        let runner = BenchmarkRunner::new(Arc::clone(&self.config), Arc::clone(&self.process));
        let total = tasks.len();

        let mut workers = JoinSet::new();
        for (index, task) in tasks.into_iter().enumerate() {
            let permits = Arc::clone(&permits);
            let runner = runner.clone();
            workers.spawn(async move {
                // Held until the process exits; the semaphore is never closed
                let _permit = permits.acquire_owned().await.ok();
                let (variant, label) = (task.variant.name(), task.label.clone());
                let result = match tokio::task::spawn_blocking(move || runner.run(&task)).await {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::error!(%variant, %label, error = %e, "benchmark worker died");
                        BenchmarkResult {
                            variant,
                            label,
                            outcome: TaskOutcome::aborted(format!("benchmark worker died: {e}")),
                            metric_line: String::new(),
                        }
                    }
                };
                (index, result)
            });
        }

        let mut slots: Vec<Option<BenchmarkResult>> = (0..total).map(|_| None).collect();
        while let Some(joined) = workers.join_next().await {
            let (index, result) = joined.map_err(|e| HarnessError::Worker(e.to_string()))?;
            reporter.on_run_complete(&result);
            slots[index] = Some(result);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.ok_or_else(|| HarnessError::Worker(format!("task #{index} produced no result"))))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::ffi::OsString;
    use std::num::NonZeroUsize;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::harness::discovery::{SubVariant, Variant, VariantKind};
    use crate::harness::process::{LaunchError, OutcomeKind, ProcessOutput};

    /// Sleeps per call, tracking how many calls overlap.
    #[derive(Default)]
    struct Overlap {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ProcessRunner for Overlap {
        fn run(&self, program: &Path, _args: &[OsString], _cwd: &Path) -> Result<ProcessOutput, LaunchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            // Later tasks finish first so completion order differs from task order
            let n = runner_number(program);
            std::thread::sleep(Duration::from_millis(80 - n * 10));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(ProcessOutput {
                exit_code: Some(if n == 3 { 1 } else { 0 }),
                output: format!("{n} frames\n"),
            })
        }
    }

    fn runner_number(program: &Path) -> u64 {
        program.file_name().unwrap().to_str().unwrap().trim_start_matches("rosettaboy-").parse().unwrap()
    }

    /// Panics while running one particular runner.
    struct PanicsOn(u64);

    impl ProcessRunner for PanicsOn {
        fn run(&self, program: &Path, _args: &[OsString], _cwd: &Path) -> Result<ProcessOutput, LaunchError> {
            let n = runner_number(program);
            if n == self.0 {
                panic!("runner {n} blew up");
            }
            Ok(ProcessOutput {
                exit_code: Some(0),
                output: format!("{n} frames\n"),
            })
        }
    }

    #[derive(Default)]
    struct Collect {
        builds: Vec<String>,
        runs: Vec<String>,
    }

    impl Reporter for Collect {
        fn on_build_complete(&mut self, task: &BuildTask, outcome: &TaskOutcome) {
            self.builds.push(format!("{}:{}", task.label, outcome.is_success()));
        }

        fn on_run_complete(&mut self, result: &BenchmarkResult) {
            self.runs.push(result.label.to_string());
        }
    }

    fn run_task(n: u64) -> RunTask {
        RunTask {
            variant: Variant {
                root: PathBuf::from("rs"),
                location: PathBuf::from("/work/rs"),
                kind: VariantKind::Directory,
            },
            runner: PathBuf::from(format!("/work/rs/target/rosettaboy-{n}")),
            label: SubVariant::from_suffix(&n.to_string()),
            frames: 0,
            profile: 10,
            workload: PathBuf::from("/work/opus5.gb"),
        }
    }

    fn scheduler(threads: usize, process: Arc<dyn ProcessRunner>) -> Scheduler {
        let config = BenchConfig::new("/work").with_threads(NonZeroUsize::new(threads).unwrap());
        Scheduler::new(Arc::new(config), process)
    }

    #[test]
    fn test_pool_never_exceeds_thread_count() {
        let process = Arc::new(Overlap::default());
        let sched = scheduler(2, process.clone());
        let mut reporter = Collect::default();
        let results = sched.run_phase((0..6).map(run_task).collect(), &mut reporter).unwrap();

        assert_eq!(results.len(), 6);
        let peak = process.peak.load(Ordering::SeqCst);
        assert!((1..=2).contains(&peak), "peak concurrency {peak}");
    }

    #[test]
    fn test_single_worker_is_sequential() {
        let process = Arc::new(Overlap::default());
        let sched = scheduler(1, process.clone());
        sched.run_phase((0..3).map(run_task).collect(), &mut Collect::default()).unwrap();
        assert_eq!(process.peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_results_keep_task_order() {
        let process = Arc::new(Overlap::default());
        let sched = scheduler(4, process);
        let mut reporter = Collect::default();
        let results = sched.run_phase((0..5).map(run_task).collect(), &mut reporter).unwrap();

        let labels: Vec<&str> = results.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, ["0", "1", "2", "3", "4"]);
        for (n, result) in results.iter().enumerate() {
            assert_eq!(result.success(), n != 3);
            if n != 3 {
                assert_eq!(result.metric_line, format!("{n} frames"));
            }
        }
        assert_eq!(reporter.runs.len(), 5);
    }

    #[test]
    fn test_worker_panic_fails_only_its_task() {
        let sched = scheduler(2, Arc::new(PanicsOn(1)));
        let mut reporter = Collect::default();
        let results = sched.run_phase((0..3).map(run_task).collect(), &mut reporter).unwrap();

        let kinds: Vec<OutcomeKind> = results.iter().map(|r| r.outcome.kind).collect();
        assert_eq!(kinds, [OutcomeKind::Succeeded, OutcomeKind::Failed, OutcomeKind::Succeeded]);
        assert_eq!(results[1].label.as_str(), "1");
        assert_eq!(results[1].variant, "rs");
        assert_eq!(results[1].outcome.exit_code, None);
        assert!(results[1].outcome.output.starts_with("benchmark worker died"));
        assert!(results[1].metric_line.is_empty());
        assert_eq!(results[2].metric_line, "2 frames");
        assert_eq!(reporter.runs.len(), 3);
    }

    #[test]
    fn test_thread_count_above_permit_limit_is_clamped() {
        let sched = scheduler(usize::MAX, Arc::new(Overlap::default()));
        let results = sched.run_phase((0..2).map(run_task).collect(), &mut Collect::default()).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(BenchmarkResult::success));
    }

    #[test]
    fn test_empty_run_phase() {
        let sched = scheduler(3, Arc::new(Overlap::default()));
        assert!(sched.run_phase(Vec::new(), &mut Collect::default()).unwrap().is_empty());
    }

    /// Every build fails; records the order builds were attempted in.
    struct FailingBuilds {
        seen: Mutex<Vec<PathBuf>>,
    }

    impl ProcessRunner for FailingBuilds {
        fn run(&self, program: &Path, _args: &[OsString], _cwd: &Path) -> Result<ProcessOutput, LaunchError> {
            self.seen.lock().unwrap().push(program.to_path_buf());
            Ok(ProcessOutput {
                exit_code: Some(1),
                output: "error: linker failed\n".to_string(),
            })
        }
    }

    #[test]
    fn test_build_failure_does_not_stop_phase() {
        let process = Arc::new(FailingBuilds {
            seen: Mutex::new(Vec::new()),
        });
        let sched = scheduler(1, process.clone());
        let variant = Variant {
            root: PathBuf::from("rs"),
            location: PathBuf::from("/work/rs"),
            kind: VariantKind::Directory,
        };
        let tasks = vec![
            BuildTask {
                variant: variant.clone(),
                script: PathBuf::from("/work/rs/build.sh"),
                label: SubVariant::release(),
            },
            BuildTask {
                variant,
                script: PathBuf::from("/work/rs/build_debug.sh"),
                label: SubVariant::from_suffix("debug"),
            },
        ];
        let mut reporter = Collect::default();
        let outcomes = sched.build_phase(&tasks, &mut reporter);

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| !o.is_success()));
        assert_eq!(reporter.builds, ["release:false", "debug:false"]);
        assert_eq!(
            *process.seen.lock().unwrap(),
            [PathBuf::from("/work/rs/build.sh"), PathBuf::from("/work/rs/build_debug.sh")]
        );
    }
}
