//! Harness configuration
//!
//! Parsed flags are resolved exactly once into a [`BenchConfig`], which is then handed by reference (or `Arc`) to
//! discovery, the builder, the runner and the scheduler. Nothing reads flags or environment variables after that.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use crate::harness::discovery;

/// Environment variable naming the default workload ROM.
pub const WORKLOAD_ENV: &str = "GB_DEFAULT_BENCH_ROM";

/// Workload used when neither `--test_rom` nor [`WORKLOAD_ENV`] is given.
pub const DEFAULT_WORKLOAD: &str = "opus5.gb";

/// Benchmark duration used when neither a frame count nor a profile duration was requested.
pub const DEFAULT_PROFILE_SECONDS: u32 = 10;

/// Immutable, fully resolved harness configuration.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Only the `release` sub-variant is built and run
    pub default_only: bool,
    /// Run-phase worker pool size
    pub threads: NonZeroUsize,
    /// `--frames` passed to every runner
    pub frames: u32,
    /// `--profile` passed to every runner
    pub profile: u32,
    /// Workload path, relative to `invocation_dir` unless absolute
    pub workload: PathBuf,
    /// Variant roots (directories or literal runner paths)
    pub roots: Vec<PathBuf>,
    /// Directory the harness was started from
    pub invocation_dir: PathBuf,
    /// Skip the build phase entirely
    pub skip_build: bool,
}

impl BenchConfig {
    /// Defaults rooted at `invocation_dir`, with the default variant roots found there.
    pub fn new(invocation_dir: impl Into<PathBuf>) -> Self {
        let invocation_dir = invocation_dir.into();
        let roots = discovery::default_roots(&invocation_dir);
        let (frames, profile) = resolve_duration(0, 0);
        Self {
            default_only: false,
            threads: NonZeroUsize::MIN,
            frames,
            profile,
            workload: PathBuf::from(DEFAULT_WORKLOAD),
            roots,
            invocation_dir,
            skip_build: false,
        }
    }

    pub fn with_default_only(mut self, default_only: bool) -> Self {
        self.default_only = default_only;
        self
    }

    pub fn with_threads(mut self, threads: NonZeroUsize) -> Self {
        self.threads = threads;
        self
    }

    /// Set the run duration, applying the default-duration rule.
    pub fn with_duration(mut self, frames: u32, profile: u32) -> Self {
        (self.frames, self.profile) = resolve_duration(frames, profile);
        self
    }

    pub fn with_workload(mut self, workload: impl Into<PathBuf>) -> Self {
        self.workload = workload.into();
        self
    }

    /// Set explicit roots. An empty list keeps the default roots.
    pub fn with_roots(mut self, roots: Vec<PathBuf>) -> Self {
        if !roots.is_empty() {
            self.roots = roots;
        }
        self
    }

    pub fn with_skip_build(mut self, skip_build: bool) -> Self {
        self.skip_build = skip_build;
        self
    }

    /// Absolute workload path.
    pub fn workload_path(&self) -> PathBuf {
        self.invocation_dir.join(&self.workload)
    }
}

/// If both `frames` and `profile` are zero, profile for [`DEFAULT_PROFILE_SECONDS`]; otherwise leave them alone.
pub fn resolve_duration(frames: u32, profile: u32) -> (u32, u32) {
    if frames == 0 && profile == 0 {
        (0, DEFAULT_PROFILE_SECONDS)
    } else {
        (frames, profile)
    }
}
