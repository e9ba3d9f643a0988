//! Variant discovery
//!
//! Turns the operator's root list into a typed registry of build and run tasks. The filesystem protocol is:
//!
//! - Build scripts live directly in a variant directory: `build.sh` (sub-variant `release`) or
//!   `build_<label>.sh` (sub-variant `<label>`).
//! - Runner executables live one level below a variant directory and are named `rosettaboy` (sub-variant
//!   `release`) or `rosettaboy-<label>`. Only files with an execute bit are eligible.
//! - A root that is not a directory is a literal runner; its sub-variant comes from a `rosettaboy-<label>` file name.
//!
//! Build scripts and runners are scanned separately: runners are looked up only after the build phase, so a
//! binary a build script just produced is benchmarked in the same invocation.
//!
//! Missing matches are not errors: they just produce fewer tasks. Entries are visited in sorted name order so a
//! given filesystem state always yields the same task order.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::BenchConfig;

/// Runner executable name prefix.
pub const RUNNER_PREFIX: &str = "rosettaboy";

/// Build script stem and extension.
const BUILD_STEM: &str = "build";
const BUILD_EXT: &str = ".sh";

/// Sub-variant used when a file name carries no label.
pub const DEFAULT_LABEL: &str = "release";

// ============================================================================
// Typed registry
// ============================================================================

/// A named build/run flavor of a variant. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SubVariant(String);

impl SubVariant {
    /// The default `release` flavor.
    pub fn release() -> Self {
        Self(DEFAULT_LABEL.to_string())
    }

    /// Build a label from a captured file-name suffix; an empty suffix falls back to `release`.
    pub fn from_suffix(suffix: &str) -> Self {
        if suffix.is_empty() { Self::release() } else { Self(suffix.to_string()) }
    }

    pub fn is_release(&self) -> bool {
        self.0 == DEFAULT_LABEL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SubVariant {
    fn default() -> Self {
        Self::release()
    }
}

impl fmt::Display for SubVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Delegate so width/alignment flags in status lines apply
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantKind {
    /// A language/implementation directory with build scripts and runners below it
    Directory,
    /// A bare runner executable given directly on the command line
    Executable,
}

/// One benchmarked implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    /// The root exactly as the operator named it (used for display)
    pub root: PathBuf,
    /// `root` resolved against the invocation directory
    pub location: PathBuf,
    pub kind: VariantKind,
}

impl Variant {
    fn resolve(root: &Path, invocation_dir: &Path) -> Self {
        let location = invocation_dir.join(root);
        let kind = if location.is_dir() {
            VariantKind::Directory
        } else {
            VariantKind::Executable
        };
        Self {
            root: root.to_path_buf(),
            location,
            kind,
        }
    }

    /// Display name used in status lines.
    pub fn name(&self) -> String {
        self.root.display().to_string()
    }

    pub fn is_dir(&self) -> bool {
        self.kind == VariantKind::Directory
    }

    /// Working directory for processes belonging to this variant.
    pub fn working_dir<'a>(&'a self, invocation_dir: &'a Path) -> &'a Path {
        if self.is_dir() { &self.location } else { invocation_dir }
    }
}

/// Invoke one build script of a variant.
#[derive(Debug, Clone)]
pub struct BuildTask {
    pub variant: Variant,
    /// Absolute path to the build script
    pub script: PathBuf,
    pub label: SubVariant,
}

/// Benchmark one runner of a variant against the workload.
#[derive(Debug, Clone)]
pub struct RunTask {
    pub variant: Variant,
    /// Absolute runner path, or a bare command name looked up on `PATH`
    pub runner: PathBuf,
    pub label: SubVariant,
    pub frames: u32,
    pub profile: u32,
    /// Workload path as configured (relative to the invocation directory unless absolute)
    pub workload: PathBuf,
}

/// Everything discovery found, in discovery order.
#[derive(Debug, Default)]
pub struct Discovery {
    pub builds: Vec<BuildTask>,
    pub runs: Vec<RunTask>,
}

// ============================================================================
// Naming convention
// ============================================================================

/// Sub-variant of a build script file name, or `None` if the name is not a build script.
pub fn build_script_label(file_name: &str) -> Option<SubVariant> {
    let stem = file_name.strip_suffix(BUILD_EXT)?;
    let rest = stem.strip_prefix(BUILD_STEM)?;
    if rest.is_empty() {
        return Some(SubVariant::release());
    }
    let label = rest.strip_prefix('_')?;
    if label.is_empty() {
        return None;
    }
    Some(SubVariant::from_suffix(label))
}

/// Sub-variant of a runner file name, or `None` if the name is not a runner.
pub fn runner_label(file_name: &str) -> Option<SubVariant> {
    let rest = file_name.strip_prefix(RUNNER_PREFIX)?;
    if rest.is_empty() {
        return Some(SubVariant::release());
    }
    rest.strip_prefix('-').map(SubVariant::from_suffix)
}

/// Sub-variant of a literal runner root. Non-conforming names are benchmarked as `release`.
fn literal_runner_label(root: &Path) -> SubVariant {
    root.file_name()
        .and_then(|n| n.to_str())
        .and_then(runner_label)
        .unwrap_or_default()
}

// ============================================================================
// Filesystem scan
// ============================================================================

/// Every immediate sub-directory of `dir` that holds a `build.sh`, sorted by name.
///
/// Returned paths are relative to `dir` so they read the same way an operator would type them.
pub fn default_roots(dir: &Path) -> Vec<PathBuf> {
    sorted_entries(dir)
        .into_iter()
        .filter(|p| p.is_dir() && p.join("build.sh").is_file())
        .filter_map(|p| p.file_name().map(PathBuf::from))
        .collect()
}

/// Scan every configured root and produce the build and run task lists.
///
/// Runners are matched against the filesystem as it is right now. The scheduler calls [`discover_builds`] and
/// [`discover_runs`] separately so runners produced by the build phase are picked up.
pub fn discover(config: &BenchConfig) -> Discovery {
    Discovery {
        builds: discover_builds(config),
        runs: discover_runs(config),
    }
}

fn variants(config: &BenchConfig) -> Vec<Variant> {
    config
        .roots
        .iter()
        .map(|root| Variant::resolve(root, &config.invocation_dir))
        .collect()
}

/// Build scripts directly inside each directory root, in root then name order.
#[tracing::instrument(skip_all, fields(roots = config.roots.len(), default_only = config.default_only))]
pub fn discover_builds(config: &BenchConfig) -> Vec<BuildTask> {
    let mut builds = Vec::new();
    for variant in variants(config).into_iter().filter(Variant::is_dir) {
        for script in sorted_entries(&variant.location) {
            if !script.is_file() {
                continue;
            }
            let Some(label) = file_name_of(&script).and_then(build_script_label) else {
                continue;
            };
            if config.default_only && !label.is_release() {
                continue;
            }
            tracing::debug!(variant = %variant.name(), label = %label, script = %script.display(), "build task");
            builds.push(BuildTask {
                variant: variant.clone(),
                script,
                label,
            });
        }
    }
    builds
}

/// Runner executables for every root: the root itself when it is not a directory, otherwise
/// `<root>/*/rosettaboy*`.
#[tracing::instrument(skip_all, fields(roots = config.roots.len(), default_only = config.default_only))]
pub fn discover_runs(config: &BenchConfig) -> Vec<RunTask> {
    let mut runs = Vec::new();
    for variant in variants(config) {
        let runners = match variant.kind {
            VariantKind::Executable => {
                vec![(literal_runner_path(&variant), literal_runner_label(&variant.root))]
            }
            VariantKind::Directory => directory_runners(&variant.location),
        };

        for (runner, label) in runners {
            if config.default_only && !label.is_release() {
                continue;
            }
            tracing::debug!(variant = %variant.name(), label = %label, runner = %runner.display(), "run task");
            runs.push(RunTask {
                variant: variant.clone(),
                runner,
                label,
                frames: config.frames,
                profile: config.profile,
                workload: config.workload.clone(),
            });
        }
    }
    runs
}

/// Runners one level below a variant directory (`<root>/*/rosettaboy*`).
fn directory_runners(location: &Path) -> Vec<(PathBuf, SubVariant)> {
    let mut runners = Vec::new();
    for child in sorted_entries(location) {
        if !child.is_dir() || file_name_of(&child).is_none_or(|n| n.starts_with('.')) {
            continue;
        }
        for candidate in sorted_entries(&child) {
            let Some(label) = file_name_of(&candidate).and_then(runner_label) else {
                continue;
            };
            if !is_executable(&candidate) {
                tracing::debug!(path = %candidate.display(), "skipping runner without execute permission");
                continue;
            }
            runners.push((candidate, label));
        }
    }
    runners
}

/// A literal root that names an existing file is launched by absolute path; a bare name that does not exist
/// relative to the invocation directory is left for `PATH` lookup.
fn literal_runner_path(variant: &Variant) -> PathBuf {
    let bare = variant.root.components().count() == 1;
    if bare && !variant.location.exists() {
        variant.root.clone()
    } else {
        variant.location.clone()
    }
}

fn sorted_entries(dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(rd) => rd.flatten().map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    };
    entries.sort();
    entries
}

fn file_name_of(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_build_script_label_default() {
        assert_eq!(build_script_label("build.sh"), Some(SubVariant::release()));
    }

    #[test]
    fn test_build_script_label_suffix() {
        assert_eq!(build_script_label("build_debug.sh").unwrap().as_str(), "debug");
        assert_eq!(build_script_label("build_lto_pgo.sh").unwrap().as_str(), "lto_pgo");
    }

    #[test]
    fn test_build_script_label_rejects_other_names() {
        assert_eq!(build_script_label("build.py"), None);
        assert_eq!(build_script_label("build_.sh"), None);
        assert_eq!(build_script_label("buildall.sh"), None);
        assert_eq!(build_script_label("rebuild.sh"), None);
    }

    #[test]
    fn test_runner_label() {
        assert_eq!(runner_label("rosettaboy"), Some(SubVariant::release()));
        assert_eq!(runner_label("rosettaboy-pypy").unwrap().as_str(), "pypy");
        assert_eq!(runner_label("rosettaboy-").unwrap(), SubVariant::release());
        assert_eq!(runner_label("rosettaboy.py"), None);
        assert_eq!(runner_label("other"), None);
    }

    #[test]
    fn test_literal_runner_label_uses_file_name() {
        assert_eq!(literal_runner_label(Path::new("zig/rosettaboy-safe")).as_str(), "safe");
        assert!(literal_runner_label(Path::new("./my-emulator")).is_release());
    }

    #[test]
    fn test_sub_variant_display_honours_width() {
        assert_eq!(format!("{:7}|", SubVariant::release()), "release|");
        assert_eq!(format!("{:7}|", SubVariant::from_suffix("pgo")), "pgo    |");
    }

    #[test]
    fn test_bare_missing_literal_is_left_for_path_lookup() {
        let v = Variant::resolve(Path::new("rosettaboy-rs"), Path::new("/definitely/not/here"));
        assert_eq!(v.kind, VariantKind::Executable);
        assert_eq!(literal_runner_path(&v), PathBuf::from("rosettaboy-rs"));

        let v = Variant::resolve(Path::new("bin/rosettaboy-rs"), Path::new("/definitely/not/here"));
        assert_eq!(literal_runner_path(&v), PathBuf::from("/definitely/not/here/bin/rosettaboy-rs"));
    }

    #[test]
    fn test_missing_directory_yields_no_entries() {
        assert!(sorted_entries(Path::new("/definitely/not/here")).is_empty());
    }
}
