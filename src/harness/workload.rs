//! Workload ROM acquisition
//!
//! Every run reads the same ROM. If it is missing it is downloaded once, before any task starts; failing to obtain
//! it aborts the whole invocation.

use std::fs;
use std::path::{Path, PathBuf};

use super::error::{HarnessError, HarnessResult};

/// Where the default workload is downloaded from.
pub const TEST_ROM_URL: &str = "https://github.com/sjl/cl-gameboy/blob/master/roms/opus5.gb?raw=true";

/// Download a workload body.
pub trait WorkloadFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, String>;
}

/// Blocking HTTP fetcher (current behavior).
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkloadFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, String> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| format!("request failed: {e}"))?;

        if !response.status().is_success() {
            return Err(format!("server returned status {}", response.status()));
        }

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| format!("failed to read response body: {e}"))
    }
}

/// Make sure `path` exists, downloading it from `url` if it does not.
///
/// The body is written to a `.part` sibling and renamed into place. The `.part` file is removed if either step
/// fails, and a directory sitting at `path` does not count as the workload.
pub fn ensure_workload(path: &Path, url: &str, fetcher: &dyn WorkloadFetcher) -> HarnessResult<()> {
    if path.is_file() {
        tracing::debug!(path = %path.display(), "workload present");
        return Ok(());
    }

    let fail = |reason: String| HarnessError::WorkloadFetch {
        url: url.to_string(),
        path: path.to_path_buf(),
        reason,
    };

    tracing::info!(url, path = %path.display(), "fetching workload");
    let body = fetcher.fetch(url).map_err(fail)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| fail(e.to_string()))?;
    }
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);
    if let Err(e) = fs::write(&partial, &body).and_then(|_| fs::rename(&partial, path)) {
        if let Err(cleanup) = fs::remove_file(&partial) {
            tracing::debug!(path = %partial.display(), error = %cleanup, "no partial workload to remove");
        }
        return Err(fail(e.to_string()));
    }

    tracing::info!(bytes = body.len(), "workload fetched");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;

    struct Fake {
        reply: Result<Vec<u8>, String>,
        calls: Cell<usize>,
    }

    impl WorkloadFetcher for Fake {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>, String> {
            self.calls.set(self.calls.get() + 1);
            self.reply.clone()
        }
    }

    #[test]
    fn test_existing_workload_is_not_fetched() {
        let dir = tempfile::tempdir().unwrap();
        let rom = dir.path().join("opus5.gb");
        fs::write(&rom, b"rom").unwrap();
        let fake = Fake {
            reply: Err("should not be called".to_string()),
            calls: Cell::new(0),
        };
        ensure_workload(&rom, TEST_ROM_URL, &fake).unwrap();
        assert_eq!(fake.calls.get(), 0);
    }

    #[test]
    fn test_missing_workload_is_fetched() {
        let dir = tempfile::tempdir().unwrap();
        let rom = dir.path().join("roms").join("opus5.gb");
        let fake = Fake {
            reply: Ok(b"ROMDATA".to_vec()),
            calls: Cell::new(0),
        };
        ensure_workload(&rom, TEST_ROM_URL, &fake).unwrap();
        assert_eq!(fake.calls.get(), 1);
        assert_eq!(fs::read(&rom).unwrap(), b"ROMDATA");
        assert!(!dir.path().join("roms").join("opus5.gb.part").exists());
    }

    #[test]
    fn test_fetch_failure_is_fatal_and_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let rom = dir.path().join("opus5.gb");
        let fake = Fake {
            reply: Err("server returned status 404 Not Found".to_string()),
            calls: Cell::new(0),
        };
        let err = ensure_workload(&rom, TEST_ROM_URL, &fake).unwrap_err();
        assert!(matches!(err, HarnessError::WorkloadFetch { .. }));
        assert!(err.to_string().contains("404"));
        assert!(!rom.exists());
    }

    #[test]
    fn test_failed_install_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let rom = dir.path().join("opus5.gb");
        // Renaming a file over a non-empty directory fails
        fs::create_dir_all(rom.join("stale")).unwrap();
        let fake = Fake {
            reply: Ok(b"ROMDATA".to_vec()),
            calls: Cell::new(0),
        };
        let err = ensure_workload(&rom, TEST_ROM_URL, &fake).unwrap_err();
        assert!(matches!(err, HarnessError::WorkloadFetch { .. }));
        assert_eq!(fake.calls.get(), 1);
        assert!(!dir.path().join("opus5.gb.part").exists());
        assert!(rom.is_dir());
    }
}
