//! Per-feature usage counters
//!
//! Each feature has a locally-incremented count and the last count the server
//! confirmed. The merged count is the larger of the two; since `local` only grows
//! and `server` only ratchets upward, the merged count never decreases.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use eyre::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Counters for a single feature
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounter {
    pub local: u64,
    pub server: u64,
}

impl UsageCounter {
    pub fn merged(&self) -> u64 {
        self.local.max(self.server)
    }

    fn increment(&mut self, amount: u64) {
        self.local = self.local.saturating_add(amount);
    }

    fn raise_server(&mut self, server_count: u64) {
        self.server = self.server.max(server_count);
    }
}

pub trait UsageCounterStore: Send + Sync {
    /// Add `amount` to the local counter for `feature`
    fn increment(&self, feature: &str, amount: u64);

    fn local_count(&self, feature: &str) -> u64;

    /// Last server-confirmed count for `feature`
    fn server_count(&self, feature: &str) -> u64;

    /// Raise the server floor; lower or stale values are ignored
    fn update_server_count(&self, feature: &str, server_count: u64);

    /// `max(local, server)` for `feature`
    fn merged_count(&self, feature: &str) -> u64;
}

/// Process-lifetime counters
#[derive(Debug, Default)]
pub struct InMemoryUsageCounterStore {
    counters: Mutex<HashMap<String, UsageCounter>>,
}

impl InMemoryUsageCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, feature: &str) -> UsageCounter {
        self.counters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(feature)
            .copied()
            .unwrap_or_default()
    }
}

impl UsageCounterStore for InMemoryUsageCounterStore {
    fn increment(&self, feature: &str, amount: u64) {
        debug!(%feature, %amount, "InMemoryUsageCounterStore::increment: called");
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters.entry(feature.to_string()).or_default().increment(amount);
    }

    fn local_count(&self, feature: &str) -> u64 {
        self.counter(feature).local
    }

    fn server_count(&self, feature: &str) -> u64 {
        self.counter(feature).server
    }

    fn update_server_count(&self, feature: &str, server_count: u64) {
        debug!(%feature, %server_count, "InMemoryUsageCounterStore::update_server_count: called");
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters.entry(feature.to_string()).or_default().raise_server(server_count);
    }

    fn merged_count(&self, feature: &str) -> u64 {
        self.counter(feature).merged()
    }
}

/// Counters persisted to a JSON file after every mutation
///
/// Every mutation holds an exclusive lock on a sibling `.lock` file, re-reads the
/// file, merges it with the in-memory counts, applies the change, and writes a
/// temp file that is renamed over the target. Several handles (or processes) can
/// share one file without losing increments or lowering a server count.
#[derive(Debug)]
pub struct FileUsageCounterStore {
    path: PathBuf,
    counters: Mutex<HashMap<String, UsageCounter>>,
}

/// Exclusive advisory lock, released on drop
struct UsageFileLock {
    file: fs::File,
}

impl UsageFileLock {
    fn acquire(path: &Path) -> Result<Self> {
        let lock_path = path.with_extension("json.lock");
        if let Some(parent) = lock_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).context("Failed to create usage directory")?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .context("Failed to open usage lock file")?;
        file.lock_exclusive().context("Failed to lock usage file")?;

        Ok(Self { file })
    }
}

impl Drop for UsageFileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl FileUsageCounterStore {
    /// Open the store at `path`, loading existing counts if the file exists
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        debug!(path = %path.display(), "FileUsageCounterStore::open: called");

        let counters = Self::read_counters(&path)?;

        Ok(Self {
            path,
            counters: Mutex::new(counters),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_counters(path: &Path) -> Result<HashMap<String, UsageCounter>> {
        if !path.is_file() {
            debug!(path = %path.display(), "FileUsageCounterStore::read_counters: no existing file");
            return Ok(HashMap::new());
        }
        let content = fs::read_to_string(path).context("Failed to read usage file")?;
        serde_json::from_str(&content).context("Failed to parse usage file")
    }

    fn counter(&self, feature: &str) -> UsageCounter {
        self.counters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(feature)
            .copied()
            .unwrap_or_default()
    }

    fn mutate(&self, feature: &str, f: impl FnOnce(&mut UsageCounter)) {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());

        let lock = match UsageFileLock::acquire(&self.path) {
            Ok(lock) => Some(lock),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "FileUsageCounterStore: failed to lock usage file");
                None
            }
        };

        if lock.is_some() {
            match Self::read_counters(&self.path) {
                Ok(on_disk) => merge_counters(&mut counters, on_disk),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "FileUsageCounterStore: ignoring unreadable usage file")
                }
            }
        }

        f(counters.entry(feature.to_string()).or_default());

        // Only write while holding the file lock
        if lock.is_some()
            && let Err(e) = self.persist(&counters)
        {
            warn!(path = %self.path.display(), error = %e, "FileUsageCounterStore: failed to persist counters");
        }
    }

    fn persist(&self, counters: &HashMap<String, UsageCounter>) -> Result<()> {
        let content = serde_json::to_string_pretty(counters).context("Failed to serialize counters")?;
        let tmp_path = self.path.with_extension("json.tmp");

        let mut file = fs::File::create(&tmp_path).context("Failed to create temp usage file")?;
        file.write_all(content.as_bytes()).context("Failed to write temp usage file")?;
        file.sync_all().context("Failed to sync temp usage file")?;
        fs::rename(&tmp_path, &self.path).context("Failed to replace usage file")?;

        Ok(())
    }
}

/// Fold counts read from disk into `counters`, keeping the larger of each field
fn merge_counters(counters: &mut HashMap<String, UsageCounter>, on_disk: HashMap<String, UsageCounter>) {
    for (feature, disk) in on_disk {
        let counter = counters.entry(feature).or_default();
        counter.local = counter.local.max(disk.local);
        counter.raise_server(disk.server);
    }
}

impl UsageCounterStore for FileUsageCounterStore {
    fn increment(&self, feature: &str, amount: u64) {
        debug!(%feature, %amount, "FileUsageCounterStore::increment: called");
        self.mutate(feature, |c| c.increment(amount));
    }

    fn local_count(&self, feature: &str) -> u64 {
        self.counter(feature).local
    }

    fn server_count(&self, feature: &str) -> u64 {
        self.counter(feature).server
    }

    fn update_server_count(&self, feature: &str, server_count: u64) {
        debug!(%feature, %server_count, "FileUsageCounterStore::update_server_count: called");
        self.mutate(feature, |c| c.raise_server(server_count));
    }

    fn merged_count(&self, feature: &str) -> u64 {
        self.counter(feature).merged()
    }
}
