//! File-based key-value store.
//!
//! Stores each record as a JSON file in a directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::store::{KeyValueStore, retain_until};
use crate::GateError;
use crate::crypto::generate_token;

/// Age after which leftover `.tmp` and `.claimed` files are swept.
const STALE_AFTER: StdDuration = StdDuration::from_secs(300);

#[derive(Debug, Serialize, Deserialize)]
struct FileRecord {
    value: String,
    retain_until: DateTime<Utc>,
}

/// File-based key-value store.
///
/// Each record is written to `{key}.json` in the configured directory.
/// Writes go through a temporary file and a rename, and `take` claims a
/// record by renaming it away before reading it. Renames within one
/// directory are atomic, so only one caller can claim a given record.
///
/// # Example
///
/// ```rust,ignore
/// use quizgate::FileKeyValueStore;
///
/// let store = FileKeyValueStore::new("/var/lib/quizgate/tokens")?;
/// ```
pub struct FileKeyValueStore {
    directory: PathBuf,
}

impl FileKeyValueStore {
    /// Creates a new file store, creating the directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns `GateError::StoreUnavailable` if the directory cannot be created.
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self, GateError> {
        let dir = directory.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            GateError::StoreUnavailable(format!("failed to create store directory: {e}"))
        })?;
        Ok(Self { directory: dir })
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{key}.json"))
    }

    fn read_record(path: &PathBuf) -> Result<Option<FileRecord>, GateError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(GateError::StoreUnavailable(format!(
                    "failed to read record: {e}"
                )));
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| GateError::StoreUnavailable(format!("failed to parse record: {e}")))
    }

    /// Removes records whose retention has elapsed, along with temporary and
    /// claim files left behind by interrupted writes or takes.
    ///
    /// Returns the number of records removed.
    ///
    /// # Errors
    ///
    /// Returns `GateError::StoreUnavailable` if the directory cannot be read.
    pub fn prune_expired(&self) -> Result<u64, GateError> {
        let entries = std::fs::read_dir(&self.directory).map_err(|e| {
            GateError::StoreUnavailable(format!("failed to read store directory: {e}"))
        })?;

        let now = Utc::now();
        let mut pruned = 0u64;

        for entry in entries.flatten() {
            let path = entry.path();

            if path.extension().is_some_and(|ext| ext == "json") {
                if let Ok(Some(record)) = Self::read_record(&path) {
                    if record.retain_until <= now && std::fs::remove_file(&path).is_ok() {
                        pruned += 1;
                    }
                }
            } else if is_leftover(&path) && is_stale(&entry) {
                if let Err(e) = std::fs::remove_file(&path) {
                    log::warn!(
                        target: "quizgate::one_time",
                        "msg=\"failed to sweep leftover file\" path={} error=\"{e}\"",
                        path.display()
                    );
                }
            }
        }

        Ok(pruned)
    }
}

fn is_leftover(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == "tmp" || ext == "claimed")
}

fn is_stale(entry: &std::fs::DirEntry) -> bool {
    entry
        .metadata()
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| age >= STALE_AFTER)
}

/// Keys become file names, so only a conservative alphabet is accepted.
fn valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 128
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), GateError> {
        if !valid_key(key) {
            return Err(GateError::Malformed);
        }

        let record = FileRecord {
            value,
            retain_until: retain_until(ttl),
        };
        let content = serde_json::to_string(&record)
            .map_err(|e| GateError::StoreUnavailable(format!("failed to serialize record: {e}")))?;

        let tmp = self.directory.join(format!(".{key}.{}.tmp", generate_token(8)));
        std::fs::write(&tmp, content)
            .map_err(|e| GateError::StoreUnavailable(format!("failed to write record: {e}")))?;
        std::fs::rename(&tmp, self.record_path(key)).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            GateError::StoreUnavailable(format!("failed to commit record: {e}"))
        })?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, GateError> {
        // Guards against path traversal
        if !valid_key(key) {
            return Ok(None);
        }

        Ok(Self::read_record(&self.record_path(key))?.map(|record| record.value))
    }

    async fn delete(&self, key: &str) -> Result<(), GateError> {
        if !valid_key(key) {
            return Ok(());
        }

        match std::fs::remove_file(self.record_path(key)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(GateError::StoreUnavailable(
                format!("failed to delete record: {e}"),
            )),
            _ => Ok(()),
        }
    }

    async fn take(&self, key: &str) -> Result<Option<String>, GateError> {
        if !valid_key(key) {
            return Ok(None);
        }

        let claimed = self
            .directory
            .join(format!(".{key}.{}.claimed", generate_token(8)));

        match std::fs::rename(self.record_path(key), &claimed) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(GateError::StoreUnavailable(format!(
                    "failed to claim record: {e}"
                )));
            }
        }

        let record = Self::read_record(&claimed);
        if let Err(e) = std::fs::remove_file(&claimed) {
            log::warn!(
                target: "quizgate::one_time",
                "msg=\"claimed record not removed, left for pruning\" error=\"{e}\""
            );
        }
        Ok(record?.map(|record| record.value))
    }

    fn atomic_take(&self) -> bool {
        true
    }
}
