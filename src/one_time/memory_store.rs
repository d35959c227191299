//! In-memory key-value store.
//!
//! Suitable for development, testing, and single-instance deployments.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::store::{KeyValueStore, retain_until};
use crate::GateError;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    retain_until: DateTime<Utc>,
}

/// Key-value store backed by a `HashMap` behind a `RwLock`.
///
/// `take` removes the entry under a single write lock, so concurrent
/// consumers of the same key see it at most once.
///
/// # Note
///
/// Entries are lost when the process restarts, and are not shared between
/// instances. For persistence on a single host, use
/// [`FileKeyValueStore`](super::FileKeyValueStore).
#[derive(Debug, Clone, Default)]
pub struct InMemoryKeyValueStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entries currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().map(|guard| guard.len()).unwrap_or(0)
    }

    /// Returns true if there are no entries stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops entries whose retention has elapsed.
    ///
    /// Call periodically in long-running processes to bound memory.
    /// Returns the number of entries removed.
    pub fn prune_expired(&self) -> usize {
        let now = Utc::now();
        self.entries.write().map_or(0, |mut entries| {
            let before = entries.len();
            entries.retain(|_, entry| entry.retain_until > now);
            before.saturating_sub(entries.len())
        })
    }
}

fn poisoned<T>(_: T) -> GateError {
    GateError::StoreUnavailable("lock poisoned".to_owned())
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), GateError> {
        let entry = Entry {
            value,
            retain_until: retain_until(ttl),
        };
        self.entries
            .write()
            .map_err(poisoned)?
            .insert(key.to_owned(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, GateError> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<(), GateError> {
        self.entries.write().map_err(poisoned)?.remove(key);
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<String>, GateError> {
        let removed = self.entries.write().map_err(poisoned)?.remove(key);
        Ok(removed.map(|entry| entry.value))
    }

    fn atomic_take(&self) -> bool {
        true
    }
}
