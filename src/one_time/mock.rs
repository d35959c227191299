#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;

use super::store::KeyValueStore;
use crate::GateError;

/// Test double for [`KeyValueStore`].
///
/// Uses the trait's default, non-atomic `take`, and can be switched into a
/// failing mode to exercise backend outages.
#[derive(Clone, Default)]
pub struct MockKeyValueStore {
    pub entries: Arc<Mutex<HashMap<String, String>>>,
    pub failing: Arc<AtomicBool>,
}

impl MockKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with `StoreUnavailable`.
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), GateError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GateError::StoreUnavailable("mock store offline".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MockKeyValueStore {
    async fn set(&self, key: &str, value: String, _ttl: Duration) -> Result<(), GateError> {
        self.check()?;
        self.entries.lock().unwrap().insert(key.to_owned(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, GateError> {
        self.check()?;
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), GateError> {
        self.check()?;
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}
