//! Key-value store abstraction behind one-time tokens.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::GateError;

/// Instant at which a record stored now with `ttl` may be dropped.
///
/// Saturates at the representable range instead of overflowing.
pub(crate) fn retain_until(ttl: Duration) -> DateTime<Utc> {
    Utc::now().checked_add_signed(ttl).unwrap_or(if ttl < Duration::zero() {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

/// Minimal key-value store consumed by [`OneTimeTokenStore`](super::OneTimeTokenStore).
///
/// Implement this trait for a shared backend (redis, a blob store, a database)
/// when several gate instances must see the same tokens.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// `ttl` is a retention hint: a record may be dropped once it has elapsed,
    /// but callers must not rely on that for expiry decisions.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), GateError>;

    async fn get(&self, key: &str) -> Result<Option<String>, GateError>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), GateError>;

    /// Fetches and deletes `key`.
    ///
    /// The default is `get` followed by `delete`. Two concurrent callers can
    /// both observe the value before either delete lands, so single use is
    /// not guaranteed. Stores with an atomic primitive override this and
    /// return `true` from [`atomic_take`](KeyValueStore::atomic_take).
    async fn take(&self, key: &str) -> Result<Option<String>, GateError> {
        let value = self.get(key).await?;
        if value.is_some() {
            self.delete(key).await?;
        }
        Ok(value)
    }

    /// Whether [`take`](KeyValueStore::take) is a single atomic operation.
    fn atomic_take(&self) -> bool {
        false
    }
}
