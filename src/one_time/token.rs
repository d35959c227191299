use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use super::store::KeyValueStore;
use crate::crypto::{generate_token_default, hash_token};
use crate::events::{GateEvent, dispatch};
use crate::{GateError, SecretString};

/// Identifiers longer than this are rejected without a store round trip.
pub const MAX_ID_LENGTH: usize = 128;

/// Outcome of consuming a one-time token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumeResult {
    Valid,
    Invalid,
    Expired,
}

/// Stored record. Expiry is unix milliseconds.
#[derive(Debug, Serialize, Deserialize)]
struct OneTimeRecord {
    expires: i64,
}

/// A freshly created one-time token.
#[derive(Clone)]
pub struct OneTimeToken {
    pub id: SecretString,
    /// Unix milliseconds.
    pub expires_at: i64,
}

impl std::fmt::Debug for OneTimeToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OneTimeToken")
            .field("id", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Issues random identifiers and consumes each of them at most once.
///
/// Records are keyed by the SHA-256 of the identifier. Consumption relies on
/// the store's [`take`](KeyValueStore::take); single use is only guaranteed
/// when the store reports an atomic take.
#[derive(Clone)]
pub struct OneTimeTokenStore {
    store: Arc<dyn KeyValueStore>,
}

impl OneTimeTokenStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        if !store.atomic_take() {
            log::warn!(
                target: "quizgate::one_time",
                "msg=\"store has no atomic take, concurrent consumers may both succeed\""
            );
        }
        Self { store }
    }

    /// Whether consumption is guaranteed single-use under concurrency.
    pub fn single_use_guaranteed(&self) -> bool {
        self.store.atomic_take()
    }

    /// Creates a token valid for `ttl` from `now_ms`.
    ///
    /// # Errors
    ///
    /// Returns `GateError::StoreUnavailable` if the record cannot be written.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "one_time_create", skip_all, err)
    )]
    pub async fn create(&self, ttl: Duration, now_ms: i64) -> Result<OneTimeToken, GateError> {
        let id = generate_token_default();
        let expires_at = now_ms.saturating_add(ttl.num_milliseconds());

        let record = serde_json::to_string(&OneTimeRecord {
            expires: expires_at,
        })
        .map_err(|e| GateError::StoreUnavailable(format!("failed to encode record: {e}")))?;

        self.store.set(&hash_token(&id), record, ttl).await?;

        log::debug!(target: "quizgate::one_time", "msg=\"one-time token created\" expires_at={expires_at}");
        dispatch(GateEvent::OneTimeTokenCreated {
            expires_at_ms: expires_at,
            at: Utc::now(),
        })
        .await;

        Ok(OneTimeToken {
            id: SecretString::new(id),
            expires_at,
        })
    }

    /// Consumes `id`: the record is removed whatever the outcome.
    ///
    /// A record expiring exactly at `now_ms` is still valid.
    ///
    /// # Errors
    ///
    /// Returns `GateError::StoreUnavailable` if the store fails.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "one_time_consume", skip_all, err)
    )]
    pub async fn consume(&self, id: &str, now_ms: i64) -> Result<ConsumeResult, GateError> {
        let outcome = if id.is_empty() || id.len() > MAX_ID_LENGTH {
            ConsumeResult::Invalid
        } else {
            match self.store.take(&hash_token(id)).await? {
                None => ConsumeResult::Invalid,
                Some(raw) => match serde_json::from_str::<OneTimeRecord>(&raw) {
                    Ok(record) if record.expires < now_ms => ConsumeResult::Expired,
                    Ok(_) => ConsumeResult::Valid,
                    Err(_) => {
                        log::warn!(target: "quizgate::one_time", "msg=\"unreadable one-time record discarded\"");
                        ConsumeResult::Invalid
                    }
                },
            }
        };

        log::info!(target: "quizgate::one_time", "msg=\"one-time token consumed\" outcome={outcome:?}");
        dispatch(GateEvent::OneTimeTokenConsumed {
            outcome,
            at: Utc::now(),
        })
        .await;

        Ok(outcome)
    }
}
