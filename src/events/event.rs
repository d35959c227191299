use chrono::{DateTime, Utc};

use crate::SessionFailure;
use crate::one_time::ConsumeResult;

/// Gate events emitted by the issuer, the gatekeeper and the one-time store.
///
/// Events are always fired. If no listeners are registered they are silently
/// ignored. Register listeners via
/// [`register_event_listeners`](crate::register_event_listeners).
#[derive(Debug, Clone)]
pub enum GateEvent {
    // entry
    SessionIssued {
        fingerprint: String,
        expires_at: i64,
        at: DateTime<Utc>,
    },
    IssueRejected {
        reason: String,
        at: DateTime<Utc>,
    },

    // edge
    SessionRenewed {
        fingerprint: String,
        expires_at: i64,
        at: DateTime<Utc>,
    },
    AccessDenied {
        reason: SessionFailure,
        path: String,
        at: DateTime<Utc>,
    },

    // one-time tokens
    OneTimeTokenCreated {
        expires_at_ms: i64,
        at: DateTime<Utc>,
    },
    OneTimeTokenConsumed {
        outcome: ConsumeResult,
        at: DateTime<Utc>,
    },
}

impl GateEvent {
    /// Returns a dot-separated event name for logging/tracing.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionIssued { .. } => "gate.session.issued",
            Self::IssueRejected { .. } => "gate.session.issue_rejected",
            Self::SessionRenewed { .. } => "gate.session.renewed",
            Self::AccessDenied { .. } => "gate.access.denied",
            Self::OneTimeTokenCreated { .. } => "gate.one_time.created",
            Self::OneTimeTokenConsumed { .. } => "gate.one_time.consumed",
        }
    }

    /// Returns the timestamp when this event occurred.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::SessionIssued { at, .. }
            | Self::IssueRejected { at, .. }
            | Self::SessionRenewed { at, .. }
            | Self::AccessDenied { at, .. }
            | Self::OneTimeTokenCreated { at, .. }
            | Self::OneTimeTokenConsumed { at, .. } => *at,
        }
    }
}
