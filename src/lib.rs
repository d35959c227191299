//! Signed-cookie access gate for link-protected content.
//!
//! An external platform hands users a one-time entry link carrying a shared
//! credential. [`TokenIssuer`] turns that credential into a signed, expiring
//! session cookie; [`EdgeGatekeeper`] validates the cookie on every protected
//! request, silently renews it near expiry and keeps protected responses out
//! of caches. No session state is kept on the server.
//!
//! [`OneTimeTokenStore`] is the store-backed alternative: a random id kept in
//! a [`KeyValueStore`] and consumed exactly once.

pub mod config;
pub mod crypto;
pub mod events;
pub mod gatekeeper;
pub mod issuer;
pub mod one_time;
pub mod origin;
pub mod secret;
pub mod session;

#[cfg(feature = "axum_support")]
pub mod api;

use std::fmt;

pub use config::{GateConfig, LinkKey};
pub use events::register_event_listeners;
pub use gatekeeper::{DenyReason, EdgeGatekeeper, GateDecision, GateRequest, Normalized};
pub use issuer::{IssueRequest, Issued, TokenIssuer};
pub use one_time::{
    ConsumeResult, FileKeyValueStore, InMemoryKeyValueStore, KeyValueStore, OneTimeTokenStore,
};
#[cfg(any(test, feature = "mocks"))]
pub use one_time::MockKeyValueStore;
pub use origin::{NavigationPolicy, OriginPolicy, OriginSignal, UnconfiguredOriginMode};
pub use secret::SecretString;
pub use session::{SessionConfig, SessionPayload, SessionToken, VerificationResult};

/// Why a presented session cookie was rejected.
///
/// Kept distinct for logs and tests; clients only ever see the collapsed
/// "session invalid" outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFailure {
    NoCredential,
    Malformed,
    BadSignature,
    Expired,
    FingerprintMismatch,
}

impl SessionFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoCredential => "no_credential",
            Self::Malformed => "malformed",
            Self::BadSignature => "bad_signature",
            Self::Expired => "expired",
            Self::FingerprintMismatch => "fingerprint_mismatch",
        }
    }
}

impl fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// Required configuration (the link key) is absent.
    ConfigMissing(String),
    /// A configuration value is present but unusable.
    ConfigInvalid(String),
    CredentialInvalid,
    OriginNotAllowed,
    SessionInvalid(SessionFailure),
    /// The one-time token backend failed.
    StoreUnavailable(String),
    /// A request parameter was missing or unparsable.
    Malformed,
}

impl std::error::Error for GateError {}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateError::ConfigMissing(msg) => write!(f, "Configuration missing: {}", msg),
            GateError::ConfigInvalid(msg) => write!(f, "Configuration invalid: {}", msg),
            GateError::CredentialInvalid => write!(f, "Invalid link credential"),
            GateError::OriginNotAllowed => write!(f, "Request origin not allowed"),
            GateError::SessionInvalid(reason) => write!(f, "Session invalid ({})", reason),
            GateError::StoreUnavailable(msg) => write!(f, "Token store unavailable: {}", msg),
            GateError::Malformed => write!(f, "Malformed request"),
        }
    }
}
