use chrono::Duration;

use crate::GateError;

/// Longest accepted session lifetime.
pub const MAX_SESSION_TTL: Duration = Duration::days(365);

/// Session cookie settings.
///
/// Cookie attributes other than name, path and lifetime are fixed:
/// `HttpOnly; Secure; SameSite=Lax`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub cookie_path: String,
    /// Lifetime of a freshly minted session token.
    pub session_ttl: Duration,
    /// Trailing part of the lifetime in which a valid request triggers renewal.
    pub renew_window: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "quiz_sess".to_owned(),
            cookie_path: "/".to_owned(),
            session_ttl: Duration::hours(12),
            renew_window: Duration::hours(2),
        }
    }
}

impl SessionConfig {
    /// Checks the settings for values that would produce unusable cookies.
    ///
    /// # Errors
    ///
    /// Returns `GateError::ConfigInvalid` describing the first problem found.
    pub fn validate(&self) -> Result<(), GateError> {
        if self.cookie_name.is_empty()
            || !self
                .cookie_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(GateError::ConfigInvalid(
                "cookie name must be a non-empty token of [A-Za-z0-9_-]".to_owned(),
            ));
        }
        if !self.cookie_path.starts_with('/') || self.cookie_path.contains(';') {
            return Err(GateError::ConfigInvalid(
                "cookie path must start with '/' and not contain ';'".to_owned(),
            ));
        }
        if self.session_ttl.num_seconds() <= 0 || self.session_ttl > MAX_SESSION_TTL {
            return Err(GateError::ConfigInvalid(
                "session ttl must be positive and at most one year".to_owned(),
            ));
        }
        if self.renew_window.num_seconds() < 0 || self.renew_window >= self.session_ttl {
            return Err(GateError::ConfigInvalid(
                "renew window must be non-negative and shorter than the session ttl".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn ttl_secs(&self) -> i64 {
        self.session_ttl.num_seconds()
    }
}
