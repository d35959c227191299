//! Sensitive data wrapper types.
//!
//! The link key and one-time identifiers pass through request handlers and
//! log statements; wrapping them keeps them out of `Debug`/`Display` output.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use subtle::ConstantTimeEq;

/// A wrapper for sensitive string data that prevents accidental logging.
///
/// `SecretString` implements `Debug` and `Display` to show `[REDACTED]` instead
/// of the actual content. Equality is evaluated in constant time.
///
/// # Example
///
/// ```rust
/// use quizgate::SecretString;
///
/// let key = SecretString::new("link-key");
///
/// assert_eq!(format!("{:?}", key), "SecretString([REDACTED])");
/// assert_eq!(key.expose_secret(), "link-key");
/// assert!(key.matches("link-key"));
/// ```
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    /// Creates a new `SecretString` from any type that can be converted to a `String`.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Exposes the secret value.
    ///
    /// Use this only at the point of use, e.g. when keying an HMAC.
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Compares the secret against a candidate without leaking the position
    /// of the first differing byte.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        crate::crypto::constant_time_str_eq(&self.0, candidate)
    }

    /// Returns true if the secret is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the length of the secret in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl Eq for SecretString {}

impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // One-time ids are returned to clients, so serialization exposes the value
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(SecretString(s))
    }
}
