//! Configuration for the gate.
//!
//! Everything is read once at startup and then shared immutably. The only
//! required value is the link key; a gate without one refuses to start.
//!
//! # Example
//!
//! ```rust
//! use quizgate::config::GateConfig;
//! use quizgate::origin::OriginPolicy;
//! use chrono::Duration;
//!
//! let mut config = GateConfig::new("a-long-random-link-key").unwrap();
//! config.session.session_ttl = Duration::hours(8);
//! config.origin = OriginPolicy::with_allowed_hosts(["platform.example.com"]);
//! assert!(config.validate().is_ok());
//! ```

use chrono::Duration;

use crate::origin::{NavigationPolicy, OriginPolicy, UnconfiguredOriginMode};
use crate::session::SessionConfig;
use crate::{GateError, SecretString};

pub const ENV_LINK_KEY: &str = "LINK_KEY";
pub const ENV_COOKIE_NAME: &str = "SESSION_COOKIE_NAME";
pub const ENV_COOKIE_PATH: &str = "SESSION_COOKIE_PATH";
pub const ENV_SESSION_TTL: &str = "SESSION_TTL_SECS";
pub const ENV_RENEW_WINDOW: &str = "SESSION_RENEW_WINDOW_SECS";
pub const ENV_PROTECTED_PATH: &str = "PROTECTED_PATH";
pub const ENV_ALLOWED_ORIGINS: &str = "ALLOWED_ORIGINS";
pub const ENV_ORIGIN_POLICY: &str = "ORIGIN_POLICY";
pub const ENV_FALLBACK_NAVIGATION: &str = "FALLBACK_NAVIGATION";
pub const ENV_ONE_TIME_TTL: &str = "ONE_TIME_TOKEN_TTL_MS";

/// Longest accepted one-time token lifetime.
pub const MAX_ONE_TIME_TTL: Duration = Duration::days(1);

/// The shared secret used to sign and verify every session token.
///
/// Construction fails on an empty key, so holding a `LinkKey` proves the gate
/// is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkKey(SecretString);

impl LinkKey {
    /// # Errors
    ///
    /// Returns `GateError::ConfigMissing` if the key is empty or only whitespace.
    pub fn new(key: impl Into<String>) -> Result<Self, GateError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(GateError::ConfigMissing(format!("{ENV_LINK_KEY} is not set")));
        }
        Ok(Self(SecretString::new(key)))
    }

    pub fn secret(&self) -> &SecretString {
        &self.0
    }

    /// Constant-time check of an inbound link credential.
    pub fn matches(&self, credential: &str) -> bool {
        !credential.is_empty() && self.0.matches(credential)
    }
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub link_key: LinkKey,
    pub session: SessionConfig,
    pub origin: OriginPolicy,
    /// Where successful entry redirects to. Must be a local absolute path.
    pub protected_path: String,
    pub one_time_token_ttl: Duration,
}

impl GateConfig {
    /// Creates a configuration with default settings around `link_key`.
    ///
    /// # Errors
    ///
    /// Returns `GateError::ConfigMissing` if the key is empty.
    pub fn new(link_key: impl Into<String>) -> Result<Self, GateError> {
        Ok(Self {
            link_key: LinkKey::new(link_key)?,
            session: SessionConfig::default(),
            origin: OriginPolicy::default(),
            protected_path: "/quiz/".to_owned(),
            one_time_token_ttl: Duration::minutes(2),
        })
    }

    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `GateError::ConfigMissing` without `LINK_KEY` and
    /// `GateError::ConfigInvalid` for unparsable values.
    pub fn from_env() -> Result<Self, GateError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through an arbitrary variable lookup.
    ///
    /// Empty values count as unset.
    ///
    /// # Errors
    ///
    /// See [`GateConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GateError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut config = Self::new(get(ENV_LINK_KEY).unwrap_or_default())?;

        if let Some(name) = get(ENV_COOKIE_NAME) {
            config.session.cookie_name = name.trim().to_owned();
        }
        if let Some(path) = get(ENV_COOKIE_PATH) {
            config.session.cookie_path = path.trim().to_owned();
        }
        if let Some(secs) = get(ENV_SESSION_TTL) {
            config.session.session_ttl =
                parse_duration(ENV_SESSION_TTL, &secs, Duration::try_seconds)?;
        }
        if let Some(secs) = get(ENV_RENEW_WINDOW) {
            config.session.renew_window =
                parse_duration(ENV_RENEW_WINDOW, &secs, Duration::try_seconds)?;
        }
        if let Some(path) = get(ENV_PROTECTED_PATH) {
            config.protected_path = path.trim().to_owned();
        }
        if let Some(ms) = get(ENV_ONE_TIME_TTL) {
            config.one_time_token_ttl =
                parse_duration(ENV_ONE_TIME_TTL, &ms, Duration::try_milliseconds)?;
        }

        let mut origin = match get(ENV_ALLOWED_ORIGINS) {
            Some(hosts) => {
                let policy = OriginPolicy::with_allowed_hosts(hosts.split(','));
                if !policy.has_allow_list() {
                    return Err(GateError::ConfigInvalid(format!(
                        "{ENV_ALLOWED_ORIGINS} contains no usable host, got '{hosts}'"
                    )));
                }
                policy
            }
            None => OriginPolicy::default(),
        };
        if let Some(mode) = get(ENV_ORIGIN_POLICY) {
            origin.unconfigured = match mode.trim().to_ascii_lowercase().as_str() {
                "open" | "allow" => UnconfiguredOriginMode::Allow,
                "closed" | "deny" => UnconfiguredOriginMode::Deny,
                other => {
                    return Err(GateError::ConfigInvalid(format!(
                        "{ENV_ORIGIN_POLICY} must be 'open' or 'closed', got '{other}'"
                    )));
                }
            };
        }
        if let Some(flag) = get(ENV_FALLBACK_NAVIGATION) {
            if !parse_flag(ENV_FALLBACK_NAVIGATION, &flag)? {
                origin.navigation = NavigationPolicy::disabled();
            }
        }
        config.origin = origin;

        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns `GateError::ConfigInvalid` describing the first problem found.
    pub fn validate(&self) -> Result<(), GateError> {
        self.session.validate()?;

        if !self.protected_path.starts_with('/') || self.protected_path.starts_with("//") {
            return Err(GateError::ConfigInvalid(format!(
                "{ENV_PROTECTED_PATH} must be a local absolute path"
            )));
        }
        if self.one_time_token_ttl <= Duration::zero()
            || self.one_time_token_ttl > MAX_ONE_TIME_TTL
        {
            return Err(GateError::ConfigInvalid(format!(
                "{ENV_ONE_TIME_TTL} must be positive and at most one day"
            )));
        }
        if !self.origin.has_allow_list() && self.origin.unconfigured == UnconfiguredOriginMode::Allow
        {
            log::warn!(
                target: "quizgate",
                "msg=\"no origin allow-list configured, accepting entry links from any origin\""
            );
        }
        Ok(())
    }
}

fn parse_number(name: &str, value: &str) -> Result<i64, GateError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| GateError::ConfigInvalid(format!("{name} must be an integer, got '{value}'")))
}

fn parse_duration(
    name: &str,
    value: &str,
    unit: fn(i64) -> Option<Duration>,
) -> Result<Duration, GateError> {
    unit(parse_number(name, value)?)
        .ok_or_else(|| GateError::ConfigInvalid(format!("{name} is out of range, got '{value}'")))
}

fn parse_flag(name: &str, value: &str) -> Result<bool, GateError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "on" | "true" | "yes" => Ok(true),
        "0" | "off" | "false" | "no" => Ok(false),
        _ => Err(GateError::ConfigInvalid(format!(
            "{name} must be 'on' or 'off', got '{value}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_link_key_required() {
        assert!(matches!(LinkKey::new(""), Err(GateError::ConfigMissing(_))));
        assert!(matches!(LinkKey::new("   "), Err(GateError::ConfigMissing(_))));
        assert!(matches!(
            GateConfig::from_lookup(lookup(&[])),
            Err(GateError::ConfigMissing(_))
        ));
    }

    #[test]
    fn test_link_key_matches() {
        let key = LinkKey::new("abc123").unwrap();
        assert!(key.matches("abc123"));
        assert!(!key.matches("wrong"));
        assert!(!key.matches(""));
    }

    #[test]
    fn test_link_key_debug_redacted() {
        let key = LinkKey::new("abc123").unwrap();
        assert!(!format!("{key:?}").contains("abc123"));
    }

    #[test]
    fn test_defaults() {
        let config = GateConfig::from_lookup(lookup(&[(ENV_LINK_KEY, "abc123")])).unwrap();
        assert_eq!(config.session, SessionConfig::default());
        assert_eq!(config.protected_path, "/quiz/");
        assert_eq!(config.one_time_token_ttl, Duration::milliseconds(120_000));
        assert!(!config.origin.has_allow_list());
        assert_eq!(config.origin.unconfigured, UnconfiguredOriginMode::Deny);
        assert!(config.origin.navigation.enabled);
    }

    #[test]
    fn test_all_values() {
        let config = GateConfig::from_lookup(lookup(&[
            (ENV_LINK_KEY, "abc123"),
            (ENV_COOKIE_NAME, "quiz_auth"),
            (ENV_COOKIE_PATH, "/quiz"),
            (ENV_SESSION_TTL, "28800"),
            (ENV_RENEW_WINDOW, "900"),
            (ENV_PROTECTED_PATH, "/quiz/index.html"),
            (ENV_ALLOWED_ORIGINS, "nutror.com, https://www.example.org"),
            (ENV_FALLBACK_NAVIGATION, "off"),
            (ENV_ONE_TIME_TTL, "60000"),
        ]))
        .unwrap();

        assert_eq!(config.session.cookie_name, "quiz_auth");
        assert_eq!(config.session.cookie_path, "/quiz");
        assert_eq!(config.session.session_ttl, Duration::hours(8));
        assert_eq!(config.session.renew_window, Duration::minutes(15));
        assert_eq!(config.protected_path, "/quiz/index.html");
        assert_eq!(
            config.origin.allowed_hosts,
            vec!["nutror.com".to_owned(), "www.example.org".to_owned()]
        );
        assert!(!config.origin.navigation.enabled);
        assert_eq!(config.one_time_token_ttl, Duration::minutes(1));
    }

    #[test]
    fn test_upper_bounds_accepted() {
        let config = GateConfig::from_lookup(lookup(&[
            (ENV_LINK_KEY, "abc123"),
            (ENV_SESSION_TTL, "31536000"),
            (ENV_ONE_TIME_TTL, "86400000"),
        ]))
        .unwrap();
        assert_eq!(config.session.session_ttl, Duration::days(365));
        assert_eq!(config.one_time_token_ttl, MAX_ONE_TIME_TTL);
    }

    #[test]
    fn test_open_origin_policy() {
        let config = GateConfig::from_lookup(lookup(&[
            (ENV_LINK_KEY, "abc123"),
            (ENV_ORIGIN_POLICY, "open"),
        ]))
        .unwrap();
        assert_eq!(config.origin.unconfigured, UnconfiguredOriginMode::Allow);
    }

    #[test]
    fn test_invalid_values_rejected() {
        for (name, value) in [
            (ENV_SESSION_TTL, "twelve hours"),
            (ENV_ORIGIN_POLICY, "maybe"),
            (ENV_FALLBACK_NAVIGATION, "sometimes"),
            (ENV_PROTECTED_PATH, "https://evil.example/"),
            (ENV_ONE_TIME_TTL, "0"),
            (ENV_RENEW_WINDOW, "999999"),
            (ENV_SESSION_TTL, "99999999999999999"),
            (ENV_SESSION_TTL, "31536001"),
            (ENV_RENEW_WINDOW, "-9223372036854775808"),
            (ENV_ONE_TIME_TTL, "9223372036854775807"),
            (ENV_ONE_TIME_TTL, "86400001"),
            (ENV_ALLOWED_ORIGINS, "https://"),
            (ENV_ALLOWED_ORIGINS, " , ,"),
        ] {
            let result = GateConfig::from_lookup(lookup(&[(ENV_LINK_KEY, "abc123"), (name, value)]));
            assert!(
                matches!(result, Err(GateError::ConfigInvalid(_))),
                "{name}={value} should be rejected"
            );
        }
    }
}
