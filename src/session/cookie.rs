//! Session cookie serialization and lookup.

use super::SessionConfig;

/// Attributes every session cookie carries.
pub const COOKIE_ATTRIBUTES: &str = "HttpOnly; Secure; SameSite=Lax";

/// Builds a `Set-Cookie` value carrying `value` for the configured lifetime.
pub fn session_cookie(config: &SessionConfig, value: &str) -> String {
    build_cookie(config, value, config.ttl_secs())
}

/// Builds a `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie(config: &SessionConfig) -> String {
    build_cookie(config, "", 0)
}

fn build_cookie(config: &SessionConfig, value: &str, max_age: i64) -> String {
    format!(
        "{}={}; Path={}; {}; Max-Age={}",
        config.cookie_name, value, config.cookie_path, COOKIE_ATTRIBUTES, max_age
    )
}

/// Finds a cookie value in a `Cookie` request header.
///
/// Pairs are split on the first `=`; empty values count as absent.
pub fn find_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty())
}
