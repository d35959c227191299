//! Origin policy for inbound entry links.
//!
//! The platform's entry link is only honoured when the click came from an
//! allowed host. The referrer is the primary signal; when the platform strips
//! it, Fetch-Metadata headers describing a user-initiated top-level navigation
//! can stand in, under a configurable [`NavigationPolicy`].

use url::Url;

use crate::GateError;

/// Origin evidence carried by an inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginSignal {
    /// `Referer` header.
    pub referrer: Option<String>,
    /// `Sec-Fetch-Site` header.
    pub fetch_site: Option<String>,
    /// `Sec-Fetch-Mode` header.
    pub fetch_mode: Option<String>,
    /// `Sec-Fetch-Dest` header.
    pub fetch_dest: Option<String>,
    /// `Sec-Fetch-User` header.
    pub fetch_user: Option<String>,
}

impl OriginSignal {
    pub fn from_referrer(referrer: impl Into<String>) -> Self {
        Self {
            referrer: Some(referrer.into()),
            ..Default::default()
        }
    }

    fn referrer(&self) -> Option<&str> {
        self.referrer
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }
}

/// What to do when no allow-list is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnconfiguredOriginMode {
    /// Accept any origin (fail-open). Must be chosen explicitly.
    Allow,
    /// Reject every origin (fail-closed).
    #[default]
    Deny,
}

/// Acceptance criteria for the Fetch-Metadata fallback.
///
/// Only consulted when the referrer is missing. The defaults demand evidence
/// of a user-activated, top-level document navigation coming from another
/// site, which a same-origin `fetch()` or an embedded resource cannot produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationPolicy {
    pub enabled: bool,
    /// Accepted `Sec-Fetch-Site` values.
    pub allowed_sites: Vec<String>,
    /// Require `Sec-Fetch-Dest: document`.
    pub require_document: bool,
    /// Require `Sec-Fetch-User: ?1`.
    pub require_user_activation: bool,
}

impl Default for NavigationPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_sites: vec!["cross-site".to_owned(), "same-site".to_owned()],
            require_document: true,
            require_user_activation: true,
        }
    }
}

impl NavigationPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn accepts(&self, signal: &OriginSignal) -> bool {
        if !self.enabled {
            return false;
        }

        let is = |value: &Option<String>, expected: &str| {
            value
                .as_deref()
                .is_some_and(|v| v.trim().eq_ignore_ascii_case(expected))
        };

        if !is(&signal.fetch_mode, "navigate") {
            return false;
        }
        if self.require_document && !is(&signal.fetch_dest, "document") {
            return false;
        }
        if self.require_user_activation && !is(&signal.fetch_user, "?1") {
            return false;
        }

        signal.fetch_site.as_deref().is_some_and(|site| {
            self.allowed_sites
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(site.trim()))
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginPolicy {
    /// Allowed hosts; subdomains of each entry are allowed too.
    pub allowed_hosts: Vec<String>,
    pub unconfigured: UnconfiguredOriginMode,
    pub navigation: NavigationPolicy,
}

impl OriginPolicy {
    /// Builds a policy from an allow-list, normalising entries to bare
    /// lowercase hosts. Entries may be given as hosts or as URLs.
    pub fn with_allowed_hosts<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_hosts: hosts
                .into_iter()
                .filter_map(|h| normalize_host_entry(h.as_ref()))
                .collect(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn unconfigured(mut self, mode: UnconfiguredOriginMode) -> Self {
        self.unconfigured = mode;
        self
    }

    #[must_use]
    pub fn navigation(mut self, navigation: NavigationPolicy) -> Self {
        self.navigation = navigation;
        self
    }

    pub fn has_allow_list(&self) -> bool {
        !self.allowed_hosts.is_empty()
    }

    /// Returns true if `host` equals or is a subdomain of an allowed host.
    pub fn host_allowed(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.allowed_hosts.iter().any(|allowed| {
            host == *allowed
                || host
                    .strip_suffix(allowed.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    /// Checks an inbound origin signal.
    ///
    /// # Errors
    ///
    /// Returns `GateError::OriginNotAllowed` when the signal is rejected.
    pub fn check(&self, signal: &OriginSignal) -> Result<(), GateError> {
        if !self.has_allow_list() {
            return match self.unconfigured {
                UnconfiguredOriginMode::Allow => Ok(()),
                UnconfiguredOriginMode::Deny => Err(GateError::OriginNotAllowed),
            };
        }

        match signal.referrer() {
            Some(referrer) => match referrer_host(referrer) {
                Some(host) if self.host_allowed(&host) => Ok(()),
                _ => Err(GateError::OriginNotAllowed),
            },
            None if self.navigation.accepts(signal) => Ok(()),
            None => Err(GateError::OriginNotAllowed),
        }
    }
}

/// Extracts the lowercase host of a referrer URL.
pub fn referrer_host(referrer: &str) -> Option<String> {
    let url = Url::parse(referrer).ok()?;
    match url.scheme() {
        "http" | "https" => url.host_str().map(str::to_ascii_lowercase),
        _ => None,
    }
}

fn normalize_host_entry(entry: &str) -> Option<String> {
    let entry = entry.trim();
    if entry.is_empty() {
        return None;
    }
    if entry.contains("://") {
        return referrer_host(entry);
    }
    let host = entry
        .trim_start_matches("*.")
        .trim_start_matches('.')
        .trim_end_matches('.')
        .to_ascii_lowercase();
    (!host.is_empty()).then_some(host)
}
