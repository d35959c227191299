//! Entry-link handling: turns the platform's link credential into the first
//! session cookie.

use std::sync::Arc;

use chrono::Utc;

use crate::config::GateConfig;
use crate::crypto;
use crate::events::{GateEvent, dispatch};
use crate::origin::OriginSignal;
use crate::session::{SessionToken, clear_session_cookie, session_cookie};
use crate::GateError;

/// An inbound entry-link request.
#[derive(Debug, Clone, Default)]
pub struct IssueRequest {
    /// Link credential from the `k` (or `token`) query parameter.
    pub credential: Option<String>,
    pub origin: OriginSignal,
    pub user_agent: Option<String>,
}

/// A successful issuance: where to send the client and what to set.
#[derive(Debug, Clone)]
pub struct Issued {
    pub token: SessionToken,
    /// Redirect target; never carries the credential.
    pub location: String,
    /// `Set-Cookie` values in order: a clearing cookie, then the session.
    pub set_cookies: Vec<String>,
}

/// Validates entry links and mints sessions.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    config: Arc<GateConfig>,
}

impl TokenIssuer {
    pub fn new(config: Arc<GateConfig>) -> Self {
        TokenIssuer { config }
    }

    /// Checks the credential and the origin, then mints a session.
    ///
    /// Pure: no events, no clock. See [`TokenIssuer::issue`].
    ///
    /// # Errors
    ///
    /// `GateError::CredentialInvalid` when the credential is missing or wrong,
    /// `GateError::OriginNotAllowed` when the origin policy rejects the request.
    pub fn authorize(&self, request: &IssueRequest, now: i64) -> Result<Issued, GateError> {
        let credential = request.credential.as_deref().unwrap_or_default();
        if !self.config.link_key.matches(credential) {
            return Err(GateError::CredentialInvalid);
        }

        self.config.origin.check(&request.origin)?;

        let fingerprint = crypto::fingerprint(request.user_agent.as_deref().unwrap_or_default());
        let token = SessionToken::mint(
            &self.config.link_key,
            &fingerprint,
            now,
            self.config.session.session_ttl,
        );

        let set_cookies = vec![
            clear_session_cookie(&self.config.session),
            session_cookie(&self.config.session, token.as_str()),
        ];

        Ok(Issued {
            token,
            location: self.config.protected_path.clone(),
            set_cookies,
        })
    }

    /// Issues a session for an entry-link request at `now` (unix seconds).
    ///
    /// # Errors
    ///
    /// See [`TokenIssuer::authorize`]. The error carries the precise reason
    /// for logs only; clients get a generic message.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "issue_session", skip_all, err)
    )]
    pub async fn issue(&self, request: &IssueRequest, now: i64) -> Result<Issued, GateError> {
        match self.authorize(request, now) {
            Ok(issued) => {
                let payload = issued.token.payload();
                log::info!(
                    target: "quizgate::issuer",
                    "msg=\"session issued\" fingerprint={} expires_at={}",
                    payload.client_fingerprint,
                    payload.expires_at
                );
                dispatch(GateEvent::SessionIssued {
                    fingerprint: payload.client_fingerprint.clone(),
                    expires_at: payload.expires_at,
                    at: Utc::now(),
                })
                .await;
                Ok(issued)
            }
            Err(err) => {
                let reason = match &err {
                    GateError::CredentialInvalid => "credential_invalid",
                    GateError::OriginNotAllowed => "origin_not_allowed",
                    _ => "internal",
                };
                log::warn!(
                    target: "quizgate::issuer",
                    "msg=\"entry link rejected\" reason={reason} referrer_present={}",
                    request.origin.referrer.is_some()
                );
                dispatch(GateEvent::IssueRejected {
                    reason: reason.to_owned(),
                    at: Utc::now(),
                })
                .await;
                Err(err)
            }
        }
    }

    /// Legacy credential check: does `credential` equal the link key?
    ///
    /// # Errors
    ///
    /// Returns `GateError::CredentialInvalid` on a missing or wrong credential.
    pub fn check_link(&self, credential: Option<&str>) -> Result<(), GateError> {
        if self.config.link_key.matches(credential.unwrap_or_default()) {
            Ok(())
        } else {
            log::debug!(target: "quizgate::issuer", "msg=\"link check failed\"");
            Err(GateError::CredentialInvalid)
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::origin::{NavigationPolicy, OriginPolicy, UnconfiguredOriginMode};
    use crate::session::VerificationResult;

    const UA: &str = "Mozilla/5.0 (X11; Linux x86_64)";

    fn issuer_with(origin: OriginPolicy) -> TokenIssuer {
        let mut config = GateConfig::new("abc123").unwrap();
        config.origin = origin;
        TokenIssuer::new(Arc::new(config))
    }

    fn issuer() -> TokenIssuer {
        issuer_with(OriginPolicy::with_allowed_hosts(["platform.example.com"]))
    }

    fn request(credential: &str, referrer: &str) -> IssueRequest {
        IssueRequest {
            credential: Some(credential.to_owned()),
            origin: OriginSignal::from_referrer(referrer),
            user_agent: Some(UA.to_owned()),
        }
    }

    #[test]
    fn test_issue_success() {
        let issuer = issuer();
        let issued = issuer
            .authorize(&request("abc123", "https://platform.example.com/course/7"), 1_000)
            .unwrap();

        assert_eq!(issued.location, "/quiz/");
        assert_eq!(issued.set_cookies.len(), 2);
        assert!(issued.set_cookies[0].contains("Max-Age=0"));
        assert!(issued.set_cookies[1].starts_with(&format!("quiz_sess={}", issued.token.as_str())));
        assert!(issued.set_cookies[1].contains("Max-Age=43200"));

        let payload = issued.token.payload();
        assert_eq!(payload.issued_at, 1_000);
        assert_eq!(payload.expires_at, 1_000 + 43_200);
        assert_eq!(payload.client_fingerprint, crypto::fingerprint(UA));

        let verified = SessionToken::verify(
            &issuer.config().link_key,
            issued.token.as_str(),
            1_001,
            &crypto::fingerprint(UA),
        );
        assert!(matches!(verified, VerificationResult::Valid(_)));
    }

    #[test]
    fn test_location_never_carries_credential() {
        let issued = issuer()
            .authorize(&request("abc123", "https://platform.example.com/"), 0)
            .unwrap();
        assert!(!issued.location.contains("abc123"));
    }

    #[test]
    fn test_wrong_credential() {
        let result =
            issuer().authorize(&request("wrong", "https://platform.example.com/"), 1_000);
        assert_eq!(result.unwrap_err(), GateError::CredentialInvalid);
    }

    #[test]
    fn test_missing_or_empty_credential() {
        let issuer = issuer();
        let mut req = request("", "https://platform.example.com/");
        assert_eq!(
            issuer.authorize(&req, 0).unwrap_err(),
            GateError::CredentialInvalid
        );
        req.credential = None;
        assert_eq!(
            issuer.authorize(&req, 0).unwrap_err(),
            GateError::CredentialInvalid
        );
    }

    #[test]
    fn test_disallowed_referrer() {
        let result = issuer().authorize(&request("abc123", "https://evil.example.net/"), 0);
        assert_eq!(result.unwrap_err(), GateError::OriginNotAllowed);
    }

    #[test]
    fn test_subdomain_referrer_allowed() {
        let result = issuer().authorize(&request("abc123", "https://eu.platform.example.com/x"), 0);
        assert!(result.is_ok());
    }

    #[test]
    fn test_missing_referrer_with_navigation_metadata() {
        let issuer = issuer();
        let req = IssueRequest {
            credential: Some("abc123".to_owned()),
            origin: OriginSignal {
                referrer: None,
                fetch_site: Some("cross-site".to_owned()),
                fetch_mode: Some("navigate".to_owned()),
                fetch_dest: Some("document".to_owned()),
                fetch_user: Some("?1".to_owned()),
            },
            user_agent: None,
        };
        assert!(issuer.authorize(&req, 0).is_ok());

        let strict = issuer_with(
            OriginPolicy::with_allowed_hosts(["platform.example.com"])
                .navigation(NavigationPolicy::disabled()),
        );
        assert_eq!(
            strict.authorize(&req, 0).unwrap_err(),
            GateError::OriginNotAllowed
        );
    }

    #[test]
    fn test_unconfigured_origin_modes() {
        let closed = issuer_with(OriginPolicy::default());
        assert_eq!(
            closed
                .authorize(&request("abc123", "https://anything.example/"), 0)
                .unwrap_err(),
            GateError::OriginNotAllowed
        );

        let open = issuer_with(OriginPolicy::default().unconfigured(UnconfiguredOriginMode::Allow));
        assert!(open.authorize(&request("abc123", "https://anything.example/"), 0).is_ok());
    }

    #[test]
    fn test_missing_user_agent_binds_empty_fingerprint() {
        let mut req = request("abc123", "https://platform.example.com/");
        req.user_agent = None;
        let issued = issuer().authorize(&req, 0).unwrap();
        assert_eq!(issued.token.payload().client_fingerprint, "e3b0c44298fc1c14");
    }

    #[tokio::test]
    async fn test_issue_dispatches_and_returns() {
        let issuer = issuer();
        assert!(
            issuer
                .issue(&request("abc123", "https://platform.example.com/"), 10)
                .await
                .is_ok()
        );
        assert_eq!(
            issuer
                .issue(&request("nope", "https://platform.example.com/"), 10)
                .await
                .unwrap_err(),
            GateError::CredentialInvalid
        );
    }

    #[test]
    fn test_check_link() {
        let issuer = issuer();
        assert!(issuer.check_link(Some("abc123")).is_ok());
        assert_eq!(
            issuer.check_link(Some("abc12")).unwrap_err(),
            GateError::CredentialInvalid
        );
        assert_eq!(
            issuer.check_link(None).unwrap_err(),
            GateError::CredentialInvalid
        );
    }
}
