//! Per-request admission for the protected subtree.
//!
//! Every request is reduced to a [`GateDecision`]:
//!
//! | Session state | Decision |
//! |---------------|----------|
//! | credential in the URL | `Redirect` to the canonical URL |
//! | no cookie | `Deny(NoCredential)`, 401 |
//! | malformed, bad signature, expired, other client | `Deny(..)`, 403 |
//! | valid, far from expiry | `Allow` |
//! | valid, inside the renewal window | `Allow` with a renewed token |
//!
//! No server-side session state is read or written.

use std::sync::Arc;

use chrono::Utc;
use url::form_urlencoded;

use crate::config::GateConfig;
use crate::crypto;
use crate::events::{GateEvent, dispatch};
use crate::origin::OriginSignal;
use crate::session::{SessionPayload, SessionToken, find_cookie, session_cookie};
use crate::SessionFailure;

/// Query parameters that carry a link credential.
pub const CREDENTIAL_PARAMS: [&str; 2] = ["k", "token"];

/// Page the one-time flow lands on, carrying `?token=<id>`.
///
/// When this page is itself gated, a `token` that is not the link key is a
/// one-time id meant for the page and stays in the URL.
pub const ONE_TIME_LANDING_PATH: &str = "/";

/// Headers forced onto every allowed response.
pub const PROTECTED_RESPONSE_HEADERS: [(&str, &str); 3] = [
    ("cache-control", "private, no-store"),
    ("pragma", "no-cache"),
    ("expires", "0"),
];

/// `Cache-Control` for redirects and denials.
pub const NO_STORE: &str = "no-store";

/// The parts of a request the gate looks at.
#[derive(Debug, Clone, Default)]
pub struct GateRequest {
    /// Request target, path plus optional query.
    pub path_and_query: String,
    /// Raw `Cookie` header.
    pub cookie: Option<String>,
    pub user_agent: Option<String>,
    pub origin: OriginSignal,
}

impl GateRequest {
    pub fn path(&self) -> &str {
        self.path_and_query
            .split_once('?')
            .map_or(self.path_and_query.as_str(), |(path, _)| path)
    }

    fn fingerprint(&self) -> String {
        crypto::fingerprint(self.user_agent.as_deref().unwrap_or_default())
    }
}

/// Result of stripping credential parameters from a request target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    /// The target without credential parameters.
    pub location: String,
    /// The first non-empty credential that was stripped, if any.
    pub credential: Option<String>,
}

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DenyReason(pub SessionFailure);

impl DenyReason {
    /// 401 without a cookie, 403 for every other failure.
    pub fn status(&self) -> u16 {
        match self.0 {
            SessionFailure::NoCredential => 401,
            _ => 403,
        }
    }

    /// The only detail a client ever sees.
    pub fn client_message(&self) -> &'static str {
        match self.0 {
            SessionFailure::Expired => "Your session has expired. Please use your entry link again.",
            _ => "Access denied.",
        }
    }
}

#[derive(Debug, Clone)]
pub enum GateDecision {
    /// The URL carried credentials; send the client to the clean form.
    Redirect {
        location: String,
        /// Session minted from a valid stripped credential.
        issued: Option<SessionToken>,
    },
    Allow {
        payload: SessionPayload,
        /// Replacement token when the session is inside its renewal window.
        renewed: Option<SessionToken>,
    },
    Deny(DenyReason),
}

/// Validates session cookies and renews them near expiry.
#[derive(Debug, Clone)]
pub struct EdgeGatekeeper {
    config: Arc<GateConfig>,
}

impl EdgeGatekeeper {
    pub fn new(config: Arc<GateConfig>) -> Self {
        EdgeGatekeeper { config }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Decides a request at `now` (unix seconds). Pure.
    pub fn evaluate(&self, request: &GateRequest, now: i64) -> GateDecision {
        if let Some(normalized) = normalize(&request.path_and_query)
            .filter(|_| !self.carries_one_time_id(request))
        {
            let issued = normalized
                .credential
                .as_deref()
                .and_then(|credential| self.edge_issue(request, credential, now));
            return GateDecision::Redirect {
                location: normalized.location,
                issued,
            };
        }

        match self.verify_session(request, now) {
            Ok(payload) => {
                let renewed = payload
                    .should_renew(now, self.config.session.renew_window)
                    .then(|| {
                        SessionToken::renew(
                            &self.config.link_key,
                            &payload,
                            now,
                            self.config.session.session_ttl,
                        )
                    });
                GateDecision::Allow { payload, renewed }
            }
            Err(failure) => GateDecision::Deny(DenyReason(failure)),
        }
    }

    /// [`EdgeGatekeeper::evaluate`] plus logging and event dispatch.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "gate_check", skip_all, fields(path = %request.path()))
    )]
    pub async fn check(&self, request: &GateRequest, now: i64) -> GateDecision {
        let decision = self.evaluate(request, now);

        match &decision {
            GateDecision::Redirect { issued, .. } => {
                log::debug!(
                    target: "quizgate::gate",
                    "msg=\"credential stripped from url\" path={} issued={}",
                    request.path(),
                    issued.is_some()
                );
                if let Some(token) = issued {
                    dispatch(GateEvent::SessionIssued {
                        fingerprint: token.payload().client_fingerprint.clone(),
                        expires_at: token.payload().expires_at,
                        at: Utc::now(),
                    })
                    .await;
                }
            }
            GateDecision::Allow {
                renewed: Some(token),
                ..
            } => {
                log::info!(
                    target: "quizgate::gate",
                    "msg=\"session renewed\" expires_at={}",
                    token.payload().expires_at
                );
                dispatch(GateEvent::SessionRenewed {
                    fingerprint: token.payload().client_fingerprint.clone(),
                    expires_at: token.payload().expires_at,
                    at: Utc::now(),
                })
                .await;
            }
            GateDecision::Allow { .. } => {}
            GateDecision::Deny(reason) => {
                log::warn!(
                    target: "quizgate::gate",
                    "msg=\"access denied\" reason={} path={}",
                    reason.0,
                    request.path()
                );
                dispatch(GateEvent::AccessDenied {
                    reason: reason.0,
                    path: request.path().to_owned(),
                    at: Utc::now(),
                })
                .await;
            }
        }

        decision
    }

    /// `Set-Cookie` value carrying `token`.
    pub fn cookie_for(&self, token: &SessionToken) -> String {
        session_cookie(&self.config.session, token.as_str())
    }

    fn verify_session(&self, request: &GateRequest, now: i64) -> Result<SessionPayload, SessionFailure> {
        let raw = request
            .cookie
            .as_deref()
            .and_then(|header| find_cookie(header, &self.config.session.cookie_name))
            .ok_or(SessionFailure::NoCredential)?;

        SessionToken::verify(&self.config.link_key, raw, now, &request.fingerprint()).into_result()
    }

    /// Whether the request is the one-time landing page whose only credential
    /// parameters are `token` values other than the link key.
    fn carries_one_time_id(&self, request: &GateRequest) -> bool {
        let Some((path, query)) = request.path_and_query.split_once('?') else {
            return false;
        };
        if path != ONE_TIME_LANDING_PATH {
            return false;
        }

        let mut params = form_urlencoded::parse(query.as_bytes())
            .filter(|(key, _)| CREDENTIAL_PARAMS.contains(&key.as_ref()))
            .peekable();
        params.peek().is_some()
            && params.all(|(key, value)| key == "token" && !self.config.link_key.matches(&value))
    }

    /// Mints a session from a credential found in the URL, unless the
    /// request already holds a valid one.
    fn edge_issue(&self, request: &GateRequest, credential: &str, now: i64) -> Option<SessionToken> {
        if !self.config.link_key.matches(credential) {
            return None;
        }
        if self.verify_session(request, now).is_ok() {
            return None;
        }
        if self.config.origin.check(&request.origin).is_err() {
            log::warn!(target: "quizgate::gate", "msg=\"edge issuance refused by origin policy\"");
            return None;
        }

        Some(SessionToken::mint(
            &self.config.link_key,
            &request.fingerprint(),
            now,
            self.config.session.session_ttl,
        ))
    }
}

/// Strips credential parameters from a request target.
///
/// Returns `None` when there is nothing to strip. Remaining parameters keep
/// their original encoding and order.
pub fn normalize(path_and_query: &str) -> Option<Normalized> {
    let (path, query) = path_and_query.split_once('?')?;

    let mut credential = None;
    let mut kept = Vec::new();
    let mut stripped = false;

    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = form_urlencoded::parse(pair.as_bytes())
            .next()
            .unwrap_or_default();

        if CREDENTIAL_PARAMS.contains(&key.as_ref()) {
            stripped = true;
            // `k` wins over `token` regardless of order
            let better = match &credential {
                None => true,
                Some((existing, _)) => existing != "k" && key == "k",
            };
            if !value.is_empty() && better {
                credential = Some((key.into_owned(), value.into_owned()));
            }
        } else {
            kept.push(pair);
        }
    }

    if !stripped {
        return None;
    }

    let location = if kept.is_empty() {
        path.to_owned()
    } else {
        format!("{path}?{}", kept.join("&"))
    };

    Some(Normalized {
        location,
        credential: credential.map(|(_, value)| value),
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::origin::OriginPolicy;

    const UA: &str = "Mozilla/5.0 (Macintosh)";
    const KEY: &str = "abc123";

    fn config() -> GateConfig {
        let mut config = GateConfig::new(KEY).unwrap();
        config.origin = OriginPolicy::with_allowed_hosts(["platform.example.com"]);
        config
    }

    fn gate() -> EdgeGatekeeper {
        EdgeGatekeeper::new(Arc::new(config()))
    }

    fn minted(now: i64) -> SessionToken {
        SessionToken::mint(
            &config().link_key,
            &crypto::fingerprint(UA),
            now,
            Duration::seconds(43_200),
        )
    }

    fn request(path: &str, cookie: Option<String>) -> GateRequest {
        GateRequest {
            path_and_query: path.to_owned(),
            cookie,
            user_agent: Some(UA.to_owned()),
            origin: OriginSignal::default(),
        }
    }

    fn with_session(path: &str, token: &SessionToken) -> GateRequest {
        request(path, Some(format!("theme=dark; quiz_sess={}", token.as_str())))
    }

    #[test]
    fn test_no_cookie_denied_401() {
        match gate().evaluate(&request("/quiz/", None), 1_000) {
            GateDecision::Deny(reason) => {
                assert_eq!(reason.0, SessionFailure::NoCredential);
                assert_eq!(reason.status(), 401);
                assert_eq!(reason.client_message(), "Access denied.");
            }
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn test_valid_far_from_expiry_allowed() {
        let token = minted(0);
        match gate().evaluate(&with_session("/quiz/index.html", &token), 1_000) {
            GateDecision::Allow { payload, renewed } => {
                assert_eq!(payload.expires_at, 43_200);
                assert!(renewed.is_none());
            }
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn test_valid_near_expiry_renewed() {
        let token = minted(0);
        match gate().evaluate(&with_session("/quiz/", &token), 40_000) {
            GateDecision::Allow {
                renewed: Some(renewed),
                ..
            } => {
                assert_eq!(renewed.payload().issued_at, 40_000);
                assert_eq!(renewed.payload().expires_at, 83_200);
                assert_eq!(renewed.payload().client_fingerprint, crypto::fingerprint(UA));
            }
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn test_renewal_window_boundary() {
        // exp - now == window renews
        let token = minted(0);
        assert!(matches!(
            gate().evaluate(&with_session("/quiz/", &token), 43_200 - 7_200),
            GateDecision::Allow {
                renewed: Some(_),
                ..
            }
        ));
        assert!(matches!(
            gate().evaluate(&with_session("/quiz/", &token), 43_200 - 7_201),
            GateDecision::Allow { renewed: None, .. }
        ));
    }

    #[test]
    fn test_failures_denied_403() {
        let gate = gate();
        let token = minted(0);

        let expired = gate.evaluate(&with_session("/quiz/", &token), 43_200);
        let GateDecision::Deny(reason) = expired else {
            panic!("expected denial");
        };
        assert_eq!(reason.0, SessionFailure::Expired);
        assert_eq!(reason.status(), 403);
        assert!(reason.client_message().contains("expired"));

        let mut other_client = with_session("/quiz/", &token);
        other_client.user_agent = Some("curl/8.0".to_owned());
        assert!(matches!(
            gate.evaluate(&other_client, 10),
            GateDecision::Deny(DenyReason(SessionFailure::FingerprintMismatch))
        ));

        let garbage = request("/quiz/", Some("quiz_sess=nodot".to_owned()));
        assert!(matches!(
            gate.evaluate(&garbage, 10),
            GateDecision::Deny(DenyReason(SessionFailure::Malformed))
        ));

        let foreign = SessionToken::mint(
            &crate::LinkKey::new("other-key").unwrap(),
            &crypto::fingerprint(UA),
            0,
            Duration::hours(1),
        );
        assert!(matches!(
            gate.evaluate(&with_session("/quiz/", &foreign), 10),
            GateDecision::Deny(DenyReason(SessionFailure::BadSignature))
        ));
    }

    #[test]
    fn test_credential_in_url_redirects() {
        match gate().evaluate(&request("/quiz/?k=wrong&page=2", None), 0) {
            GateDecision::Redirect { location, issued } => {
                assert_eq!(location, "/quiz/?page=2");
                assert!(issued.is_none());
            }
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn test_edge_issuance() {
        let mut req = request("/quiz/?k=abc123", None);
        req.origin = OriginSignal::from_referrer("https://platform.example.com/");

        match gate().evaluate(&req, 500) {
            GateDecision::Redirect { location, issued } => {
                assert_eq!(location, "/quiz/");
                let token = issued.unwrap();
                assert_eq!(token.payload().issued_at, 500);
            }
            other => panic!("unexpected decision: {other:?}"),
        }

        // origin policy still applies
        req.origin = OriginSignal::from_referrer("https://elsewhere.example.org/");
        assert!(matches!(
            gate().evaluate(&req, 500),
            GateDecision::Redirect { issued: None, .. }
        ));
    }

    #[test]
    fn test_edge_issuance_skipped_with_valid_session() {
        let token = minted(0);
        let mut req = with_session("/quiz/?token=abc123", &token);
        req.origin = OriginSignal::from_referrer("https://platform.example.com/");
        assert!(matches!(
            gate().evaluate(&req, 10),
            GateDecision::Redirect { issued: None, .. }
        ));
    }

    #[test]
    fn test_one_time_id_kept_on_landing_page() {
        let mut config = config();
        config.protected_path = "/".to_owned();
        let gate = EdgeGatekeeper::new(Arc::new(config));
        let token = minted(0);

        match gate.evaluate(&with_session("/?token=Xy12ab", &token), 10) {
            GateDecision::Allow { .. } => {}
            other => panic!("unexpected decision: {other:?}"),
        }
        assert!(matches!(
            gate.evaluate(&request("/?token=Xy12ab", None), 10),
            GateDecision::Deny(DenyReason(SessionFailure::NoCredential))
        ));

        // the link key and `k` are still stripped on the landing page
        assert!(matches!(
            gate.evaluate(&with_session("/?token=abc123", &token), 10),
            GateDecision::Redirect { .. }
        ));
        assert!(matches!(
            gate.evaluate(&with_session("/?k=Xy12ab", &token), 10),
            GateDecision::Redirect { .. }
        ));
        assert!(matches!(
            gate.evaluate(&with_session("/quiz/?token=Xy12ab", &token), 10),
            GateDecision::Redirect { .. }
        ));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/quiz/"), None);
        assert_eq!(normalize("/quiz/?page=1"), None);
        assert_eq!(
            normalize("/quiz/?k=abc"),
            Some(Normalized {
                location: "/quiz/".to_owned(),
                credential: Some("abc".to_owned()),
            })
        );
        assert_eq!(
            normalize("/quiz/?a=1&token=t%2Bx&b=%20"),
            Some(Normalized {
                location: "/quiz/?a=1&b=%20".to_owned(),
                credential: Some("t+x".to_owned()),
            })
        );
        assert_eq!(
            normalize("/quiz/?token=second&k=first").unwrap().credential,
            Some("first".to_owned())
        );
        assert_eq!(normalize("/quiz/?k=").unwrap().credential, None);
    }

    #[test]
    fn test_cookie_for() {
        let token = minted(0);
        let cookie = gate().cookie_for(&token);
        assert!(cookie.starts_with("quiz_sess="));
        assert!(cookie.ends_with("HttpOnly; Secure; SameSite=Lax; Max-Age=43200"));
    }

    #[tokio::test]
    async fn test_check_matches_evaluate() {
        let decision = gate().check(&request("/quiz/", None), 0).await;
        assert!(matches!(
            decision,
            GateDecision::Deny(DenyReason(SessionFailure::NoCredential))
        ));
    }
}
