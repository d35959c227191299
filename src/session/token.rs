//! Self-contained session tokens.
//!
//! Wire form: `base64url(json(payload)) + "." + base64url(hmac(key, body))`.
//! The MAC covers the exact base64url body string, so the payload is never
//! parsed before its signature has been checked.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::crypto::{self, SignatureEncoding};
use crate::{LinkKey, SessionFailure};

/// Current payload version.
pub const TOKEN_VERSION: u32 = 1;

/// Separates body and signature. Not part of the base64url alphabet.
pub const SEPARATOR: char = '.';

/// Signed claims carried by a session token.
///
/// Field order is fixed by the struct declaration, which keeps the
/// serialized body deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPayload {
    #[serde(rename = "v")]
    pub version: u32,
    #[serde(rename = "ua")]
    pub client_fingerprint: String,
    #[serde(rename = "iat")]
    pub issued_at: i64,
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

impl SessionPayload {
    pub fn remaining(&self, now: i64) -> i64 {
        self.expires_at - now
    }

    /// Renewal fires once the remaining lifetime has dropped into the window.
    pub fn should_renew(&self, now: i64, renew_window: Duration) -> bool {
        self.remaining(now) <= renew_window.num_seconds()
    }
}

/// A minted session token.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    payload: SessionPayload,
    encoded: String,
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionToken")
            .field("payload", &self.payload)
            .field("encoded", &"[REDACTED]")
            .finish()
    }
}

/// A token split into body and signature, not yet verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSessionToken<'a> {
    pub body: &'a str,
    pub signature: &'a str,
}

/// Outcome of [`SessionToken::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationResult {
    Valid(SessionPayload),
    BadSignature,
    Malformed,
    Expired,
    FingerprintMismatch,
}

impl VerificationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// Converts into the payload, or the failure reason.
    ///
    /// # Errors
    ///
    /// Returns the `SessionFailure` matching a non-`Valid` outcome.
    pub fn into_result(self) -> Result<SessionPayload, SessionFailure> {
        match self {
            Self::Valid(payload) => Ok(payload),
            Self::BadSignature => Err(SessionFailure::BadSignature),
            Self::Malformed => Err(SessionFailure::Malformed),
            Self::Expired => Err(SessionFailure::Expired),
            Self::FingerprintMismatch => Err(SessionFailure::FingerprintMismatch),
        }
    }
}

impl SessionToken {
    /// Mints a token valid from `now` for `ttl`.
    pub fn mint(key: &LinkKey, fingerprint: &str, now: i64, ttl: Duration) -> Self {
        let payload = SessionPayload {
            version: TOKEN_VERSION,
            client_fingerprint: fingerprint.to_owned(),
            issued_at: now,
            expires_at: now.saturating_add(ttl.num_seconds()),
        };
        Self::sign(key, payload)
    }

    /// Mints the replacement for a token in its renewal window.
    ///
    /// The new token keeps the fingerprint and gets a full `ttl` from `now`;
    /// the old expiry is not extended.
    pub fn renew(key: &LinkKey, payload: &SessionPayload, now: i64, ttl: Duration) -> Self {
        Self::mint(key, &payload.client_fingerprint, now, ttl)
    }

    fn sign(key: &LinkKey, payload: SessionPayload) -> Self {
        // Serializing a struct of integers and a string cannot fail.
        #[allow(clippy::expect_used)]
        let json = serde_json::to_vec(&payload).expect("session payload serializes");
        let body = URL_SAFE_NO_PAD.encode(json);
        let signature = crypto::sign(key.secret(), body.as_bytes(), SignatureEncoding::Base64Url);

        Self {
            payload,
            encoded: format!("{body}{SEPARATOR}{signature}"),
        }
    }

    pub fn payload(&self) -> &SessionPayload {
        &self.payload
    }

    /// The cookie value.
    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    /// Splits a raw token on the last separator.
    ///
    /// # Errors
    ///
    /// Returns `SessionFailure::Malformed` if the separator is missing, is the
    /// first character, or leaves an empty signature.
    pub fn parse(raw: &str) -> Result<RawSessionToken<'_>, SessionFailure> {
        match raw.rfind(SEPARATOR) {
            Some(idx) if idx > 0 && idx + 1 < raw.len() => Ok(RawSessionToken {
                body: &raw[..idx],
                signature: &raw[idx + 1..],
            }),
            _ => Err(SessionFailure::Malformed),
        }
    }

    /// Verifies a raw cookie value.
    ///
    /// Checks run in a fixed order and the first failure wins: signature,
    /// payload structure, expiry (`now >= exp` is expired), fingerprint.
    pub fn verify(key: &LinkKey, raw: &str, now: i64, fingerprint: &str) -> VerificationResult {
        let Ok(token) = Self::parse(raw) else {
            return VerificationResult::Malformed;
        };

        if !crypto::verify(
            key.secret(),
            token.body.as_bytes(),
            token.signature,
            SignatureEncoding::Base64Url,
        ) {
            return VerificationResult::BadSignature;
        }

        let Some(payload) = decode_payload(token.body) else {
            return VerificationResult::Malformed;
        };

        if now >= payload.expires_at {
            return VerificationResult::Expired;
        }

        if !crypto::constant_time_str_eq(&payload.client_fingerprint, fingerprint) {
            return VerificationResult::FingerprintMismatch;
        }

        VerificationResult::Valid(payload)
    }
}

fn decode_payload(body: &str) -> Option<SessionPayload> {
    let bytes = URL_SAFE_NO_PAD.decode(body).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::fingerprint;

    fn key() -> LinkKey {
        LinkKey::new("abc123").unwrap()
    }

    fn fp() -> String {
        fingerprint("Mozilla/5.0 (test)")
    }

    fn signed_body(body: &str) -> String {
        let sig = crypto::sign(key().secret(), body.as_bytes(), SignatureEncoding::Base64Url);
        format!("{body}.{sig}")
    }

    #[test]
    fn test_mint_then_verify_is_valid() {
        let token = SessionToken::mint(&key(), &fp(), 1_000, Duration::hours(12));
        let result = SessionToken::verify(&key(), token.as_str(), 1_000, &fp());
        assert_eq!(result, VerificationResult::Valid(token.payload().clone()));
    }

    #[test]
    fn test_minted_payload_fields() {
        let token = SessionToken::mint(&key(), &fp(), 500, Duration::seconds(60));
        let payload = token.payload();
        assert_eq!(payload.version, TOKEN_VERSION);
        assert_eq!(payload.client_fingerprint, fp());
        assert_eq!(payload.issued_at, 500);
        assert_eq!(payload.expires_at, 560);
    }

    #[test]
    fn test_mint_expiry_saturates() {
        let token = SessionToken::mint(&key(), &fp(), i64::MAX - 10, Duration::hours(1));
        assert_eq!(token.payload().expires_at, i64::MAX);
    }

    #[test]
    fn test_wire_format_field_names_and_order() {
        let token = SessionToken::mint(&key(), "0123456789abcdef", 10, Duration::seconds(5));
        let (body, _) = token.as_str().rsplit_once('.').unwrap();
        let json = String::from_utf8(URL_SAFE_NO_PAD.decode(body).unwrap()).unwrap();
        assert_eq!(json, r#"{"v":1,"ua":"0123456789abcdef","iat":10,"exp":15}"#);
    }

    #[test]
    fn test_parse_splits_on_last_separator() {
        let raw = SessionToken::parse("a.b.c").unwrap();
        assert_eq!(raw.body, "a.b");
        assert_eq!(raw.signature, "c");
    }

    #[test]
    fn test_parse_rejects_missing_or_leading_separator() {
        assert_eq!(SessionToken::parse("nodot"), Err(SessionFailure::Malformed));
        assert_eq!(SessionToken::parse(".sig"), Err(SessionFailure::Malformed));
        assert_eq!(SessionToken::parse("body."), Err(SessionFailure::Malformed));
        assert_eq!(SessionToken::parse(""), Err(SessionFailure::Malformed));
    }

    #[test]
    fn test_flipping_signature_bits_is_bad_signature() {
        let token = SessionToken::mint(&key(), &fp(), 0, Duration::hours(1));
        let (body, sig) = token.as_str().rsplit_once('.').unwrap();
        let mut sig_bytes = URL_SAFE_NO_PAD.decode(sig).unwrap();

        for byte in 0..sig_bytes.len() {
            for bit in 0..8 {
                sig_bytes[byte] ^= 1 << bit;
                let tampered = format!("{body}.{}", URL_SAFE_NO_PAD.encode(&sig_bytes));
                assert_eq!(
                    SessionToken::verify(&key(), &tampered, 0, &fp()),
                    VerificationResult::BadSignature
                );
                sig_bytes[byte] ^= 1 << bit;
            }
        }
    }

    #[test]
    fn test_tampered_body_is_bad_signature() {
        let token = SessionToken::mint(&key(), &fp(), 0, Duration::hours(1));
        let (_, sig) = token.as_str().rsplit_once('.').unwrap();
        let forged = URL_SAFE_NO_PAD.encode(br#"{"v":1,"ua":"x","iat":0,"exp":99999999999}"#);
        assert_eq!(
            SessionToken::verify(&key(), &format!("{forged}.{sig}"), 0, &fp()),
            VerificationResult::BadSignature
        );
    }

    #[test]
    fn test_wrong_key_is_bad_signature() {
        let token = SessionToken::mint(&key(), &fp(), 0, Duration::hours(1));
        let other = LinkKey::new("another-key").unwrap();
        assert_eq!(
            SessionToken::verify(&other, token.as_str(), 0, &fp()),
            VerificationResult::BadSignature
        );
    }

    #[test]
    fn test_signature_checked_before_structure() {
        // Garbage body with a garbage signature reports the signature first
        assert_eq!(
            SessionToken::verify(&key(), "!!!.AAAA", 0, &fp()),
            VerificationResult::BadSignature
        );
    }

    #[test]
    fn test_signed_garbage_is_malformed() {
        let not_base64 = signed_body("!!notbase64!!");
        assert_eq!(
            SessionToken::verify(&key(), &not_base64, 0, &fp()),
            VerificationResult::Malformed
        );

        let not_json = signed_body(&URL_SAFE_NO_PAD.encode(b"plain text"));
        assert_eq!(
            SessionToken::verify(&key(), &not_json, 0, &fp()),
            VerificationResult::Malformed
        );

        let missing_fields = signed_body(&URL_SAFE_NO_PAD.encode(br#"{"v":1}"#));
        assert_eq!(
            SessionToken::verify(&key(), &missing_fields, 0, &fp()),
            VerificationResult::Malformed
        );
    }

    #[test]
    fn test_unparsable_raw_is_malformed() {
        assert_eq!(
            SessionToken::verify(&key(), "no-separator", 0, &fp()),
            VerificationResult::Malformed
        );
    }

    #[test]
    fn test_expiry_boundary_is_expired() {
        let token = SessionToken::mint(&key(), &fp(), 0, Duration::seconds(100));
        assert!(SessionToken::verify(&key(), token.as_str(), 99, &fp()).is_valid());
        assert_eq!(
            SessionToken::verify(&key(), token.as_str(), 100, &fp()),
            VerificationResult::Expired
        );
        assert_eq!(
            SessionToken::verify(&key(), token.as_str(), 101, &fp()),
            VerificationResult::Expired
        );
    }

    #[test]
    fn test_expired_reported_before_fingerprint_mismatch() {
        let token = SessionToken::mint(&key(), &fp(), 0, Duration::seconds(10));
        assert_eq!(
            SessionToken::verify(&key(), token.as_str(), 10, "ffffffffffffffff"),
            VerificationResult::Expired
        );
    }

    #[test]
    fn test_fingerprint_mismatch() {
        let token = SessionToken::mint(&key(), &fp(), 0, Duration::hours(1));
        assert_eq!(
            SessionToken::verify(&key(), token.as_str(), 1, &fingerprint("curl/8.0")),
            VerificationResult::FingerprintMismatch
        );
    }

    #[test]
    fn test_renewal_scenario() {
        let ttl = Duration::seconds(43_200);
        let window = Duration::seconds(7_200);
        let token = SessionToken::mint(&key(), &fp(), 0, ttl);

        let early = SessionToken::verify(&key(), token.as_str(), 1_000, &fp())
            .into_result()
            .unwrap();
        assert!(!early.should_renew(1_000, window));

        let late = SessionToken::verify(&key(), token.as_str(), 40_000, &fp())
            .into_result()
            .unwrap();
        assert!(late.should_renew(40_000, window));

        let renewed = SessionToken::renew(&key(), &late, 40_000, ttl);
        assert_eq!(renewed.payload().issued_at, 40_000);
        assert_eq!(renewed.payload().expires_at, 83_200);
        assert_eq!(renewed.payload().client_fingerprint, fp());
    }

    #[test]
    fn test_should_renew_boundary() {
        let payload = SessionPayload {
            version: 1,
            client_fingerprint: fp(),
            issued_at: 0,
            expires_at: 10_000,
        };
        let window = Duration::seconds(2_000);
        assert!(!payload.should_renew(7_999, window));
        assert!(payload.should_renew(8_000, window));
        assert!(payload.should_renew(9_999, window));
    }

    #[test]
    fn test_into_result_maps_failures() {
        assert_eq!(
            VerificationResult::Expired.into_result(),
            Err(SessionFailure::Expired)
        );
        assert_eq!(
            VerificationResult::BadSignature.into_result(),
            Err(SessionFailure::BadSignature)
        );
    }

    #[test]
    fn test_debug_redacts_encoded_value() {
        let token = SessionToken::mint(&key(), &fp(), 0, Duration::hours(1));
        let debug = format!("{token:?}");
        assert!(!debug.contains(token.as_str()));
    }
}
