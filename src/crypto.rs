//! Keyed signatures, fingerprints and random identifiers.
//!
//! Every signature and secret comparison in the crate goes through this
//! module so that none of them short-circuit on the first differing byte.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::SecretString;

type HmacSha256 = Hmac<Sha256>;

/// Default random identifier length in characters.
pub const DEFAULT_TOKEN_LENGTH: usize = 32;

/// Number of hex characters kept from a fingerprint hash.
pub const FINGERPRINT_LENGTH: usize = 16;

/// Textual encoding of a MAC on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureEncoding {
    /// URL-safe base64 without padding. Used by session tokens.
    #[default]
    Base64Url,
    /// Lowercase hex.
    Hex,
}

impl SignatureEncoding {
    fn encode(self, bytes: &[u8]) -> String {
        match self {
            Self::Base64Url => URL_SAFE_NO_PAD.encode(bytes),
            Self::Hex => hex::encode(bytes),
        }
    }

    fn decode(self, text: &str) -> Option<Vec<u8>> {
        match self {
            Self::Base64Url => URL_SAFE_NO_PAD.decode(text).ok(),
            Self::Hex => hex::decode(text).ok(),
        }
    }
}

/// Signs `data` with HMAC-SHA256 and encodes the MAC.
///
/// # Example
///
/// ```rust
/// use quizgate::SecretString;
/// use quizgate::crypto::{SignatureEncoding, sign, verify};
///
/// let key = SecretString::new("abc123");
/// let mac = sign(&key, b"body", SignatureEncoding::Base64Url);
/// assert!(verify(&key, b"body", &mac, SignatureEncoding::Base64Url));
/// ```
pub fn sign(secret: &SecretString, data: &[u8], encoding: SignatureEncoding) -> String {
    encoding.encode(&compute_hmac(data, secret.expose_secret().as_bytes()))
}

/// Recomputes the MAC over `data` and compares it with `mac` in constant time.
///
/// A MAC that does not decode under `encoding` never verifies.
pub fn verify(secret: &SecretString, data: &[u8], mac: &str, encoding: SignatureEncoding) -> bool {
    let Some(actual) = encoding.decode(mac) else {
        return false;
    };
    let expected = compute_hmac(data, secret.expose_secret().as_bytes());
    constant_time_eq(&expected, &actual)
}

/// Coarse client fingerprint: SHA-256 of the input, hex, truncated.
///
/// Distinguishes common User-Agent strings; it is not an identity check.
pub fn fingerprint(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut out = hex::encode(digest);
    out.truncate(FINGERPRINT_LENGTH);
    out
}

/// Constant-time byte comparison.
///
/// Lengths are compared first; that reveals only the length, never the
/// position of a mismatch.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

/// Constant-time string comparison for credentials.
pub fn constant_time_str_eq(a: &str, b: &str) -> bool {
    constant_time_eq(a.as_bytes(), b.as_bytes())
}

/// Generates a cryptographically secure random identifier.
///
/// The identifier consists of alphanumeric characters (a-z, A-Z, 0-9),
/// roughly 5.95 bits of entropy per character.
///
/// ```rust
/// use quizgate::crypto::generate_token;
///
/// let id = generate_token(32);
/// assert_eq!(id.len(), 32);
/// ```
pub fn generate_token(length: usize) -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(rng.sample(rand::distributions::Alphanumeric)))
        .collect()
}

/// Generates an identifier with the default length (32 characters).
pub fn generate_token_default() -> String {
    generate_token(DEFAULT_TOKEN_LENGTH)
}

/// Hashes a high-entropy token for storage (SHA-256, hex).
///
/// Stores keep only this hash, so a leaked store does not leak usable ids.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn compute_hmac(message: &[u8], key: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, so construction cannot fail.
    #[allow(clippy::expect_used)]
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any size");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}
