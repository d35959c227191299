mod config;
mod cookie;
mod token;

pub use config::SessionConfig;
pub use cookie::{COOKIE_ATTRIBUTES, clear_session_cookie, find_cookie, session_cookie};
pub use token::{
    RawSessionToken, SEPARATOR, SessionPayload, SessionToken, TOKEN_VERSION, VerificationResult,
};
