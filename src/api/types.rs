use serde::{Deserialize, Serialize};

use crate::{ConsumeResult, GateError};

// Request DTOs

/// Query of the entry link. The credential travels as `k`, or `token` on
/// older links.
#[derive(Debug, Default, Deserialize)]
pub struct EnterQuery {
    pub k: Option<String>,
    pub token: Option<String>,
}

impl EnterQuery {
    pub fn credential(self) -> Option<String> {
        self.k
            .filter(|k| !k.is_empty())
            .or(self.token.filter(|t| !t.is_empty()))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

// Response DTOs

/// Body of the link-check and one-time consumption endpoints.
#[derive(Debug, Serialize)]
pub struct ConsumeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConsumeResponse {
    pub fn ok() -> Self {
        ConsumeResponse {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        ConsumeResponse {
            success: false,
            error: Some(error.into()),
        }
    }
}

impl From<ConsumeResult> for ConsumeResponse {
    fn from(result: ConsumeResult) -> Self {
        match result {
            ConsumeResult::Valid => Self::ok(),
            ConsumeResult::Invalid => Self::failed("Invalid token."),
            ConsumeResult::Expired => Self::failed("Token expired."),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Client-facing error bodies. Internal detail (which check failed, store
/// errors) stays in the logs.
impl From<&GateError> for ErrorResponse {
    fn from(err: &GateError) -> Self {
        let (error, code) = match err {
            GateError::ConfigMissing(_) | GateError::ConfigInvalid(_) => {
                ("Service not configured.", "CONFIGURATION_ERROR")
            }
            GateError::CredentialInvalid | GateError::OriginNotAllowed => {
                ("Access denied.", "ACCESS_DENIED")
            }
            GateError::SessionInvalid(crate::SessionFailure::Expired) => {
                ("Session expired.", "SESSION_EXPIRED")
            }
            GateError::SessionInvalid(_) => ("Access denied.", "ACCESS_DENIED"),
            GateError::StoreUnavailable(_) => ("Service unavailable.", "STORE_UNAVAILABLE"),
            GateError::Malformed => ("Bad request.", "BAD_REQUEST"),
        };

        ErrorResponse {
            error: error.to_owned(),
            code: code.to_owned(),
        }
    }
}
