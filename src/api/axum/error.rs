use axum::http::StatusCode;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};

use crate::api::ErrorResponse;
use crate::gatekeeper::{DenyReason, NO_STORE};
use crate::{GateError, SessionFailure};

/// converts `GateError` into a minimal, non-cacheable HTML response
#[derive(Debug)]
pub struct AppError(pub GateError);

impl From<GateError> for AppError {
    fn from(err: GateError) -> Self {
        Self(err)
    }
}

impl From<DenyReason> for AppError {
    fn from(reason: DenyReason) -> Self {
        Self(GateError::SessionInvalid(reason.0))
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            GateError::ConfigMissing(_)
            | GateError::ConfigInvalid(_)
            | GateError::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::CredentialInvalid | GateError::OriginNotAllowed => StatusCode::FORBIDDEN,
            GateError::SessionInvalid(SessionFailure::NoCredential) => StatusCode::UNAUTHORIZED,
            GateError::SessionInvalid(_) => StatusCode::FORBIDDEN,
            GateError::Malformed => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            GateError::SessionInvalid(failure) => DenyReason(*failure).client_message().to_owned(),
            other => ErrorResponse::from(other).error,
        };

        if status.is_server_error() {
            log::error!(target: "quizgate", "msg=\"request failed\" error=\"{}\"", self.0);
        }

        let body = format!(
            "<!doctype html><html><head><meta charset=\"utf-8\"><title>{code}</title></head>\
             <body><p>{message}</p></body></html>",
            code = status.as_u16()
        );

        (
            status,
            [
                (CONTENT_TYPE, "text/html; charset=utf-8"),
                (CACHE_CONTROL, NO_STORE),
            ],
            body,
        )
            .into_response()
    }
}
