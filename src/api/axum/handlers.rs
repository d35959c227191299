//! HTTP handlers for the gate's public endpoints.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::header::{CACHE_CONTROL, HOST, USER_AGENT};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use super::error::AppError;
use super::middleware::{header_string, origin_signal, redirect};
use super::routes::AppState;
use crate::api::{ConsumeResponse, EnterQuery, ErrorResponse, TokenQuery};
use crate::gatekeeper::{NO_STORE, ONE_TIME_LANDING_PATH};
use crate::{ConsumeResult, GateError, IssueRequest};

/// Exchange an entry-link credential for a session cookie.
///
/// GET /enter?k=
pub async fn enter(
    State(state): State<AppState>,
    Query(query): Query<EnterQuery>,
    headers: HeaderMap,
) -> Response {
    let request = IssueRequest {
        credential: query.credential(),
        origin: origin_signal(&headers),
        user_agent: header_string(&headers, USER_AGENT.as_str()),
    };

    match state.issuer.issue(&request, Utc::now().timestamp()).await {
        Ok(issued) => redirect(&issued.location, &issued.set_cookies),
        Err(err) => AppError(err).into_response(),
    }
}

/// Check a credential against the link key.
///
/// GET /check-link?token=
pub async fn check_link(State(state): State<AppState>, Query(query): Query<TokenQuery>) -> Response {
    match state.issuer.check_link(query.token.as_deref()) {
        Ok(()) => json(StatusCode::OK, ConsumeResponse::ok()),
        Err(err @ (GateError::ConfigMissing(_) | GateError::ConfigInvalid(_))) => json(
            StatusCode::INTERNAL_SERVER_ERROR,
            ConsumeResponse::failed(ErrorResponse::from(&err).error),
        ),
        Err(_) => json(StatusCode::FORBIDDEN, ConsumeResponse::failed("Invalid token.")),
    }
}

/// Mint a one-time token and send the client to the site root with it.
///
/// GET /one-time/issue
pub async fn one_time_issue(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let ttl = state.config().one_time_token_ttl;

    match state
        .one_time
        .create(ttl, Utc::now().timestamp_millis())
        .await
    {
        Ok(token) => {
            let location = format!(
                "{}{ONE_TIME_LANDING_PATH}?token={}",
                site_origin(&headers),
                token.id.expose_secret()
            );
            redirect(&location, &[])
        }
        Err(err) => {
            log::error!(target: "quizgate::one_time", "msg=\"one-time issuance failed\" error=\"{err}\"");
            json(
                StatusCode::INTERNAL_SERVER_ERROR,
                ConsumeResponse::failed(ErrorResponse::from(&err).error),
            )
        }
    }
}

/// Consume a one-time token.
///
/// GET /one-time/consume?token=
pub async fn one_time_consume(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Response {
    let Some(id) = query.token.filter(|t| !t.is_empty()) else {
        return json(StatusCode::BAD_REQUEST, ConsumeResponse::failed("Missing token."));
    };

    match state
        .one_time
        .consume(&id, Utc::now().timestamp_millis())
        .await
    {
        Ok(result) => {
            let status = match result {
                ConsumeResult::Valid => StatusCode::OK,
                ConsumeResult::Invalid | ConsumeResult::Expired => StatusCode::FORBIDDEN,
            };
            json(status, ConsumeResponse::from(result))
        }
        Err(err) => {
            log::error!(target: "quizgate::one_time", "msg=\"one-time consumption failed\" error=\"{err}\"");
            json(
                StatusCode::INTERNAL_SERVER_ERROR,
                ConsumeResponse::failed(ErrorResponse::from(&err).error),
            )
        }
    }
}

fn json(status: StatusCode, body: ConsumeResponse) -> Response {
    (status, [(CACHE_CONTROL, NO_STORE)], Json(body)).into_response()
}

/// Origin the client used to reach us, from `Host` and `X-Forwarded-Proto`.
///
/// Empty when the host is unknown or unusable, which yields a relative
/// redirect.
fn site_origin(headers: &HeaderMap) -> String {
    let Some(host) = header_string(headers, HOST.as_str()).filter(|h| valid_host(h)) else {
        return String::new();
    };
    let scheme = match header_string(headers, "x-forwarded-proto").as_deref() {
        Some("http") => "http",
        _ => "https",
    };
    format!("{scheme}://{host}")
}

fn valid_host(host: &str) -> bool {
    !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '[' | ']'))
}
