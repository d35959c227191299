use axum::extract::{Request, State};
use axum::http::header::{CACHE_CONTROL, COOKIE, LOCATION, REFERER, SET_COOKIE, USER_AGENT};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use super::error::AppError;
use super::routes::AppState;
use crate::gatekeeper::{GateRequest, NO_STORE, PROTECTED_RESPONSE_HEADERS};
use crate::{GateDecision, OriginSignal};

/// Paths served outside the gate even when the protected path is `/`.
const UNGATED_PATHS: [&str; 4] = ["/enter", "/check-link", "/one-time/issue", "/one-time/consume"];

pub fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(ToOwned::to_owned)
}

/// All `Cookie` fields joined into one header value.
///
/// HTTP/2 clients may send each cookie in its own field.
pub fn cookie_header(headers: &HeaderMap) -> Option<String> {
    let fields: Vec<&str> = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();
    (!fields.is_empty()).then(|| fields.join("; "))
}

/// Referrer and Fetch-Metadata headers of a request.
pub fn origin_signal(headers: &HeaderMap) -> OriginSignal {
    OriginSignal {
        referrer: header_string(headers, REFERER.as_str()),
        fetch_site: header_string(headers, "sec-fetch-site"),
        fetch_mode: header_string(headers, "sec-fetch-mode"),
        fetch_dest: header_string(headers, "sec-fetch-dest"),
        fetch_user: header_string(headers, "sec-fetch-user"),
    }
}

/// Whether `path` falls under the protected subtree.
pub fn is_protected(path: &str, protected_path: &str) -> bool {
    if UNGATED_PATHS.contains(&path) {
        return false;
    }
    let root = protected_path.trim_end_matches('/');
    root.is_empty() || path == root || path.starts_with(&format!("{root}/"))
}

/// 302 with `Cache-Control: no-store` and optional cookies.
pub fn redirect(location: &str, cookies: &[String]) -> Response {
    let mut response = (
        StatusCode::FOUND,
        [(LOCATION, location.to_owned()), (CACHE_CONTROL, NO_STORE.to_owned())],
    )
        .into_response();
    append_cookies(response.headers_mut(), cookies);
    response
}

pub fn append_cookies(headers: &mut HeaderMap, cookies: &[String]) {
    for cookie in cookies {
        match HeaderValue::from_str(cookie) {
            Ok(value) => {
                headers.append(SET_COOKIE, value);
            }
            Err(_) => {
                log::error!(target: "quizgate::gate", "msg=\"unencodable cookie dropped\"");
            }
        }
    }
}

/// Admits, renews or turns away requests for the protected subtree.
///
/// ```rust,ignore
/// let app = Router::new()
///     .nest_service("/quiz", ServeDir::new("quiz"))
///     .layer(middleware::from_fn_with_state(state.clone(), gate_layer))
///     .with_state(state);
/// ```
pub async fn gate_layer(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path();
    if !is_protected(path, &state.config().protected_path) {
        return next.run(request).await;
    }

    let headers = request.headers();
    let gate_request = GateRequest {
        path_and_query: request
            .uri()
            .path_and_query()
            .map_or_else(|| path.to_owned(), |pq| pq.as_str().to_owned()),
        cookie: cookie_header(headers),
        user_agent: header_string(headers, USER_AGENT.as_str()),
        origin: origin_signal(headers),
    };

    match state
        .gatekeeper
        .check(&gate_request, Utc::now().timestamp())
        .await
    {
        GateDecision::Redirect { location, issued } => {
            let cookies: Vec<String> = issued
                .iter()
                .map(|token| state.gatekeeper.cookie_for(token))
                .collect();
            redirect(&location, &cookies)
        }
        GateDecision::Deny(reason) => AppError::from(reason).into_response(),
        GateDecision::Allow { renewed, .. } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();

            for (name, value) in PROTECTED_RESPONSE_HEADERS {
                headers.insert(
                    HeaderName::from_static(name),
                    HeaderValue::from_static(value),
                );
            }
            if let Some(token) = renewed {
                append_cookies(headers, &[state.gatekeeper.cookie_for(&token)]);
            }
            response
        }
    }
}
