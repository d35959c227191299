use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::get;

use super::content::{self, QuestionBank};
use super::handlers;
use super::middleware::gate_layer;
use crate::{EdgeGatekeeper, GateConfig, KeyValueStore, OneTimeTokenStore, TokenIssuer};

#[derive(Clone)]
pub struct AppState {
    pub issuer: TokenIssuer,
    pub gatekeeper: EdgeGatekeeper,
    pub one_time: OneTimeTokenStore,
    pub questions: Option<QuestionBank>,
}

impl AppState {
    pub fn new(config: GateConfig, store: Arc<dyn KeyValueStore>) -> Self {
        let config = Arc::new(config);
        AppState {
            issuer: TokenIssuer::new(Arc::clone(&config)),
            gatekeeper: EdgeGatekeeper::new(config),
            one_time: OneTimeTokenStore::new(store),
            questions: None,
        }
    }

    #[must_use]
    pub fn with_questions(mut self, questions: QuestionBank) -> Self {
        self.questions = Some(questions);
        self
    }

    pub fn config(&self) -> &GateConfig {
        self.gatekeeper.config()
    }
}

/// entry link, legacy link check and the one-time token exchange
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/enter", get(handlers::enter))
        .route("/check-link", get(handlers::check_link))
        .route("/one-time/issue", get(handlers::one_time_issue))
        .route("/one-time/consume", get(handlers::one_time_consume))
}

/// The complete application: public routes, the question bank and `origin`,
/// with every request under the protected path passing through the gate.
///
/// `origin` serves the protected content, typically a static directory
/// nested at the protected path.
pub fn gate_routes(state: AppState, origin: Router<AppState>) -> Router {
    let questions = format!("{}questions", with_trailing_slash(&state.config().protected_path));

    Router::new()
        .merge(public_routes())
        .route(&questions, get(content::questions))
        .merge(origin)
        .layer(from_fn_with_state(state.clone(), gate_layer))
        .with_state(state)
}

fn with_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_owned()
    } else {
        format!("{path}/")
    }
}
