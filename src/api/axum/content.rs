use std::path::Path;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use super::routes::AppState;
use crate::GateError;

/// The quiz question bank, loaded once and served behind the gate.
#[derive(Debug, Clone)]
pub struct QuestionBank(Arc<Value>);

impl QuestionBank {
    pub fn new(questions: Value) -> Self {
        QuestionBank(Arc::new(questions))
    }

    /// # Errors
    ///
    /// Returns `GateError::ConfigInvalid` if the file is unreadable or not JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GateError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GateError::ConfigInvalid(format!("cannot read {}: {e}", path.display()))
        })?;
        let questions = serde_json::from_str(&content).map_err(|e| {
            GateError::ConfigInvalid(format!("{} is not valid JSON: {e}", path.display()))
        })?;
        Ok(Self::new(questions))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// Serve the question bank. Only reachable through the gate.
///
/// GET {protected}/questions
pub async fn questions(State(state): State<AppState>) -> Response {
    match state.questions {
        Some(bank) => Json(bank.as_value().clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
