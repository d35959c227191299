mod content;
mod error;
mod handlers;
mod middleware;
mod routes;

pub use content::QuestionBank;
pub use error::AppError;
pub use middleware::{gate_layer, is_protected, origin_signal};
pub use routes::{AppState, gate_routes, public_routes};
