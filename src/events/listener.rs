use async_trait::async_trait;

use super::GateEvent;

/// Trait for handling gate events asynchronously.
///
/// # Example
///
/// ```rust,ignore
/// use quizgate::events::{GateEvent, Listener};
/// use async_trait::async_trait;
///
/// struct DenialCounter;
///
/// #[async_trait]
/// impl Listener for DenialCounter {
///     async fn handle(&self, event: &GateEvent) {
///         if let GateEvent::AccessDenied { reason, .. } = event {
///             // increment a counter keyed by reason
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    /// Called for every dispatched event; filter by matching on the variant.
    async fn handle(&self, event: &GateEvent);
}
