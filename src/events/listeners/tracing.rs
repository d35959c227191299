use async_trait::async_trait;

use crate::events::{GateEvent, Listener};

/// Emits gate events as `tracing` events; denials at WARN.
///
/// Requires the `tracing` feature to be enabled.
///
/// # Example
///
/// ```rust,ignore
/// use quizgate::register_event_listeners;
/// use quizgate::events::listeners::TracingListener;
///
/// register_event_listeners(|registry| {
///     registry.listen(TracingListener);
/// });
/// ```
pub struct TracingListener;

#[async_trait]
impl Listener for TracingListener {
    async fn handle(&self, event: &GateEvent) {
        match event {
            GateEvent::AccessDenied { reason, path, .. } => tracing::warn!(
                target: "quizgate::events",
                event_name = event.name(),
                reason = reason.as_str(),
                path = %path,
                "gate event"
            ),
            GateEvent::IssueRejected { reason, .. } => tracing::warn!(
                target: "quizgate::events",
                event_name = event.name(),
                reason = %reason,
                "gate event"
            ),
            _ => tracing::info!(
                target: "quizgate::events",
                event_name = event.name(),
                ?event,
                "gate event"
            ),
        }
    }
}
