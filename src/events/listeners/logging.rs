use async_trait::async_trait;

use crate::events::{GateEvent, Listener};

/// Logs all gate events using the `log` crate.
///
/// Denials and rejected entries are logged at a separate, higher level so
/// probing shows up without raising the level of routine traffic.
///
/// # Example
///
/// ```rust,ignore
/// use quizgate::register_event_listeners;
/// use quizgate::events::listeners::LoggingListener;
///
/// register_event_listeners(|registry| {
///     registry.listen(LoggingListener::new());
/// });
/// ```
pub struct LoggingListener {
    level: log::Level,
    denial_level: log::Level,
}

impl LoggingListener {
    /// Routine events at INFO, denials at WARN.
    pub fn new() -> Self {
        Self {
            level: log::Level::Info,
            denial_level: log::Level::Warn,
        }
    }

    /// Logs every event, denials included, at `level`.
    pub fn with_level(level: log::Level) -> Self {
        Self {
            level,
            denial_level: level,
        }
    }

    #[must_use]
    pub fn denial_level(mut self, level: log::Level) -> Self {
        self.denial_level = level;
        self
    }

    fn level_for(&self, event: &GateEvent) -> log::Level {
        match event {
            GateEvent::AccessDenied { .. } | GateEvent::IssueRejected { .. } => self.denial_level,
            _ => self.level,
        }
    }
}

impl Default for LoggingListener {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Listener for LoggingListener {
    async fn handle(&self, event: &GateEvent) {
        log::log!(
            target: "quizgate::events",
            self.level_for(event),
            "event={} {:?}",
            event.name(),
            event
        );
    }
}
