//! Listeners shipped with the gate.
//!
//! [`LoggingListener`] writes every event through the `log` facade;
//! `TracingListener` (feature `tracing`) emits structured `tracing` events.

mod logging;
#[cfg(feature = "tracing")]
mod tracing;

pub use logging::LoggingListener;
#[cfg(feature = "tracing")]
pub use self::tracing::TracingListener;
