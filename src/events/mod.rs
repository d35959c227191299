//! Event system for gate decisions.
//!
//! Events are fired for every issued, renewed and denied session and for
//! one-time token traffic. If no listeners are registered, they are silently
//! ignored.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use quizgate::register_event_listeners;
//! use quizgate::events::listeners::LoggingListener;
//!
//! fn main() {
//!     register_event_listeners(|registry| {
//!         registry.listen(LoggingListener::new());
//!     });
//! }
//! ```

mod event;
mod listener;
mod registry;

pub mod listeners;

pub use event::GateEvent;
pub use listener::Listener;
pub use registry::{EventRegistry, dispatch, register_event_listeners};
