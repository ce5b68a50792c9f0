//! Event sink system for observability.
//!
//! The coordinator reports context lifecycle transitions through an
//! [`EventSink`]. Sinks default to a no-op.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use parking_lot::RwLock;
use std::sync::Arc;

/// A context was created and registered.
pub const CONTEXT_CREATED: &str = "update_context.created";
/// A context was replaced by a newer one for the same conversation.
pub const CONTEXT_EVICTED: &str = "update_context.evicted";
/// A stale context was reclaimed.
pub const CONTEXT_RECLAIMED: &str = "update_context.reclaimed";
/// A handler requested force exit.
pub const CONTEXT_FORCE_EXIT: &str = "update_context.force_exit";
/// The handler chain finished for a context.
pub const CONTEXT_COMPLETED: &str = "update_context.completed";
/// A context was disposed.
pub const CONTEXT_DISPOSED: &str = "update_context.disposed";

static GLOBAL_EVENT_SINK: RwLock<Option<Arc<dyn EventSink>>> = RwLock::new(None);

/// Sets the current global event sink.
pub fn set_event_sink(sink: Arc<dyn EventSink>) {
    *GLOBAL_EVENT_SINK.write() = Some(sink);
}

/// Clears the current global event sink.
pub fn clear_event_sink() {
    *GLOBAL_EVENT_SINK.write() = None;
}

/// Gets the current global event sink.
///
/// Returns a `NoOpEventSink` if no sink is set.
pub fn get_event_sink() -> Arc<dyn EventSink> {
    GLOBAL_EVENT_SINK
        .read()
        .clone()
        .unwrap_or_else(|| Arc::new(NoOpEventSink))
}
