//! Lifecycle events.
//!
//! The executor and exporter report progress through an [`EventSink`].
//! Components that are not given a sink explicitly use the process-wide
//! default, which discards events until one is set.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use parking_lot::RwLock;
use std::sync::Arc;

/// Event type names.
pub mod event_types {
    /// A run began executing pairs.
    pub const RUN_STARTED: &str = "run.started";
    /// A pair started.
    pub const PAIR_STARTED: &str = "pair.started";
    /// A pair produced valid evidence.
    pub const PAIR_SUCCEEDED: &str = "pair.succeeded";
    /// A pair failed.
    pub const PAIR_FAILED: &str = "pair.failed";
    /// A pair was skipped.
    pub const PAIR_SKIPPED: &str = "pair.skipped";
    /// A run reached a terminal status.
    pub const RUN_COMPLETED: &str = "run.completed";
    /// An export delivery attempt began.
    pub const EXPORT_ATTEMPT: &str = "export.attempt";
    /// The destination accepted a report.
    pub const EXPORT_ACCEPTED: &str = "export.accepted";
}

static DEFAULT_EVENT_SINK: RwLock<Option<Arc<dyn EventSink>>> = RwLock::new(None);

/// Sets the process-wide default sink.
pub fn set_event_sink(sink: Arc<dyn EventSink>) {
    *DEFAULT_EVENT_SINK.write() = Some(sink);
}

/// Clears the process-wide default sink.
pub fn clear_event_sink() {
    *DEFAULT_EVENT_SINK.write() = None;
}

/// Returns the process-wide default sink, or a [`NoOpEventSink`].
pub fn get_event_sink() -> Arc<dyn EventSink> {
    DEFAULT_EVENT_SINK
        .read()
        .clone()
        .unwrap_or_else(|| Arc::new(NoOpEventSink))
}
