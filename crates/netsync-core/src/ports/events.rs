//! Sync event sink port
//!
//! Callers that want to observe a sync as it happens (progress bars,
//! reports, audit trails) implement [`ISyncEventSink`] and pass it in the
//! sync options. The engine calls the sink synchronously, exactly once per
//! transfer, skip or deletion, from whichever task produced the event.
//!
//! ## Design Notes
//!
//! - Every method has a no-op default so sinks implement only what they need.
//! - Return values are not consumed; a sink cannot veto an event.

use crate::domain::{DeleteEvent, SkipEvent, TransferEvent};

/// Observer for sync events
pub trait ISyncEventSink: Send + Sync {
    /// Called after a file was transferred (or simulated in dry-run mode)
    fn on_transfer(&self, _event: &TransferEvent) {}

    /// Called when an entry was left alone
    fn on_skip(&self, _event: &SkipEvent) {}

    /// Called after an extraneous entry was deleted (or simulated)
    fn on_delete(&self, _event: &DeleteEvent) {}
}

/// Sink that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl ISyncEventSink for NoopEventSink {}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::domain::{CompareStrategy, SkipReason};

    #[derive(Default)]
    struct CountingSink {
        skips: AtomicUsize,
    }

    impl ISyncEventSink for CountingSink {
        fn on_skip(&self, _event: &SkipEvent) {
            self.skips.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_partial_sink_uses_defaults() {
        let sink = CountingSink::default();
        let event = SkipEvent {
            relative_path: "a.txt".into(),
            reason: SkipReason::Compare(CompareStrategy::Size),
        };
        sink.on_skip(&event);
        sink.on_skip(&event);
        assert_eq!(sink.skips.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_noop_sink_is_object_safe() {
        let sink: Box<dyn ISyncEventSink> = Box::new(NoopEventSink);
        sink.on_skip(&SkipEvent {
            relative_path: "x".into(),
            reason: SkipReason::Symlink,
        });
    }
}
