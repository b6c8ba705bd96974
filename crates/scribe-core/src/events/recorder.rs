//! Diagnostic event recording.

use super::broadcaster::EventBroadcaster;
use super::types::{DiagnosticEvent, EventType};
use crate::object::ObjectReference;

/// Sink for human-facing diagnostic events.
///
/// Recording is fire-and-forget: a recorder never fails the caller.
pub trait EventRecorder: Send + Sync {
    fn record(&self, event: DiagnosticEvent);

    fn warning(&self, target: &ObjectReference, reason: &str, message: &str) {
        self.record(DiagnosticEvent::warning(target.clone(), reason, message));
    }

    fn normal(&self, target: &ObjectReference, reason: &str, message: &str) {
        self.record(DiagnosticEvent::normal(target.clone(), reason, message));
    }
}

impl EventRecorder for EventBroadcaster {
    fn record(&self, event: DiagnosticEvent) {
        match event.event_type {
            EventType::Warning => tracing::warn!(
                object = %event.involved_object,
                reason = %event.reason,
                message = %event.message,
                "Recorded event"
            ),
            EventType::Normal => tracing::info!(
                object = %event.involved_object,
                reason = %event.reason,
                message = %event.message,
                "Recorded event"
            ),
        }
        self.send_diagnostic(event);
    }
}
