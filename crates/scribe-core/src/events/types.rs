//! Event type definitions.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::object::{ManagedObject, ObjectReference};

// ============================================================================
// Change Events
// ============================================================================

/// Kind of write observed on the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// Object was created or updated
    Applied,
    /// Object was removed
    Deleted,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Applied => "applied",
            ChangeType::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Notification that an object changed in the store.
///
/// Deleted events carry the last known body of the object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub change_type: ChangeType,
    pub object: ManagedObject,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl ChangeEvent {
    pub fn new(change_type: ChangeType, object: ManagedObject) -> Self {
        Self {
            change_type,
            object,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    pub fn applied(object: ManagedObject) -> Self {
        Self::new(ChangeType::Applied, object)
    }

    pub fn deleted(object: ManagedObject) -> Self {
        Self::new(ChangeType::Deleted, object)
    }

    /// Reference to the changed object.
    pub fn reference(&self) -> ObjectReference {
        self.object.reference()
    }
}

// ============================================================================
// Diagnostic Events
// ============================================================================

/// Severity of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Normal,
    Warning,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Normal => "Normal",
            EventType::Warning => "Warning",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Human-facing event attached to an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    /// Object the event is about
    pub involved_object: ObjectReference,
    pub event_type: EventType,
    /// Short machine-readable cause, e.g. `AnnotationValidationFailure`
    pub reason: String,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl DiagnosticEvent {
    pub fn new(
        involved_object: ObjectReference,
        event_type: EventType,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            involved_object,
            event_type,
            reason: reason.into(),
            message: message.into(),
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    pub fn warning(
        involved_object: ObjectReference,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(involved_object, EventType::Warning, reason, message)
    }

    pub fn normal(
        involved_object: ObjectReference,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(involved_object, EventType::Normal, reason, message)
    }
}

// ============================================================================
// System Events
// ============================================================================

/// Everything carried by the event broadcaster.
#[derive(Debug, Clone)]
pub enum SystemEvent {
    Change(ChangeEvent),
    Diagnostic(DiagnosticEvent),
}

impl From<ChangeEvent> for SystemEvent {
    fn from(event: ChangeEvent) -> Self {
        SystemEvent::Change(event)
    }
}

impl From<DiagnosticEvent> for SystemEvent {
    fn from(event: DiagnosticEvent) -> Self {
        SystemEvent::Diagnostic(event)
    }
}
