//! Broadcast channel wrapper for system events.

use std::sync::Arc;
use tokio::sync::broadcast;

use super::types::{ChangeEvent, DiagnosticEvent, SystemEvent};
use crate::object::ManagedObject;

/// Events beyond this limit are dropped for slow receivers.
const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Multi-subscriber event bus.
///
/// Cloning is cheap; every clone publishes into the same channel.
#[derive(Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<SystemEvent>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Sends an event to all subscribers.
    ///
    /// Returns the number of subscribers that received it, 0 when nobody listens.
    pub fn send(&self, event: SystemEvent) -> usize {
        self.sender.send(event).unwrap_or_default()
    }

    pub fn send_change(&self, event: ChangeEvent) -> usize {
        self.send(SystemEvent::Change(event))
    }

    pub fn send_applied(&self, object: ManagedObject) -> usize {
        self.send_change(ChangeEvent::applied(object))
    }

    pub fn send_deleted(&self, object: ManagedObject) -> usize {
        self.send_change(ChangeEvent::deleted(object))
    }

    pub fn send_diagnostic(&self, event: DiagnosticEvent) -> usize {
        self.send(SystemEvent::Diagnostic(event))
    }

    /// Events sent before subscribing are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<SystemEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
