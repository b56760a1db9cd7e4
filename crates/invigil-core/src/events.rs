//! Event bus for proctoring lifecycle notifications.
//!
//! Every successful mutation publishes synchronously before the call
//! returns. Delivery to subscribers is best-effort, at-most-once: a
//! lagging subscriber loses the oldest events, and publishing with no
//! subscribers is a no-op. Downstream audit/notification systems attach
//! via [`EventBus::subscribe`].

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::session::ProctorSession;
use crate::violation::SecurityViolation;

/// Events emitted by the proctoring core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProctorEvent {
    /// `proctor.session.started`
    SessionStarted { session: Box<ProctorSession> },

    /// `proctor.session.ended`
    SessionEnded { session: Box<ProctorSession> },

    /// `proctor.violation.recorded`
    ViolationRecorded {
        session_id: String,
        violation: Box<SecurityViolation>,
    },

    /// `proctor.session.terminated`
    SessionTerminated {
        session: Box<ProctorSession>,
        reason: String,
    },
}

impl ProctorEvent {
    /// Dotted event name for downstream routing.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "proctor.session.started",
            Self::SessionEnded { .. } => "proctor.session.ended",
            Self::ViolationRecorded { .. } => "proctor.violation.recorded",
            Self::SessionTerminated { .. } => "proctor.session.terminated",
        }
    }
}

/// Broadcast fanout for [`ProctorEvent`]s.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<ProctorEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus {
    /// Create a bus with the given per-subscriber buffer capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProctorEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to current subscribers. Returns the number of
    /// subscribers the event was handed to (0 when nobody listens).
    pub fn publish(&self, event: ProctorEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Current subscriber count.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
