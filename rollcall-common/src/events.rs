//! Attendance event types and the EventBus
//!
//! Events are broadcast via [`EventBus`] and serialized for SSE transmission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Rollcall event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AttendanceEvent {
    /// First detection of an entity marked it present
    Present {
        /// Entity identifier
        id: String,
        /// When the entity was first seen
        timestamp: DateTime<Utc>,
    },

    /// Attendance flipped manually
    AttendanceToggled {
        id: String,
        attendance: bool,
        timestamp: DateTime<Utc>,
    },

    /// Roster replaced the ledger contents
    RosterLoaded {
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// Detection stream registered and ingestor launched
    StreamStarted {
        stream_id: Uuid,
        url: String,
        update_interval_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Detection stream stopped on request
    StreamStopped {
        url: String,
        timestamp: DateTime<Utc>,
    },

    /// Detection stream ended on its own (source closed or failed)
    StreamEnded {
        stream_id: Uuid,
        url: String,
        timestamp: DateTime<Utc>,
    },
}

impl AttendanceEvent {
    /// Event name used for the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            AttendanceEvent::Present { .. } => "Present",
            AttendanceEvent::AttendanceToggled { .. } => "AttendanceToggled",
            AttendanceEvent::RosterLoaded { .. } => "RosterLoaded",
            AttendanceEvent::StreamStarted { .. } => "StreamStarted",
            AttendanceEvent::StreamStopped { .. } => "StreamStopped",
            AttendanceEvent::StreamEnded { .. } => "StreamEnded",
        }
    }
}

/// Broadcast channel for [`AttendanceEvent`]s
///
/// Cloning is cheap; all clones share one channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AttendanceEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per slow subscriber
    ///
    /// ```
    /// use rollcall_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.subscriber_count(), 0);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<AttendanceEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: AttendanceEvent,
    ) -> Result<usize, broadcast::error::SendError<AttendanceEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: AttendanceEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_emitted_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        let event = AttendanceEvent::Present {
            id: "alice".to_string(),
            timestamp: Utc::now(),
        };
        assert_eq!(bus.emit(event.clone()).unwrap(), 1);
        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[test]
    fn test_capacity_is_kept() {
        assert_eq!(EventBus::new(256).capacity(), 256);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(10);
        let event = AttendanceEvent::StreamStopped {
            url: "http://localhost/results".to_string(),
            timestamp: Utc::now(),
        };
        assert!(bus.emit(event.clone()).is_err());
        // lossy variant never fails
        bus.emit_lossy(event);
    }

    #[test]
    fn test_serialized_with_type_tag() {
        let event = AttendanceEvent::RosterLoaded {
            total: 3,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "RosterLoaded");
        assert_eq!(json["total"], 3);
        assert_eq!(event.event_type(), "RosterLoaded");
    }
}
