//! Event types and broadcast bus
//!
//! One-to-many fan-out over `tokio::sync::broadcast`: the engine and the
//! state machine emit, the controller's event loop and any number of SSE
//! clients subscribe. Emission is lossy by default: a player with no
//! listeners keeps playing.

use crate::playback::slot::SlotId;
use crate::session::RepeatMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Player events
///
/// Engine-scoped events (`TimeUpdate`, `Ended`, `LoadError`) always refer to
/// the active slot: notifications from a fading-out slot are filtered before
/// they reach the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Position report from the active slot
    TimeUpdate {
        position: f64,
        duration: Option<f64>,
        timestamp: DateTime<Utc>,
    },

    /// Active slot exhausted its material
    Ended { timestamp: DateTime<Utc> },

    /// A source failed to bind; the slot is marked errored
    LoadError {
        slot: SlotId,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Play/pause flip
    PlaybackStateChanged {
        playing: bool,
        timestamp: DateTime<Utc>,
    },

    /// A different track became logically current
    TrackChanged {
        index: usize,
        title: String,
        timestamp: DateTime<Utc>,
    },

    /// The synced lyric line moved
    LyricLineChanged {
        line: Option<usize>,
        text: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Gain exchange between slots began
    CrossfadeStarted {
        operation_id: Uuid,
        from: SlotId,
        to: SlotId,
        duration_seconds: f64,
        timestamp: DateTime<Utc>,
    },

    /// Pending crossfade completion fired; `active` is the new active slot
    CrossfadeCompleted {
        operation_id: Uuid,
        active: SlotId,
        timestamp: DateTime<Utc>,
    },

    /// A pending crossfade was preempted before completion
    CrossfadeCancelled {
        operation_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Shuffle toggled
    ShuffleChanged {
        enabled: bool,
        timestamp: DateTime<Utc>,
    },

    /// Repeat mode cycled
    RepeatChanged {
        mode: RepeatMode,
        timestamp: DateTime<Utc>,
    },

    /// A persisted session was recovered at startup
    SessionRestored {
        index: usize,
        position_seconds: f64,
        playing: bool,
        timestamp: DateTime<Utc>,
    },
}

impl PlayerEvent {
    /// Stable event name, used as the SSE `event:` field
    pub fn kind(&self) -> &'static str {
        match self {
            PlayerEvent::TimeUpdate { .. } => "TimeUpdate",
            PlayerEvent::Ended { .. } => "Ended",
            PlayerEvent::LoadError { .. } => "LoadError",
            PlayerEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            PlayerEvent::TrackChanged { .. } => "TrackChanged",
            PlayerEvent::LyricLineChanged { .. } => "LyricLineChanged",
            PlayerEvent::CrossfadeStarted { .. } => "CrossfadeStarted",
            PlayerEvent::CrossfadeCompleted { .. } => "CrossfadeCompleted",
            PlayerEvent::CrossfadeCancelled { .. } => "CrossfadeCancelled",
            PlayerEvent::ShuffleChanged { .. } => "ShuffleChanged",
            PlayerEvent::RepeatChanged { .. } => "RepeatChanged",
            PlayerEvent::SessionRestored { .. } => "SessionRestored",
        }
    }
}

/// Broadcast bus for [`PlayerEvent`]
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, reporting how many subscribers received it
    pub fn emit(
        &self,
        event: PlayerEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<PlayerEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

// ========================================
// Tests
// ========================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_subscribe_count() {
        let bus = EventBus::new(16);
        assert_eq!(bus.subscriber_count(), 0);

        let _rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(16);
        let event = PlayerEvent::Ended {
            timestamp: Utc::now(),
        };

        assert!(bus.emit(event.clone()).is_err());
        bus.emit_lossy(event); // must not panic
    }

    #[tokio::test]
    async fn test_emit_with_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit_lossy(PlayerEvent::PlaybackStateChanged {
            playing: true,
            timestamp: Utc::now(),
        });

        match rx.recv().await.unwrap() {
            PlayerEvent::PlaybackStateChanged { playing, .. } => assert!(playing),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = PlayerEvent::TrackChanged {
            index: 2,
            title: "Lerato".to_string(),
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "TrackChanged");
        assert_eq!(json["index"], 2);
        assert_eq!(event.kind(), "TrackChanged");
    }
}
