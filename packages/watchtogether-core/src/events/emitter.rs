//! Event emitter abstraction for decoupling services from transport.
//!
//! Services depend on the [`EventEmitter`] trait rather than concrete broadcast
//! channels, enabling testing and alternative transport implementations.

use super::{DiscoveryEvent, RoomEvent};

/// Trait for emitting ambient domain events without knowledge of transport.
pub trait EventEmitter: Send + Sync {
    /// Emits a room lifecycle event.
    fn emit_room(&self, event: RoomEvent);

    /// Emits a discovery-map event.
    fn emit_discovery(&self, event: DiscoveryEvent);
}

/// No-op emitter for testing.
///
/// Events are silently discarded.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit_room(&self, _event: RoomEvent) {}
    fn emit_discovery(&self, _event: DiscoveryEvent) {}
}

/// Logging emitter for debugging and development.
///
/// Logs all events at debug level.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit_room(&self, event: RoomEvent) {
        tracing::debug!(?event, "room_event");
    }

    fn emit_discovery(&self, event: DiscoveryEvent) {
        tracing::debug!(?event, "discovery_event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingEventEmitter {
        room_count: AtomicUsize,
        discovery_count: AtomicUsize,
    }

    impl CountingEventEmitter {
        fn new() -> Self {
            Self {
                room_count: AtomicUsize::new(0),
                discovery_count: AtomicUsize::new(0),
            }
        }
    }

    impl EventEmitter for CountingEventEmitter {
        fn emit_room(&self, _event: RoomEvent) {
            self.room_count.fetch_add(1, Ordering::SeqCst);
        }

        fn emit_discovery(&self, _event: DiscoveryEvent) {
            self.discovery_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn counting_emitter_tracks_events() {
        let emitter = Arc::new(CountingEventEmitter::new());

        emitter.emit_room(RoomEvent::Created {
            room_id: "ABCD1234".to_string(),
            timestamp: 0,
        });
        emitter.emit_room(RoomEvent::Destroyed {
            room_id: "ABCD1234".to_string(),
            timestamp: 0,
        });
        emitter.emit_discovery(DiscoveryEvent::EntryDiscovered {
            instance_id: "inst".to_string(),
            room_id: "ABCD1234".to_string(),
            timestamp: 0,
        });

        assert_eq!(emitter.room_count.load(Ordering::SeqCst), 2);
        assert_eq!(emitter.discovery_count.load(Ordering::SeqCst), 1);
    }
}
