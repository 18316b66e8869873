//! Event system for ambient observability.
//!
//! This module provides:
//! - [`EventEmitter`] trait for domain services to emit ambient lifecycle events
//! - Event types for the room and discovery domains
//!
//! Client-facing fan-out (`room:snapshot`, `playback:state`, `room:error`,
//! `room:closed`) is room-scoped and handled separately by each
//! [`crate::services::room::Room`]'s own broadcast channel; this module
//! instead carries cross-cutting events (room created/destroyed, discovery
//! entries changing) useful for logging and future observability consumers.

mod bridge;
mod emitter;

pub use bridge::BroadcastEventBridge;
pub use emitter::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};

use serde::Serialize;

/// Ambient events observable across the whole server process.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "category", rename_all = "camelCase")]
pub enum BroadcastEvent {
    /// Events from room lifecycle (creation, destruction, host handoff).
    Room(RoomEvent),

    /// Events from the discovery service's map of known peers.
    Discovery(DiscoveryEvent),
}

/// Room lifecycle events, independent of any single room's own broadcast channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RoomEvent {
    /// A room was created in the registry.
    Created {
        #[serde(rename = "roomId")]
        room_id: String,
        timestamp: u64,
    },
    /// A room was destroyed (idle eviction or explicit close).
    Destroyed {
        #[serde(rename = "roomId")]
        room_id: String,
        timestamp: u64,
    },
    /// Host role transferred to a different member.
    HostChanged {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "newHostConnId")]
        new_host_conn_id: String,
        timestamp: u64,
    },
}

/// Events from the discovery service's announcement/probe map.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DiscoveryEvent {
    /// A new peer instance/room was observed (broadcast or probe).
    EntryDiscovered {
        #[serde(rename = "instanceId")]
        instance_id: String,
        #[serde(rename = "roomId")]
        room_id: String,
        timestamp: u64,
    },
    /// A previously known broadcast entry aged out.
    EntryExpired {
        #[serde(rename = "instanceId")]
        instance_id: String,
        #[serde(rename = "roomId")]
        room_id: String,
        timestamp: u64,
    },
}

impl From<RoomEvent> for BroadcastEvent {
    fn from(event: RoomEvent) -> Self {
        BroadcastEvent::Room(event)
    }
}

impl From<DiscoveryEvent> for BroadcastEvent {
    fn from(event: DiscoveryEvent) -> Self {
        BroadcastEvent::Discovery(event)
    }
}
