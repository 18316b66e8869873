//! LAN discovery: UDP broadcast announce/listen plus HTTP subnet probing.
//!
//! The announcer and listener own a UDP socket and a mutex-guarded map,
//! grounded on the teacher's SSDP socket-construction pattern
//! ([`crate::services::discovery::announce`]); the probe path's private-subnet
//! enumeration has no teacher counterpart but follows the same
//! enumerate-interfaces/filter/build-candidate-list shape. All socket and HTTP
//! errors here are swallowed — discovery is best-effort and never surfaces a
//! failure to a caller.

mod announce;
mod listen;
mod probe;

pub use announce::Announcer;
pub use listen::{DiscoveryEntry, Listener};
pub use probe::{ProbeSummary, Prober};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::protocol_constants::DEFAULT_DISCOVERY_PORT;

/// Payload a host supplies to arm the announcer; also what the listener/probe
/// surface back to callers once wrapped with discovery metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomAnnouncement {
    pub room_id: String,
    pub room_name: String,
    pub host_nickname: String,
    pub requires_password: bool,
    pub member_count: usize,
    pub max_members: usize,
    pub media_name: Option<String>,
    pub subtitle_name: Option<String>,
    pub playback_state: RoomPlaybackSummary,
    pub port: u16,
}

/// Coarse playback status surfaced in discovery payloads, distinct from the
/// full [`crate::services::playback::PlaybackState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomPlaybackSummary {
    Idle,
    Paused,
    Playing,
}

/// The wire envelope broadcast over UDP and returned by `/api/discovery`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnounceMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub protocol_version: u32,
    pub instance_id: String,
    #[serde(flatten)]
    pub room: RoomAnnouncement,
    pub announced_at: u64,
}

/// Composes the announcer, listener and prober into the single service the
/// composition root wires up. Merges the broadcast map and the probe cache by
/// key, preferring the entry with the newer `lastSeenAt`.
pub struct DiscoveryService {
    announcer: Arc<Announcer>,
    listener: Arc<Listener>,
    prober: Arc<Prober>,
}

impl DiscoveryService {
    pub fn new(port: Option<u16>) -> Self {
        let announcer = Arc::new(Announcer::new(port.unwrap_or(DEFAULT_DISCOVERY_PORT)));
        let listener = Arc::new(Listener::new(
            announcer.instance_id().to_string(),
            port.unwrap_or(DEFAULT_DISCOVERY_PORT),
        ));
        let prober = Arc::new(Prober::new(announcer.instance_id().to_string()));
        Self {
            announcer,
            listener,
            prober,
        }
    }

    pub fn instance_id(&self) -> &str {
        self.announcer.instance_id()
    }

    pub fn arm(&self, room: RoomAnnouncement) {
        self.announcer.arm(room);
    }

    pub fn disarm(&self) {
        self.announcer.disarm();
    }

    /// The room announcement currently armed, if any — what `/api/discovery`
    /// reports as hosted by this instance.
    pub fn armed(&self) -> Option<RoomAnnouncement> {
        self.announcer.armed()
    }

    /// Spawns the announce and listen background loops. Call once from the
    /// composition root.
    pub fn spawn_background_tasks(&self) {
        tokio::spawn(Arc::clone(&self.announcer).run());
        tokio::spawn(Arc::clone(&self.listener).run());
    }

    /// Broadcast-discovered entries merged with a fresh/cached HTTP probe,
    /// preferring whichever observation of a given `instanceId:roomId` is newer.
    pub async fn discover(&self) -> Vec<DiscoveryEntry> {
        let mut merged: std::collections::HashMap<String, DiscoveryEntry> =
            std::collections::HashMap::new();

        for entry in self.listener.entries() {
            merged.insert(format!("{}:{}", entry.instance_id, entry.room.room_id), entry);
        }

        for entry in self.prober.probe().await {
            let key = format!("{}:{}", entry.instance_id, entry.room.room_id);
            match merged.get(&key) {
                Some(existing) if existing.last_seen_at >= entry.last_seen_at => {}
                _ => {
                    merged.insert(key, entry);
                }
            }
        }

        merged.into_values().collect()
    }
}
