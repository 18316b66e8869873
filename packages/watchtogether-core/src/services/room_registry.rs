//! Room registry: maps room ids to running room actors.
//!
//! `get_or_create` is the only path that creates a room, and it never holds
//! the registry lock across a command to a room actor. An idle sweep runs
//! periodically, destroying rooms that have had zero members for longer than
//! the configured TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::context::NetworkContext;
use crate::events::{EventEmitter, RoomEvent};
use crate::services::discovery::{DiscoveryService, RoomAnnouncement, RoomPlaybackSummary};
use crate::services::room::{spawn_room, RoomHandle};
use crate::utils::{normalize_room_id, now_millis};

/// Thread-safe table of live rooms, keyed by normalized room id.
pub struct RoomRegistry {
    rooms: Mutex<HashMap<String, RoomHandle>>,
    default_max_members: usize,
    idle_ttl_ms: u64,
    emitter: Arc<dyn EventEmitter>,
    discovery: Arc<DiscoveryService>,
    network: NetworkContext,
}

impl RoomRegistry {
    pub fn new(
        default_max_members: usize,
        idle_ttl_minutes: u64,
        emitter: Arc<dyn EventEmitter>,
        discovery: Arc<DiscoveryService>,
        network: NetworkContext,
    ) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            default_max_members,
            idle_ttl_ms: idle_ttl_minutes * 60 * 1000,
            emitter,
            discovery,
            network,
        }
    }

    pub fn get(&self, room_id: &str) -> Option<RoomHandle> {
        let id = normalize_room_id(room_id);
        self.rooms.lock().get(&id).cloned()
    }

    /// Returns the existing room for `room_id`, or creates one if absent.
    /// `room_name`/`password`/`max_members` only take effect on creation.
    pub fn get_or_create(
        &self,
        room_id: &str,
        room_name: String,
        password: Option<String>,
        max_members: Option<usize>,
    ) -> RoomHandle {
        let id = normalize_room_id(room_id);
        let mut rooms = self.rooms.lock();
        if let Some(handle) = rooms.get(&id) {
            return handle.clone();
        }

        let handle = spawn_room(
            id.clone(),
            room_name,
            password,
            max_members.unwrap_or(self.default_max_members),
        );
        rooms.insert(id.clone(), handle.clone());
        let live_handles: Vec<RoomHandle> = rooms.values().cloned().collect();
        drop(rooms);
        self.emitter.emit_room(RoomEvent::Created {
            room_id: id,
            timestamp: now_millis(),
        });

        let discovery = Arc::clone(&self.discovery);
        let port = self.network.get_port();
        tokio::spawn(async move {
            recompute_and_arm(live_handles, &discovery, port).await;
        });

        handle
    }

    /// Rebuilds the armed discovery announcement from the busiest live room
    /// (most members), disarming if no room currently has any. Driven by
    /// [`Self::run_discovery_refresher`] and called directly after room
    /// creation and idle eviction.
    pub async fn refresh_discovery(&self) {
        let handles: Vec<RoomHandle> = self.rooms.lock().values().cloned().collect();
        recompute_and_arm(handles, &self.discovery, self.network.get_port()).await;
    }

    /// Runs [`Self::refresh_discovery`] on the given interval until the
    /// process exits.
    pub async fn run_discovery_refresher(self: Arc<Self>, interval_ms: u64) {
        let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
        loop {
            ticker.tick().await;
            self.refresh_discovery().await;
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.lock().len()
    }

    /// Removes and shuts down every room with zero members whose last
    /// activity is older than the configured idle TTL. Meant to be driven by
    /// a periodic task in the composition root.
    pub async fn sweep_idle(&self) {
        let candidates: Vec<(String, RoomHandle)> = self
            .rooms
            .lock()
            .iter()
            .map(|(id, handle)| (id.clone(), handle.clone()))
            .collect();

        let now = now_millis();
        for (id, handle) in candidates {
            let Some(status) = handle.status().await else {
                self.rooms.lock().remove(&id);
                continue;
            };
            if status.member_count == 0 && now.saturating_sub(status.last_active_at) > self.idle_ttl_ms
            {
                handle.shutdown().await;
                self.rooms.lock().remove(&id);
                self.emitter.emit_room(RoomEvent::Destroyed {
                    room_id: id,
                    timestamp: now_millis(),
                });
            }
        }

        self.refresh_discovery().await;
    }

    /// Runs [`sweep_idle`] on the given interval until the process exits.
    pub async fn run_idle_sweeper(self: Arc<Self>, interval_ms: u64) {
        let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
        loop {
            ticker.tick().await;
            self.sweep_idle().await;
        }
    }
}

/// Picks the room with the most members among `handles` and arms `discovery`
/// with its announcement; disarms if none has any members.
async fn recompute_and_arm(handles: Vec<RoomHandle>, discovery: &DiscoveryService, port: u16) {
    let mut best: Option<(crate::services::room::RoomSnapshot, usize)> = None;
    for handle in handles {
        let Some(snapshot) = handle.request_snapshot().await else {
            continue;
        };
        let member_count = snapshot.members.len();
        if member_count == 0 {
            continue;
        }
        if best.as_ref().map_or(true, |(_, count)| member_count > *count) {
            best = Some((snapshot, member_count));
        }
    }

    match best {
        Some((snapshot, _)) => discovery.arm(announcement_from_snapshot(&snapshot, port)),
        None => discovery.disarm(),
    }
}

/// Derives the discovery-wire [`RoomAnnouncement`] from a room's internal
/// snapshot, reading the host's nickname off the member table.
fn announcement_from_snapshot(
    snapshot: &crate::services::room::RoomSnapshot,
    port: u16,
) -> RoomAnnouncement {
    let host_nickname = snapshot
        .members
        .iter()
        .find(|m| m.is_host)
        .map(|m| m.nickname.clone())
        .unwrap_or_default();

    let playback_state = match (&snapshot.media, snapshot.playback.paused) {
        (None, _) => RoomPlaybackSummary::Idle,
        (Some(_), true) => RoomPlaybackSummary::Paused,
        (Some(_), false) => RoomPlaybackSummary::Playing,
    };

    RoomAnnouncement {
        room_id: snapshot.room_id.clone(),
        room_name: snapshot.room_name.clone(),
        host_nickname,
        requires_password: snapshot.has_password,
        member_count: snapshot.members.len(),
        max_members: snapshot.max_members,
        media_name: snapshot.media.as_ref().map(|m| m.name.clone()),
        subtitle_name: snapshot.subtitle.as_ref().map(|s| s.name.clone()),
        playback_state,
        port,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopEventEmitter;

    fn registry() -> RoomRegistry {
        RoomRegistry::new(
            6,
            120,
            Arc::new(NoopEventEmitter),
            Arc::new(DiscoveryService::new(None)),
            NetworkContext::for_test(),
        )
    }

    #[tokio::test]
    async fn get_or_create_reuses_existing_room() {
        let registry = registry();
        let a = registry.get_or_create("abc123", "Movie Night".into(), None, None);
        let b = registry.get_or_create("abc123", "Different Name".into(), None, None);
        assert_eq!(a.room_id(), b.room_id());
        assert_eq!(registry.room_count(), 1);
    }

    #[tokio::test]
    async fn normalizes_room_id_casing() {
        let registry = registry();
        let a = registry.get_or_create("abc123", "Movie Night".into(), None, None);
        let b = registry.get_or_create("ABC123", "Movie Night".into(), None, None);
        assert_eq!(a.room_id(), b.room_id());
    }

    #[tokio::test]
    async fn sweep_idle_removes_empty_expired_rooms() {
        let registry = RoomRegistry::new(
            6,
            0,
            Arc::new(NoopEventEmitter),
            Arc::new(DiscoveryService::new(None)),
            NetworkContext::for_test(),
        );
        registry.get_or_create("abc123", "Movie Night".into(), None, None);
        tokio::time::sleep(Duration::from_millis(5)).await;
        registry.sweep_idle().await;
        assert_eq!(registry.room_count(), 0);
    }
}
