//! Listen path: a single UDP socket bound to `0.0.0.0:discoveryPort`
//! collecting other instances' announcements into a TTL-evicted map.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use super::{AnnounceMessage, RoomAnnouncement};
use crate::protocol_constants::{
    ANNOUNCE_MESSAGE_TYPE, DISCOVERY_ENTRY_TTL_MS, DISCOVERY_PROTOCOL_VERSION,
    DISCOVERY_SWEEP_INTERVAL_MS,
};
use crate::utils::now_millis;

/// A room announcement observed either via broadcast or HTTP probe, with the
/// bookkeeping needed to evict or merge it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryEntry {
    pub instance_id: String,
    pub room: RoomAnnouncement,
    pub server_url: String,
    pub last_seen_at: u64,
}

fn bind_listen_socket(port: u16) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_broadcast(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port).into())?;
    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket)
}

fn validate(message: &AnnounceMessage, self_instance_id: &str) -> bool {
    message.message_type == ANNOUNCE_MESSAGE_TYPE
        && message.protocol_version == DISCOVERY_PROTOCOL_VERSION
        && message.instance_id != self_instance_id
        && !message.room.room_id.is_empty()
        && message.room.port != 0
}

/// Owns the listen socket and the broadcast-discovered entry map.
pub struct Listener {
    self_instance_id: String,
    port: u16,
    entries: Arc<Mutex<HashMap<String, DiscoveryEntry>>>,
}

impl Listener {
    pub fn new(self_instance_id: String, port: u16) -> Self {
        Self {
            self_instance_id,
            port,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn entries(&self) -> Vec<DiscoveryEntry> {
        self.entries.lock().values().cloned().collect()
    }

    /// Runs the receive loop and periodic TTL sweep concurrently until the
    /// process exits. Spawn as a background task from the composition root.
    pub async fn run(self: Arc<Self>) {
        let socket = match bind_listen_socket(self.port) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("[Listener] failed to bind discovery socket on port {}: {}", self.port, e);
                return;
            }
        };

        let recv_entries = Arc::clone(&self.entries);
        let self_id = self.self_instance_id.clone();
        let recv_loop = async move {
            let mut buf = [0u8; 2048];
            loop {
                match socket.recv_from(&mut buf).await {
                    Ok((amt, src)) => {
                        if let Ok(message) = serde_json::from_slice::<AnnounceMessage>(&buf[..amt]) {
                            if validate(&message, &self_id) {
                                let key = format!("{}:{}", message.instance_id, message.room.room_id);
                                let server_url =
                                    format!("http://{}:{}", src.ip(), message.room.port);
                                recv_entries.lock().insert(
                                    key,
                                    DiscoveryEntry {
                                        instance_id: message.instance_id,
                                        room: message.room,
                                        server_url,
                                        last_seen_at: now_millis(),
                                    },
                                );
                            }
                        }
                    }
                    Err(e) => {
                        log::trace!("[Listener] recv error: {}", e);
                    }
                }
            }
        };

        let sweep_entries = Arc::clone(&self.entries);
        let sweep_loop = async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(DISCOVERY_SWEEP_INTERVAL_MS));
            loop {
                ticker.tick().await;
                let now = now_millis();
                sweep_entries
                    .lock()
                    .retain(|_, entry| now.saturating_sub(entry.last_seen_at) < DISCOVERY_ENTRY_TTL_MS);
            }
        };

        tokio::join!(recv_loop, sweep_loop);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::discovery::RoomPlaybackSummary;

    fn sample_message(instance_id: &str) -> AnnounceMessage {
        AnnounceMessage {
            message_type: ANNOUNCE_MESSAGE_TYPE.to_string(),
            protocol_version: DISCOVERY_PROTOCOL_VERSION,
            instance_id: instance_id.to_string(),
            room: RoomAnnouncement {
                room_id: "ABC123".into(),
                room_name: "Movie Night".into(),
                host_nickname: "Alice".into(),
                requires_password: false,
                member_count: 1,
                max_members: 6,
                media_name: None,
                subtitle_name: None,
                playback_state: RoomPlaybackSummary::Idle,
                port: 4000,
            },
            announced_at: now_millis(),
        }
    }

    #[test]
    fn validate_rejects_self_instance() {
        let message = sample_message("self-id");
        assert!(!validate(&message, "self-id"));
    }

    #[test]
    fn validate_rejects_wrong_protocol_version() {
        let mut message = sample_message("other-id");
        message.protocol_version = 99;
        assert!(!validate(&message, "self-id"));
    }

    #[test]
    fn validate_accepts_well_formed_message() {
        let message = sample_message("other-id");
        assert!(validate(&message, "self-id"));
    }
}
