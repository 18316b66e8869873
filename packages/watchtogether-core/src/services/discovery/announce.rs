//! Announcement path: broadcasts this instance's armed rooms as JSON UDP
//! datagrams on every interface broadcast address plus the limited broadcast.
//!
//! Socket construction (SO_REUSEADDR, SO_BROADCAST,
//! `socket2::Socket` → `tokio::net::UdpSocket::from_std`) mirrors the
//! teacher's SSDP discovery socket setup.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use local_ip_address::list_afinet_netifas;
use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use uuid::Uuid;

use super::{AnnounceMessage, RoomAnnouncement};
use crate::protocol_constants::{
    ANNOUNCE_MESSAGE_TYPE, DISCOVERY_ANNOUNCE_INTERVAL_MS, DISCOVERY_PROTOCOL_VERSION,
};
use crate::utils::now_millis;

fn broadcast_addresses(port: u16) -> Vec<SocketAddr> {
    let mut addrs: Vec<SocketAddr> = list_afinet_netifas()
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(_, addr)| match addr {
            IpAddr::V4(ipv4) if !ipv4.is_loopback() => {
                let octets = ipv4.octets();
                let broadcast = Ipv4Addr::new(octets[0], octets[1], octets[2], 255);
                Some(SocketAddr::new(IpAddr::V4(broadcast), port))
            }
            _ => None,
        })
        .collect();
    addrs.push(SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), port));
    addrs
}

fn create_broadcast_socket() -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_broadcast(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0).into())?;
    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket)
}

/// Broadcasts one armed room's announcement on a fixed interval. Created per
/// instance process; `arm`/`disarm` are called as the host's discovery
/// toggle changes.
pub struct Announcer {
    instance_id: String,
    port: u16,
    armed: Arc<Mutex<Option<RoomAnnouncement>>>,
}

impl Announcer {
    pub fn new(port: u16) -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
            port,
            armed: Arc::new(Mutex::new(None)),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn arm(&self, room: RoomAnnouncement) {
        *self.armed.lock() = Some(room);
    }

    pub fn disarm(&self) {
        *self.armed.lock() = None;
    }

    pub fn armed(&self) -> Option<RoomAnnouncement> {
        self.armed.lock().clone()
    }

    /// Runs the announce loop until the process exits. Spawn as a background
    /// task from the composition root.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(Duration::from_millis(DISCOVERY_ANNOUNCE_INTERVAL_MS));
        loop {
            ticker.tick().await;
            let Some(room) = self.armed.lock().clone() else {
                continue;
            };
            self.broadcast_once(room).await;
        }
    }

    async fn broadcast_once(&self, room: RoomAnnouncement) {
        let socket = match create_broadcast_socket() {
            Ok(s) => s,
            Err(e) => {
                log::debug!("[Announcer] failed to create broadcast socket: {}", e);
                return;
            }
        };

        let message = AnnounceMessage {
            message_type: ANNOUNCE_MESSAGE_TYPE.to_string(),
            protocol_version: DISCOVERY_PROTOCOL_VERSION,
            instance_id: self.instance_id.clone(),
            room,
            announced_at: now_millis(),
        };
        let Ok(payload) = serde_json::to_vec(&message) else {
            return;
        };

        for addr in broadcast_addresses(self.port) {
            if let Err(e) = socket.send_to(&payload, addr).await {
                log::trace!("[Announcer] send to {} failed: {}", addr, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_room() -> RoomAnnouncement {
        RoomAnnouncement {
            room_id: "ABC123".into(),
            room_name: "Movie Night".into(),
            host_nickname: "Alice".into(),
            requires_password: false,
            member_count: 1,
            max_members: 6,
            media_name: None,
            subtitle_name: None,
            playback_state: super::super::RoomPlaybackSummary::Idle,
            port: 4000,
        }
    }

    #[test]
    fn arm_and_disarm_toggle_state() {
        let announcer = Announcer::new(43153);
        assert!(announcer.armed.lock().is_none());
        announcer.arm(sample_room());
        assert!(announcer.armed.lock().is_some());
        announcer.disarm();
        assert!(announcer.armed.lock().is_none());
    }

    #[test]
    fn broadcast_addresses_includes_limited_broadcast() {
        let addrs = broadcast_addresses(43153);
        assert!(addrs
            .iter()
            .any(|a| a.ip() == IpAddr::V4(Ipv4Addr::BROADCAST)));
    }
}
