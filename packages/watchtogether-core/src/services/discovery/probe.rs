//! Probe path: HTTP subnet scan used when a client's LAN doesn't forward UDP
//! broadcast. No teacher counterpart for the private-subnet classification;
//! it follows the same enumerate-interfaces/filter/build-candidate-list shape
//! the teacher's SSDP interface enumeration uses.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{listen::DiscoveryEntry, RoomAnnouncement};
use crate::protocol_constants::{
    DEFAULT_RELAY_PORT, DISCOVERY_PROTOCOL_VERSION, PROBE_CACHE_TTL_SECS, PROBE_CONCURRENCY,
    PROBE_HOST_TIMEOUT_MS,
};
use crate::utils::now_millis;

/// Body returned by a peer's `GET /api/discovery` and parsed here, and the
/// shape this instance serves at the same endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeSummary {
    pub protocol_version: u32,
    pub instance_id: String,
    pub rooms: Vec<RoomAnnouncement>,
}

/// `true` if `ip` falls in a private/carrier-grade/link-local LAN range:
/// `10/8 | 172.16/12 | 192.168/16 | 100.64/10 | 169.254/16 | 198.18/15`.
#[must_use]
pub fn is_private_lan(ip: Ipv4Addr) -> bool {
    let o = ip.octets();
    match o[0] {
        10 => true,
        172 => (16..=31).contains(&o[1]),
        192 => o[1] == 168,
        100 => (64..=127).contains(&o[1]),
        169 => o[1] == 254,
        198 => o[1] == 18 || o[1] == 19,
        _ => false,
    }
}

/// Builds the /24 candidate host list for `ip`'s subnet, excluding `ip` itself.
fn candidates_for_subnet(ip: Ipv4Addr) -> Vec<Ipv4Addr> {
    let o = ip.octets();
    (1u8..=254)
        .filter(|&last| last != o[3])
        .map(|last| Ipv4Addr::new(o[0], o[1], o[2], last))
        .collect()
}

/// Orders interfaces' own-subnet `GET /api/discovery` candidates, tracks a
/// short-lived merged cache, and remembers which hosts answered last time so
/// they are retried first.
pub struct Prober {
    self_instance_id: String,
    relay_port: u16,
    client: reqwest::Client,
    cache: Mutex<Option<(u64, Vec<DiscoveryEntry>)>>,
    success_hosts: Mutex<Vec<Ipv4Addr>>,
}

impl Prober {
    pub fn new(self_instance_id: String) -> Self {
        Self {
            self_instance_id,
            relay_port: DEFAULT_RELAY_PORT,
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(PROBE_HOST_TIMEOUT_MS))
                .build()
                .unwrap_or_default(),
            cache: Mutex::new(None),
            success_hosts: Mutex::new(Vec::new()),
        }
    }

    /// Returns local interfaces' candidate hosts, ordered with previously
    /// successful hosts first.
    fn ordered_candidates(&self) -> Vec<Ipv4Addr> {
        let local_ips: Vec<Ipv4Addr> = local_ip_address::list_afinet_netifas()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(_, addr)| match addr {
                IpAddr::V4(ipv4) if !ipv4.is_loopback() && is_private_lan(ipv4) => Some(ipv4),
                _ => None,
            })
            .collect();

        let mut candidates: Vec<Ipv4Addr> = local_ips
            .iter()
            .flat_map(|ip| candidates_for_subnet(*ip))
            .collect();
        candidates.dedup();

        let success = self.success_hosts.lock().clone();
        candidates.sort_by_key(|ip| success.iter().position(|s| s == ip).unwrap_or(usize::MAX));
        candidates
    }

    /// Runs the probe, honoring the 6s cache, and returns merged entries.
    pub async fn probe(&self) -> Vec<DiscoveryEntry> {
        let now = now_millis();
        if let Some((stamped_at, entries)) = self.cache.lock().clone() {
            if now.saturating_sub(stamped_at) < PROBE_CACHE_TTL_SECS * 1000 {
                return entries;
            }
        }

        let candidates = self.ordered_candidates();
        let results: Vec<(Ipv4Addr, DiscoveryEntry)> = stream::iter(candidates)
            .map(|ip| self.probe_host(ip))
            .buffer_unordered(PROBE_CONCURRENCY)
            .filter_map(|r| async move { r })
            .collect()
            .await;

        *self.success_hosts.lock() = results.iter().map(|(ip, _)| *ip).collect();
        let entries: Vec<DiscoveryEntry> = results.into_iter().map(|(_, entry)| entry).collect();
        *self.cache.lock() = Some((now, entries.clone()));
        entries
    }

    async fn probe_host(&self, ip: Ipv4Addr) -> Option<(Ipv4Addr, DiscoveryEntry)> {
        let url = format!("http://{}:{}/api/discovery", ip, self.relay_port);
        let response = self.client.get(&url).send().await.ok()?;
        let summary: ProbeSummary = response.json().await.ok()?;
        if summary.protocol_version != DISCOVERY_PROTOCOL_VERSION
            || summary.instance_id == self.self_instance_id
        {
            return None;
        }
        let room = summary.rooms.into_iter().next()?;
        Some((
            ip,
            DiscoveryEntry {
                instance_id: summary.instance_id,
                server_url: format!("http://{}:{}", ip, room.port),
                room,
                last_seen_at: now_millis(),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_private_ranges() {
        assert!(is_private_lan(Ipv4Addr::new(10, 0, 0, 1)));
        assert!(is_private_lan(Ipv4Addr::new(172, 16, 0, 1)));
        assert!(!is_private_lan(Ipv4Addr::new(172, 32, 0, 1)));
        assert!(is_private_lan(Ipv4Addr::new(192, 168, 1, 1)));
        assert!(is_private_lan(Ipv4Addr::new(100, 64, 0, 1)));
        assert!(!is_private_lan(Ipv4Addr::new(100, 128, 0, 1)));
        assert!(is_private_lan(Ipv4Addr::new(169, 254, 1, 1)));
        assert!(is_private_lan(Ipv4Addr::new(198, 18, 0, 1)));
        assert!(!is_private_lan(Ipv4Addr::new(8, 8, 8, 8)));
    }

    #[test]
    fn candidates_exclude_self_and_cover_24() {
        let candidates = candidates_for_subnet(Ipv4Addr::new(192, 168, 1, 42));
        assert_eq!(candidates.len(), 253);
        assert!(!candidates.contains(&Ipv4Addr::new(192, 168, 1, 42)));
        assert!(candidates.contains(&Ipv4Addr::new(192, 168, 1, 1)));
        assert!(candidates.contains(&Ipv4Addr::new(192, 168, 1, 254)));
    }
}
