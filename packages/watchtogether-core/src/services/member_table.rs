//! Member table: an insertion-ordered record of a room's connected peers.
//!
//! Modeled as a plain `Vec`, not a concurrent map — the table is only ever
//! touched from inside a single room's command loop, and insertion order is
//! load-bearing (host reassignment picks the oldest remaining member).

use serde::Serialize;

use crate::protocol_constants::NICKNAME_MAX_LEN;
use crate::utils::{now_millis, sanitize_nickname};

/// A selected-media match outcome for a non-host member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaMatch {
    /// The member has not selected/reported any media.
    Missing,
    /// The member's fingerprint matches the room's media.
    Matched,
    /// The member reported a fingerprint that does not match the room's media.
    Mismatch,
}

/// A connected room participant.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub conn_id: String,
    pub nickname: String,
    pub is_host: bool,
    pub media_match: MediaMatch,
    #[serde(skip)]
    pub selected_media_sha256: Option<String>,
    pub buffering: bool,
    pub startup_ready: bool,
    pub buffer_ahead_seconds: f64,
    pub ready_state: u8,
    pub can_play_through: bool,
    #[serde(skip)]
    pub buffering_started_at: Option<u64>,
    pub connected_at: u64,
}

impl Member {
    fn new(conn_id: String, nickname: String, is_host: bool) -> Self {
        let now = now_millis();
        Self {
            conn_id,
            nickname,
            is_host,
            media_match: MediaMatch::Missing,
            selected_media_sha256: None,
            buffering: false,
            startup_ready: false,
            buffer_ahead_seconds: 0.0,
            ready_state: 0,
            can_play_through: false,
            buffering_started_at: None,
            connected_at: now,
        }
    }
}

/// Insertion-ordered table of room members, keyed by connection id.
#[derive(Debug, Default)]
pub struct MemberTable {
    members: Vec<Member>,
}

impl MemberTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, conn_id: &str) -> bool {
        self.members.iter().any(|m| m.conn_id == conn_id)
    }

    pub fn get(&self, conn_id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.conn_id == conn_id)
    }

    pub fn get_mut(&mut self, conn_id: &str) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.conn_id == conn_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Member> {
        self.members.iter_mut()
    }

    pub fn host_conn_id(&self) -> Option<&str> {
        self.members
            .iter()
            .find(|m| m.is_host)
            .map(|m| m.conn_id.as_str())
    }

    /// Inserts a new member, trimming/truncating the nickname. `is_host` is
    /// true iff the table was empty before this join.
    pub fn join(&mut self, conn_id: String, nickname: &str) -> &Member {
        let is_host = self.members.is_empty();
        let nickname = sanitize_nickname(nickname, NICKNAME_MAX_LEN);
        self.members.push(Member::new(conn_id.clone(), nickname, is_host));
        self.get(&conn_id).expect("just inserted")
    }

    /// Removes a member. If it held the host role, reassigns host to the
    /// oldest remaining member (index 0 after removal, by insertion order).
    /// Returns the newly assigned host's conn_id, if any.
    pub fn remove(&mut self, conn_id: &str) -> Option<String> {
        let was_host = self.get(conn_id).map(|m| m.is_host).unwrap_or(false);
        self.members.retain(|m| m.conn_id != conn_id);

        if was_host {
            if let Some(new_host) = self.members.first_mut() {
                new_host.is_host = true;
                return Some(new_host.conn_id.clone());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_joiner_becomes_host() {
        let mut table = MemberTable::new();
        table.join("a".into(), "Alice");
        assert!(table.get("a").unwrap().is_host);
    }

    #[test]
    fn second_joiner_is_not_host() {
        let mut table = MemberTable::new();
        table.join("a".into(), "Alice");
        table.join("b".into(), "Bob");
        assert!(!table.get("b").unwrap().is_host);
    }

    #[test]
    fn host_disconnect_reassigns_to_oldest_remaining() {
        let mut table = MemberTable::new();
        table.join("a".into(), "Alice");
        table.join("b".into(), "Bob");
        table.join("c".into(), "Carol");

        let new_host = table.remove("a");
        assert_eq!(new_host.as_deref(), Some("b"));
        assert!(table.get("b").unwrap().is_host);
        assert!(!table.get("c").unwrap().is_host);
    }

    #[test]
    fn non_host_disconnect_does_not_reassign() {
        let mut table = MemberTable::new();
        table.join("a".into(), "Alice");
        table.join("b".into(), "Bob");

        let new_host = table.remove("b");
        assert_eq!(new_host, None);
        assert!(table.get("a").unwrap().is_host);
    }

    #[test]
    fn empty_nickname_falls_back_to_viewer() {
        let mut table = MemberTable::new();
        table.join("a".into(), "   ");
        assert!(table.get("a").unwrap().nickname.starts_with("Viewer-"));
    }
}
