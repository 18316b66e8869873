//! Room Coordinator: the per-room actor that serializes all reads/writes.
//!
//! Each room runs as a dedicated task owning its state exclusively, driven by
//! an `mpsc` command queue with `oneshot` reply channels — this directly
//! implements the "Room state is owned by exactly one Room Coordinator and is
//! never shared" and "single serialized command queue per room" requirements.
//! The room never holds references to transport connections; it produces
//! [`RoomBroadcast`] values that the transport layer fans out to subscribers.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};
use uuid::Uuid;

use crate::protocol_constants::{PLAYBACK_HEARTBEAT_MS, SNAPSHOT_HEARTBEAT_MS};
use crate::services::gate;
use crate::services::media_registry::{
    MediaDescriptor, MediaFingerprint, MediaRegistry, SubtitleDescriptor, SubtitleFormat,
};
use crate::services::member_table::{MediaMatch, MemberTable};
use crate::services::playback::{mark_playback, PlaybackPatch, PlaybackReason, PlaybackState};
use crate::utils::{clamp_field, now_millis};

/// Sync mode: whether a single buffering member pauses the whole room immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Soft,
    Strict,
}

impl SyncMode {
    fn is_strict(self) -> bool {
        matches!(self, SyncMode::Strict)
    }
}

/// A candidate media descriptor submitted over the wire.
#[derive(Debug, Clone)]
pub struct IncomingMediaSelection {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub duration: Option<f64>,
    pub sha256: String,
    /// Path to the backing file, set only when the caller is host (the file
    /// has already been written to storage by the HTTP upload handler).
    pub path: Option<std::path::PathBuf>,
}

/// Materialized, read-only view of a room. Never stored; built on demand.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: String,
    pub room_name: String,
    pub has_password: bool,
    pub sync_mode: SyncMode,
    pub is_preparing: bool,
    pub max_members: usize,
    pub media: Option<MediaDescriptor>,
    pub subtitle: Option<SubtitleDescriptor>,
    pub playback: PlaybackState,
    pub members: Vec<crate::services::member_table::Member>,
    pub server_time: u64,
}

/// A playback state plus server time and the set of currently-buffering
/// members — the unit clients use to reconcile their local player.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackEnvelope {
    pub playback: PlaybackState,
    pub server_time: u64,
    pub buffering_conn_ids: Vec<String>,
}

/// A message the Room Coordinator asks the transport layer to fan out.
#[derive(Debug, Clone)]
pub enum RoomBroadcast {
    Snapshot(RoomSnapshot),
    Playback(PlaybackEnvelope),
    Error(String),
    Closed(Option<String>),
}

/// Result of a join attempt.
#[derive(Debug, Clone)]
pub struct JoinResult {
    pub ok: bool,
    pub error: Option<String>,
    pub snapshot: Option<RoomSnapshot>,
}

/// Point-in-time status used by the registry's idle-eviction sweep.
#[derive(Debug, Clone, Copy)]
pub struct RoomStatus {
    pub member_count: usize,
    pub last_active_at: u64,
}

enum RoomCommand {
    Join {
        conn_id: String,
        nickname: String,
        password: Option<String>,
        reply: oneshot::Sender<JoinResult>,
    },
    SelectMedia {
        conn_id: String,
        selection: IncomingMediaSelection,
    },
    SelectSubtitle {
        conn_id: String,
        name: String,
        format: SubtitleFormat,
        language: Option<String>,
        path: std::path::PathBuf,
    },
    PlaybackControl {
        conn_id: String,
        position: f64,
        paused: bool,
        rate: f64,
    },
    ReportBuffering {
        conn_id: String,
        buffering: bool,
        buffer_ahead_seconds: f64,
        ready_state: u8,
        can_play_through: bool,
    },
    SetSyncMode {
        conn_id: String,
        mode: SyncMode,
    },
    Leave {
        conn_id: String,
        reply: oneshot::Sender<()>,
    },
    Disconnect {
        conn_id: String,
    },
    RequestSnapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },
    RequestPlayback {
        reply: oneshot::Sender<PlaybackEnvelope>,
    },
    Status {
        reply: oneshot::Sender<RoomStatus>,
    },
    IsHost {
        conn_id: String,
        reply: oneshot::Sender<bool>,
    },
    MediaFile {
        reply: oneshot::Sender<Option<(Uuid, PathBuf, String)>>,
    },
    SubtitleFile {
        reply: oneshot::Sender<Option<(Uuid, PathBuf, SubtitleFormat)>>,
    },
    Shutdown,
}

/// A cheaply-cloneable handle to a running room actor.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: String,
    tx: mpsc::Sender<RoomCommand>,
    broadcast_tx: broadcast::Sender<RoomBroadcast>,
}

impl RoomHandle {
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Subscribes to this room's broadcast fan-out. A connection calls this
    /// once it has joined and wants `room:snapshot`/`playback:state` pushes.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomBroadcast> {
        self.broadcast_tx.subscribe()
    }

    pub async fn join(
        &self,
        conn_id: String,
        nickname: String,
        password: Option<String>,
    ) -> JoinResult {
        let (reply, rx) = oneshot::channel();
        let _ = self
            .tx
            .send(RoomCommand::Join {
                conn_id,
                nickname,
                password,
                reply,
            })
            .await;
        rx.await.unwrap_or(JoinResult {
            ok: false,
            error: Some("room closed".to_string()),
            snapshot: None,
        })
    }

    pub async fn select_media(&self, conn_id: String, selection: IncomingMediaSelection) {
        let _ = self
            .tx
            .send(RoomCommand::SelectMedia { conn_id, selection })
            .await;
    }

    pub async fn select_subtitle(
        &self,
        conn_id: String,
        name: String,
        format: SubtitleFormat,
        language: Option<String>,
        path: std::path::PathBuf,
    ) {
        let _ = self
            .tx
            .send(RoomCommand::SelectSubtitle {
                conn_id,
                name,
                format,
                language,
                path,
            })
            .await;
    }

    pub async fn playback_control(&self, conn_id: String, position: f64, paused: bool, rate: f64) {
        let _ = self
            .tx
            .send(RoomCommand::PlaybackControl {
                conn_id,
                position,
                paused,
                rate,
            })
            .await;
    }

    pub async fn report_buffering(
        &self,
        conn_id: String,
        buffering: bool,
        buffer_ahead_seconds: f64,
        ready_state: u8,
        can_play_through: bool,
    ) {
        let _ = self
            .tx
            .send(RoomCommand::ReportBuffering {
                conn_id,
                buffering,
                buffer_ahead_seconds,
                ready_state,
                can_play_through,
            })
            .await;
    }

    pub async fn set_sync_mode(&self, conn_id: String, mode: SyncMode) {
        let _ = self
            .tx
            .send(RoomCommand::SetSyncMode { conn_id, mode })
            .await;
    }

    /// Acknowledges within the leave deadline; an unacknowledged leave must
    /// be treated by the caller as success (the disconnect path is the
    /// fallback cleanup).
    pub async fn leave(&self, conn_id: String) {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(RoomCommand::Leave { conn_id, reply }).await;
        let _ = tokio::time::timeout(
            Duration::from_millis(crate::protocol_constants::LEAVE_ACK_DEADLINE_MS),
            rx,
        )
        .await;
    }

    pub async fn disconnect(&self, conn_id: String) {
        let _ = self.tx.send(RoomCommand::Disconnect { conn_id }).await;
    }

    /// Returns the latest snapshot to the caller only — never broadcast.
    pub async fn request_snapshot(&self) -> Option<RoomSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RoomCommand::RequestSnapshot { reply })
            .await
            .ok()?;
        rx.await.ok()
    }

    /// Returns the latest playback envelope to the caller only — never broadcast.
    pub async fn request_playback(&self) -> Option<PlaybackEnvelope> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RoomCommand::RequestPlayback { reply })
            .await
            .ok()?;
        rx.await.ok()
    }

    pub async fn status(&self) -> Option<RoomStatus> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(RoomCommand::Status { reply }).await.ok()?;
        rx.await.ok()
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(RoomCommand::Shutdown).await;
    }

    /// Whether `conn_id` currently holds the host role. Used by the HTTP
    /// upload handlers, which authorize solely off the `x-socket-id` header.
    pub async fn is_host(&self, conn_id: String) -> bool {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(RoomCommand::IsHost { conn_id, reply }).await.is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// The room's current media file, if any: `(id, path, mime_type)`.
    pub async fn media_file(&self) -> Option<(Uuid, PathBuf, String)> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(RoomCommand::MediaFile { reply }).await.ok()?;
        rx.await.ok().flatten()
    }

    /// The room's current subtitle file, if any: `(id, path, format)`.
    pub async fn subtitle_file(&self) -> Option<(Uuid, PathBuf, SubtitleFormat)> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RoomCommand::SubtitleFile { reply })
            .await
            .ok()?;
        rx.await.ok().flatten()
    }
}

/// The room actor's owned state.
struct Room {
    room_id: String,
    room_name: String,
    password: Option<String>,
    sync_mode: SyncMode,
    max_members: usize,
    startup_gate_active: bool,
    pending_start_requested: bool,
    startup_buffer_target_seconds: f64,
    resume_buffer_target_seconds: f64,
    resume_after_buffer: bool,
    last_active_at: u64,
    members: MemberTable,
    media_registry: MediaRegistry,
    playback: PlaybackState,
    broadcast_tx: broadcast::Sender<RoomBroadcast>,
}

/// Spawns a room actor and returns a handle to it.
pub fn spawn_room(
    room_id: String,
    room_name: String,
    password: Option<String>,
    max_members: usize,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(64);
    let (broadcast_tx, _) = broadcast::channel(crate::protocol_constants::EVENT_CHANNEL_CAPACITY);

    let room = Room {
        room_id: room_id.clone(),
        room_name: clamp_field(&room_name, crate::protocol_constants::ROOM_NAME_MAX_LEN),
        password: password
            .map(|p| clamp_field(&p, crate::protocol_constants::PASSWORD_MAX_LEN))
            .filter(|p| !p.is_empty()),
        sync_mode: SyncMode::Soft,
        max_members,
        startup_gate_active: false,
        pending_start_requested: false,
        startup_buffer_target_seconds: gate::startup_target(None),
        resume_buffer_target_seconds: gate::resume_target(None),
        resume_after_buffer: false,
        last_active_at: now_millis(),
        members: MemberTable::new(),
        media_registry: MediaRegistry::new(),
        playback: PlaybackState::initial("system"),
        broadcast_tx: broadcast_tx.clone(),
    };

    tokio::spawn(room.run(rx));

    RoomHandle {
        room_id,
        tx,
        broadcast_tx,
    }
}

impl Room {
    async fn run(mut self, mut rx: mpsc::Receiver<RoomCommand>) {
        let mut playback_heartbeat =
            tokio::time::interval(Duration::from_millis(PLAYBACK_HEARTBEAT_MS));
        let mut snapshot_heartbeat =
            tokio::time::interval(Duration::from_millis(SNAPSHOT_HEARTBEAT_MS));

        loop {
            tokio::select! {
                cmd = rx.recv() => {
                    match cmd {
                        Some(RoomCommand::Shutdown) | None => break,
                        Some(cmd) => self.handle(cmd),
                    }
                }
                _ = playback_heartbeat.tick() => {
                    if self.media_registry.media().is_some() && !self.members.is_empty() {
                        self.broadcast_playback();
                    }
                }
                _ = snapshot_heartbeat.tick() => {
                    if !self.members.is_empty() {
                        self.broadcast_snapshot();
                    }
                }
            }
        }
        self.media_registry.clear();
    }

    fn handle(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                conn_id,
                nickname,
                password,
                reply,
            } => {
                let result = self.join(conn_id, &nickname, password);
                let _ = reply.send(result);
            }
            RoomCommand::SelectMedia { conn_id, selection } => self.select_media(&conn_id, selection),
            RoomCommand::SelectSubtitle {
                conn_id,
                name,
                format,
                language,
                path,
            } => self.select_subtitle(&conn_id, name, format, language, path),
            RoomCommand::PlaybackControl {
                conn_id,
                position,
                paused,
                rate,
            } => self.playback_control(&conn_id, position, paused, rate),
            RoomCommand::ReportBuffering {
                conn_id,
                buffering,
                buffer_ahead_seconds,
                ready_state,
                can_play_through,
            } => self.report_buffering(
                &conn_id,
                buffering,
                buffer_ahead_seconds,
                ready_state,
                can_play_through,
            ),
            RoomCommand::SetSyncMode { conn_id, mode } => self.set_sync_mode(&conn_id, mode),
            RoomCommand::Leave { conn_id, reply } => {
                self.remove_member(&conn_id);
                let _ = reply.send(());
            }
            RoomCommand::Disconnect { conn_id } => self.remove_member(&conn_id),
            RoomCommand::RequestSnapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            RoomCommand::RequestPlayback { reply } => {
                let _ = reply.send(self.envelope());
            }
            RoomCommand::Status { reply } => {
                let _ = reply.send(RoomStatus {
                    member_count: self.members.len(),
                    last_active_at: self.last_active_at,
                });
            }
            RoomCommand::IsHost { conn_id, reply } => {
                let is_host = self.members.get(&conn_id).map(|m| m.is_host).unwrap_or(false);
                let _ = reply.send(is_host);
            }
            RoomCommand::MediaFile { reply } => {
                let file = self.media_registry.media().zip(self.media_registry.media_path()).map(
                    |(descriptor, path)| (descriptor.id, path.to_path_buf(), descriptor.mime_type.clone()),
                );
                let _ = reply.send(file);
            }
            RoomCommand::SubtitleFile { reply } => {
                let file = self
                    .media_registry
                    .subtitle()
                    .zip(self.media_registry.subtitle_path())
                    .map(|(descriptor, path)| (descriptor.id, path.to_path_buf(), descriptor.format));
                let _ = reply.send(file);
            }
            RoomCommand::Shutdown => {}
        }
    }

    fn touch(&mut self) {
        self.last_active_at = now_millis();
    }

    fn current_position(&self) -> f64 {
        self.playback.derive_position(now_millis())
    }

    fn join(&mut self, conn_id: String, nickname: &str, password: Option<String>) -> JoinResult {
        if let Some(expected) = &self.password {
            let provided = password
                .map(|p| clamp_field(&p, crate::protocol_constants::PASSWORD_MAX_LEN))
                .unwrap_or_default();
            if !self.members.contains(&conn_id) && &provided != expected {
                return JoinResult {
                    ok: false,
                    error: Some("password_mismatch".to_string()),
                    snapshot: None,
                };
            }
        }
        if !self.members.contains(&conn_id) && self.members.len() >= self.max_members {
            return JoinResult {
                ok: false,
                error: Some("room_full".to_string()),
                snapshot: None,
            };
        }

        let had_media = self.media_registry.media().is_some();
        let was_non_empty = !self.members.is_empty();
        self.members.join(conn_id, nickname);
        self.touch();

        if was_non_empty && had_media {
            self.arm_startup_gate();
        }

        let snapshot = self.snapshot();
        self.broadcast_tx
            .send(RoomBroadcast::Snapshot(snapshot.clone()))
            .ok();

        JoinResult {
            ok: true,
            error: None,
            snapshot: Some(snapshot),
        }
    }

    fn select_media(&mut self, conn_id: &str, selection: IncomingMediaSelection) {
        let is_host = self.members.get(conn_id).map(|m| m.is_host).unwrap_or(false);

        if is_host {
            let Some(path) = selection.path else {
                return;
            };
            let descriptor = self.media_registry.replace_media(
                selection.name,
                selection.size,
                selection.mime_type,
                selection.duration,
                selection.sha256,
                path,
            );

            for member in self.members.iter_mut() {
                member.buffering = false;
                member.startup_ready = false;
                member.buffer_ahead_seconds = 0.0;
                member.ready_state = 0;
                member.can_play_through = false;
                member.buffering_started_at = None;
                member.media_match = if member.is_host {
                    MediaMatch::Matched
                } else {
                    MediaMatch::Missing
                };
            }

            self.playback = PlaybackState::initial(conn_id.to_string());
            self.startup_buffer_target_seconds = gate::startup_target(descriptor.duration);
            self.resume_buffer_target_seconds = gate::resume_target(descriptor.duration);
            self.resume_after_buffer = false;
            self.arm_startup_gate();
            self.touch();
            self.broadcast_snapshot();
        } else {
            let fingerprint = MediaFingerprint {
                sha256: selection.sha256,
                size: selection.size,
                duration: selection.duration,
            };
            let matches = self.media_registry.matches(&fingerprint);
            if let Some(member) = self.members.get_mut(conn_id) {
                member.media_match = if matches {
                    MediaMatch::Matched
                } else {
                    MediaMatch::Mismatch
                };
                if !matches {
                    self.broadcast_tx
                        .send(RoomBroadcast::Error("media_mismatch".to_string()))
                        .ok();
                }
            }
            self.step_gates();
        }
    }

    fn select_subtitle(
        &mut self,
        conn_id: &str,
        name: String,
        format: SubtitleFormat,
        language: Option<String>,
        path: std::path::PathBuf,
    ) {
        let is_host = self.members.get(conn_id).map(|m| m.is_host).unwrap_or(false);
        if !is_host {
            return;
        }
        self.media_registry.replace_subtitle(name, format, language, path);
        self.touch();
        self.broadcast_snapshot();
    }

    fn arm_startup_gate(&mut self) {
        self.startup_gate_active = true;
        self.pending_start_requested = false;
    }

    fn playback_control(&mut self, conn_id: &str, position: f64, paused: bool, rate: f64) {
        if self.media_registry.media().is_none() || !self.members.contains(conn_id) {
            return;
        }

        let duration = self.media_registry.media().and_then(|m| m.duration);
        let wants_unpause = !paused;

        if wants_unpause && self.startup_gate_active {
            let ready = gate::all_startup_ready(
                &self.members,
                self.startup_buffer_target_seconds,
                duration,
                self.current_position(),
            );
            if !ready {
                self.pending_start_requested = true;
                let mut envelope = self.envelope();
                envelope.playback.paused = true;
                envelope.playback.reason = PlaybackReason::StartupGate;
                self.broadcast_tx
                    .send(RoomBroadcast::Playback(envelope))
                    .ok();
                return;
            }
        }

        if wants_unpause && self.sync_mode.is_strict() {
            let anyone_buffering = self.members.iter().any(|m| m.buffering);
            if anyone_buffering {
                return;
            }
        }

        mark_playback(
            &mut self.playback,
            PlaybackPatch {
                position,
                paused,
                rate,
            },
            conn_id.to_string(),
            PlaybackReason::User,
        );
        self.touch();
        self.broadcast_playback();
        self.step_gates();
    }

    fn report_buffering(
        &mut self,
        conn_id: &str,
        buffering: bool,
        buffer_ahead_seconds: f64,
        ready_state: u8,
        can_play_through: bool,
    ) {
        let now = now_millis();
        let Some(member) = self.members.get_mut(conn_id) else {
            return;
        };
        let rising_edge = buffering && !member.buffering;
        let falling_edge = !buffering && member.buffering;
        member.buffering = buffering;
        member.buffer_ahead_seconds = buffer_ahead_seconds;
        member.ready_state = ready_state;
        member.can_play_through = can_play_through;
        if rising_edge {
            member.buffering_started_at = Some(now);
        } else if falling_edge {
            member.buffering_started_at = None;
        }
        self.touch();
        self.step_gates();
    }

    fn set_sync_mode(&mut self, conn_id: &str, mode: SyncMode) {
        let is_host = self.members.get(conn_id).map(|m| m.is_host).unwrap_or(false);
        if !is_host {
            return;
        }
        self.sync_mode = mode;
        if matches!(mode, SyncMode::Soft) {
            self.resume_after_buffer = false;
        }
        self.touch();
        self.step_gates();
        self.broadcast_snapshot();
    }

    /// Runs both gates once and applies any resulting transition. Called
    /// after any mutation that could change readiness.
    fn step_gates(&mut self) {
        let duration = self.media_registry.media().and_then(|m| m.duration);
        let position = self.current_position();
        let now = now_millis();

        if self.startup_gate_active
            && self.pending_start_requested
            && gate::all_startup_ready(
                &self.members,
                self.startup_buffer_target_seconds,
                duration,
                position,
            )
        {
            self.startup_gate_active = false;
            self.broadcast_snapshot();
            let rate = self.playback.rate;
            mark_playback(
                &mut self.playback,
                PlaybackPatch {
                    position,
                    paused: false,
                    rate,
                },
                "system".to_string(),
                PlaybackReason::StartupGate,
            );
            self.broadcast_playback();
            return;
        }

        let remaining = duration.map(|d| d - position).unwrap_or(f64::MAX);
        let grace = gate::soft_buffer_grace_ms(remaining);

        if gate::should_pause_for_buffering(&self.members, self.sync_mode.is_strict(), grace, now)
        {
            if !self.playback.paused {
                let rate = self.playback.rate;
                mark_playback(
                    &mut self.playback,
                    PlaybackPatch {
                        position,
                        paused: true,
                        rate,
                    },
                    "system".to_string(),
                    PlaybackReason::BufferLock,
                );
                self.resume_after_buffer = true;
                self.broadcast_playback();
            }
            return;
        }

        if self.resume_after_buffer {
            let nobody_buffering = self.members.iter().all(|m| !m.buffering);
            let everyone_resume_ready = self.members.iter().all(|m| {
                gate::is_member_resume_ready(m, self.resume_buffer_target_seconds, duration, position)
            });
            if nobody_buffering && everyone_resume_ready {
                self.resume_after_buffer = false;
                let rate = self.playback.rate;
                mark_playback(
                    &mut self.playback,
                    PlaybackPatch {
                        position,
                        paused: false,
                        rate,
                    },
                    "system".to_string(),
                    PlaybackReason::BufferLock,
                );
                self.broadcast_playback();
            }
        }
    }

    fn remove_member(&mut self, conn_id: &str) {
        self.members.remove(conn_id);
        self.touch();
        if !self.members.is_empty() {
            self.step_gates();
            self.broadcast_snapshot();
        }
    }

    fn snapshot(&self) -> RoomSnapshot {
        let mut members: Vec<_> = self.members.iter().cloned().collect();
        members.sort_by_key(|m| !m.is_host);

        RoomSnapshot {
            room_id: self.room_id.clone(),
            room_name: self.room_name.clone(),
            has_password: self.password.is_some(),
            sync_mode: self.sync_mode,
            is_preparing: self.startup_gate_active,
            max_members: self.max_members,
            media: self.media_registry.media().cloned(),
            subtitle: self.media_registry.subtitle().cloned(),
            playback: self.playback.clone(),
            members,
            server_time: now_millis(),
        }
    }

    fn envelope(&self) -> PlaybackEnvelope {
        PlaybackEnvelope {
            playback: self.playback.clone(),
            server_time: now_millis(),
            buffering_conn_ids: self
                .members
                .iter()
                .filter(|m| m.buffering)
                .map(|m| m.conn_id.clone())
                .collect(),
        }
    }

    fn broadcast_snapshot(&self) {
        self.broadcast_tx
            .send(RoomBroadcast::Snapshot(self.snapshot()))
            .ok();
    }

    fn broadcast_playback(&self) {
        self.broadcast_tx
            .send(RoomBroadcast::Playback(self.envelope()))
            .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn join_creates_host_and_returns_snapshot() {
        let handle = spawn_room("ROOM1".into(), "Movie Night".into(), None, 6);
        let result = handle.join("a".into(), "Alice".into(), None).await;
        assert!(result.ok);
        let snapshot = result.snapshot.unwrap();
        assert_eq!(snapshot.members.len(), 1);
        assert!(snapshot.members[0].is_host);
    }

    #[tokio::test]
    async fn join_rejects_wrong_password() {
        let handle = spawn_room(
            "ROOM1".into(),
            "Movie Night".into(),
            Some("secret".into()),
            6,
        );
        handle.join("a".into(), "Alice".into(), Some("secret".into())).await;
        let result = handle.join("b".into(), "Bob".into(), Some("wrong".into())).await;
        assert!(!result.ok);
        assert_eq!(result.error.as_deref(), Some("password_mismatch"));
    }

    #[tokio::test]
    async fn join_rejects_when_room_full() {
        let handle = spawn_room("ROOM1".into(), "Movie Night".into(), None, 1);
        handle.join("a".into(), "Alice".into(), None).await;
        let result = handle.join("b".into(), "Bob".into(), None).await;
        assert!(!result.ok);
        assert_eq!(result.error.as_deref(), Some("room_full"));
    }

    #[tokio::test]
    async fn leave_reassigns_host() {
        let handle = spawn_room("ROOM1".into(), "Movie Night".into(), None, 6);
        handle.join("a".into(), "Alice".into(), None).await;
        handle.join("b".into(), "Bob".into(), None).await;
        handle.leave("a".into()).await;

        let status = handle.status().await.unwrap();
        assert_eq!(status.member_count, 1);
    }

    #[tokio::test]
    async fn non_host_select_media_does_not_replace_room_media() {
        let handle = spawn_room("ROOM1".into(), "Movie Night".into(), None, 6);
        handle.join("a".into(), "Alice".into(), None).await;
        handle.join("b".into(), "Bob".into(), None).await;

        handle
            .select_media(
                "b".into(),
                IncomingMediaSelection {
                    name: "movie.mp4".into(),
                    size: 10,
                    mime_type: "video/mp4".into(),
                    duration: Some(10.0),
                    sha256: "x".into(),
                    path: None,
                },
            )
            .await;

        let snapshot = handle.request_snapshot().await.unwrap();
        assert!(snapshot.media.is_none());
    }
}
