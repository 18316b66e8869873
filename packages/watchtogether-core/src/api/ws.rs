//! WebSocket handler for real-time client communication.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

use crate::api::AppState;
use crate::protocol_constants::{WS_HEARTBEAT_CHECK_INTERVAL_SECS, WS_HEARTBEAT_TIMEOUT_SECS};
use crate::services::room::{
    IncomingMediaSelection, PlaybackEnvelope, RoomBroadcast, RoomHandle, RoomSnapshot, SyncMode,
};

// ─────────────────────────────────────────────────────────────────────────────
// Wire message types
// ─────────────────────────────────────────────────────────────────────────────

/// Incoming WebSocket message envelope, tagged by `type`.
#[derive(Deserialize)]
#[serde(tag = "type")]
enum WsIncoming {
    #[serde(rename = "room:join")]
    Join {
        #[serde(rename = "roomId")]
        room_id: String,
        nickname: String,
        #[serde(default)]
        password: Option<String>,
        #[serde(default, rename = "roomName")]
        room_name: Option<String>,
    },
    #[serde(rename = "room:leave")]
    Leave {
        #[serde(rename = "roomId")]
        room_id: String,
    },
    #[serde(rename = "room:select-media")]
    SelectMedia {
        #[serde(rename = "roomId")]
        room_id: String,
        media: WireMediaDescriptor,
    },
    #[serde(rename = "playback:control")]
    PlaybackControl {
        #[serde(rename = "roomId")]
        room_id: String,
        position: f64,
        paused: bool,
        rate: f64,
    },
    #[serde(rename = "client:buffering")]
    ClientBuffering {
        #[serde(rename = "roomId")]
        room_id: String,
        buffering: bool,
        #[serde(rename = "bufferAheadSeconds")]
        buffer_ahead_seconds: f64,
        #[serde(rename = "readyState")]
        ready_state: u8,
        #[serde(rename = "canPlayThrough")]
        can_play_through: bool,
        /// Client-reported readiness; the gate controller computes its own
        /// verdict from the fields above, so this is accepted but unused.
        #[serde(default, rename = "startupReady")]
        _startup_ready: Option<bool>,
    },
    #[serde(rename = "playback:request-state")]
    PlaybackRequestState {
        #[serde(rename = "roomId")]
        room_id: String,
    },
    #[serde(rename = "room:request-snapshot")]
    RequestSnapshot {
        #[serde(rename = "roomId")]
        room_id: String,
    },
    #[serde(rename = "room:config")]
    Config {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "syncMode")]
        sync_mode: SyncMode,
    },
}

/// A client-submitted media fingerprint for matching against room media.
///
/// `path` is never populated over the wire — only the HTTP upload handler,
/// which has the file on disk, can install a room's authoritative media.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMediaDescriptor {
    name: String,
    size: u64,
    #[serde(rename = "mimeType")]
    mime_type: String,
    #[serde(default)]
    duration: Option<f64>,
    sha256: String,
}

/// Outgoing WebSocket message envelope, tagged by `type`.
#[derive(Serialize)]
#[serde(tag = "type")]
enum WsOutgoing {
    #[serde(rename = "room:join")]
    RoomJoin {
        ok: bool,
        error: Option<String>,
        snapshot: Option<RoomSnapshot>,
    },
    #[serde(rename = "room:leave")]
    RoomLeave { ok: bool },
    #[serde(rename = "room:snapshot")]
    RoomSnapshot {
        #[serde(flatten)]
        snapshot: RoomSnapshot,
    },
    #[serde(rename = "playback:state")]
    PlaybackState {
        #[serde(flatten)]
        envelope: PlaybackEnvelope,
    },
    #[serde(rename = "room:error")]
    RoomError { message: String },
    #[serde(rename = "room:closed")]
    RoomClosed { reason: Option<String> },
}

impl WsOutgoing {
    fn to_message(&self) -> Option<Message> {
        serde_json::to_string(self)
            .ok()
            .map(|s| Message::Text(s.into()))
    }
}

fn room_event_to_outgoing(event: RoomBroadcast) -> WsOutgoing {
    match event {
        RoomBroadcast::Snapshot(snapshot) => WsOutgoing::RoomSnapshot { snapshot },
        RoomBroadcast::Playback(envelope) => WsOutgoing::PlaybackState { envelope },
        RoomBroadcast::Error(message) => WsOutgoing::RoomError { message },
        RoomBroadcast::Closed(reason) => WsOutgoing::RoomClosed { reason },
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection-scoped room membership
// ─────────────────────────────────────────────────────────────────────────────

/// Tracks which room (if any) this connection currently belongs to.
struct JoinedRoom {
    handle: RoomHandle,
    broadcast_rx: broadcast::Receiver<RoomBroadcast>,
}

/// Awaits the next broadcast for the currently-joined room, or never
/// resolves if the connection hasn't joined a room yet.
async fn recv_room_broadcast(joined: &mut Option<JoinedRoom>) -> Option<RoomBroadcast> {
    match joined {
        Some(room) => room.broadcast_rx.recv().await.ok(),
        None => std::future::pending().await,
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Main WebSocket connection handler.
async fn handle_ws(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let conn_guard = state.ws_manager.register();
    let conn_id = conn_guard.id().to_string();
    let cancel_token = conn_guard.cancel_token().clone();

    log::info!("[WS] New connection established: {}", conn_id);

    let mut joined: Option<JoinedRoom> = None;
    let mut last_activity = Instant::now();

    let mut heartbeat_interval =
        tokio::time::interval(Duration::from_secs(WS_HEARTBEAT_CHECK_INTERVAL_SECS));
    heartbeat_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log::info!("[WS] Connection force-closed: {}", conn_id);
                break;
            }
            msg = receiver.next() => {
                last_activity = Instant::now();
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_incoming(&state, &conn_id, &text, &mut sender, &mut joined).await;
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
            Some(event) = recv_room_broadcast(&mut joined) => {
                if let Some(msg) = room_event_to_outgoing(event).to_message() {
                    if sender.send(msg).await.is_err() {
                        break;
                    }
                }
            }
            _ = heartbeat_interval.tick() => {
                if last_activity.elapsed() > Duration::from_secs(WS_HEARTBEAT_TIMEOUT_SECS) {
                    log::warn!("[WS] Heartbeat timeout: {}", conn_id);
                    break;
                }
            }
        }
    }

    if let Some(room) = joined {
        room.handle.disconnect(conn_id).await;
    }

    // ConnectionGuard's Drop impl unregisters the connection.
}

/// Parses and dispatches one incoming text frame.
async fn handle_incoming(
    state: &AppState,
    conn_id: &str,
    text: &str,
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    joined: &mut Option<JoinedRoom>,
) {
    let parsed = match serde_json::from_str::<WsIncoming>(text) {
        Ok(msg) => msg,
        Err(_) => return,
    };

    match parsed {
        WsIncoming::Join {
            room_id,
            nickname,
            password,
            room_name,
        } => {
            // A connection only ever belongs to one room; switching rooms
            // leaves the previous one first.
            if let Some(previous) = joined.take() {
                previous.handle.disconnect(conn_id.to_string()).await;
            }

            let handle = state.room_registry.get_or_create(
                &room_id,
                room_name.unwrap_or_else(|| room_id.clone()),
                password.clone(),
                None,
            );
            let result = handle.join(conn_id.to_string(), nickname, password).await;

            let ack = WsOutgoing::RoomJoin {
                ok: result.ok,
                error: result.error,
                snapshot: result.snapshot,
            };
            if let Some(msg) = ack.to_message() {
                let _ = sender.send(msg).await;
            }

            if result.ok {
                *joined = Some(JoinedRoom {
                    broadcast_rx: handle.subscribe(),
                    handle,
                });
            }
        }
        WsIncoming::Leave { room_id } => {
            if let Some(room) = with_matching_room(joined, &room_id) {
                room.handle.leave(conn_id.to_string()).await;
            }
            *joined = None;
            let ack = WsOutgoing::RoomLeave { ok: true };
            if let Some(msg) = ack.to_message() {
                let _ = sender.send(msg).await;
            }
        }
        WsIncoming::SelectMedia { room_id, media } => {
            if let Some(room) = with_matching_room(joined, &room_id) {
                room.handle
                    .select_media(
                        conn_id.to_string(),
                        IncomingMediaSelection {
                            name: media.name,
                            size: media.size,
                            mime_type: media.mime_type,
                            duration: media.duration,
                            sha256: media.sha256,
                            path: None,
                        },
                    )
                    .await;
            }
        }
        WsIncoming::PlaybackControl {
            room_id,
            position,
            paused,
            rate,
        } => {
            if let Some(room) = with_matching_room(joined, &room_id) {
                room.handle
                    .playback_control(conn_id.to_string(), position, paused, rate)
                    .await;
            }
        }
        WsIncoming::ClientBuffering {
            room_id,
            buffering,
            buffer_ahead_seconds,
            ready_state,
            can_play_through,
            _startup_ready: _,
        } => {
            if let Some(room) = with_matching_room(joined, &room_id) {
                room.handle
                    .report_buffering(
                        conn_id.to_string(),
                        buffering,
                        buffer_ahead_seconds,
                        ready_state,
                        can_play_through,
                    )
                    .await;
            }
        }
        WsIncoming::PlaybackRequestState { room_id } => {
            if let Some(room) = with_matching_room(joined, &room_id) {
                if let Some(envelope) = room.handle.request_playback().await {
                    let outgoing = WsOutgoing::PlaybackState { envelope };
                    if let Some(msg) = outgoing.to_message() {
                        let _ = sender.send(msg).await;
                    }
                }
            }
        }
        WsIncoming::RequestSnapshot { room_id } => {
            if let Some(room) = with_matching_room(joined, &room_id) {
                if let Some(snapshot) = room.handle.request_snapshot().await {
                    let outgoing = WsOutgoing::RoomSnapshot { snapshot };
                    if let Some(msg) = outgoing.to_message() {
                        let _ = sender.send(msg).await;
                    }
                }
            }
        }
        WsIncoming::Config { room_id, sync_mode } => {
            if let Some(room) = with_matching_room(joined, &room_id) {
                room.handle.set_sync_mode(conn_id.to_string(), sync_mode).await;
            }
        }
    }
}

/// Returns the joined room, but only if its id matches `room_id` — guards
/// against a stale/mismatched room id on a connection that already left.
fn with_matching_room<'a>(
    joined: &'a mut Option<JoinedRoom>,
    room_id: &str,
) -> Option<&'a mut JoinedRoom> {
    match joined {
        Some(room) if room.handle.room_id().eq_ignore_ascii_case(room_id) => Some(room),
        _ => None,
    }
}
