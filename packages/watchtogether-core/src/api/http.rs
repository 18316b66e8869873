//! REST surface: health/discovery probes and media/subtitle transfer.
//!
//! Upload handlers stream the multipart body straight to disk (grounded on
//! the teacher's pack's multipart-upload pattern) instead of buffering the
//! whole file, since media uploads can approach the 15 GiB cap. The
//! range-capable download handler follows a single-range parse/clamp/416
//! shape grounded on a byte-range resource server from the broader pack.

use std::path::{Path as FsPath, PathBuf};

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::api::AppState;
use crate::error::{WatchTogetherError, WatchTogetherResult};
use crate::protocol_constants::{MAX_MEDIA_UPLOAD_BYTES, MAX_SUBTITLE_UPLOAD_BYTES};
use crate::services::discovery::{DiscoveryEntry, ProbeSummary};
use crate::services::media_registry::SubtitleFormat;
use crate::services::room::RoomHandle;
use crate::utils::now_millis;

/// Builds the full HTTP + WebSocket router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/discovery", get(discovery))
        .route("/api/discovery/peers", get(discovery_peers))
        .route(
            "/api/rooms/{room_id}/media",
            axum::routing::post(upload_media).layer(DefaultBodyLimit::max(
                MAX_MEDIA_UPLOAD_BYTES as usize,
            )),
        )
        .route(
            "/api/rooms/{room_id}/subtitle",
            axum::routing::post(upload_subtitle).layer(DefaultBodyLimit::max(
                MAX_SUBTITLE_UPLOAD_BYTES as usize,
            )),
        )
        .route("/api/rooms/{room_id}/media/{media_id}", get(download_media))
        .route(
            "/api/rooms/{room_id}/subtitles/{subtitle_id}",
            get(download_subtitle),
        )
        .route("/ws", get(super::ws::ws_handler))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Health / discovery
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    ok: bool,
    room_count: usize,
    timestamp: u64,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        room_count: state.room_registry.room_count(),
        timestamp: now_millis(),
    })
}

async fn discovery(State(state): State<AppState>) -> impl IntoResponse {
    let summary = ProbeSummary {
        protocol_version: crate::protocol_constants::DISCOVERY_PROTOCOL_VERSION,
        instance_id: state.discovery_service.instance_id().to_string(),
        rooms: state.discovery_service.armed().into_iter().collect(),
    };
    let mut headers = HeaderMap::new();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    (headers, Json(summary))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DiscoveryPeersResponse {
    peers: Vec<DiscoveryEntry>,
}

/// Rooms hosted by other instances on the LAN: broadcast-discovered entries
/// merged with an on-demand HTTP subnet probe.
async fn discovery_peers(State(state): State<AppState>) -> impl IntoResponse {
    let peers = state.discovery_service.discover().await;
    let mut headers = HeaderMap::new();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    (headers, Json(DiscoveryPeersResponse { peers }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Resolves a room handle or responds 404.
async fn require_room(state: &AppState, room_id: &str) -> WatchTogetherResult<RoomHandle> {
    state
        .room_registry
        .get(room_id)
        .ok_or_else(|| WatchTogetherError::NotFound(format!("room {room_id} does not exist")))
}

/// Checks the `x-socket-id` header identifies the room's current host.
async fn require_host(headers: &HeaderMap, room: &RoomHandle) -> WatchTogetherResult<String> {
    let conn_id = headers
        .get("x-socket-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| WatchTogetherError::Permission("missing x-socket-id header".to_string()))?
        .to_string();
    if !room.is_host(conn_id.clone()).await {
        return Err(WatchTogetherError::Permission(
            "only the room host may upload media".to_string(),
        ));
    }
    Ok(conn_id)
}

/// Keeps only filesystem-safe characters from a client-submitted filename.
fn sanitize_basename(raw: &str) -> String {
    let stem = FsPath::new(raw)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("upload");
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

fn room_storage_dir(state: &AppState, room_id: &str) -> PathBuf {
    PathBuf::from(state.config.read().storage_dir.clone()).join(room_id)
}

/// Streams one multipart field to disk, rejecting once `max_bytes` is exceeded.
async fn stream_field_to_disk(
    mut field: axum::extract::multipart::Field<'_>,
    dest: &FsPath,
    max_bytes: u64,
) -> WatchTogetherResult<u64> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(dest).await?;
    let mut written: u64 = 0;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| WatchTogetherError::InputValidation(e.to_string()))?
    {
        written += chunk.len() as u64;
        if written > max_bytes {
            drop(file);
            let _ = tokio::fs::remove_file(dest).await;
            return Err(WatchTogetherError::Capacity(format!(
                "upload exceeds {max_bytes} byte limit"
            )));
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(written)
}

// ─────────────────────────────────────────────────────────────────────────────
// Media upload
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct MediaUploadFields {
    name: Option<String>,
    mime_type: Option<String>,
    duration: Option<f64>,
    sha256: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MediaUploadResponse {
    media: crate::services::media_registry::MediaDescriptor,
    optimized_for_network: bool,
    source_bitrate_mbps: Option<f64>,
}

async fn upload_media(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> WatchTogetherResult<Json<MediaUploadResponse>> {
    let room = require_room(&state, &room_id).await?;
    let conn_id = require_host(&headers, &room).await?;

    let mut fields = MediaUploadFields::default();
    let mut saved: Option<(PathBuf, String, u64)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| WatchTogetherError::InputValidation(e.to_string()))?
    {
        match field.name().unwrap_or_default() {
            "video" => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let basename = sanitize_basename(field.file_name().unwrap_or("video"));
                let dest = room_storage_dir(&state, &room_id)
                    .join(format!("{}-{}", now_millis(), basename));
                let size = stream_field_to_disk(field, &dest, MAX_MEDIA_UPLOAD_BYTES).await?;
                saved = Some((dest, content_type, size));
            }
            "name" => fields.name = Some(text_field(field).await?),
            "mimeType" => fields.mime_type = Some(text_field(field).await?),
            "duration" => {
                let raw = text_field(field).await?;
                fields.duration = raw.parse::<f64>().ok();
            }
            "sha256" => fields.sha256 = Some(text_field(field).await?),
            _ => {}
        }
    }

    let (path, detected_mime, size) =
        saved.ok_or_else(|| WatchTogetherError::InputValidation("no file provided".to_string()))?;
    let mime_type = fields.mime_type.unwrap_or(detected_mime);
    let sha256 = fields
        .sha256
        .ok_or_else(|| WatchTogetherError::InputValidation("missing sha256 field".to_string()))?;
    let name = fields
        .name
        .unwrap_or_else(|| path.file_name().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default());

    room.select_media(
        conn_id,
        crate::services::room::IncomingMediaSelection {
            name,
            size,
            mime_type,
            duration: fields.duration,
            sha256,
            path: Some(path),
        },
    )
    .await;

    // `select_media` is fire-and-forget; request a snapshot to read back the
    // descriptor the room actor just installed.
    let media = media_descriptor_for_room(&room)
        .await
        .ok_or_else(|| WatchTogetherError::Internal("media missing after upload".to_string()))?;

    let source_bitrate_mbps = media
        .duration
        .filter(|d| *d > 0.0)
        .map(|d| (media.size as f64 * 8.0) / d / 1_000_000.0);
    let max_bps = state.config.read().direct_stream_max_bps;
    let optimized_for_network = source_bitrate_mbps
        .map(|mbps| mbps * 1_000_000.0 <= max_bps as f64)
        .unwrap_or(true);

    Ok(Json(MediaUploadResponse {
        media,
        optimized_for_network,
        source_bitrate_mbps,
    }))
}

async fn text_field(field: axum::extract::multipart::Field<'_>) -> WatchTogetherResult<String> {
    field
        .text()
        .await
        .map_err(|e| WatchTogetherError::InputValidation(e.to_string()))
}

/// The room actor doesn't hand back a full `MediaDescriptor` from
/// `select_media`/`media_file`; request a snapshot instead, which carries it.
async fn media_descriptor_for_room(
    room: &RoomHandle,
) -> Option<crate::services::media_registry::MediaDescriptor> {
    room.request_snapshot().await?.media
}

// ─────────────────────────────────────────────────────────────────────────────
// Subtitle upload
// ─────────────────────────────────────────────────────────────────────────────

async fn upload_subtitle(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> WatchTogetherResult<Json<crate::services::media_registry::SubtitleDescriptor>> {
    let room = require_room(&state, &room_id).await?;
    let conn_id = require_host(&headers, &room).await?;

    let mut saved: Option<(PathBuf, String)> = None;
    let mut language: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| WatchTogetherError::InputValidation(e.to_string()))?
    {
        match field.name().unwrap_or_default() {
            "subtitle" => {
                let original_name = field.file_name().unwrap_or("subtitle.srt").to_string();
                let basename = sanitize_basename(&original_name);
                let ext = FsPath::new(&basename)
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("")
                    .to_ascii_lowercase();
                if !matches!(ext.as_str(), "srt" | "vtt" | "ass" | "ssa") {
                    return Err(WatchTogetherError::InputValidation(format!(
                        "unsupported subtitle format: {ext}"
                    )));
                }
                let tmp_dest = room_storage_dir(&state, &room_id)
                    .join(format!("{}-{}", now_millis(), basename));
                stream_field_to_disk(field, &tmp_dest, MAX_SUBTITLE_UPLOAD_BYTES).await?;
                saved = Some((tmp_dest, ext));
            }
            "language" => language = Some(text_field(field).await?),
            _ => {}
        }
    }

    let (tmp_dest, ext) =
        saved.ok_or_else(|| WatchTogetherError::InputValidation("no file provided".to_string()))?;

    let (final_path, format) = if ext == "srt" {
        let vtt_path = tmp_dest.with_extension("vtt");
        convert_srt_to_vtt(&tmp_dest, &vtt_path).await?;
        let _ = tokio::fs::remove_file(&tmp_dest).await;
        (vtt_path, SubtitleFormat::Vtt)
    } else if ext == "vtt" {
        (tmp_dest, SubtitleFormat::Vtt)
    } else {
        (tmp_dest, SubtitleFormat::Ass)
    };

    let name = final_path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "subtitle".to_string());

    room.select_subtitle(conn_id, name, format, language, final_path)
        .await;

    let descriptor = subtitle_descriptor_for_room(&room)
        .await
        .ok_or_else(|| WatchTogetherError::Internal("subtitle missing after upload".to_string()))?;

    Ok(Json(descriptor))
}

/// Minimal SRT→VTT conversion: prefix the `WEBVTT` header and swap the comma
/// decimal separator in timestamps for a period, which is the only syntactic
/// difference the two formats have for plain (non-styled) cue text.
///
/// A real `ffmpeg`-backed converter is a pluggable seam (`FFMPEG_PATH`); this
/// is the fallback used when no such binary is configured.
async fn convert_srt_to_vtt(src: &FsPath, dest: &FsPath) -> WatchTogetherResult<()> {
    let contents = tokio::fs::read_to_string(src).await?;
    let mut out = String::with_capacity(contents.len() + 16);
    out.push_str("WEBVTT\n\n");
    for line in contents.lines() {
        if is_srt_timing_line(line) {
            out.push_str(&line.replace(',', "."));
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    tokio::fs::write(dest, out).await?;
    Ok(())
}

fn is_srt_timing_line(line: &str) -> bool {
    line.contains("-->")
}

async fn subtitle_descriptor_for_room(
    room: &RoomHandle,
) -> Option<crate::services::media_registry::SubtitleDescriptor> {
    room.request_snapshot().await?.subtitle
}

// ─────────────────────────────────────────────────────────────────────────────
// Range-capable media/subtitle download
// ─────────────────────────────────────────────────────────────────────────────

enum RangeOutcome {
    Full,
    Partial(u64, u64),
    Unsatisfiable,
}

/// Parses a single-range `Range: bytes=...` header against a resource of
/// length `len`. Multi-range requests and malformed values are treated as
/// unsatisfiable; an empty `bytes=-` is treated as a full-body request.
fn parse_range(value: &str, len: u64) -> RangeOutcome {
    let Some(spec) = value.trim().strip_prefix("bytes=") else {
        return RangeOutcome::Full;
    };
    if spec.contains(',') {
        return RangeOutcome::Unsatisfiable;
    }
    let mut parts = spec.splitn(2, '-');
    let start_str = parts.next().unwrap_or("").trim();
    let end_str = parts.next().unwrap_or("").trim();

    if start_str.is_empty() && end_str.is_empty() {
        return RangeOutcome::Full;
    }
    if len == 0 {
        return RangeOutcome::Unsatisfiable;
    }

    if start_str.is_empty() {
        let Ok(suffix_len) = end_str.parse::<u64>() else {
            return RangeOutcome::Unsatisfiable;
        };
        if suffix_len == 0 {
            return RangeOutcome::Unsatisfiable;
        }
        let start = len.saturating_sub(suffix_len);
        return RangeOutcome::Partial(start, len - 1);
    }

    let Ok(start) = start_str.parse::<u64>() else {
        return RangeOutcome::Unsatisfiable;
    };
    if start >= len {
        return RangeOutcome::Unsatisfiable;
    }
    let end = if end_str.is_empty() {
        len - 1
    } else {
        match end_str.parse::<u64>() {
            Ok(e) => e.min(len - 1),
            Err(_) => return RangeOutcome::Unsatisfiable,
        }
    };
    if end < start {
        return RangeOutcome::Unsatisfiable;
    }
    RangeOutcome::Partial(start, end)
}

async fn serve_file_range(
    path: &FsPath,
    mime_type: &str,
    range_header: Option<&str>,
) -> WatchTogetherResult<Response> {
    let metadata = tokio::fs::metadata(path).await?;
    let len = metadata.len();

    let outcome = range_header.map(|v| parse_range(v, len)).unwrap_or(RangeOutcome::Full);

    let (status, start, end) = match outcome {
        RangeOutcome::Full => (StatusCode::OK, 0, len.saturating_sub(1)),
        RangeOutcome::Partial(s, e) => (StatusCode::PARTIAL_CONTENT, s, e),
        RangeOutcome::Unsatisfiable => {
            let mut headers = HeaderMap::new();
            headers.insert(
                header::CONTENT_RANGE,
                HeaderValue::from_str(&format!("bytes */{len}"))
                    .unwrap_or_else(|_| HeaderValue::from_static("bytes */0")),
            );
            return Ok((StatusCode::RANGE_NOT_SATISFIABLE, headers).into_response());
        }
    };

    let content_length = end.saturating_sub(start) + 1;
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(std::io::SeekFrom::Start(start)).await?;
    let limited = file.take(content_length);
    let stream = ReaderStream::new(limited);
    let body = axum::body::Body::from_stream(stream);

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime_type).unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&content_length.to_string()).unwrap(),
    );
    if status == StatusCode::PARTIAL_CONTENT {
        headers.insert(
            header::CONTENT_RANGE,
            HeaderValue::from_str(&format!("bytes {start}-{end}/{len}"))
                .unwrap_or_else(|_| HeaderValue::from_static("bytes */0")),
        );
    }

    Ok((status, headers, body).into_response())
}

async fn download_media(
    State(state): State<AppState>,
    Path((room_id, media_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> WatchTogetherResult<Response> {
    let room = require_room(&state, &room_id).await?;
    let (id, path, mime_type) = room
        .media_file()
        .await
        .ok_or_else(|| WatchTogetherError::NotFound("no media selected for this room".to_string()))?;
    let requested: Uuid = media_id
        .parse()
        .map_err(|_| WatchTogetherError::InputValidation("invalid media id".to_string()))?;
    if requested != id {
        return Err(WatchTogetherError::NotFound("media id does not match room's current media".to_string()));
    }
    let range_value = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    serve_file_range(&path, &mime_type, range_value).await
}

async fn download_subtitle(
    State(state): State<AppState>,
    Path((room_id, subtitle_id)): Path<(String, String)>,
) -> WatchTogetherResult<Response> {
    let room = require_room(&state, &room_id).await?;
    let (id, path, format) = room
        .subtitle_file()
        .await
        .ok_or_else(|| WatchTogetherError::NotFound("no subtitle selected for this room".to_string()))?;
    let requested: Uuid = subtitle_id
        .parse()
        .map_err(|_| WatchTogetherError::InputValidation("invalid subtitle id".to_string()))?;
    if requested != id {
        return Err(WatchTogetherError::NotFound(
            "subtitle id does not match room's current subtitle".to_string(),
        ));
    }
    let mime_type = match format {
        SubtitleFormat::Vtt => "text/vtt; charset=utf-8",
        SubtitleFormat::Ass => "text/x-ssa; charset=utf-8",
    };
    serve_file_range(&path, mime_type, None).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_header_absent_is_full_body() {
        assert!(matches!(parse_range("bytes=-", 10_000), RangeOutcome::Full));
    }

    #[test]
    fn range_header_parses_prefix() {
        match parse_range("bytes=0-499", 10_000) {
            RangeOutcome::Partial(start, end) => {
                assert_eq!(start, 0);
                assert_eq!(end, 499);
            }
            _ => panic!("expected partial range"),
        }
    }

    #[test]
    fn range_header_out_of_bounds_is_unsatisfiable() {
        assert!(matches!(
            parse_range("bytes=20000-", 10_000),
            RangeOutcome::Unsatisfiable
        ));
    }

    #[test]
    fn range_header_suffix_clamps_to_start() {
        match parse_range("bytes=-500", 1_000) {
            RangeOutcome::Partial(start, end) => {
                assert_eq!(start, 500);
                assert_eq!(end, 999);
            }
            _ => panic!("expected partial range"),
        }
    }

    #[test]
    fn sanitize_basename_strips_path_and_unsafe_chars() {
        assert_eq!(sanitize_basename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_basename("my movie (2024).mp4"), "my_movie__2024_.mp4");
    }

    #[test]
    fn srt_timing_line_detection() {
        assert!(is_srt_timing_line("00:00:01,000 --> 00:00:02,000"));
        assert!(!is_srt_timing_line("Hello there"));
    }
}
