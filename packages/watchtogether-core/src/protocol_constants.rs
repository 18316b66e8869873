//! Fixed protocol constants that should NOT be changed.
//!
//! These values are part of the wire protocol (room IDs, discovery
//! datagrams, gate timing formulas) and changing them would break
//! compatibility between server and client builds.

// ─────────────────────────────────────────────────────────────────────────────
// Room IDs
// ─────────────────────────────────────────────────────────────────────────────

/// Length a normalized room ID is clamped to.
pub const ROOM_ID_MAX_LEN: usize = 8;

/// Length of an auto-generated room code when normalization yields nothing.
pub const ROOM_CODE_LEN: usize = 6;

/// Alphabet used for auto-generated room codes.
///
/// Excludes `I`, `O`, `0`, `1` for readability when read aloud or typed.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Maximum trimmed nickname length; longer nicknames are truncated.
pub const NICKNAME_MAX_LEN: usize = 24;

/// Maximum room name length.
pub const ROOM_NAME_MAX_LEN: usize = 32;

/// Maximum password length (trimmed before comparison).
pub const PASSWORD_MAX_LEN: usize = 64;

// ─────────────────────────────────────────────────────────────────────────────
// Playback
// ─────────────────────────────────────────────────────────────────────────────

/// Minimum allowed playback rate.
pub const PLAYBACK_RATE_MIN: f64 = 0.5;

/// Maximum allowed playback rate.
pub const PLAYBACK_RATE_MAX: f64 = 2.0;

/// Tolerance for duration agreement when matching a media fingerprint (seconds).
pub const DURATION_MATCH_TOLERANCE_SECS: f64 = 0.25;

// ─────────────────────────────────────────────────────────────────────────────
// Gate Controller
// ─────────────────────────────────────────────────────────────────────────────

/// Floor applied to `effectiveTarget` regardless of remaining duration (seconds).
pub const EFFECTIVE_TARGET_FLOOR_SECS: f64 = 0.8;

/// Lower bound for the derived startup buffer target (seconds).
pub const STARTUP_TARGET_MIN_SECS: f64 = 8.0;

/// Upper bound for the derived startup buffer target (seconds).
pub const STARTUP_TARGET_MAX_SECS: f64 = 24.0;

/// Fraction of media duration used to derive the startup buffer target.
pub const STARTUP_TARGET_DURATION_FRACTION: f64 = 0.02;

/// Startup buffer target used when media duration is unknown (seconds).
pub const STARTUP_TARGET_UNKNOWN_DURATION_SECS: f64 = 12.0;

/// Lower bound for the derived resume buffer target (seconds).
pub const RESUME_TARGET_MIN_SECS: f64 = 3.0;

/// Upper bound for the derived resume buffer target (seconds).
pub const RESUME_TARGET_MAX_SECS: f64 = 10.0;

/// Fraction of media duration used to derive the resume buffer target.
pub const RESUME_TARGET_DURATION_FRACTION: f64 = 0.01;

/// Resume buffer target used when media duration is unknown (seconds).
pub const RESUME_TARGET_UNKNOWN_DURATION_SECS: f64 = 6.0;

/// `readyState` threshold at or above which a member is unconditionally ready.
pub const READY_STATE_CAN_PLAY_THROUGH: u8 = 4;

/// `readyState` threshold at or above which buffer-ahead telemetry is trusted.
pub const READY_STATE_HAVE_FUTURE_DATA: u8 = 3;

/// Remaining-duration threshold below which soft buffer grace is zero (seconds).
pub const SOFT_BUFFER_GRACE_ZERO_THRESHOLD_SECS: f64 = 5.0;

/// Remaining-duration threshold below which soft buffer grace is 350ms (seconds).
pub const SOFT_BUFFER_GRACE_SHORT_THRESHOLD_SECS: f64 = 15.0;

/// Soft buffer grace when remaining duration is short (milliseconds).
pub const SOFT_BUFFER_GRACE_SHORT_MS: u64 = 350;

/// Soft buffer grace applied otherwise (milliseconds).
pub const SOFT_BUFFER_GRACE_DEFAULT_MS: u64 = 900;

// ─────────────────────────────────────────────────────────────────────────────
// Timers
// ─────────────────────────────────────────────────────────────────────────────

/// Playback heartbeat interval (milliseconds).
pub const PLAYBACK_HEARTBEAT_MS: u64 = 1500;

/// Snapshot heartbeat interval (milliseconds).
pub const SNAPSHOT_HEARTBEAT_MS: u64 = 4000;

/// Idle-room cleanup sweep interval (milliseconds).
pub const IDLE_CLEANUP_INTERVAL_MS: u64 = 60_000;

/// Default idle TTL before an empty room is destroyed (minutes).
pub const DEFAULT_ROOM_IDLE_TTL_MINUTES: u64 = 120;

/// Deadline within which a `leave` command acknowledges (milliseconds).
pub const LEAVE_ACK_DEADLINE_MS: u64 = 400;

// ─────────────────────────────────────────────────────────────────────────────
// Discovery (LAN UDP + HTTP probe)
// ─────────────────────────────────────────────────────────────────────────────

/// Announcement/listen protocol version.
pub const DISCOVERY_PROTOCOL_VERSION: u32 = 1;

/// Default UDP port for discovery announcements.
pub const DEFAULT_DISCOVERY_PORT: u16 = 43153;

/// Interval between discovery announcement broadcasts (milliseconds).
pub const DISCOVERY_ANNOUNCE_INTERVAL_MS: u64 = 1500;

/// How often the room registry re-derives the armed discovery announcement
/// from live room state.
pub const DISCOVERY_REFRESH_INTERVAL_MS: u64 = 2000;

/// Interval between discovery-map eviction sweeps (milliseconds).
pub const DISCOVERY_SWEEP_INTERVAL_MS: u64 = 1500;

/// Age after which a broadcast-discovered entry is evicted (milliseconds).
pub const DISCOVERY_ENTRY_TTL_MS: u64 = 4500;

/// Validity window of a successful probe result (seconds).
pub const PROBE_CACHE_TTL_SECS: u64 = 6;

/// Per-host timeout for an HTTP discovery probe (milliseconds).
pub const PROBE_HOST_TIMEOUT_MS: u64 = 300;

/// Maximum concurrent in-flight probe requests.
pub const PROBE_CONCURRENCY: usize = 48;

/// Host-count ceiling above which a probe falls back to scanning only the /24.
pub const PROBE_MAX_HOSTS_FOR_SUBNET_SCAN: u32 = 2048;

/// Default HTTP port probed on each candidate host.
pub const DEFAULT_RELAY_PORT: u16 = 4000;

// ─────────────────────────────────────────────────────────────────────────────
// HTTP surface
// ─────────────────────────────────────────────────────────────────────────────

/// Maximum accepted media upload size (bytes): 15 GiB.
pub const MAX_MEDIA_UPLOAD_BYTES: u64 = 15 * 1024 * 1024 * 1024;

/// Maximum accepted subtitle upload size (bytes): 5 MiB.
pub const MAX_SUBTITLE_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

// ─────────────────────────────────────────────────────────────────────────────
// Application Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Announcement message type identifier.
pub const ANNOUNCE_MESSAGE_TYPE: &str = "watchtogether:announce";

/// Application name used in discovery payloads.
pub const APP_NAME: &str = "WatchTogether";

/// Service identifier clients use to recognize a valid server on /health.
pub const SERVICE_ID: &str = "watchtogether";

/// Capacity of the event broadcast channel for WebSocket clients.
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// WebSocket heartbeat timeout (seconds).
pub const WS_HEARTBEAT_TIMEOUT_SECS: u64 = 30;

/// Interval between WebSocket heartbeat checks (seconds).
pub const WS_HEARTBEAT_CHECK_INTERVAL_SECS: u64 = 1;
