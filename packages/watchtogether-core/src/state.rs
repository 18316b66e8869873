//! Core application configuration.
//!
//! Provides [`Config`], loadable from environment variables with CLI-flag
//! overrides applied on top by the binary crate.

use serde::{Deserialize, Serialize};

/// Configuration for the WatchTogether server.
///
/// All fields have sensible defaults; [`Config::load_from_env`] overlays
/// environment variables on top of [`Config::default`].
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Preferred port for the HTTP/WS server (0 = auto-allocate).
    pub preferred_port: u16,

    /// Minutes an empty room survives before the registry destroys it.
    pub room_idle_ttl_minutes: u64,

    /// Root directory under which uploaded media and subtitles are stored.
    pub storage_dir: String,

    /// UDP port used for LAN discovery announcements and listening.
    pub discovery_port: u16,

    /// Disables the HTTP-probe discovery fallback when set.
    pub disable_compat_proxy: bool,

    /// Bitrate ceiling advertised for direct (non-transcoded) streaming, in bits/sec.
    pub direct_stream_max_bps: u64,

    /// Path to an `ffprobe` binary, if media duration/bitrate probing is available.
    pub ffprobe_path: Option<String>,

    /// Path to an `ffmpeg` binary, if subtitle/media conversion is available.
    pub ffmpeg_path: Option<String>,

    /// Default sync mode assigned to newly created rooms.
    pub sync_mode_default: String,

    /// Interval between `room:snapshot` broadcasts (milliseconds).
    pub snapshot_heartbeat_ms: u64,

    /// Interval between `playback:state` broadcasts (milliseconds).
    pub playback_heartbeat_ms: u64,

    /// Interval between idle-room cleanup sweeps (milliseconds).
    pub idle_cleanup_interval_ms: u64,

    /// Default per-room member cap used when a caller doesn't specify one.
    pub default_max_members: usize,
}

impl Config {
    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.room_idle_ttl_minutes == 0 {
            return Err("room_idle_ttl_minutes must be >= 1".to_string());
        }
        if self.storage_dir.trim().is_empty() {
            return Err("storage_dir must not be empty".to_string());
        }
        if self.direct_stream_max_bps == 0 {
            return Err("direct_stream_max_bps must be >= 1".to_string());
        }
        if self.default_max_members == 0 {
            return Err("default_max_members must be >= 1".to_string());
        }
        Ok(())
    }

    /// Builds a [`Config`] by overlaying environment variables on the defaults.
    ///
    /// Unset or unparsable variables fall back to the default value rather
    /// than failing, matching how optional env tuning is handled elsewhere
    /// in this crate.
    #[must_use]
    pub fn load_from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("PORT") {
            if let Ok(parsed) = v.parse() {
                config.preferred_port = parsed;
            }
        }
        if let Ok(v) = std::env::var("ROOM_IDLE_TTL_MINUTES") {
            if let Ok(parsed) = v.parse() {
                config.room_idle_ttl_minutes = parsed;
            }
        }
        if let Ok(v) = std::env::var("WATCH_TOGETHER_STORAGE_DIR") {
            config.storage_dir = v;
        }
        if let Ok(v) = std::env::var("WATCH_TOGETHER_DISCOVERY_PORT") {
            if let Ok(parsed) = v.parse() {
                config.discovery_port = parsed;
            }
        }
        if std::env::var("WATCH_TOGETHER_DISABLE_COMPAT_PROXY").as_deref() == Ok("1") {
            config.disable_compat_proxy = true;
        }
        if let Ok(v) = std::env::var("WATCH_TOGETHER_DIRECT_STREAM_MAX_BPS") {
            if let Ok(parsed) = v.parse() {
                config.direct_stream_max_bps = parsed;
            }
        }
        if let Ok(v) = std::env::var("FFPROBE_PATH") {
            config.ffprobe_path = Some(v);
        }
        if let Ok(v) = std::env::var("FFMPEG_PATH") {
            config.ffmpeg_path = Some(v);
        }

        config
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preferred_port: 4000,
            room_idle_ttl_minutes: crate::protocol_constants::DEFAULT_ROOM_IDLE_TTL_MINUTES,
            storage_dir: ".watchtogether/uploads".to_string(),
            discovery_port: crate::protocol_constants::DEFAULT_DISCOVERY_PORT,
            disable_compat_proxy: false,
            direct_stream_max_bps: 900_000,
            ffprobe_path: None,
            ffmpeg_path: None,
            sync_mode_default: "soft".to_string(),
            snapshot_heartbeat_ms: crate::protocol_constants::SNAPSHOT_HEARTBEAT_MS,
            playback_heartbeat_ms: crate::protocol_constants::PLAYBACK_HEARTBEAT_MS,
            idle_cleanup_interval_ms: crate::protocol_constants::IDLE_CLEANUP_INTERVAL_MS,
            default_max_members: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.preferred_port, 4000);
        assert_eq!(config.sync_mode_default, "soft");
    }

    #[test]
    fn config_rejects_zero_values() {
        let config = Config {
            room_idle_ttl_minutes: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            default_max_members: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
