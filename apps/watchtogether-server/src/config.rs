//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides,
//! following the same `load` → `apply_env_overrides` shape used upstream;
//! the env var names and defaults instead match `watchtogether_core::Config`.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind the HTTP/WS server to (0 = auto-allocate).
    /// Override: `PORT`
    pub port: u16,

    /// Minutes an empty room survives before it is destroyed.
    /// Override: `ROOM_IDLE_TTL_MINUTES`
    pub room_idle_ttl_minutes: u64,

    /// Root directory under which uploaded media/subtitles are stored.
    /// Override: `WATCH_TOGETHER_STORAGE_DIR`
    pub storage_dir: String,

    /// UDP port used for LAN discovery announce/listen.
    /// Override: `WATCH_TOGETHER_DISCOVERY_PORT`
    pub discovery_port: u16,

    /// Disables the HTTP-probe discovery fallback when true.
    /// Override: `WATCH_TOGETHER_DISABLE_COMPAT_PROXY=1`
    pub disable_compat_proxy: bool,

    /// Bitrate ceiling advertised for direct streaming, in bits/sec.
    /// Override: `WATCH_TOGETHER_DIRECT_STREAM_MAX_BPS`
    pub direct_stream_max_bps: u64,

    /// Path to an `ffprobe` binary, if available. Override: `FFPROBE_PATH`
    pub ffprobe_path: Option<String>,

    /// Path to an `ffmpeg` binary, if available. Override: `FFMPEG_PATH`
    pub ffmpeg_path: Option<String>,

    /// Default per-room member cap.
    pub default_max_members: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let core = watchtogether_core::Config::default();
        Self {
            port: core.preferred_port,
            room_idle_ttl_minutes: core.room_idle_ttl_minutes,
            storage_dir: core.storage_dir,
            discovery_port: core.discovery_port,
            disable_compat_proxy: core.disable_compat_proxy,
            direct_stream_max_bps: core.direct_stream_max_bps,
            ffprobe_path: core.ffprobe_path,
            ffmpeg_path: core.ffmpeg_path,
            default_max_members: core.default_max_members,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from an optional YAML file, then applies
    /// environment variable overrides on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("PORT") {
            if let Ok(parsed) = v.parse() {
                self.port = parsed;
            }
        }
        if let Ok(v) = std::env::var("ROOM_IDLE_TTL_MINUTES") {
            if let Ok(parsed) = v.parse() {
                self.room_idle_ttl_minutes = parsed;
            }
        }
        if let Ok(v) = std::env::var("WATCH_TOGETHER_STORAGE_DIR") {
            self.storage_dir = v;
        }
        if let Ok(v) = std::env::var("WATCH_TOGETHER_DISCOVERY_PORT") {
            if let Ok(parsed) = v.parse() {
                self.discovery_port = parsed;
            }
        }
        if std::env::var("WATCH_TOGETHER_DISABLE_COMPAT_PROXY").as_deref() == Ok("1") {
            self.disable_compat_proxy = true;
        }
        if let Ok(v) = std::env::var("WATCH_TOGETHER_DIRECT_STREAM_MAX_BPS") {
            if let Ok(parsed) = v.parse() {
                self.direct_stream_max_bps = parsed;
            }
        }
        if let Ok(v) = std::env::var("FFPROBE_PATH") {
            self.ffprobe_path = Some(v);
        }
        if let Ok(v) = std::env::var("FFMPEG_PATH") {
            self.ffmpeg_path = Some(v);
        }
    }

    /// Converts to `watchtogether_core`'s `Config` type.
    pub fn to_core_config(&self) -> watchtogether_core::Config {
        watchtogether_core::Config {
            preferred_port: self.port,
            room_idle_ttl_minutes: self.room_idle_ttl_minutes,
            storage_dir: self.storage_dir.clone(),
            discovery_port: self.discovery_port,
            disable_compat_proxy: self.disable_compat_proxy,
            direct_stream_max_bps: self.direct_stream_max_bps,
            ffprobe_path: self.ffprobe_path.clone(),
            ffmpeg_path: self.ffmpeg_path.clone(),
            default_max_members: self.default_max_members,
            ..Default::default()
        }
    }
}
