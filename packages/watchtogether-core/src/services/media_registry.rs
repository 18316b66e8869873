//! Media registry: the (at most one) media item and subtitle track for a room.
//!
//! `replace` releases the previous file's on-disk resource (best-effort) and
//! installs a fresh descriptor with a new id and `selectedAt`. A host's
//! selection always goes through here; a non-host's `select-media` never
//! touches the registry, only the submitting member's match state.

use std::path::{Path, PathBuf};

use serde::Serialize;
use uuid::Uuid;

use crate::protocol_constants::DURATION_MATCH_TOLERANCE_SECS;
use crate::utils::now_millis;

/// A candidate media fingerprint submitted by a client for matching.
#[derive(Debug, Clone)]
pub struct MediaFingerprint {
    pub sha256: String,
    pub size: u64,
    pub duration: Option<f64>,
}

/// Describes the single media item currently selected for a room.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDescriptor {
    pub id: Uuid,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub duration: Option<f64>,
    pub sha256: String,
    pub selected_at: u64,
}

/// Subtitle track format, after any server-side conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    Vtt,
    Ass,
}

/// Describes the single subtitle track currently attached to a room.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleDescriptor {
    pub id: Uuid,
    pub name: String,
    pub format: SubtitleFormat,
    pub language: Option<String>,
    pub uploaded_at: u64,
}

/// Holds the media/subtitle descriptor and backing file path for one room.
#[derive(Debug, Default)]
pub struct MediaRegistry {
    media: Option<(MediaDescriptor, PathBuf)>,
    subtitle: Option<(SubtitleDescriptor, PathBuf)>,
}

impl MediaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn media(&self) -> Option<&MediaDescriptor> {
        self.media.as_ref().map(|(d, _)| d)
    }

    pub fn media_path(&self) -> Option<&Path> {
        self.media.as_ref().map(|(_, p)| p.as_path())
    }

    pub fn subtitle(&self) -> Option<&SubtitleDescriptor> {
        self.subtitle.as_ref().map(|(d, _)| d)
    }

    pub fn subtitle_path(&self) -> Option<&Path> {
        self.subtitle.as_ref().map(|(_, p)| p.as_path())
    }

    /// Replaces the current media, best-effort deleting the previous file.
    pub fn replace_media(
        &mut self,
        name: String,
        size: u64,
        mime_type: String,
        duration: Option<f64>,
        sha256: String,
        path: PathBuf,
    ) -> MediaDescriptor {
        if let Some((_, old_path)) = self.media.take() {
            if let Err(e) = std::fs::remove_file(&old_path) {
                log::debug!("[MediaRegistry] failed to remove old media file: {}", e);
            }
        }
        let descriptor = MediaDescriptor {
            id: Uuid::new_v4(),
            name,
            size,
            mime_type,
            duration,
            sha256,
            selected_at: now_millis(),
        };
        self.media = Some((descriptor.clone(), path));
        descriptor
    }

    /// Replaces the current subtitle, best-effort deleting the previous file.
    pub fn replace_subtitle(
        &mut self,
        name: String,
        format: SubtitleFormat,
        language: Option<String>,
        path: PathBuf,
    ) -> SubtitleDescriptor {
        if let Some((_, old_path)) = self.subtitle.take() {
            if let Err(e) = std::fs::remove_file(&old_path) {
                log::debug!("[MediaRegistry] failed to remove old subtitle file: {}", e);
            }
        }
        let descriptor = SubtitleDescriptor {
            id: Uuid::new_v4(),
            name,
            format,
            language,
            uploaded_at: now_millis(),
        };
        self.subtitle = Some((descriptor.clone(), path));
        descriptor
    }

    /// Releases both files best-effort. Called on room destruction.
    pub fn clear(&mut self) {
        if let Some((_, path)) = self.media.take() {
            let _ = std::fs::remove_file(path);
        }
        if let Some((_, path)) = self.subtitle.take() {
            let _ = std::fs::remove_file(path);
        }
    }

    /// `sha256 equal AND size equal AND |duration_client - duration_room| <= 0.25`.
    #[must_use]
    pub fn matches(&self, candidate: &MediaFingerprint) -> bool {
        let Some(descriptor) = self.media() else {
            return false;
        };
        if descriptor.sha256 != candidate.sha256 || descriptor.size != candidate.size {
            return false;
        }
        match (descriptor.duration, candidate.duration) {
            (Some(room_dur), Some(client_dur)) => {
                (room_dur - client_dur).abs() <= DURATION_MATCH_TOLERANCE_SECS
            }
            (None, None) => true,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor_fingerprint(reg: &MediaRegistry) -> MediaFingerprint {
        let d = reg.media().unwrap();
        MediaFingerprint {
            sha256: d.sha256.clone(),
            size: d.size,
            duration: d.duration,
        }
    }

    #[test]
    fn matches_exact_fingerprint() {
        let mut reg = MediaRegistry::new();
        reg.replace_media(
            "movie.mp4".into(),
            1000,
            "video/mp4".into(),
            Some(120.0),
            "abc123".into(),
            PathBuf::from("/tmp/does-not-exist-watchtogether-test"),
        );
        let fp = descriptor_fingerprint(&reg);
        assert!(reg.matches(&fp));
    }

    #[test]
    fn rejects_different_sha() {
        let mut reg = MediaRegistry::new();
        reg.replace_media(
            "movie.mp4".into(),
            1000,
            "video/mp4".into(),
            Some(120.0),
            "abc123".into(),
            PathBuf::from("/tmp/does-not-exist-watchtogether-test-2"),
        );
        let fp = MediaFingerprint {
            sha256: "different".into(),
            size: 1000,
            duration: Some(120.0),
        };
        assert!(!reg.matches(&fp));
    }

    #[test]
    fn tolerates_small_duration_drift() {
        let mut reg = MediaRegistry::new();
        reg.replace_media(
            "movie.mp4".into(),
            1000,
            "video/mp4".into(),
            Some(120.0),
            "abc123".into(),
            PathBuf::from("/tmp/does-not-exist-watchtogether-test-3"),
        );
        let fp = MediaFingerprint {
            sha256: "abc123".into(),
            size: 1000,
            duration: Some(120.2),
        };
        assert!(reg.matches(&fp));

        let fp_far = MediaFingerprint {
            sha256: "abc123".into(),
            size: 1000,
            duration: Some(121.0),
        };
        assert!(!reg.matches(&fp_far));
    }

    #[test]
    fn replace_releases_previous_descriptor_id() {
        let mut reg = MediaRegistry::new();
        let first = reg.replace_media(
            "a.mp4".into(),
            1,
            "video/mp4".into(),
            None,
            "sha-a".into(),
            PathBuf::from("/tmp/does-not-exist-watchtogether-test-4"),
        );
        let second = reg.replace_media(
            "b.mp4".into(),
            2,
            "video/mp4".into(),
            None,
            "sha-b".into(),
            PathBuf::from("/tmp/does-not-exist-watchtogether-test-5"),
        );
        assert_ne!(first.id, second.id);
        assert_eq!(reg.media().unwrap().sha256, "sha-b");
    }
}
