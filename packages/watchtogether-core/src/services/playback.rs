//! Playback state machine: the authoritative `{position, paused, rate}` triple.
//!
//! `mark_playback` is the only mutator. It stamps `updatedAt`, clamps
//! `position` and `rate`, and records `updatedBy` — no other code path is
//! allowed to construct a [`PlaybackState`] by hand once a room has media.

use serde::Serialize;

use crate::protocol_constants::{PLAYBACK_RATE_MAX, PLAYBACK_RATE_MIN};
use crate::utils::now_millis;

/// Why a playback state transition occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackReason {
    /// A member explicitly changed playback (play/pause/seek).
    User,
    /// The buffer gate forced a pause or resumed after one.
    BufferLock,
    /// The startup gate forced a pause or released it.
    StartupGate,
    /// Media was just replaced by the host.
    MediaTransfer,
}

/// A patch applied via [`mark_playback`].
#[derive(Debug, Clone, Copy)]
pub struct PlaybackPatch {
    pub position: f64,
    pub paused: bool,
    pub rate: f64,
}

/// The authoritative playback timeline for a room.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub position: f64,
    pub paused: bool,
    pub rate: f64,
    pub updated_at: u64,
    pub updated_by: String,
    pub reason: PlaybackReason,
}

impl PlaybackState {
    /// The initial state created when media is selected: paused at position 0.
    pub fn initial(updated_by: impl Into<String>) -> Self {
        Self {
            position: 0.0,
            paused: true,
            rate: 1.0,
            updated_at: now_millis(),
            updated_by: updated_by.into(),
            reason: PlaybackReason::MediaTransfer,
        }
    }

    /// Derives the current position given a reference wall-clock time (ms).
    ///
    /// While unpaused: `position + (referenceTime - updatedAt)/1000 * rate`.
    /// While paused: `position`.
    #[must_use]
    pub fn derive_position(&self, reference_time_ms: u64) -> f64 {
        if self.paused {
            self.position
        } else {
            let elapsed_secs =
                reference_time_ms.saturating_sub(self.updated_at) as f64 / 1000.0;
            self.position + elapsed_secs * self.rate
        }
    }
}

/// Applies `patch`, clamping `position >= 0` and `rate` into
/// `[PLAYBACK_RATE_MIN, PLAYBACK_RATE_MAX]` (NaN maps to 1.0), stamping
/// `updatedAt = now` and recording `updatedBy`/`reason`.
pub fn mark_playback(
    state: &mut PlaybackState,
    patch: PlaybackPatch,
    updated_by: impl Into<String>,
    reason: PlaybackReason,
) {
    let rate = if patch.rate.is_nan() {
        1.0
    } else {
        patch.rate.clamp(PLAYBACK_RATE_MIN, PLAYBACK_RATE_MAX)
    };

    state.position = patch.position.max(0.0);
    state.paused = patch.paused;
    state.rate = rate;
    state.updated_at = now_millis();
    state.updated_by = updated_by.into();
    state.reason = reason;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_playback_clamps_negative_position() {
        let mut state = PlaybackState::initial("host");
        mark_playback(
            &mut state,
            PlaybackPatch {
                position: -5.0,
                paused: false,
                rate: 1.0,
            },
            "host",
            PlaybackReason::User,
        );
        assert_eq!(state.position, 0.0);
    }

    #[test]
    fn mark_playback_clamps_rate_range() {
        let mut state = PlaybackState::initial("host");
        mark_playback(
            &mut state,
            PlaybackPatch {
                position: 0.0,
                paused: false,
                rate: 10.0,
            },
            "host",
            PlaybackReason::User,
        );
        assert_eq!(state.rate, PLAYBACK_RATE_MAX);

        mark_playback(
            &mut state,
            PlaybackPatch {
                position: 0.0,
                paused: false,
                rate: 0.01,
            },
            "host",
            PlaybackReason::User,
        );
        assert_eq!(state.rate, PLAYBACK_RATE_MIN);
    }

    #[test]
    fn mark_playback_maps_nan_rate_to_one() {
        let mut state = PlaybackState::initial("host");
        mark_playback(
            &mut state,
            PlaybackPatch {
                position: 0.0,
                paused: false,
                rate: f64::NAN,
            },
            "host",
            PlaybackReason::User,
        );
        assert_eq!(state.rate, 1.0);
    }

    #[test]
    fn derive_position_while_paused_is_exact() {
        let state = PlaybackState::initial("host");
        assert_eq!(state.derive_position(now_millis() + 5000), 0.0);
    }

    #[test]
    fn derive_position_while_playing_advances_with_rate() {
        let mut state = PlaybackState::initial("host");
        state.paused = false;
        state.position = 10.0;
        state.rate = 2.0;
        state.updated_at = 1_000_000;

        let derived = state.derive_position(1_002_000);
        assert!((derived - 14.0).abs() < 1e-9);
    }
}
