//! Gate controller: the startup-gate and buffer-gate predicates.
//!
//! Pure functions over member telemetry and room timing state — no mutable
//! state of its own. The room coordinator calls these after every mutation
//! that could change readiness (join, buffering report, media selection).

use crate::protocol_constants::{
    EFFECTIVE_TARGET_FLOOR_SECS, READY_STATE_CAN_PLAY_THROUGH, READY_STATE_HAVE_FUTURE_DATA,
    RESUME_TARGET_DURATION_FRACTION, RESUME_TARGET_MAX_SECS, RESUME_TARGET_MIN_SECS,
    RESUME_TARGET_UNKNOWN_DURATION_SECS, SOFT_BUFFER_GRACE_DEFAULT_MS,
    SOFT_BUFFER_GRACE_SHORT_MS, SOFT_BUFFER_GRACE_SHORT_THRESHOLD_SECS,
    SOFT_BUFFER_GRACE_ZERO_THRESHOLD_SECS, STARTUP_TARGET_DURATION_FRACTION,
    STARTUP_TARGET_MAX_SECS, STARTUP_TARGET_MIN_SECS, STARTUP_TARGET_UNKNOWN_DURATION_SECS,
};
use crate::services::member_table::{Member, MemberTable};

/// Clips `target` by the remaining duration (`duration - current_position`)
/// with a floor of [`EFFECTIVE_TARGET_FLOOR_SECS`]; 0 if no duration remains.
#[must_use]
pub fn effective_target(target_secs: f64, duration: Option<f64>, current_position: f64) -> f64 {
    let Some(duration) = duration else {
        return target_secs;
    };
    let remaining = (duration - current_position).max(0.0);
    if remaining <= 0.0 {
        return 0.0;
    }
    target_secs.min(remaining).max(EFFECTIVE_TARGET_FLOOR_SECS)
}

/// `min(24, max(8, duration * 0.02))` when duration is known, else 12.
#[must_use]
pub fn startup_target(duration: Option<f64>) -> f64 {
    match duration {
        Some(d) => (d * STARTUP_TARGET_DURATION_FRACTION)
            .clamp(STARTUP_TARGET_MIN_SECS, STARTUP_TARGET_MAX_SECS),
        None => STARTUP_TARGET_UNKNOWN_DURATION_SECS,
    }
}

/// `min(10, max(3, duration * 0.01))` when duration is known, else 6.
#[must_use]
pub fn resume_target(duration: Option<f64>) -> f64 {
    match duration {
        Some(d) => (d * RESUME_TARGET_DURATION_FRACTION)
            .clamp(RESUME_TARGET_MIN_SECS, RESUME_TARGET_MAX_SECS),
        None => RESUME_TARGET_UNKNOWN_DURATION_SECS,
    }
}

/// 0 if <= 5s remain, 350ms if <= 15s, otherwise 900ms.
#[must_use]
pub fn soft_buffer_grace_ms(remaining_duration_secs: f64) -> u64 {
    if remaining_duration_secs <= SOFT_BUFFER_GRACE_ZERO_THRESHOLD_SECS {
        0
    } else if remaining_duration_secs <= SOFT_BUFFER_GRACE_SHORT_THRESHOLD_SECS {
        SOFT_BUFFER_GRACE_SHORT_MS
    } else {
        SOFT_BUFFER_GRACE_DEFAULT_MS
    }
}

/// `media matched AND (canPlayThrough OR readyState >= 4 OR (readyState >= 3
/// AND bufferAheadSeconds >= effectiveTarget(startupTarget)))`.
#[must_use]
pub fn is_member_startup_ready(
    member: &Member,
    target_secs: f64,
    duration: Option<f64>,
    current_position: f64,
) -> bool {
    use crate::services::member_table::MediaMatch;
    if member.media_match != MediaMatch::Matched {
        return false;
    }
    if member.can_play_through || member.ready_state >= READY_STATE_CAN_PLAY_THROUGH {
        return true;
    }
    if member.ready_state >= READY_STATE_HAVE_FUTURE_DATA {
        let target = effective_target(target_secs, duration, current_position);
        return member.buffer_ahead_seconds >= target;
    }
    false
}

/// `media matched AND not buffering AND (canPlayThrough OR readyState >= 4 OR
/// (readyState >= 3 AND bufferAheadSeconds >= effectiveTarget(resumeTarget)))`.
#[must_use]
pub fn is_member_resume_ready(
    member: &Member,
    target_secs: f64,
    duration: Option<f64>,
    current_position: f64,
) -> bool {
    use crate::services::member_table::MediaMatch;
    if member.media_match != MediaMatch::Matched || member.buffering {
        return false;
    }
    if member.can_play_through || member.ready_state >= READY_STATE_CAN_PLAY_THROUGH {
        return true;
    }
    if member.ready_state >= READY_STATE_HAVE_FUTURE_DATA {
        let target = effective_target(target_secs, duration, current_position);
        return member.buffer_ahead_seconds >= target;
    }
    false
}

/// All members satisfy [`is_member_startup_ready`].
#[must_use]
pub fn all_startup_ready(
    members: &MemberTable,
    target_secs: f64,
    duration: Option<f64>,
    current_position: f64,
) -> bool {
    members
        .iter()
        .all(|m| is_member_startup_ready(m, target_secs, duration, current_position))
}

/// Any member is buffering AND (mode=strict OR that member has readyState < 3
/// OR has been buffering for at least `soft_buffer_grace_ms`).
#[must_use]
pub fn should_pause_for_buffering(
    members: &MemberTable,
    strict: bool,
    soft_grace_ms: u64,
    now_ms: u64,
) -> bool {
    members.iter().any(|m| {
        if !m.buffering {
            return false;
        }
        if strict || m.ready_state < READY_STATE_HAVE_FUTURE_DATA {
            return true;
        }
        match m.buffering_started_at {
            Some(started) => now_ms.saturating_sub(started) >= soft_grace_ms,
            None => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::member_table::MediaMatch;

    fn member_with(
        media_match: MediaMatch,
        ready_state: u8,
        can_play_through: bool,
        buffer_ahead: f64,
    ) -> Member {
        let mut table = MemberTable::new();
        table.join("a".into(), "A");
        let m = table.get_mut("a").unwrap();
        m.media_match = media_match;
        m.ready_state = ready_state;
        m.can_play_through = can_play_through;
        m.buffer_ahead_seconds = buffer_ahead;
        m.clone()
    }

    #[test]
    fn effective_target_floors_and_clips() {
        assert_eq!(effective_target(12.0, Some(100.0), 0.0), 12.0);
        assert_eq!(effective_target(12.0, Some(100.0), 95.0), 5.0);
        assert_eq!(
            effective_target(12.0, Some(100.0), 99.5),
            EFFECTIVE_TARGET_FLOOR_SECS
        );
        assert_eq!(effective_target(12.0, Some(100.0), 100.0), 0.0);
        assert_eq!(effective_target(12.0, None, 0.0), 12.0);
    }

    #[test]
    fn startup_target_bounds_by_duration() {
        assert_eq!(startup_target(None), STARTUP_TARGET_UNKNOWN_DURATION_SECS);
        assert_eq!(startup_target(Some(10.0)), STARTUP_TARGET_MIN_SECS);
        assert_eq!(startup_target(Some(10_000.0)), STARTUP_TARGET_MAX_SECS);
    }

    #[test]
    fn resume_target_bounds_by_duration() {
        assert_eq!(resume_target(None), RESUME_TARGET_UNKNOWN_DURATION_SECS);
        assert_eq!(resume_target(Some(10.0)), RESUME_TARGET_MIN_SECS);
        assert_eq!(resume_target(Some(10_000.0)), RESUME_TARGET_MAX_SECS);
    }

    #[test]
    fn soft_buffer_grace_tiers() {
        assert_eq!(soft_buffer_grace_ms(3.0), 0);
        assert_eq!(soft_buffer_grace_ms(10.0), SOFT_BUFFER_GRACE_SHORT_MS);
        assert_eq!(soft_buffer_grace_ms(60.0), SOFT_BUFFER_GRACE_DEFAULT_MS);
    }

    #[test]
    fn startup_ready_requires_media_match() {
        let member = member_with(MediaMatch::Missing, 4, true, 0.0);
        assert!(!is_member_startup_ready(&member, 12.0, None, 0.0));
    }

    #[test]
    fn startup_ready_true_on_can_play_through() {
        let member = member_with(MediaMatch::Matched, 0, true, 0.0);
        assert!(is_member_startup_ready(&member, 12.0, None, 0.0));
    }

    #[test]
    fn startup_ready_true_on_ready_state_four() {
        let member = member_with(MediaMatch::Matched, 4, false, 0.0);
        assert!(is_member_startup_ready(&member, 12.0, None, 0.0));
    }

    #[test]
    fn startup_ready_checks_buffer_ahead_at_ready_state_three() {
        let insufficient = member_with(MediaMatch::Matched, 3, false, 1.0);
        assert!(!is_member_startup_ready(&insufficient, 12.0, None, 0.0));

        let sufficient = member_with(MediaMatch::Matched, 3, false, 20.0);
        assert!(is_member_startup_ready(&sufficient, 12.0, None, 0.0));
    }

    #[test]
    fn should_pause_for_buffering_strict_mode_triggers_immediately() {
        let mut members = MemberTable::new();
        members.join("a".into(), "A");
        members.get_mut("a").unwrap().buffering = true;
        members.get_mut("a").unwrap().ready_state = 4;

        assert!(should_pause_for_buffering(&members, true, 900, now_millis_stub()));
    }

    #[test]
    fn should_pause_for_buffering_soft_mode_waits_for_grace() {
        let mut members = MemberTable::new();
        members.join("a".into(), "A");
        let now = now_millis_stub();
        {
            let m = members.get_mut("a").unwrap();
            m.buffering = true;
            m.ready_state = 4;
            m.buffering_started_at = Some(now);
        }
        assert!(!should_pause_for_buffering(&members, false, 900, now + 100));
        assert!(should_pause_for_buffering(&members, false, 900, now + 1000));
    }

    fn now_millis_stub() -> u64 {
        1_700_000_000_000
    }
}
