//! Phase engine.
//!
//! Pure transition logic over [`PomodoroState`]. Nothing here touches the
//! store, the alarm or the clock: callers pass `now` in and persist the
//! result themselves.
//!
//! ## Transitions
//!
//! ```text
//! focus -> short | long (long on every `longEvery`-th completed focus)
//! short | long -> focus
//! idle -> idle (invalid, returned unchanged)
//! ```

use super::phase::{Phase, PomodoroState};

/// Extra recomputations allowed when skipping zero-length phases.
///
/// Two is enough to try every phase kind once: a zero-length break leads to
/// focus, a zero-length focus leads to a break.
const MAX_EMPTY_PHASE_SKIPS: usize = 2;

/// Compute the state that follows the current phase.
///
/// Returns the input unchanged when the phase is idle.
pub fn compute_next_phase(state: &PomodoroState, now: i64) -> PomodoroState {
    let (next_phase, cycle_count) = match state.phase {
        Phase::Focus => {
            let completed = state.cycle_count + 1;
            let every = state.config.long_every.max(1);
            let next = if completed % every == 0 {
                Phase::Long
            } else {
                Phase::Short
            };
            (next, completed)
        }
        Phase::Short | Phase::Long => (Phase::Focus, state.cycle_count),
        Phase::Idle => return state.clone(),
    };

    PomodoroState {
        phase: next_phase,
        running: true,
        cycle_count,
        started_at: Some(now),
        ends_at: state.ends_at_for(next_phase, now),
        paused: false,
        paused_at: None,
        pause_accum_ms: 0,
        config: state.config.clone(),
    }
}

/// Compute the next phase and skip over phases that have no duration.
///
/// A running phase without `endsAt` would never fire an alarm, so it is
/// advanced past immediately. If every candidate is empty the last one is
/// kept (running, no end time).
pub fn advance(state: &PomodoroState, now: i64) -> PomodoroState {
    let mut next = compute_next_phase(state, now);
    for _ in 0..MAX_EMPTY_PHASE_SKIPS {
        if next.phase == Phase::Idle || next.ends_at.is_some() {
            break;
        }
        tracing::debug!(phase = %next.phase, "skipping zero-length phase");
        next = compute_next_phase(&next, now);
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::phase::PomodoroConfig;

    fn running(phase: Phase, config: PomodoroConfig) -> PomodoroState {
        let mut state = PomodoroState::idle(config);
        state.phase = phase;
        state.running = true;
        state.started_at = Some(0);
        state.ends_at = state.ends_at_for(phase, 0);
        state
    }

    #[test]
    fn focus_goes_to_short_break() {
        let state = running(Phase::Focus, PomodoroConfig::default());
        let next = compute_next_phase(&state, 1_500_000);
        assert_eq!(next.phase, Phase::Short);
        assert_eq!(next.cycle_count, 1);
        assert_eq!(next.started_at, Some(1_500_000));
        assert_eq!(next.ends_at, Some(1_800_000));
    }

    #[test]
    fn every_nth_focus_goes_to_long_break() {
        let mut state = running(Phase::Focus, PomodoroConfig::default());
        state.cycle_count = 3;
        let next = compute_next_phase(&state, 0);
        assert_eq!(next.phase, Phase::Long);
        assert_eq!(next.cycle_count, 4);
        assert_eq!(next.ends_at, Some(20 * 60_000));
    }

    #[test]
    fn break_goes_to_focus_and_clears_pause() {
        let mut state = running(Phase::Long, PomodoroConfig::default());
        state.cycle_count = 4;
        state.paused = true;
        state.paused_at = Some(10);
        state.pause_accum_ms = 500;
        let next = compute_next_phase(&state, 100);
        assert_eq!(next.phase, Phase::Focus);
        assert_eq!(next.cycle_count, 4);
        assert!(!next.paused);
        assert_eq!(next.paused_at, None);
        assert_eq!(next.pause_accum_ms, 0);
    }

    #[test]
    fn idle_is_identity() {
        let state = PomodoroState::default();
        assert_eq!(compute_next_phase(&state, 42), state);
        assert_eq!(advance(&state, 42), state);
    }

    #[test]
    fn advance_skips_zero_length_break() {
        let config = PomodoroConfig {
            short_min: 0.0,
            ..PomodoroConfig::default()
        };
        let state = running(Phase::Focus, config);
        let next = advance(&state, 1_000);
        assert_eq!(next.phase, Phase::Focus);
        assert_eq!(next.cycle_count, 1);
        assert_eq!(next.ends_at, Some(1_000 + 25 * 60_000));
    }

    #[test]
    fn advance_terminates_when_everything_is_empty() {
        let config = PomodoroConfig {
            focus_min: 0.0,
            short_min: 0.0,
            long_min: 0.0,
            ..PomodoroConfig::default()
        };
        let state = running(Phase::Focus, config);
        let next = advance(&state, 0);
        assert!(next.running);
        assert_eq!(next.ends_at, None);
    }
}
