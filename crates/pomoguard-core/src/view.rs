use serde::{Deserialize, Serialize};

use crate::timer::{Phase, PomodoroState};

/// What a UI shows on each redraw. Derived from the persisted state; never
/// written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerView {
    pub phase: Phase,
    pub label: String,
    pub running: bool,
    pub paused: bool,
    pub remaining_ms: i64,
    pub total_ms: i64,
    /// Elapsed fraction of the phase, 0.0 to 1.0.
    pub progress: f64,
    /// `MM:SS`, seconds rounded up.
    pub display: String,
    pub cycle_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<i64>,
}

impl TimerView {
    pub fn from_state(state: &PomodoroState, now: i64) -> Self {
        let remaining_ms = remaining_ms(state, now);
        let total_ms = state.config.duration_ms(state.phase);
        let progress = if total_ms > 0 {
            (1.0 - remaining_ms as f64 / total_ms as f64).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            phase: state.phase,
            label: state.phase.label().to_string(),
            running: state.running,
            paused: state.paused,
            remaining_ms,
            total_ms,
            progress,
            display: format_mm_ss(remaining_ms),
            cycle_count: state.cycle_count,
            ends_at: state.ends_at,
        }
    }
}

/// Time left in the current phase. Frozen at `endsAt - pausedAt` while paused.
pub fn remaining_ms(state: &PomodoroState, now: i64) -> i64 {
    if !state.is_active() {
        return 0;
    }
    let Some(ends_at) = state.ends_at else {
        return 0;
    };
    let reference = match (state.paused, state.paused_at) {
        (true, Some(paused_at)) => paused_at,
        _ => now,
    };
    (ends_at - reference).max(0)
}

pub fn format_mm_ss(ms: i64) -> String {
    let secs = (ms.max(0) + 999) / 1000;
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
