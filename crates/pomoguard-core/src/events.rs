use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::Phase;

/// Every state change made by the session controller produces an Event.
/// Hosts log them; the native host forwards them alongside responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    PhaseStarted {
        phase: Phase,
        /// Absent when the phase has zero length.
        ends_at: Option<i64>,
        queue_id: Option<String>,
        at: DateTime<Utc>,
    },
    TimerPaused {
        remaining_ms: i64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        remaining_ms: i64,
        paused_for_ms: i64,
        at: DateTime<Utc>,
    },
    /// The phase alarm fired and the session moved on.
    PhaseCompleted {
        completed: Phase,
        next: Phase,
        cycle_count: u32,
        at: DateTime<Utc>,
    },
    PhaseSkipped {
        skipped: Phase,
        next: Phase,
        at: DateTime<Utc>,
    },
    TimerStopped {
        stopped: Phase,
        at: DateTime<Utc>,
    },
    ConfigApplied {
        strict_mode: bool,
        ends_at: Option<i64>,
        at: DateTime<Utc>,
    },
    /// The break page asked to be closed.
    BreakClosed {
        at: DateTime<Utc>,
    },
}

/// Convert epoch milliseconds to a UTC timestamp, clamping garbage to the epoch.
pub fn timestamp(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}
