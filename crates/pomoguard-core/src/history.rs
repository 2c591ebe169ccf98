//! Append-only phase history and the current queue marker.

use std::collections::HashSet;

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{Phase, PomodoroState};

/// One continuous run from start to stop. Groups history entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentQueue {
    pub id: String,
    pub started_at: i64,
}

impl CurrentQueue {
    pub fn new(started_at: i64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            started_at,
        }
    }
}

/// A phase that ended naturally, was skipped, or was cut short by stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroHistoryEntry {
    pub id: String,
    pub phase: Phase,
    pub title: String,
    pub started_at: i64,
    pub ended_at: i64,
    pub duration_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_id: Option<String>,
}

impl PomodoroHistoryEntry {
    /// Entry covering the state's current phase up to `ended_at`.
    ///
    /// Returns `None` for idle or never-started phases.
    pub fn for_phase(
        state: &PomodoroState,
        ended_at: i64,
        queue: Option<&CurrentQueue>,
    ) -> Option<Self> {
        if state.phase == Phase::Idle {
            return None;
        }
        let started_at = state.started_at?;
        Some(Self {
            id: uuid::Uuid::new_v4().to_string(),
            phase: state.phase,
            title: state.phase.label().to_string(),
            started_at,
            ended_at,
            duration_ms: (ended_at - started_at).max(0),
            queue_id: queue.map(|q| q.id.clone()),
        })
    }
}

/// Aggregates over a slice of history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySummary {
    pub entries: u64,
    pub focus_sessions: u64,
    pub focus_ms: i64,
    pub break_ms: i64,
    pub queues: u64,
}

/// Summarize entries that ended at or after `since` (all when `None`).
pub fn summarize(entries: &[PomodoroHistoryEntry], since: Option<i64>) -> HistorySummary {
    let mut summary = HistorySummary::default();
    let mut queues = HashSet::new();
    for entry in entries
        .iter()
        .filter(|e| since.map_or(true, |s| e.ended_at >= s))
    {
        summary.entries += 1;
        match entry.phase {
            Phase::Focus => {
                summary.focus_sessions += 1;
                summary.focus_ms += entry.duration_ms;
            }
            Phase::Short | Phase::Long => summary.break_ms += entry.duration_ms,
            Phase::Idle => {}
        }
        if let Some(q) = &entry.queue_id {
            queues.insert(q.as_str());
        }
    }
    summary.queues = queues.len() as u64;
    summary
}

/// Entries belonging to one queue, newest first.
pub fn for_queue<'a>(
    entries: &'a [PomodoroHistoryEntry],
    queue_id: &str,
) -> Vec<&'a PomodoroHistoryEntry> {
    let mut list: Vec<_> = entries
        .iter()
        .filter(|e| e.queue_id.as_deref() == Some(queue_id))
        .collect();
    list.sort_by(|a, b| b.ended_at.cmp(&a.ended_at));
    list
}

/// Epoch milliseconds of local midnight for the day containing `now_ms`.
pub fn local_day_start(now_ms: i64) -> i64 {
    let Some(now) = DateTime::<Utc>::from_timestamp_millis(now_ms) else {
        return now_ms;
    };
    let local = now.with_timezone(&Local);
    local
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| Local.from_local_datetime(&midnight).earliest())
        .map_or(now_ms, |midnight| midnight.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::PomodoroConfig;

    fn entry(phase: Phase, started_at: i64, ended_at: i64, queue: Option<&str>) -> PomodoroHistoryEntry {
        PomodoroHistoryEntry {
            id: format!("{phase}-{started_at}"),
            phase,
            title: phase.label().into(),
            started_at,
            ended_at,
            duration_ms: ended_at - started_at,
            queue_id: queue.map(str::to_string),
        }
    }

    #[test]
    fn for_phase_clips_negative_duration() {
        let mut state = PomodoroState::idle(PomodoroConfig::default());
        state.phase = Phase::Focus;
        state.running = true;
        state.started_at = Some(1_000);
        let e = PomodoroHistoryEntry::for_phase(&state, 500, None).unwrap();
        assert_eq!(e.duration_ms, 0);
        assert_eq!(e.title, "Focus");
    }

    #[test]
    fn for_phase_skips_idle() {
        let state = PomodoroState::default();
        assert!(PomodoroHistoryEntry::for_phase(&state, 10, None).is_none());
    }

    #[test]
    fn summarize_counts_by_kind() {
        let entries = vec![
            entry(Phase::Focus, 0, 100, Some("a")),
            entry(Phase::Short, 100, 130, Some("a")),
            entry(Phase::Focus, 200, 300, Some("b")),
            entry(Phase::Long, 300, 400, None),
        ];
        let all = summarize(&entries, None);
        assert_eq!(all.entries, 4);
        assert_eq!(all.focus_sessions, 2);
        assert_eq!(all.focus_ms, 200);
        assert_eq!(all.break_ms, 130);
        assert_eq!(all.queues, 2);

        let recent = summarize(&entries, Some(300));
        assert_eq!(recent.entries, 2);
        assert_eq!(recent.focus_sessions, 1);
    }

    #[test]
    fn for_queue_filters_and_sorts_newest_first() {
        let entries = vec![
            entry(Phase::Focus, 0, 100, Some("a")),
            entry(Phase::Short, 100, 130, Some("a")),
            entry(Phase::Focus, 200, 300, Some("b")),
        ];
        let list = for_queue(&entries, "a");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].ended_at, 130);
    }
}
