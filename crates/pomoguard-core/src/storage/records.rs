//! Typed access to the well-known store keys.

use super::{StateStore, StateStoreExt};
use crate::error::StoreError;
use crate::history::{CurrentQueue, PomodoroHistoryEntry};
use crate::timer::{PomodoroConfig, PomodoroState};

pub const STATE_KEY: &str = "pomodoroState";
pub const HISTORY_KEY: &str = "pomodoroHistory";
pub const CURRENT_QUEUE_KEY: &str = "currentQueueId";
pub const BREAK_LAST_FORCED_AT_KEY: &str = "breakLastForcedAt";

/// Write an idle state with `defaults` unless one already exists.
///
/// Returns the state now in the store.
pub fn ensure_initial_state<S: StateStore + ?Sized>(
    store: &S,
    defaults: &PomodoroConfig,
) -> Result<PomodoroState, StoreError> {
    if let Some(state) = store.get_json::<PomodoroState>(STATE_KEY)? {
        return Ok(state);
    }
    let state = PomodoroState::idle(defaults.clone());
    store.set_json(STATE_KEY, &state)?;
    tracing::info!("initial timer state created");
    Ok(state)
}

/// Current timer state, or the default idle state when none was written yet.
pub fn load_state<S: StateStore + ?Sized>(store: &S) -> Result<PomodoroState, StoreError> {
    Ok(store
        .get_json::<PomodoroState>(STATE_KEY)?
        .unwrap_or_default())
}

pub fn save_state<S: StateStore + ?Sized>(
    store: &S,
    state: &PomodoroState,
) -> Result<(), StoreError> {
    store.set_json(STATE_KEY, state)
}

pub fn load_history<S: StateStore + ?Sized>(
    store: &S,
) -> Result<Vec<PomodoroHistoryEntry>, StoreError> {
    Ok(store
        .get_json::<Vec<PomodoroHistoryEntry>>(HISTORY_KEY)?
        .unwrap_or_default())
}

pub fn append_history<S: StateStore + ?Sized>(
    store: &S,
    entry: PomodoroHistoryEntry,
) -> Result<(), StoreError> {
    let mut list = load_history(store)?;
    list.push(entry);
    store.set_json(HISTORY_KEY, &list)
}

pub fn current_queue<S: StateStore + ?Sized>(
    store: &S,
) -> Result<Option<CurrentQueue>, StoreError> {
    // Stored as JSON null after a stop by older writers.
    Ok(store
        .get_json::<Option<CurrentQueue>>(CURRENT_QUEUE_KEY)?
        .flatten())
}

pub fn set_current_queue<S: StateStore + ?Sized>(
    store: &S,
    queue: &CurrentQueue,
) -> Result<(), StoreError> {
    store.set_json(CURRENT_QUEUE_KEY, queue)
}

pub fn clear_current_queue<S: StateStore + ?Sized>(store: &S) -> Result<(), StoreError> {
    store.remove(CURRENT_QUEUE_KEY)
}

pub fn break_last_forced_at<S: StateStore + ?Sized>(store: &S) -> Result<Option<i64>, StoreError> {
    store.get_json(BREAK_LAST_FORCED_AT_KEY)
}

pub fn mark_break_forced<S: StateStore + ?Sized>(store: &S, at: i64) -> Result<(), StoreError> {
    store.set_json(BREAK_LAST_FORCED_AT_KEY, &at)
}
