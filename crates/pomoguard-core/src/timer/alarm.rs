//! Single-slot wake-up scheduling.
//!
//! The scheduler keeps at most one pending phase alarm. Backends only need
//! to store named one-shot alarms; hosts poll [`AlarmScheduler::next_fire_at`]
//! and drain [`AlarmScheduler::take_due`] to fire them.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::phase::PomodoroState;
use crate::error::StoreError;

/// Name of the alarm that ends the current phase.
pub const PHASE_ALARM: &str = "pomodoro-phase-end";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    pub name: String,
    /// Epoch milliseconds.
    pub when: i64,
}

/// Storage for named one-shot alarms. Creating an alarm replaces any alarm
/// with the same name.
pub trait AlarmSlot {
    fn create(&self, alarm: Alarm) -> Result<(), StoreError>;

    /// Returns whether an alarm was removed.
    fn clear(&self, name: &str) -> Result<bool, StoreError>;

    fn get(&self, name: &str) -> Result<Option<Alarm>, StoreError>;

    fn all(&self) -> Result<Vec<Alarm>, StoreError>;
}

impl<T: AlarmSlot + ?Sized> AlarmSlot for &T {
    fn create(&self, alarm: Alarm) -> Result<(), StoreError> {
        (**self).create(alarm)
    }
    fn clear(&self, name: &str) -> Result<bool, StoreError> {
        (**self).clear(name)
    }
    fn get(&self, name: &str) -> Result<Option<Alarm>, StoreError> {
        (**self).get(name)
    }
    fn all(&self) -> Result<Vec<Alarm>, StoreError> {
        (**self).all()
    }
}

impl<T: AlarmSlot + ?Sized> AlarmSlot for Arc<T> {
    fn create(&self, alarm: Alarm) -> Result<(), StoreError> {
        (**self).create(alarm)
    }
    fn clear(&self, name: &str) -> Result<bool, StoreError> {
        (**self).clear(name)
    }
    fn get(&self, name: &str) -> Result<Option<Alarm>, StoreError> {
        (**self).get(name)
    }
    fn all(&self) -> Result<Vec<Alarm>, StoreError> {
        (**self).all()
    }
}

/// In-process alarm table.
#[derive(Debug, Default)]
pub struct MemoryAlarms {
    alarms: Mutex<BTreeMap<String, i64>>,
}

impl MemoryAlarms {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, i64>> {
        self.alarms.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl AlarmSlot for MemoryAlarms {
    fn create(&self, alarm: Alarm) -> Result<(), StoreError> {
        self.table().insert(alarm.name, alarm.when);
        Ok(())
    }

    fn clear(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.table().remove(name).is_some())
    }

    fn get(&self, name: &str) -> Result<Option<Alarm>, StoreError> {
        Ok(self.table().get(name).map(|&when| Alarm {
            name: name.to_string(),
            when,
        }))
    }

    fn all(&self) -> Result<Vec<Alarm>, StoreError> {
        Ok(self
            .table()
            .iter()
            .map(|(name, &when)| Alarm {
                name: name.clone(),
                when,
            })
            .collect())
    }
}

/// Keeps the phase alarm in step with the persisted state.
#[derive(Debug)]
pub struct AlarmScheduler<A> {
    slot: A,
}

impl<A: AlarmSlot> AlarmScheduler<A> {
    pub fn new(slot: A) -> Self {
        Self { slot }
    }

    pub fn slot(&self) -> &A {
        &self.slot
    }

    /// Clear the phase alarm, then arm it at `endsAt` when the state is
    /// running, unpaused and has an end time.
    pub fn reschedule(&self, state: &PomodoroState) -> Result<Option<Alarm>, StoreError> {
        self.slot.clear(PHASE_ALARM)?;
        match state.ends_at {
            Some(when) if state.running && !state.paused => {
                let alarm = Alarm {
                    name: PHASE_ALARM.to_string(),
                    when,
                };
                self.slot.create(alarm.clone())?;
                tracing::debug!(when, "phase alarm armed");
                Ok(Some(alarm))
            }
            _ => Ok(None),
        }
    }

    pub fn cancel(&self) -> Result<(), StoreError> {
        if self.slot.clear(PHASE_ALARM)? {
            tracing::debug!("phase alarm cancelled");
        }
        Ok(())
    }

    pub fn pending(&self) -> Result<Option<Alarm>, StoreError> {
        self.slot.get(PHASE_ALARM)
    }

    /// Earliest pending alarm time, if any.
    pub fn next_fire_at(&self) -> Result<Option<i64>, StoreError> {
        Ok(self.slot.all()?.into_iter().map(|a| a.when).min())
    }

    /// Remove and return every alarm due at `now`, earliest first.
    pub fn take_due(&self, now: i64) -> Result<Vec<Alarm>, StoreError> {
        let mut due: Vec<Alarm> = self
            .slot
            .all()?
            .into_iter()
            .filter(|a| a.when <= now)
            .collect();
        due.sort_by_key(|a| a.when);
        for alarm in &due {
            self.slot.clear(&alarm.name)?;
        }
        Ok(due)
    }
}
