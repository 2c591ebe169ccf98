mod alarm;
mod clock;
mod engine;
mod phase;

pub use alarm::{Alarm, AlarmScheduler, AlarmSlot, MemoryAlarms, PHASE_ALARM};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{advance, compute_next_phase};
pub use phase::{Phase, PomodoroConfig, PomodoroState};
