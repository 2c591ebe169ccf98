//! Phase-start notifications.
//!
//! Content and gating live here; delivery is behind [`Notifier`] so the CLI
//! can use desktop notifications while tests record what would be shown.

use std::sync::Mutex;

use crate::error::NotifyError;
use crate::timer::{Phase, PomodoroConfig};

/// What a notification button asks the session to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    Pause,
    Skip,
    Stop,
}

/// Buttons shown for a phase, in index order.
pub fn buttons_for(phase: Phase) -> &'static [NotificationAction] {
    match phase {
        Phase::Focus => &[NotificationAction::Pause, NotificationAction::Stop],
        Phase::Short | Phase::Long => &[NotificationAction::Skip, NotificationAction::Stop],
        Phase::Idle => &[],
    }
}

/// Map a clicked button back to its action.
pub fn button_action(phase: Phase, index: usize) -> Option<NotificationAction> {
    buttons_for(phase).get(index).copied()
}

/// Focus always notifies; breaks only when break notifications are on.
pub fn should_notify(phase: Phase, config: &PomodoroConfig) -> bool {
    match phase {
        Phase::Focus => true,
        Phase::Short | Phase::Long => config.enable_break_notifications,
        Phase::Idle => false,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseNotification {
    /// `pomodoro-<phase>-<ms>`
    pub id: String,
    pub phase: Phase,
    pub title: String,
    pub message: String,
    pub buttons: Vec<NotificationAction>,
    /// 0 (low) to 2 (high). Breaks outrank focus.
    pub priority: u8,
}

impl PhaseNotification {
    /// Notification announcing `phase`, or `None` when it should not be shown.
    pub fn for_phase(phase: Phase, config: &PomodoroConfig, now_ms: i64) -> Option<Self> {
        if !should_notify(phase, config) {
            return None;
        }
        let (title, message, priority) = match phase {
            Phase::Focus => (
                "Focus time".to_string(),
                "Time to focus. Close the distractions and get going.".to_string(),
                1,
            ),
            Phase::Short => (
                "Short break".to_string(),
                format!("Take a {} minute break.", config.short_min),
                2,
            ),
            Phase::Long => (
                "Long break".to_string(),
                format!("Well done. Take a {} minute break.", config.long_min),
                2,
            ),
            Phase::Idle => return None,
        };
        Some(Self {
            id: format!("pomodoro-{phase}-{now_ms}"),
            phase,
            title,
            message,
            buttons: buttons_for(phase).to_vec(),
            priority,
        })
    }
}

/// Delivery backend. Failures are logged by the caller and never abort a
/// timer operation.
pub trait Notifier {
    fn notify(&self, notification: &PhaseNotification) -> Result<(), NotifyError>;
}

/// Drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _notification: &PhaseNotification) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<PhaseNotification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<PhaseNotification> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notification: &PhaseNotification) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notification.clone());
        Ok(())
    }
}

impl<T: Notifier + ?Sized> Notifier for std::sync::Arc<T> {
    fn notify(&self, notification: &PhaseNotification) -> Result<(), NotifyError> {
        (**self).notify(notification)
    }
}
