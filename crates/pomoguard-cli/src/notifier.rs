use notify_rust::Notification;
use pomoguard_core::error::NotifyError;
use pomoguard_core::notify::{Notifier, PhaseNotification};

/// Shows phase notifications through the desktop notification service.
///
/// Buttons are only actionable from the extension; the desktop toast
/// carries the title and message.
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn notify(&self, notification: &PhaseNotification) -> Result<(), NotifyError> {
        Notification::new()
            .appname("pomoguard")
            .summary(&notification.title)
            .body(&notification.message)
            .show()
            .map(|_| ())
            .map_err(|e| NotifyError(e.to_string()))
    }
}
