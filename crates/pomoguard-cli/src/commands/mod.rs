pub mod config;
pub mod history;
pub mod host;
pub mod timer;

use std::sync::Arc;

use pomoguard_core::notify::{Notifier, NullNotifier};
use pomoguard_core::{AppConfig, BrowserSurface, Clock, StrictBreakKernel, SystemClock};

use crate::notifier::DesktopNotifier;

/// Flags shared by every subcommand.
#[derive(Debug, Default, Clone)]
pub struct GlobalOpts {
    pub no_notify: bool,
}

impl GlobalOpts {
    /// Desktop notifier when enabled in config and not suppressed.
    pub fn notifier(&self, config: &AppConfig) -> Box<dyn Notifier> {
        if config.notifications.desktop && !self.no_notify {
            Box::new(DesktopNotifier)
        } else {
            Box::new(NullNotifier)
        }
    }
}

pub fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

pub fn kernel<B: BrowserSurface>(config: &AppConfig, browser: B) -> StrictBreakKernel<B> {
    StrictBreakKernel::new(
        browser,
        config.break_page(),
        config.retry_policy(),
        system_clock(),
    )
}

pub fn current_thread_runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}
