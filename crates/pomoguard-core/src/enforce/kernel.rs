//! Keeps the user on the break page while a strict break runs.
//!
//! Every entry point re-reads the persisted state to decide whether
//! enforcement applies, so the kernel carries no phase of its own. The only
//! memory it keeps is which tab it opened as the break page in each window.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::page::is_http_page;
use super::{
    with_retry, BreakPage, BrowserEvent, BrowserSurface, RetryPolicy, Tab, TabChange, TabId,
    TabStatus, TabUpdate, WindowId,
};
use crate::error::BrowserError;
use crate::storage::{records, StateStore};
use crate::timer::Clock;

pub struct StrictBreakKernel<B> {
    browser: B,
    page: BreakPage,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
    break_tabs: Mutex<HashMap<WindowId, TabId>>,
    installed: AtomicBool,
}

impl<B: BrowserSurface> StrictBreakKernel<B> {
    pub fn new(browser: B, page: BreakPage, retry: RetryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            browser,
            page,
            retry,
            clock,
            break_tabs: Mutex::new(HashMap::new()),
            installed: AtomicBool::new(false),
        }
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    pub fn break_page(&self) -> &BreakPage {
        &self.page
    }

    /// Start reacting to browser events. Returns `false` if already installed.
    pub fn install(&self) -> bool {
        let first = self
            .installed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if first {
            tracing::debug!("strict break listeners installed");
        }
        first
    }

    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }

    /// Break tab remembered for a window.
    pub fn remembered_tab(&self, window_id: WindowId) -> Option<TabId> {
        self.tabs().get(&window_id).copied()
    }

    fn tabs(&self) -> MutexGuard<'_, HashMap<WindowId, TabId>> {
        self.break_tabs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Strict mode is on and a break is running. Unreadable state counts as
    /// "no".
    pub fn should_enforce<S: StateStore + ?Sized>(&self, store: &S) -> bool {
        match records::load_state(store) {
            Ok(state) => state.should_enforce(),
            Err(e) => {
                tracing::warn!(error = %e, "cannot read timer state, not enforcing");
                false
            }
        }
    }

    /// Pull every window back to its break tab.
    pub async fn begin_strict_break<S: StateStore + ?Sized>(&self, store: &S) {
        if !self.should_enforce(store) {
            return;
        }
        let windows = match self.browser.all_windows().await {
            Ok(windows) => windows,
            Err(e) => {
                tracing::warn!(error = %e, "cannot list windows");
                return;
            }
        };
        tracing::info!(windows = windows.len(), "strict break started");
        for window_id in windows {
            self.focus_break_tab(store, Some(window_id)).await;
        }
    }

    /// Close every break page in every window and forget the bookkeeping.
    pub async fn end_strict_break(&self) {
        match self.browser.query_tabs(None).await {
            Ok(tabs) => {
                let ids: Vec<TabId> = tabs
                    .iter()
                    .filter(|t| self.page.is_break_page(t.url.as_deref()))
                    .map(|t| t.id)
                    .collect();
                if !ids.is_empty() {
                    match self.browser.remove_tabs(&ids).await {
                        Ok(()) => tracing::info!(closed = ids.len(), "break pages closed"),
                        Err(e) => tracing::warn!(error = %e, "failed to close break pages"),
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "cannot list tabs"),
        }
        self.tabs().clear();
    }

    /// Inject the break overlay into every open http(s) tab. One tab failing
    /// does not stop the rest. Returns how many injections succeeded.
    pub async fn show_overlay_on_all_open_tabs(&self) -> usize {
        let tabs = match self.browser.query_tabs(None).await {
            Ok(tabs) => tabs,
            Err(e) => {
                tracing::warn!(error = %e, "cannot list tabs for overlay");
                return 0;
            }
        };
        let mut shown = 0;
        for tab in tabs.iter().filter(|t| is_http_page(t.url.as_deref())) {
            match self.browser.inject_overlay(tab.id).await {
                Ok(()) => shown += 1,
                Err(e) => tracing::warn!(tab_id = tab.id, error = %e, "overlay injection failed"),
            }
        }
        shown
    }

    /// Activate the break tab of `window_id` (the current window when
    /// `None`), creating it if needed. Failures are logged.
    pub async fn focus_break_tab<S: StateStore + ?Sized>(
        &self,
        store: &S,
        window_id: Option<WindowId>,
    ) -> Option<TabId> {
        match self.try_focus_break_tab(window_id).await {
            Ok(tab_id) => {
                if let Err(e) = records::mark_break_forced(store, self.clock.now_ms()) {
                    tracing::warn!(error = %e, "failed to record pull-back time");
                }
                Some(tab_id)
            }
            Err(e) => {
                tracing::warn!(?window_id, error = %e, "failed to focus break tab");
                None
            }
        }
    }

    async fn try_focus_break_tab(&self, window_id: Option<WindowId>) -> Result<TabId, BrowserError> {
        let window_id = match window_id {
            Some(id) => id,
            None => self.browser.current_window().await?,
        };

        if let Some(recorded) = self.remembered_tab(window_id) {
            match self.update(recorded, TabUpdate::activate()).await {
                Ok(()) => return Ok(recorded),
                Err(e) => {
                    tracing::debug!(window_id, tab_id = recorded, error = %e, "remembered break tab gone");
                    self.tabs().remove(&window_id);
                }
            }
        }

        let existing = self
            .browser
            .query_tabs(Some(window_id))
            .await?
            .into_iter()
            .find(|t| self.page.is_break_page(t.url.as_deref()));
        let tab_id = match existing {
            Some(tab) => tab.id,
            None => self.create_break_tab(window_id).await?.id,
        };
        self.tabs().insert(window_id, tab_id);
        self.update(tab_id, TabUpdate::activate()).await?;
        tracing::info!(window_id, tab_id, "pulled back to break page");
        Ok(tab_id)
    }

    async fn update(&self, tab_id: TabId, update: TabUpdate) -> Result<(), BrowserError> {
        with_retry(&self.retry, BrowserError::is_transient, || {
            self.browser.update_tab(tab_id, update.clone())
        })
        .await
    }

    async fn create_break_tab(&self, window_id: WindowId) -> Result<Tab, BrowserError> {
        with_retry(&self.retry, BrowserError::is_transient, || {
            self.browser.create_tab(window_id, self.page.url(), true)
        })
        .await
    }

    /// React to one browser event. Ignored until [`install`](Self::install)
    /// has been called.
    pub async fn handle_event<S: StateStore + ?Sized>(&self, store: &S, event: &BrowserEvent) {
        if !self.is_installed() {
            return;
        }
        match event {
            BrowserEvent::TabActivated { tab_id, window_id } => {
                self.on_tab_activated(store, *tab_id, *window_id).await
            }
            BrowserEvent::WindowFocusChanged { window_id } => {
                let Some(window_id) = window_id else {
                    return;
                };
                if self.should_enforce(store) {
                    self.focus_break_tab(store, Some(*window_id)).await;
                }
            }
            BrowserEvent::TabUpdated { tab_id, change, tab } => {
                self.on_tab_updated(store, *tab_id, change, tab).await
            }
            BrowserEvent::TabCreated { tab } => {
                if !self.should_enforce(store) || self.page.is_exempt(tab.url.as_deref()) {
                    return;
                }
                if tab.active {
                    self.focus_break_tab(store, Some(tab.window_id)).await;
                }
            }
            BrowserEvent::HistoryStateUpdated {
                tab_id,
                frame_id,
                url,
            } => {
                if *frame_id != 0 || !self.should_enforce(store) || self.page.is_exempt(Some(url))
                {
                    return;
                }
                match self.browser.get_tab(*tab_id).await {
                    Ok(tab) if tab.active => {
                        self.focus_break_tab(store, Some(tab.window_id)).await;
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(tab_id, error = %e, "cannot fetch navigated tab"),
                }
            }
            BrowserEvent::TabRemoved { tab_id, .. } => {
                self.tabs().retain(|_, remembered| remembered != tab_id);
            }
        }
    }

    async fn on_tab_activated<S: StateStore + ?Sized>(
        &self,
        store: &S,
        tab_id: TabId,
        window_id: WindowId,
    ) {
        if !self.should_enforce(store) {
            return;
        }
        let tab = match self.browser.get_tab(tab_id).await {
            Ok(tab) => tab,
            Err(e) => {
                tracing::debug!(tab_id, error = %e, "activated tab vanished");
                return;
            }
        };
        if self.page.is_exempt(tab.url.as_deref()) {
            return;
        }
        self.focus_break_tab(store, Some(window_id)).await;
    }

    async fn on_tab_updated<S: StateStore + ?Sized>(
        &self,
        store: &S,
        tab_id: TabId,
        change: &TabChange,
        tab: &Tab,
    ) {
        if !self.should_enforce(store) {
            return;
        }

        // The user typed a new address into the break tab itself: send it
        // back instead of closing it.
        if self.remembered_tab(tab.window_id) == Some(tab_id) {
            if let Some(url) = change.url.as_deref() {
                if !self.page.is_break_page(Some(url)) {
                    match self
                        .update(tab_id, TabUpdate::navigate(self.page.url()))
                        .await
                    {
                        Ok(()) => tracing::info!(tab_id, "break tab navigated back"),
                        Err(e) => tracing::warn!(tab_id, error = %e, "failed to restore break tab"),
                    }
                }
            }
            return;
        }

        if self.page.is_exempt(tab.url.as_deref()) {
            return;
        }
        if change.status == Some(TabStatus::Complete) && tab.active {
            self.focus_break_tab(store, Some(tab.window_id)).await;
        }
    }
}
