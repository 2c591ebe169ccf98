use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use super::{BrowserSurface, Tab, TabId, TabUpdate, WindowId};
use crate::error::BrowserError;

/// A mutating call received by [`SimulatedBrowser`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserCall {
    Update { tab_id: TabId, update: TabUpdate },
    Create { window_id: WindowId, url: String, active: bool },
    Remove { tab_ids: Vec<TabId> },
    InjectOverlay { tab_id: TabId },
}

#[derive(Debug, Default)]
struct Windows {
    tabs: Vec<Tab>,
    windows: Vec<WindowId>,
    current: Option<WindowId>,
    next_tab_id: TabId,
    busy_updates: u32,
    busy_creates: u32,
    failing_overlays: HashSet<TabId>,
    calls: Vec<BrowserCall>,
}

impl Windows {
    fn ensure_window(&mut self, window_id: WindowId) {
        if !self.windows.contains(&window_id) {
            self.windows.push(window_id);
        }
        self.current.get_or_insert(window_id);
    }

    fn activate(&mut self, tab_id: TabId) -> Result<(), BrowserError> {
        let window_id = self
            .tabs
            .iter()
            .find(|t| t.id == tab_id)
            .map(|t| t.window_id)
            .ok_or(BrowserError::NoSuchTab(tab_id))?;
        for tab in self.tabs.iter_mut().filter(|t| t.window_id == window_id) {
            tab.active = tab.id == tab_id;
        }
        Ok(())
    }
}

/// In-process model of browser windows and tabs.
///
/// Records every mutating call so tests can assert what enforcement did,
/// and can be told to fail with the browser's busy error or refuse overlay
/// injection.
#[derive(Debug, Default)]
pub struct SimulatedBrowser {
    inner: Mutex<Windows>,
}

impl SimulatedBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Windows> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn open_window(&self, window_id: WindowId) {
        self.lock().ensure_window(window_id);
    }

    /// Open a tab as the user would. Not recorded as a call.
    pub fn open_tab(&self, window_id: WindowId, url: &str, active: bool) -> Tab {
        let mut w = self.lock();
        w.ensure_window(window_id);
        w.next_tab_id += 1;
        let tab = Tab {
            id: w.next_tab_id,
            window_id,
            url: Some(url.to_string()),
            active: false,
        };
        w.tabs.push(tab.clone());
        if active {
            let _ = w.activate(tab.id);
        }
        w.tabs
            .iter()
            .find(|t| t.id == tab.id)
            .cloned()
            .unwrap_or(tab)
    }

    /// Change a tab's URL as the user would. Not recorded as a call.
    pub fn navigate(&self, tab_id: TabId, url: &str) {
        if let Some(tab) = self.lock().tabs.iter_mut().find(|t| t.id == tab_id) {
            tab.url = Some(url.to_string());
        }
    }

    pub fn focus_window(&self, window_id: WindowId) {
        let mut w = self.lock();
        w.ensure_window(window_id);
        w.current = Some(window_id);
    }

    pub fn tabs(&self) -> Vec<Tab> {
        self.lock().tabs.clone()
    }

    pub fn active_tab(&self, window_id: WindowId) -> Option<Tab> {
        self.lock()
            .tabs
            .iter()
            .find(|t| t.window_id == window_id && t.active)
            .cloned()
    }

    /// Make the next `n` tab updates fail as if the user were dragging a tab.
    pub fn fail_next_updates(&self, n: u32) {
        self.lock().busy_updates = n;
    }

    /// Make the next `n` tab creations fail with the busy error.
    pub fn fail_next_creates(&self, n: u32) {
        self.lock().busy_creates = n;
    }

    pub fn fail_overlay_for(&self, tab_id: TabId) {
        self.lock().failing_overlays.insert(tab_id);
    }

    pub fn calls(&self) -> Vec<BrowserCall> {
        self.lock().calls.clone()
    }

    pub fn take_calls(&self) -> Vec<BrowserCall> {
        std::mem::take(&mut self.lock().calls)
    }
}

impl BrowserSurface for SimulatedBrowser {
    async fn get_tab(&self, tab_id: TabId) -> Result<Tab, BrowserError> {
        self.lock()
            .tabs
            .iter()
            .find(|t| t.id == tab_id)
            .cloned()
            .ok_or(BrowserError::NoSuchTab(tab_id))
    }

    async fn query_tabs(&self, window_id: Option<WindowId>) -> Result<Vec<Tab>, BrowserError> {
        Ok(self
            .lock()
            .tabs
            .iter()
            .filter(|t| window_id.map_or(true, |w| t.window_id == w))
            .cloned()
            .collect())
    }

    async fn all_windows(&self) -> Result<Vec<WindowId>, BrowserError> {
        Ok(self.lock().windows.clone())
    }

    async fn current_window(&self) -> Result<WindowId, BrowserError> {
        self.lock()
            .current
            .ok_or_else(|| BrowserError::NoSuchWindow("no current window".into()))
    }

    async fn update_tab(&self, tab_id: TabId, update: TabUpdate) -> Result<(), BrowserError> {
        let mut w = self.lock();
        w.calls.push(BrowserCall::Update {
            tab_id,
            update: update.clone(),
        });
        if w.busy_updates > 0 {
            w.busy_updates -= 1;
            return Err(BrowserError::from_message(
                "Tabs cannot be edited right now (user may be dragging a tab).",
            ));
        }
        let tab = w
            .tabs
            .iter_mut()
            .find(|t| t.id == tab_id)
            .ok_or(BrowserError::NoSuchTab(tab_id))?;
        if let Some(url) = update.url {
            tab.url = Some(url);
        }
        if update.active == Some(true) {
            w.activate(tab_id)?;
        }
        Ok(())
    }

    async fn create_tab(
        &self,
        window_id: WindowId,
        url: &str,
        active: bool,
    ) -> Result<Tab, BrowserError> {
        let mut w = self.lock();
        w.calls.push(BrowserCall::Create {
            window_id,
            url: url.to_string(),
            active,
        });
        if w.busy_creates > 0 {
            w.busy_creates -= 1;
            return Err(BrowserError::from_message(
                "Tabs cannot be edited right now (user may be dragging a tab).",
            ));
        }
        if !w.windows.contains(&window_id) {
            return Err(BrowserError::NoSuchWindow(window_id.to_string()));
        }
        w.next_tab_id += 1;
        let tab = Tab {
            id: w.next_tab_id,
            window_id,
            url: Some(url.to_string()),
            active: false,
        };
        w.tabs.push(tab.clone());
        if active {
            w.activate(tab.id)?;
        }
        Ok(Tab { active, ..tab })
    }

    async fn remove_tabs(&self, tab_ids: &[TabId]) -> Result<(), BrowserError> {
        let mut w = self.lock();
        w.calls.push(BrowserCall::Remove {
            tab_ids: tab_ids.to_vec(),
        });
        w.tabs.retain(|t| !tab_ids.contains(&t.id));
        Ok(())
    }

    async fn inject_overlay(&self, tab_id: TabId) -> Result<(), BrowserError> {
        let mut w = self.lock();
        w.calls.push(BrowserCall::InjectOverlay { tab_id });
        if w.failing_overlays.contains(&tab_id) {
            return Err(BrowserError::Api(format!(
                "Cannot access contents of tab {tab_id}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn activation_is_exclusive_per_window() {
        let browser = SimulatedBrowser::new();
        let a = browser.open_tab(1, "https://a.example", true);
        let b = browser.open_tab(1, "https://b.example", false);
        let other = browser.open_tab(2, "https://c.example", true);

        browser.update_tab(b.id, TabUpdate::activate()).await.unwrap();
        assert_eq!(browser.active_tab(1).map(|t| t.id), Some(b.id));
        assert!(!browser.get_tab(a.id).await.unwrap().active);
        assert!(browser.get_tab(other.id).await.unwrap().active);
    }

    #[tokio::test]
    async fn busy_updates_fail_then_recover() {
        let browser = SimulatedBrowser::new();
        let tab = browser.open_tab(1, "https://a.example", false);
        browser.fail_next_updates(1);
        let err = browser
            .update_tab(tab.id, TabUpdate::activate())
            .await
            .unwrap_err();
        assert!(err.is_transient());
        browser.update_tab(tab.id, TabUpdate::activate()).await.unwrap();
        assert_eq!(browser.calls().len(), 2);
    }
}
