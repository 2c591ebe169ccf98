//! Strict-break enforcement.
//!
//! The kernel never talks to a browser directly. It drives a
//! [`BrowserSurface`], which the native host implements by forwarding calls
//! to the extension and tests implement with [`SimulatedBrowser`].

mod kernel;
mod page;
mod retry;
mod simulated;

pub use kernel::StrictBreakKernel;
pub use page::{BreakPage, PageKind};
pub use retry::{with_retry, RetryPolicy};
pub use simulated::{BrowserCall, SimulatedBrowser};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::BrowserError;

pub type TabId = i64;
pub type WindowId = i64;

/// A browser tab as reported by the extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: TabId,
    pub window_id: WindowId,
    /// Missing for tabs the extension cannot see into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub active: bool,
}

/// Properties to change on an existing tab.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl TabUpdate {
    pub fn activate() -> Self {
        Self {
            active: Some(true),
            url: None,
        }
    }

    pub fn navigate(url: impl Into<String>) -> Self {
        Self {
            active: None,
            url: Some(url.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabStatus {
    Loading,
    Complete,
}

/// What changed in a `tab updated` notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TabStatus>,
}

/// Tab and window events forwarded by the extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum BrowserEvent {
    TabActivated {
        tab_id: TabId,
        window_id: WindowId,
    },
    /// `window_id` is absent when focus left the browser entirely.
    WindowFocusChanged {
        #[serde(default)]
        window_id: Option<WindowId>,
    },
    TabUpdated {
        tab_id: TabId,
        change: TabChange,
        tab: Tab,
    },
    TabCreated {
        tab: Tab,
    },
    /// Same-document navigation through the History API.
    HistoryStateUpdated {
        tab_id: TabId,
        frame_id: i64,
        url: String,
    },
    TabRemoved {
        tab_id: TabId,
        #[serde(default)]
        window_id: Option<WindowId>,
    },
}

/// The tab and window operations enforcement needs.
///
/// Implementations are driven from a single-threaded host, so the returned
/// futures need not be `Send`.
#[allow(async_fn_in_trait)]
pub trait BrowserSurface {
    async fn get_tab(&self, tab_id: TabId) -> Result<Tab, BrowserError>;

    /// Tabs in one window, or in every window when `window_id` is `None`.
    async fn query_tabs(&self, window_id: Option<WindowId>) -> Result<Vec<Tab>, BrowserError>;

    async fn all_windows(&self) -> Result<Vec<WindowId>, BrowserError>;

    async fn current_window(&self) -> Result<WindowId, BrowserError>;

    async fn update_tab(&self, tab_id: TabId, update: TabUpdate) -> Result<(), BrowserError>;

    async fn create_tab(
        &self,
        window_id: WindowId,
        url: &str,
        active: bool,
    ) -> Result<Tab, BrowserError>;

    async fn remove_tabs(&self, tab_ids: &[TabId]) -> Result<(), BrowserError>;

    /// Run the break overlay content script in a tab.
    async fn inject_overlay(&self, tab_id: TabId) -> Result<(), BrowserError>;
}

impl<T: BrowserSurface + ?Sized> BrowserSurface for &T {
    async fn get_tab(&self, tab_id: TabId) -> Result<Tab, BrowserError> {
        (**self).get_tab(tab_id).await
    }
    async fn query_tabs(&self, window_id: Option<WindowId>) -> Result<Vec<Tab>, BrowserError> {
        (**self).query_tabs(window_id).await
    }
    async fn all_windows(&self) -> Result<Vec<WindowId>, BrowserError> {
        (**self).all_windows().await
    }
    async fn current_window(&self) -> Result<WindowId, BrowserError> {
        (**self).current_window().await
    }
    async fn update_tab(&self, tab_id: TabId, update: TabUpdate) -> Result<(), BrowserError> {
        (**self).update_tab(tab_id, update).await
    }
    async fn create_tab(
        &self,
        window_id: WindowId,
        url: &str,
        active: bool,
    ) -> Result<Tab, BrowserError> {
        (**self).create_tab(window_id, url, active).await
    }
    async fn remove_tabs(&self, tab_ids: &[TabId]) -> Result<(), BrowserError> {
        (**self).remove_tabs(tab_ids).await
    }
    async fn inject_overlay(&self, tab_id: TabId) -> Result<(), BrowserError> {
        (**self).inject_overlay(tab_id).await
    }
}

impl<T: BrowserSurface + ?Sized> BrowserSurface for Arc<T> {
    async fn get_tab(&self, tab_id: TabId) -> Result<Tab, BrowserError> {
        (**self).get_tab(tab_id).await
    }
    async fn query_tabs(&self, window_id: Option<WindowId>) -> Result<Vec<Tab>, BrowserError> {
        (**self).query_tabs(window_id).await
    }
    async fn all_windows(&self) -> Result<Vec<WindowId>, BrowserError> {
        (**self).all_windows().await
    }
    async fn current_window(&self) -> Result<WindowId, BrowserError> {
        (**self).current_window().await
    }
    async fn update_tab(&self, tab_id: TabId, update: TabUpdate) -> Result<(), BrowserError> {
        (**self).update_tab(tab_id, update).await
    }
    async fn create_tab(
        &self,
        window_id: WindowId,
        url: &str,
        active: bool,
    ) -> Result<Tab, BrowserError> {
        (**self).create_tab(window_id, url, active).await
    }
    async fn remove_tabs(&self, tab_ids: &[TabId]) -> Result<(), BrowserError> {
        (**self).remove_tabs(tab_ids).await
    }
    async fn inject_overlay(&self, tab_id: TabId) -> Result<(), BrowserError> {
        (**self).inject_overlay(tab_id).await
    }
}

/// Surface used when no extension is attached. Sees no windows, so every
/// enforcement operation does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBrowser;

impl BrowserSurface for NoBrowser {
    async fn get_tab(&self, tab_id: TabId) -> Result<Tab, BrowserError> {
        Err(BrowserError::NoSuchTab(tab_id))
    }
    async fn query_tabs(&self, _window_id: Option<WindowId>) -> Result<Vec<Tab>, BrowserError> {
        Ok(Vec::new())
    }
    async fn all_windows(&self) -> Result<Vec<WindowId>, BrowserError> {
        Ok(Vec::new())
    }
    async fn current_window(&self) -> Result<WindowId, BrowserError> {
        Err(BrowserError::NoSuchWindow("no browser attached".into()))
    }
    async fn update_tab(&self, _tab_id: TabId, _update: TabUpdate) -> Result<(), BrowserError> {
        Err(BrowserError::Disconnected)
    }
    async fn create_tab(
        &self,
        _window_id: WindowId,
        _url: &str,
        _active: bool,
    ) -> Result<Tab, BrowserError> {
        Err(BrowserError::Disconnected)
    }
    async fn remove_tabs(&self, _tab_ids: &[TabId]) -> Result<(), BrowserError> {
        Ok(())
    }
    async fn inject_overlay(&self, _tab_id: TabId) -> Result<(), BrowserError> {
        Err(BrowserError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_event_wire_shape() {
        let event: BrowserEvent = serde_json::from_str(
            r#"{"type":"tabUpdated","tabId":7,"change":{"status":"complete"},
                "tab":{"id":7,"windowId":1,"url":"https://example.com","active":true}}"#,
        )
        .unwrap();
        match event {
            BrowserEvent::TabUpdated { tab_id, change, tab } => {
                assert_eq!(tab_id, 7);
                assert_eq!(change.status, Some(TabStatus::Complete));
                assert!(tab.active);
            }
            other => panic!("unexpected event {other:?}"),
        }

        let focus: BrowserEvent =
            serde_json::from_str(r#"{"type":"windowFocusChanged"}"#).unwrap();
        assert_eq!(focus, BrowserEvent::WindowFocusChanged { window_id: None });
    }

    #[test]
    fn tab_update_omits_unset_fields() {
        let json = serde_json::to_value(TabUpdate::activate()).unwrap();
        assert_eq!(json, serde_json::json!({ "active": true }));
    }
}
