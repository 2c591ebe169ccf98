//! Persistent state store.
//!
//! All core components talk to storage through [`StateStore`], a small
//! key-value interface with change notification. Values are JSON strings so
//! the extension side can read the same records.

mod config;
pub mod database;
mod memory;
pub mod records;

pub use config::{
    update_pomodoro_field, AppConfig, EnforcementConfig, ExtensionConfig, LoggingConfig,
    NotificationsConfig,
};
pub use database::Database;
pub use memory::MemoryStore;

use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::StoreError;

/// Capacity of the change feed. Slow watchers see `Lagged` and re-read.
pub(crate) const WATCH_CAPACITY: usize = 64;

/// A key was written or removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub key: String,
}

/// Durable key-value store shared by every component.
///
/// No component holds data across an await: read, mutate a local copy,
/// write back. Last write wins.
pub trait StateStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set_raw(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Subscribe to changes made through this handle.
    fn watch(&self) -> broadcast::Receiver<StoreChange>;
}

impl<T: StateStore + ?Sized> StateStore for &T {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get_raw(key)
    }
    fn set_raw(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set_raw(key, value)
    }
    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
    fn watch(&self) -> broadcast::Receiver<StoreChange> {
        (**self).watch()
    }
}

impl<T: StateStore + ?Sized> StateStore for Arc<T> {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get_raw(key)
    }
    fn set_raw(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set_raw(key, value)
    }
    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
    fn watch(&self) -> broadcast::Receiver<StoreChange> {
        (**self).watch()
    }
}

/// Typed JSON access on top of [`StateStore`].
pub trait StateStoreExt: StateStore {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get_raw(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StoreError::Malformed {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value).map_err(|source| StoreError::Malformed {
            key: key.to_string(),
            source,
        })?;
        self.set_raw(key, &raw)
    }
}

impl<S: StateStore + ?Sized> StateStoreExt for S {}

/// Returns `~/.config/pomoguard[-dev]/` based on POMOGUARD_ENV.
///
/// Set POMOGUARD_ENV=dev to use development data directory.
/// POMOGUARD_HOME overrides the location entirely.
///
/// # Errors
/// Returns an error if creating the data directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let dir = match std::env::var_os("POMOGUARD_HOME") {
        Some(home) => PathBuf::from(home),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("POMOGUARD_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("pomoguard-dev")
            } else {
                base_dir.join("pomoguard")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
