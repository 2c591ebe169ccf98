//! Core error types for pomoguard-core.
//!
//! Store and validation failures propagate to callers. Browser and
//! notification failures are classified here but are logged and swallowed
//! by the components that produce them.

use std::path::PathBuf;
use thiserror::Error;

use crate::enforce::TabId;

/// Core error type for pomoguard-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Persistent store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Persistent store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A stored record could not be encoded or decoded
    #[error("Malformed record under '{key}': {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Errors reported by the browser automation surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrowserError {
    /// The browser refused to edit tabs right now (user dragging a tab, etc).
    #[error("Tab is busy: {0}")]
    TabBusy(String),

    #[error("No tab with id {0}")]
    NoSuchTab(TabId),

    #[error("No such window: {0}")]
    NoSuchWindow(String),

    /// The extension side of the channel went away.
    #[error("Browser channel disconnected")]
    Disconnected,

    #[error("Browser call '{method}' timed out after {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },

    #[error("Browser API error: {0}")]
    Api(String),
}

/// Substring the browser uses for its "tab is being edited" refusal.
const TAB_BUSY_MESSAGE: &str = "Tabs cannot be edited right now";

impl BrowserError {
    /// Classify a raw error message coming back from the browser.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.contains(TAB_BUSY_MESSAGE) {
            BrowserError::TabBusy(message)
        } else if let Some(rest) = message.strip_prefix("No tab with id: ") {
            rest.trim_end_matches('.')
                .parse()
                .map(BrowserError::NoSuchTab)
                .unwrap_or(BrowserError::Api(message))
        } else {
            BrowserError::Api(message)
        }
    }

    /// Only the busy-tab race is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, BrowserError::TabBusy(_))
    }
}

/// Notification backend errors. Always swallowed by callers.
#[derive(Error, Debug)]
#[error("Notification failed: {0}")]
pub struct NotifyError(pub String);

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_message_is_transient() {
        let err = BrowserError::from_message(
            "Tabs cannot be edited right now (user may be dragging a tab).",
        );
        assert!(err.is_transient());
    }

    #[test]
    fn missing_tab_is_not_transient() {
        let err = BrowserError::from_message("No tab with id: 42.");
        assert_eq!(err, BrowserError::NoSuchTab(42));
        assert!(!err.is_transient());
    }

    #[test]
    fn unknown_message_is_api_error() {
        let err = BrowserError::from_message("Cannot access contents of url");
        assert!(matches!(err, BrowserError::Api(_)));
    }
}
