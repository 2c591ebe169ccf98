//! # Pomoguard Core Library
//!
//! The engine behind a browser-extension Pomodoro timer. The extension is a
//! thin client: it forwards user commands and tab/window events to this
//! library (through the native messaging host in `pomoguard-cli`) and carries
//! out the tab operations it asks for.
//!
//! ## Architecture
//!
//! - **Phase engine**: pure focus / short break / long break transitions
//!   with the "every Nth focus" long-break rule
//! - **Alarm scheduler**: a single named wake-up, re-armed on every mutation
//! - **Session controller**: start, pause, resume, stop, skip and config
//!   updates over an injected state store
//! - **Strict-break kernel**: keeps the user on the break page during strict
//!   breaks, over an injected browser surface
//! - **Storage**: SQLite-backed key-value records and TOML configuration
//!
//! ## Key Components
//!
//! - [`SessionController`]: public timer operations
//! - [`StrictBreakKernel`]: break enforcement
//! - [`Database`]: durable state store and alarm table
//! - [`AppConfig`]: application configuration

pub mod enforce;
pub mod error;
pub mod events;
pub mod history;
pub mod notify;
pub mod protocol;
pub mod session;
pub mod storage;
pub mod timer;
pub mod view;

pub use enforce::{BreakPage, BrowserEvent, BrowserSurface, NoBrowser, RetryPolicy, StrictBreakKernel};
pub use error::{BrowserError, ConfigError, CoreError, StoreError, ValidationError};
pub use events::Event;
pub use history::{CurrentQueue, HistorySummary, PomodoroHistoryEntry};
pub use protocol::{dispatch, Command, Response};
pub use session::SessionController;
pub use storage::{AppConfig, Database, MemoryStore, StateStore};
pub use timer::{Clock, Phase, PomodoroConfig, PomodoroState, SystemClock};
pub use view::TimerView;
