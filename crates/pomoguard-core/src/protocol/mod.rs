//! Command contract between the extension and the session controller.
//!
//! Commands are JSON objects tagged by `type`; every command answers with
//! `{ok:true}` (plus a payload for queries) or `{ok:false, error}`.

pub mod native;

use serde::{Deserialize, Serialize};

use crate::enforce::BrowserSurface;
use crate::error::Result;
use crate::history::PomodoroHistoryEntry;
use crate::session::SessionController;
use crate::storage::StateStore;
use crate::timer::{AlarmSlot, Phase, PomodoroConfig};
use crate::view::TimerView;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum Command {
    /// Start a phase; focus when none is given.
    #[serde(rename = "start")]
    Start {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        phase: Option<Phase>,
    },
    #[serde(rename = "pause")]
    Pause,
    #[serde(rename = "resume")]
    Resume,
    #[serde(rename = "stop")]
    Stop,
    #[serde(rename = "skip")]
    Skip,
    /// The body is the full new config.
    #[serde(rename = "config.update")]
    ConfigUpdate(PomodoroConfig),
    #[serde(rename = "break.close")]
    BreakClose,
    #[serde(rename = "notification.button")]
    NotificationButton { phase: Phase, button_index: usize },
    #[serde(rename = "status")]
    Status,
    #[serde(rename = "history")]
    History {
        #[serde(default)]
        current_queue_only: bool,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start { .. } => "start",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Stop => "stop",
            Command::Skip => "skip",
            Command::ConfigUpdate(_) => "config.update",
            Command::BreakClose => "break.close",
            Command::NotificationButton { .. } => "notification.button",
            Command::Status => "status",
            Command::History { .. } => "history",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<TimerView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<PomodoroHistoryEntry>>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            ok: true,
            error: None,
            view: None,
            history: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
            ..Self::ok()
        }
    }
}

/// Run one command against the controller. Never fails: errors become
/// `{ok:false}` responses.
pub async fn dispatch<S, A, B>(ctl: &SessionController<S, A, B>, command: Command) -> Response
where
    S: StateStore,
    A: AlarmSlot,
    B: BrowserSurface,
{
    let name = command.name();
    match run(ctl, command).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(command = name, error = %e, "command failed");
            Response::error(e.to_string())
        }
    }
}

async fn run<S, A, B>(ctl: &SessionController<S, A, B>, command: Command) -> Result<Response>
where
    S: StateStore,
    A: AlarmSlot,
    B: BrowserSurface,
{
    let event = match command {
        Command::Start { phase } => ctl.start_phase(phase.unwrap_or(Phase::Focus)).await?,
        Command::Pause => ctl.pause_timer()?,
        Command::Resume => ctl.resume_timer()?,
        Command::Stop => ctl.stop_all().await?,
        Command::Skip => ctl.skip_phase().await?,
        Command::ConfigUpdate(config) => ctl.apply_config(config).await?,
        Command::BreakClose => ctl.close_break_page().await?,
        Command::NotificationButton {
            phase,
            button_index,
        } => ctl.handle_notification_button(phase, button_index).await?,
        Command::Status => {
            return Ok(Response {
                view: Some(ctl.view()?),
                ..Response::ok()
            })
        }
        Command::History { current_queue_only } => {
            return Ok(Response {
                history: Some(ctl.history(current_queue_only)?),
                ..Response::ok()
            })
        }
    };
    if let Some(event) = event {
        tracing::debug!(?event, "command applied");
    }
    Ok(Response::ok())
}
