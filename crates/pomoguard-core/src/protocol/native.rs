//! Native messaging framing.
//!
//! Every message in either direction is a 4-byte length in native byte
//! order followed by that many bytes of UTF-8 JSON.

use std::io;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{Command, Response};
use crate::enforce::{BrowserEvent, TabId, TabUpdate, WindowId};
use crate::view::TimerView;

/// Largest frame the browser will send to a native host.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Frames sent by the extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Inbound {
    Command {
        id: u64,
        command: Command,
    },
    Event {
        event: BrowserEvent,
    },
    /// Answer to a [`Outbound::Call`].
    Result {
        id: u64,
        ok: bool,
        #[serde(default)]
        value: Option<serde_json::Value>,
        #[serde(default)]
        error: Option<String>,
    },
}

/// Frames sent by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Outbound {
    Response { id: u64, body: Response },
    Call { id: u64, call: BrowserRequest },
    /// Pushed whenever the timer state changes.
    State { view: TimerView },
}

/// A browser API call the host asks the extension to make.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "method",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum BrowserRequest {
    GetTab {
        tab_id: TabId,
    },
    QueryTabs {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        window_id: Option<WindowId>,
    },
    GetAllWindows,
    GetCurrentWindow,
    UpdateTab {
        tab_id: TabId,
        update: TabUpdate,
    },
    CreateTab {
        window_id: WindowId,
        url: String,
        active: bool,
    },
    RemoveTabs {
        tab_ids: Vec<TabId>,
    },
    InjectOverlay {
        tab_id: TabId,
    },
}

impl BrowserRequest {
    pub fn method(&self) -> &'static str {
        match self {
            BrowserRequest::GetTab { .. } => "getTab",
            BrowserRequest::QueryTabs { .. } => "queryTabs",
            BrowserRequest::GetAllWindows => "getAllWindows",
            BrowserRequest::GetCurrentWindow => "getCurrentWindow",
            BrowserRequest::UpdateTab { .. } => "updateTab",
            BrowserRequest::CreateTab { .. } => "createTab",
            BrowserRequest::RemoveTabs { .. } => "removeTabs",
            BrowserRequest::InjectOverlay { .. } => "injectOverlay",
        }
    }
}

/// Read one frame. Returns `Ok(None)` on a clean end of stream.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut length_bytes = [0u8; 4];
    match reader.read_exact(&mut length_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let length = u32::from_ne_bytes(length_bytes) as usize;
    if length > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {length} bytes exceeds limit"),
        ));
    }

    let mut buffer = vec![0u8; length];
    reader.read_exact(&mut buffer).await?;
    Ok(Some(buffer))
}

/// Read and decode one JSON frame.
pub async fn read_message<T, R>(reader: &mut R) -> io::Result<Option<T>>
where
    T: DeserializeOwned,
    R: AsyncRead + Unpin,
{
    match read_frame(reader).await? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
        None => Ok(None),
    }
}

/// Encode and write one JSON frame, then flush.
pub async fn write_message<T, W>(writer: &mut W, message: &T) -> io::Result<()>
where
    T: Serialize + ?Sized,
    W: AsyncWrite + Unpin,
{
    let json =
        serde_json::to_vec(message).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let length = u32::try_from(json.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "frame too large"))?;

    writer.write_all(&length.to_ne_bytes()).await?;
    writer.write_all(&json).await?;
    writer.flush().await?;
    Ok(())
}
