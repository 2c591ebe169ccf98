//! Native messaging host.
//!
//! The extension starts this process and talks to it over stdin/stdout in
//! length-prefixed JSON frames. Commands and browser events are handled one
//! at a time on a single thread. Tab operations the enforcement kernel needs
//! go back to the extension as `call` frames and are answered by `result`
//! frames, which a separate reader task routes to the waiting caller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use pomoguard_core::enforce::{Tab, TabId, TabUpdate, WindowId};
use pomoguard_core::protocol::native::{read_frame, write_message, BrowserRequest, Inbound, Outbound};
use pomoguard_core::storage::records::STATE_KEY;
use pomoguard_core::storage::StoreChange;
use pomoguard_core::{
    dispatch, AppConfig, BrowserError, BrowserEvent, BrowserSurface, Clock, Command, Database,
    SessionController, StateStore, SystemClock,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc, oneshot};

use super::{current_thread_runtime, kernel, system_clock, GlobalOpts};

type Reply = Result<serde_json::Value, BrowserError>;
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Work for the main loop, in arrival order.
#[derive(Debug)]
enum Incoming {
    Command { id: u64, command: Command },
    Event(BrowserEvent),
}

/// The extension may answer window calls with bare ids or window objects.
#[derive(Deserialize)]
#[serde(untagged)]
enum WindowRef {
    Id(WindowId),
    Window { id: WindowId },
}

impl WindowRef {
    fn id(self) -> WindowId {
        match self {
            WindowRef::Id(id) | WindowRef::Window { id } => id,
        }
    }
}

/// [`BrowserSurface`] that forwards every call to the extension.
pub struct NativeBrowser {
    outbound: mpsc::UnboundedSender<Outbound>,
    pending: Pending,
    next_id: AtomicU64,
    timeout: Duration,
}

impl NativeBrowser {
    fn new(outbound: mpsc::UnboundedSender<Outbound>, pending: Pending, timeout: Duration) -> Self {
        Self {
            outbound,
            pending,
            next_id: AtomicU64::new(1),
            timeout,
        }
    }

    async fn call(&self, request: BrowserRequest) -> Reply {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let method = request.method();
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);

        if self.outbound.send(Outbound::Call { id, call: request }).is_err() {
            lock(&self.pending).remove(&id);
            return Err(BrowserError::Disconnected);
        }
        tracing::trace!(id, method, "browser call sent");

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(BrowserError::Disconnected),
            Err(_) => {
                lock(&self.pending).remove(&id);
                Err(BrowserError::Timeout {
                    method: method.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
        }
    }

    async fn call_as<T: DeserializeOwned>(&self, request: BrowserRequest) -> Result<T, BrowserError> {
        let method = request.method();
        let value = self.call(request).await?;
        serde_json::from_value(value)
            .map_err(|e| BrowserError::Api(format!("unexpected {method} reply: {e}")))
    }
}

impl BrowserSurface for NativeBrowser {
    async fn get_tab(&self, tab_id: TabId) -> Result<Tab, BrowserError> {
        self.call_as(BrowserRequest::GetTab { tab_id }).await
    }

    async fn query_tabs(&self, window_id: Option<WindowId>) -> Result<Vec<Tab>, BrowserError> {
        self.call_as(BrowserRequest::QueryTabs { window_id }).await
    }

    async fn all_windows(&self) -> Result<Vec<WindowId>, BrowserError> {
        let windows: Vec<WindowRef> = self.call_as(BrowserRequest::GetAllWindows).await?;
        Ok(windows.into_iter().map(WindowRef::id).collect())
    }

    async fn current_window(&self) -> Result<WindowId, BrowserError> {
        let window: WindowRef = self.call_as(BrowserRequest::GetCurrentWindow).await?;
        Ok(window.id())
    }

    async fn update_tab(&self, tab_id: TabId, update: TabUpdate) -> Result<(), BrowserError> {
        self.call(BrowserRequest::UpdateTab { tab_id, update })
            .await
            .map(|_| ())
    }

    async fn create_tab(
        &self,
        window_id: WindowId,
        url: &str,
        active: bool,
    ) -> Result<Tab, BrowserError> {
        self.call_as(BrowserRequest::CreateTab {
            window_id,
            url: url.to_string(),
            active,
        })
        .await
    }

    async fn remove_tabs(&self, tab_ids: &[TabId]) -> Result<(), BrowserError> {
        self.call(BrowserRequest::RemoveTabs {
            tab_ids: tab_ids.to_vec(),
        })
        .await
        .map(|_| ())
    }

    async fn inject_overlay(&self, tab_id: TabId) -> Result<(), BrowserError> {
        self.call(BrowserRequest::InjectOverlay { tab_id })
            .await
            .map(|_| ())
    }
}

/// Hand a `result` frame to the call waiting for it.
fn resolve(
    pending: &Pending,
    id: u64,
    ok: bool,
    value: Option<serde_json::Value>,
    error: Option<String>,
) {
    let Some(waiter) = lock(pending).remove(&id) else {
        tracing::debug!(id, "result for unknown or expired call");
        return;
    };
    let reply = if ok {
        Ok(value.unwrap_or(serde_json::Value::Null))
    } else {
        Err(BrowserError::from_message(
            error.unwrap_or_else(|| "unknown browser error".into()),
        ))
    };
    let _ = waiter.send(reply);
}

async fn read_loop(inbox: mpsc::UnboundedSender<Incoming>, pending: Pending) {
    let mut stdin = tokio::io::stdin();
    loop {
        let frame = match read_frame(&mut stdin).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::info!("extension disconnected");
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to read from extension");
                break;
            }
        };

        let incoming = match serde_json::from_slice::<Inbound>(&frame) {
            Ok(Inbound::Command { id, command }) => Incoming::Command { id, command },
            Ok(Inbound::Event { event }) => Incoming::Event(event),
            Ok(Inbound::Result {
                id,
                ok,
                value,
                error,
            }) => {
                resolve(&pending, id, ok, value, error);
                continue;
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed frame");
                continue;
            }
        };
        if inbox.send(incoming).is_err() {
            break;
        }
    }
    // Wake every caller still waiting on the extension.
    lock(&pending).clear();
}

async fn write_loop(mut outbox: mpsc::UnboundedReceiver<Outbound>) {
    let mut stdout = tokio::io::stdout();
    while let Some(frame) = outbox.recv().await {
        if let Err(e) = write_message(&mut stdout, &frame).await {
            tracing::error!(error = %e, "failed to write to extension");
            break;
        }
    }
}

fn push_view<S, A, B>(ctl: &SessionController<S, A, B>, outbound: &mpsc::UnboundedSender<Outbound>)
where
    S: StateStore,
    A: pomoguard_core::timer::AlarmSlot,
    B: BrowserSurface,
{
    match ctl.view() {
        Ok(view) => {
            let _ = outbound.send(Outbound::State { view });
        }
        Err(e) => tracing::warn!(error = %e, "failed to build timer view"),
    }
}

/// Longest single wait for an alarm. The sleep runs on a monotonic clock
/// that stops during system suspend, so the deadline is re-read against
/// wall time at least this often.
const MAX_ALARM_WAIT: Duration = Duration::from_secs(30);

/// How long to wait before checking alarms again, or `None` with no alarm.
fn alarm_wait(next_fire_at: Option<i64>, now_ms: i64) -> Option<Duration> {
    next_fire_at.map(|at| Duration::from_millis((at - now_ms).max(0) as u64).min(MAX_ALARM_WAIT))
}

async fn sleep_or_forever(delay: Option<Duration>) {
    match delay {
        Some(delay) => tokio::time::sleep(delay).await,
        None => std::future::pending().await,
    }
}

pub fn run(origin: Option<String>, opts: &GlobalOpts) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load()?;
    if let Some(origin) = origin {
        config.extension.origin = origin;
    }
    let db = Database::open()?;
    let rt = current_thread_runtime()?;
    rt.block_on(serve(config, &db, opts))
}

async fn serve(
    config: AppConfig,
    db: &Database,
    opts: &GlobalOpts,
) -> Result<(), Box<dyn std::error::Error>> {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (in_tx, mut in_rx) = mpsc::unbounded_channel();
    let pending = Pending::default();

    let writer = tokio::spawn(write_loop(out_rx));
    let reader = tokio::spawn(read_loop(in_tx, Arc::clone(&pending)));

    let browser = NativeBrowser::new(
        out_tx.clone(),
        pending,
        Duration::from_millis(config.enforcement.call_timeout_ms),
    );
    let ctl = SessionController::new(db, db, kernel(&config, browser), system_clock())
        .with_notifier(opts.notifier(&config));
    ctl.init(&config.defaults)?;

    let mut changes = db.watch();
    push_view(&ctl, &out_tx);
    tracing::info!(origin = %config.extension.origin, "native host ready");

    loop {
        let delay = match ctl.scheduler().next_fire_at() {
            Ok(next) => alarm_wait(next, SystemClock.now_ms()),
            Err(e) => {
                tracing::error!(error = %e, "failed to read alarm");
                None
            }
        };

        tokio::select! {
            incoming = in_rx.recv() => match incoming {
                Some(Incoming::Command { id, command }) => {
                    let body = dispatch(&ctl, command).await;
                    let _ = out_tx.send(Outbound::Response { id, body });
                }
                Some(Incoming::Event(event)) => ctl.handle_browser_event(&event).await,
                None => break,
            },
            _ = sleep_or_forever(delay) => {
                if let Err(e) = ctl.fire_due_alarms().await {
                    tracing::error!(error = %e, "alarm handling failed");
                }
            }
            change = changes.recv() => match change {
                Ok(StoreChange { key }) if key == STATE_KEY => push_view(&ctl, &out_tx),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => push_view(&ctl, &out_tx),
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    // The browser inside the controller holds a sender too.
    drop(ctl);
    drop(out_tx);
    let _ = reader.await;
    let _ = writer.await;
    Ok(())
}
