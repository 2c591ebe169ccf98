//! Session controller: the public timer operations.
//!
//! Each operation re-reads the persisted state, works on a local copy and
//! writes it back, so an operation whose precondition no longer holds (a
//! pause racing an alarm, a resume without a pause) returns `Ok(None)`
//! instead of failing. Only store and validation failures are errors;
//! notification and browser failures are logged.

use std::sync::Arc;

use crate::enforce::{BrowserEvent, BrowserSurface, StrictBreakKernel};
use crate::error::Result;
use crate::events::{timestamp, Event};
use crate::history::{CurrentQueue, PomodoroHistoryEntry};
use crate::notify::{button_action, NotificationAction, Notifier, NullNotifier, PhaseNotification};
use crate::storage::{records, StateStore};
use crate::timer::{advance, AlarmScheduler, AlarmSlot, Clock, Phase, PomodoroConfig, PomodoroState, PHASE_ALARM};
use crate::view::{remaining_ms, TimerView};

pub struct SessionController<S, A, B> {
    store: S,
    scheduler: AlarmScheduler<A>,
    kernel: StrictBreakKernel<B>,
    notifier: Box<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl<S, A, B> SessionController<S, A, B>
where
    S: StateStore,
    A: AlarmSlot,
    B: BrowserSurface,
{
    pub fn new(store: S, alarms: A, kernel: StrictBreakKernel<B>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            scheduler: AlarmScheduler::new(alarms),
            kernel,
            notifier: Box::new(NullNotifier),
            clock,
        }
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn scheduler(&self) -> &AlarmScheduler<A> {
        &self.scheduler
    }

    pub fn kernel(&self) -> &StrictBreakKernel<B> {
        &self.kernel
    }

    fn now(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Create the initial state if missing, install the enforcement
    /// listeners and re-arm the alarm for whatever state was persisted.
    pub fn init(&self, defaults: &PomodoroConfig) -> Result<PomodoroState> {
        let state = records::ensure_initial_state(&self.store, defaults)?;
        self.kernel.install();
        self.scheduler.reschedule(&state)?;
        Ok(state)
    }

    pub fn state(&self) -> Result<PomodoroState> {
        Ok(records::load_state(&self.store)?)
    }

    pub fn view(&self) -> Result<TimerView> {
        Ok(TimerView::from_state(&self.state()?, self.now()))
    }

    /// Full history, or only the entries of the running queue.
    pub fn history(&self, current_queue_only: bool) -> Result<Vec<PomodoroHistoryEntry>> {
        let entries = records::load_history(&self.store)?;
        if !current_queue_only {
            return Ok(entries);
        }
        let Some(queue) = records::current_queue(&self.store)? else {
            return Ok(Vec::new());
        };
        Ok(entries
            .into_iter()
            .filter(|e| e.queue_id.as_deref() == Some(queue.id.as_str()))
            .collect())
    }

    /// Start `phase` now. Starting `idle` stops the session.
    pub async fn start_phase(&self, phase: Phase) -> Result<Option<Event>> {
        if phase == Phase::Idle {
            return self.stop_all().await;
        }
        let now = self.now();
        let mut state = records::load_state(&self.store)?;

        let queue = if state.phase == Phase::Idle || !state.running {
            let queue = CurrentQueue::new(now);
            records::set_current_queue(&self.store, &queue)?;
            Some(queue)
        } else {
            records::current_queue(&self.store)?
        };

        state.phase = phase;
        state.running = true;
        state.started_at = Some(now);
        state.ends_at = state.ends_at_for(phase, now);
        state.paused = false;
        state.paused_at = None;
        state.pause_accum_ms = 0;

        records::save_state(&self.store, &state)?;
        self.scheduler.reschedule(&state)?;
        tracing::info!(%phase, ends_at = ?state.ends_at, "phase started");

        self.announce(&state, now);
        self.enter_phase(&state).await;

        Ok(Some(Event::PhaseStarted {
            phase,
            ends_at: state.ends_at,
            queue_id: queue.map(|q| q.id),
            at: timestamp(now),
        }))
    }

    pub fn pause_timer(&self) -> Result<Option<Event>> {
        let now = self.now();
        let mut state = records::load_state(&self.store)?;
        if !state.running || state.paused {
            tracing::debug!("pause ignored: not running or already paused");
            return Ok(None);
        }

        state.paused = true;
        state.paused_at = Some(now);
        records::save_state(&self.store, &state)?;
        self.scheduler.cancel()?;

        let remaining = remaining_ms(&state, now);
        tracing::info!(remaining_ms = remaining, "timer paused");
        Ok(Some(Event::TimerPaused {
            remaining_ms: remaining,
            at: timestamp(now),
        }))
    }

    pub fn resume_timer(&self) -> Result<Option<Event>> {
        let now = self.now();
        let mut state = records::load_state(&self.store)?;
        let (Some(paused_at), Some(ends_at)) = (state.paused_at, state.ends_at) else {
            tracing::debug!("resume ignored: no pause or no end time");
            return Ok(None);
        };
        if !state.running || !state.paused {
            tracing::debug!("resume ignored: not paused");
            return Ok(None);
        }

        let delta = (now - paused_at).max(0);
        state.ends_at = Some(ends_at + delta);
        state.pause_accum_ms += delta;
        state.paused = false;
        state.paused_at = None;
        records::save_state(&self.store, &state)?;
        self.scheduler.reschedule(&state)?;

        let remaining = remaining_ms(&state, now);
        tracing::info!(paused_for_ms = delta, remaining_ms = remaining, "timer resumed");
        Ok(Some(Event::TimerResumed {
            remaining_ms: remaining,
            paused_for_ms: delta,
            at: timestamp(now),
        }))
    }

    /// Record the active phase, reset to idle and tear down enforcement.
    pub async fn stop_all(&self) -> Result<Option<Event>> {
        let now = self.now();
        let state = records::load_state(&self.store)?;
        let queue = records::current_queue(&self.store)?;

        if let Some(entry) = PomodoroHistoryEntry::for_phase(&state, now, queue.as_ref()) {
            records::append_history(&self.store, entry)?;
        }

        let next = PomodoroState::idle(state.config.clone());
        records::save_state(&self.store, &next)?;
        self.scheduler.cancel()?;
        records::clear_current_queue(&self.store)?;
        tracing::info!(stopped = %state.phase, "session stopped");

        self.kernel.end_strict_break().await;

        Ok(Some(Event::TimerStopped {
            stopped: state.phase,
            at: timestamp(now),
        }))
    }

    /// End the running phase early and move to the next one.
    pub async fn skip_phase(&self) -> Result<Option<Event>> {
        let now = self.now();
        let state = records::load_state(&self.store)?;
        if !state.is_active() {
            tracing::debug!("skip ignored: nothing running");
            return Ok(None);
        }

        let next = self.finish_phase(&state, now)?;
        tracing::info!(skipped = %state.phase, next = %next.phase, "phase skipped");

        self.announce(&next, now);
        self.enter_phase(&next).await;

        Ok(Some(Event::PhaseSkipped {
            skipped: state.phase,
            next: next.phase,
            at: timestamp(now),
        }))
    }

    /// Handle a fired alarm. Anything but the phase alarm against a running,
    /// unpaused session is ignored.
    pub async fn on_alarm_fire(&self, name: &str) -> Result<Option<Event>> {
        if name != PHASE_ALARM {
            tracing::debug!(name, "ignoring unknown alarm");
            return Ok(None);
        }
        let now = self.now();
        let state = records::load_state(&self.store)?;
        if !state.is_active() || state.paused {
            tracing::debug!("alarm ignored: session not running or paused");
            return Ok(None);
        }

        let next = self.finish_phase(&state, now)?;
        tracing::info!(completed = %state.phase, next = %next.phase, cycle = next.cycle_count, "phase completed");

        self.announce(&next, now);
        self.enter_phase(&next).await;

        Ok(Some(Event::PhaseCompleted {
            completed: state.phase,
            next: next.phase,
            cycle_count: next.cycle_count,
            at: timestamp(now),
        }))
    }

    /// Fire every alarm that is due. For hosts that drive the alarm clock
    /// themselves.
    pub async fn fire_due_alarms(&self) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        for alarm in self.scheduler.take_due(self.now())? {
            if let Some(event) = self.on_alarm_fire(&alarm.name).await? {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Replace the timer settings. A running phase keeps its remaining time.
    pub async fn apply_config(&self, config: PomodoroConfig) -> Result<Option<Event>> {
        config.validate()?;
        let now = self.now();
        let mut state = records::load_state(&self.store)?;
        let was_strict = state.config.strict_mode;
        state.config = config;

        // While paused the remaining time is measured from pausedAt, so the
        // end time stays put.
        if state.is_active() && !state.paused {
            if let Some(ends_at) = state.ends_at {
                state.ends_at = Some(now + (ends_at - now).max(0));
            }
        }
        // A phase started with zero length has no end time. Once it has a
        // duration it ends right away (on resume, if paused).
        if state.is_active()
            && state.ends_at.is_none()
            && state.config.duration_ms(state.phase) > 0
        {
            state.ends_at = Some(state.paused_at.filter(|_| state.paused).unwrap_or(now));
        }

        records::save_state(&self.store, &state)?;
        self.scheduler.reschedule(&state)?;
        let strict = state.config.strict_mode;
        tracing::info!(strict_mode = strict, "config applied");

        if state.is_active() && state.phase.is_break() && was_strict != strict {
            if strict {
                self.kernel.begin_strict_break(&self.store).await;
            } else {
                self.kernel.show_overlay_on_all_open_tabs().await;
                self.kernel.end_strict_break().await;
            }
        }

        Ok(Some(Event::ConfigApplied {
            strict_mode: strict,
            ends_at: state.ends_at,
            at: timestamp(now),
        }))
    }

    /// A button on a phase notification was clicked. Clicks on a
    /// notification for a phase that is no longer current are ignored.
    pub async fn handle_notification_button(
        &self,
        phase: Phase,
        index: usize,
    ) -> Result<Option<Event>> {
        let Some(action) = button_action(phase, index) else {
            tracing::debug!(%phase, index, "no action for notification button");
            return Ok(None);
        };
        let state = records::load_state(&self.store)?;
        if state.phase != phase {
            tracing::debug!(%phase, current = %state.phase, "stale notification click");
            return Ok(None);
        }
        match action {
            NotificationAction::Pause => self.pause_timer(),
            NotificationAction::Skip => self.skip_phase().await,
            NotificationAction::Stop => self.stop_all().await,
        }
    }

    /// The break page asked to be closed.
    pub async fn close_break_page(&self) -> Result<Option<Event>> {
        self.kernel.end_strict_break().await;
        Ok(Some(Event::BreakClosed {
            at: timestamp(self.now()),
        }))
    }

    pub async fn handle_browser_event(&self, event: &BrowserEvent) {
        self.kernel.handle_event(&self.store, event).await;
    }

    /// Log the current phase to history, advance and persist.
    fn finish_phase(&self, state: &PomodoroState, now: i64) -> Result<PomodoroState> {
        let queue = records::current_queue(&self.store)?;
        if let Some(entry) = PomodoroHistoryEntry::for_phase(state, now, queue.as_ref()) {
            records::append_history(&self.store, entry)?;
        }
        let next = advance(state, now);
        records::save_state(&self.store, &next)?;
        self.scheduler.reschedule(&next)?;
        Ok(next)
    }

    fn announce(&self, state: &PomodoroState, now: i64) {
        let Some(notification) = PhaseNotification::for_phase(state.phase, &state.config, now)
        else {
            return;
        };
        if let Err(e) = self.notifier.notify(&notification) {
            tracing::warn!(error = %e, id = %notification.id, "notification not shown");
        }
    }

    /// Bring enforcement in line with a phase that just began.
    async fn enter_phase(&self, state: &PomodoroState) {
        match state.phase {
            Phase::Idle | Phase::Focus => self.kernel.end_strict_break().await,
            Phase::Short | Phase::Long if state.config.strict_mode => {
                self.kernel.begin_strict_break(&self.store).await
            }
            Phase::Short | Phase::Long => {
                self.kernel.show_overlay_on_all_open_tabs().await;
            }
        }
    }
}
