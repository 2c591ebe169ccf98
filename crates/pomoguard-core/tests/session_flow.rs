//! Integration tests for the session controller.
//!
//! Drives whole sessions through alarm firings, against both the in-memory
//! store and an on-disk SQLite database.

use std::sync::Arc;
use std::time::Duration;

use pomoguard_core::enforce::SimulatedBrowser;
use pomoguard_core::storage::records;
use pomoguard_core::timer::{AlarmSlot, ManualClock, MemoryAlarms, PHASE_ALARM};
use pomoguard_core::{
    BreakPage, Database, MemoryStore, NoBrowser, Phase, PomodoroConfig, RetryPolicy,
    SessionController, StrictBreakKernel,
};
use proptest::prelude::*;

fn kernel<B>(browser: B, clock: Arc<ManualClock>) -> StrictBreakKernel<B>
where
    B: pomoguard_core::BrowserSurface,
{
    StrictBreakKernel::new(
        browser,
        BreakPage::new("chrome-extension://ext/", "tabs/break.html"),
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        },
        clock,
    )
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

/// Complete `focus_sessions` focus phases by firing the alarm at each end
/// time and return the break phases that followed them.
fn run_cycles(config: PomodoroConfig, focus_sessions: u32) -> Vec<Phase> {
    let clock = Arc::new(ManualClock::new(0));
    let store = MemoryStore::new();
    let alarms = MemoryAlarms::new();
    let ctl = SessionController::new(&store, &alarms, kernel(NoBrowser, clock.clone()), clock.clone());
    ctl.init(&config).unwrap();

    runtime().block_on(async {
        ctl.start_phase(Phase::Focus).await.unwrap();
        let mut breaks = Vec::new();
        while breaks.len() < focus_sessions as usize {
            let when = ctl.scheduler().next_fire_at().unwrap().unwrap();
            clock.set(when);
            ctl.fire_due_alarms().await.unwrap();
            let state = ctl.state().unwrap();
            if state.phase.is_break() {
                breaks.push(state.phase);
            }
        }
        breaks
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn every_nth_break_is_long(long_every in 2u32..=6, focus in 1u32..=60, short in 1u32..=15, long in 1u32..=30) {
        let config = PomodoroConfig {
            focus_min: focus as f64,
            short_min: short as f64,
            long_min: long as f64,
            long_every,
            ..PomodoroConfig::default()
        };
        let breaks = run_cycles(config, 4 * long_every);
        prop_assert_eq!(breaks.len() as u32, 4 * long_every);
        for (i, phase) in breaks.iter().enumerate() {
            let nth = i as u32 + 1;
            let expected = if nth % long_every == 0 { Phase::Long } else { Phase::Short };
            prop_assert_eq!(*phase, expected, "break #{}", nth);
        }
    }

    #[test]
    fn pause_accumulates_monotonically(pauses in prop::collection::vec((1i64..60_000, 1i64..60_000), 1..8)) {
        let clock = Arc::new(ManualClock::new(0));
        let store = MemoryStore::new();
        let alarms = MemoryAlarms::new();
        let ctl = SessionController::new(&store, &alarms, kernel(NoBrowser, clock.clone()), clock.clone());
        ctl.init(&PomodoroConfig::default()).unwrap();

        runtime().block_on(async {
            ctl.start_phase(Phase::Focus).await.unwrap();
            let mut expected_end = ctl.state().unwrap().ends_at.unwrap();
            let mut last_accum = 0;
            for (run, pause) in &pauses {
                clock.advance(*run);
                ctl.pause_timer().unwrap();
                clock.advance(*pause);
                ctl.resume_timer().unwrap();
                expected_end += pause;

                let state = ctl.state().unwrap();
                prop_assert_eq!(state.ends_at, Some(expected_end));
                prop_assert!(state.pause_accum_ms > last_accum);
                last_accum = state.pause_accum_ms;
                prop_assert_eq!(alarms.get(PHASE_ALARM).unwrap().map(|a| a.when), Some(expected_end));
            }
            Ok(())
        })?;
    }
}

#[test]
fn zero_length_phases_do_not_loop() {
    let config = PomodoroConfig {
        focus_min: 0.0,
        short_min: 0.0,
        long_min: 0.0,
        ..PomodoroConfig::default()
    };
    let clock = Arc::new(ManualClock::new(0));
    let store = MemoryStore::new();
    let alarms = MemoryAlarms::new();
    let ctl = SessionController::new(&store, &alarms, kernel(NoBrowser, clock.clone()), clock.clone());
    ctl.init(&config).unwrap();

    runtime().block_on(async {
        ctl.start_phase(Phase::Focus).await.unwrap();
        ctl.skip_phase().await.unwrap();
    });

    let state = ctl.state().unwrap();
    assert!(state.running);
    assert_eq!(state.ends_at, None);
    assert!(alarms.all().unwrap().is_empty());
}

#[test]
fn session_survives_database_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pomoguard.db");
    let clock = Arc::new(ManualClock::new(1_000));

    {
        let db = Database::open_at(&path).unwrap();
        let ctl = SessionController::new(&db, &db, kernel(NoBrowser, clock.clone()), clock.clone());
        ctl.init(&PomodoroConfig::default()).unwrap();
        runtime().block_on(async {
            ctl.start_phase(Phase::Focus).await.unwrap();
        });
    }

    let db = Database::open_at(&path).unwrap();
    assert_eq!(
        db.get(PHASE_ALARM).unwrap().map(|a| a.when),
        Some(1_000 + 1_500_000)
    );
    let ctl = SessionController::new(&db, &db, kernel(NoBrowser, clock.clone()), clock.clone());
    let state = ctl.init(&PomodoroConfig::default()).unwrap();
    assert_eq!(state.phase, Phase::Focus);

    clock.set(1_501_000);
    let events = runtime().block_on(ctl.fire_due_alarms()).unwrap();
    assert_eq!(events.len(), 1);

    let state = ctl.state().unwrap();
    assert_eq!(state.phase, Phase::Short);
    assert_eq!(state.cycle_count, 1);

    let history = records::load_history(&db).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].duration_ms, 1_500_000);
    assert!(history[0].queue_id.is_some());
}

#[test]
fn strict_break_over_whole_cycle() {
    let config = PomodoroConfig {
        strict_mode: true,
        long_every: 2,
        ..PomodoroConfig::default()
    };
    let clock = Arc::new(ManualClock::new(0));
    let store = MemoryStore::new();
    let alarms = MemoryAlarms::new();
    let browser = Arc::new(SimulatedBrowser::new());
    browser.open_tab(1, "https://docs.example", true);
    browser.open_tab(2, "https://mail.example", true);
    let ctl = SessionController::new(
        &store,
        &alarms,
        kernel(Arc::clone(&browser), clock.clone()),
        clock.clone(),
    );
    ctl.init(&config).unwrap();

    let break_url = "chrome-extension://ext/tabs/break.html";
    let on_break_page = |window| {
        browser
            .active_tab(window)
            .and_then(|t| t.url)
            .is_some_and(|u| u == break_url)
    };

    runtime().block_on(async {
        ctl.start_phase(Phase::Focus).await.unwrap();
        assert!(!on_break_page(1));

        clock.set(1_500_000);
        ctl.fire_due_alarms().await.unwrap();
        assert!(on_break_page(1));
        assert!(on_break_page(2));

        clock.set(1_800_000);
        ctl.fire_due_alarms().await.unwrap();
        assert_eq!(ctl.state().unwrap().phase, Phase::Focus);
        assert!(!on_break_page(1));
        assert!(!on_break_page(2));
        assert!(browser
            .tabs()
            .iter()
            .all(|t| t.url.as_deref() != Some(break_url)));

        clock.set(3_300_000);
        ctl.fire_due_alarms().await.unwrap();
        assert_eq!(ctl.state().unwrap().phase, Phase::Long);
        assert!(on_break_page(1));

        ctl.stop_all().await.unwrap();
        assert!(!on_break_page(1));
    });

    assert_eq!(
        records::break_last_forced_at(&store).unwrap(),
        Some(3_300_000)
    );
}
