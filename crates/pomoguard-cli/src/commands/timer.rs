use clap::Subcommand;
use pomoguard_core::storage::update_pomodoro_field;
use pomoguard_core::{AppConfig, Database, Event, NoBrowser, Phase, SessionController};

use super::{current_thread_runtime, kernel, system_clock, GlobalOpts};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a phase
    Start {
        /// focus, short or long
        #[arg(long, default_value = "focus")]
        phase: Phase,
    },
    /// Pause the running phase
    Pause,
    /// Resume a paused phase
    Resume,
    /// Stop and return to idle
    Stop,
    /// End the current phase now and move to the next one
    Skip,
    /// Print current timer view as JSON
    Status,
    /// Complete any phase whose end time has passed
    Tick,
    /// Change one timer setting, e.g. `focusMin 50`
    Configure {
        /// camelCase setting name
        key: String,
        /// New value
        value: String,
    },
}

fn print_event(event: Option<Event>) -> Result<(), Box<dyn std::error::Error>> {
    match event {
        Some(event) => println!("{}", serde_json::to_string_pretty(&event)?),
        None => eprintln!("nothing to do"),
    }
    Ok(())
}

pub fn run(action: TimerAction, opts: &GlobalOpts) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let db = Database::open()?;
    let ctl = SessionController::new(&db, &db, kernel(&config, NoBrowser), system_clock())
        .with_notifier(opts.notifier(&config));
    ctl.init(&config.defaults)?;

    let rt = current_thread_runtime()?;
    rt.block_on(async {
        // The CLI has no background alarm clock; catch up on entry.
        let overdue = ctl.fire_due_alarms().await?;
        for event in &overdue {
            tracing::info!(?event, "completed overdue phase");
        }

        match action {
            TimerAction::Start { phase } => print_event(ctl.start_phase(phase).await?)?,
            TimerAction::Pause => print_event(ctl.pause_timer()?)?,
            TimerAction::Resume => print_event(ctl.resume_timer()?)?,
            TimerAction::Stop => print_event(ctl.stop_all().await?)?,
            TimerAction::Skip => print_event(ctl.skip_phase().await?)?,
            TimerAction::Status => {
                println!("{}", serde_json::to_string_pretty(&ctl.view()?)?);
            }
            TimerAction::Tick => {
                println!("{}", serde_json::to_string_pretty(&overdue)?);
            }
            TimerAction::Configure { key, value } => {
                let current = ctl.state()?.config;
                let updated = update_pomodoro_field(&current, &key, &value)?;
                print_event(ctl.apply_config(updated).await?)?;
            }
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
