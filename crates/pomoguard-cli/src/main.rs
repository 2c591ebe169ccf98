use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pomoguard_core::AppConfig;

mod commands;
mod notifier;

#[derive(Parser)]
#[command(name = "pomoguard", version, about = "Pomoguard CLI and native messaging host")]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Never show desktop notifications
    #[arg(long, global = true)]
    no_notify: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Phase history
    History {
        #[command(subcommand)]
        action: commands::history::HistoryAction,
    },
    /// Run as the browser extension's native messaging host
    Host {
        /// Extension origin, as passed by the browser
        origin: Option<String>,
    },
}

/// Logs go to stderr: stdout carries command output and native messages.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let level = AppConfig::load()
                .map(|c| c.logging.level)
                .unwrap_or_else(|_| "info".into());
            EnvFilter::new(level)
        })
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    // Browsers start native hosts with the caller's origin as the only
    // argument, without a subcommand.
    let args: Vec<String> = std::env::args().collect();
    let result = if let Some(origin) = args
        .get(1)
        .filter(|a| a.starts_with("chrome-extension://"))
    {
        init_logging(false);
        let opts = commands::GlobalOpts::default();
        commands::host::run(Some(origin.clone()), &opts)
    } else {
        let cli = Cli::parse();
        init_logging(cli.verbose);
        let opts = commands::GlobalOpts {
            no_notify: cli.no_notify,
        };
        match cli.command {
            Commands::Timer { action } => commands::timer::run(action, &opts),
            Commands::Config { action } => commands::config::run(action),
            Commands::History { action } => commands::history::run(action),
            Commands::Host { origin } => commands::host::run(origin, &opts),
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
