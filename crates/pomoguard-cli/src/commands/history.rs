use clap::Subcommand;
use pomoguard_core::history::{for_queue, local_day_start, summarize};
use pomoguard_core::storage::records;
use pomoguard_core::{Clock, Database, SystemClock};

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List finished phases, newest first
    List {
        /// Only entries of this queue
        #[arg(long, conflicts_with = "current")]
        queue: Option<String>,
        /// Only entries of the running queue
        #[arg(long)]
        current: bool,
        /// Maximum number of entries
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Totals over the history
    Stats {
        /// Only phases that ended today
        #[arg(long)]
        today: bool,
    },
}

pub fn run(action: HistoryAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let history = records::load_history(&db)?;

    match action {
        HistoryAction::List {
            queue,
            current,
            limit,
            json,
        } => {
            let queue = if current {
                records::current_queue(&db)?.map(|q| q.id)
            } else {
                queue
            };
            let mut entries: Vec<_> = match (&queue, current) {
                (Some(id), _) => for_queue(&history, id),
                // --current with no running queue shows nothing.
                (None, true) => Vec::new(),
                (None, false) => history.iter().rev().collect(),
            };
            entries.truncate(limit);

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                eprintln!("no history");
            } else {
                for entry in entries {
                    let ended = pomoguard_core::events::timestamp(entry.ended_at)
                        .with_timezone(&chrono::Local);
                    println!(
                        "{}  {:<12} {:>4} min  {}",
                        ended.format("%Y-%m-%d %H:%M"),
                        entry.title,
                        entry.duration_ms / 60_000,
                        entry.queue_id.as_deref().unwrap_or("-"),
                    );
                }
            }
        }
        HistoryAction::Stats { today } => {
            let since = today.then(|| local_day_start(SystemClock.now_ms()));
            let summary = summarize(&history, since);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}
