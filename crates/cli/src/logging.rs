use std::io::Write;
use anyhow::{Context, Result};
use chrono::Local;
use env_logger::{Env, Target};
use fluidvid::event_log::format_line;
use fluidvid::EventLog;

/// Route the `log` facade into the event log.
///
/// The dashboard owns the terminal while jobs run, so nothing may go to
/// stderr. Records share the job-event line format, which lets the monitor
/// show them in the same panel. `RUST_LOG` still overrides the level.
pub fn init(sink: EventLog, verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
        .target(Target::Pipe(Box::new(sink)))
        .format(|buf, record| {
            let level = record.level().to_string();
            writeln!(buf, "{}", format_line(&Local::now(), &level, &record.args().to_string()))
        })
        .try_init()
        .context("Failed to initialise logger")
}
