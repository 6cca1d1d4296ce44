use chrono::Local;
use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};

use crate::PROGRESS_BAR;

/// Crate whose records are shown at every level (both the library and this
/// binary); other crates only get warnings and errors through.
const LOGGED_CRATE: &str = "simtools";

struct Logger;

impl Logger {
    fn crate_name<'a>(&self, target: &'a str) -> &'a str {
        target.split("::").next().unwrap_or(target)
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Warn
            || self.crate_name(metadata.target()) == LOGGED_CRATE
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let msg = format!(
            "{} {:<5} [{}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        );
        if PROGRESS_BAR.is_hidden() {
            eprintln!("{}", msg);
        } else {
            PROGRESS_BAR.println(msg);
        }
    }

    fn flush(&self) {}
}

static LOGGER: Logger = Logger;

pub fn init_logging(filter: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(filter);

    Ok(())
}
