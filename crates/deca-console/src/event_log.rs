//! File-backed event log sink behind the `log` facade.
//!
//! One record per call, `YYYY-MM-DD HH:MM:SS [LEVEL] message`, written to
//! `system.log` in the working directory (truncated on startup). Records
//! at the ERROR level and records targeted at `interrupt` are mirrored to
//! stdout so faults stay visible without tailing the file.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record};

/// Log file name, relative to the working directory.
pub const LOG_FILE: &str = "system.log";

const INTERRUPT_TARGET: &str = "interrupt";

struct EventLog {
    file: Mutex<File>,
}

impl EventLog {
    fn level_label(record: &Record<'_>) -> &'static str {
        if record.target() == INTERRUPT_TARGET {
            return "[INTERRUPT]";
        }
        match record.level() {
            Level::Error => "[ERROR]   ",
            Level::Warn => "[WARNING] ",
            Level::Info => "[INFO]    ",
            Level::Debug | Level::Trace => "[DEBUG]   ",
        }
    }

    fn format(record: &Record<'_>) -> String {
        format!(
            "{} {} {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            Self::level_label(record),
            record.args()
        )
    }
}

impl Log for EventLog {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= Level::Debug
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = Self::format(record);

        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writeln!(file, "{line}");
        let _ = file.flush();
        drop(file);

        if record.level() == Level::Error || record.target() == INTERRUPT_TARGET {
            println!("{line}");
        }
    }

    fn flush(&self) {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = file.flush();
    }
}

/// Truncates the log file and installs the sink as the global logger.
///
/// # Errors
///
/// Returns the I/O error when the log file cannot be created, or an error
/// when a global logger is already installed. The caller exits with status
/// 1 on failure.
pub fn init() -> io::Result<()> {
    init_at(LOG_FILE)
}

fn init_at(path: impl AsRef<Path>) -> io::Result<()> {
    let file = File::create(path)?;
    log::set_boxed_logger(Box::new(EventLog {
        file: Mutex::new(file),
    }))
    .map_err(io::Error::other)?;
    log::set_max_level(LevelFilter::Debug);
    log::info!("system started");
    Ok(())
}
