//! Logger that keeps messages in memory.

use std::fmt::Arguments;

use parking_lot::Mutex;

use crate::log::{LogLevel, Logger};

/// Records every message for later inspection.
///
/// Meant for tests and for tools that show cache diagnostics after a run.
///
/// # Example
///
/// ```
/// use seqcache::log::{CaptureLogger, LogLevel, Logger};
/// use seqcache::log_warn;
///
/// let logger = CaptureLogger::new();
/// log_warn!(logger, "disk root {} unusable", "/nope");
/// assert!(logger.contains(LogLevel::Warn, "unusable"));
/// ```
#[derive(Debug, Default)]
pub struct CaptureLogger {
    entries: Mutex<Vec<(LogLevel, String)>>,
}

impl CaptureLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all recorded messages in arrival order.
    pub fn entries(&self) -> Vec<(LogLevel, String)> {
        self.entries.lock().clone()
    }

    /// Whether a message at `level` contains `needle`.
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|(l, msg)| *l == level && msg.contains(needle))
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Logger for CaptureLogger {
    fn log(&self, level: LogLevel, args: Arguments<'_>) {
        self.entries.lock().push((level, args.to_string()));
    }
}
