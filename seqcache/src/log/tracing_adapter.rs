//! Tracing library adapter implementation.

use crate::log::{LogLevel, Logger};
use std::fmt::Arguments;

/// Logger that forwards to the `tracing` crate.
///
/// Messages are emitted under the `seqcache` target so they can be
/// filtered with `RUST_LOG=seqcache=debug`.
///
/// # Example
///
/// ```ignore
/// use seqcache::log::{Logger, TracingLogger};
/// use std::sync::Arc;
///
/// // Assumes a tracing subscriber is already installed
/// let logger: Arc<dyn Logger> = Arc::new(TracingLogger::new());
/// logger.info(format_args!("Using tracing backend"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn new() -> Self {
        Self
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, args: Arguments<'_>) {
        match level {
            LogLevel::Trace => tracing::trace!(target: "seqcache", "{}", args),
            LogLevel::Debug => tracing::debug!(target: "seqcache", "{}", args),
            LogLevel::Info => tracing::info!(target: "seqcache", "{}", args),
            LogLevel::Warn => tracing::warn!(target: "seqcache", "{}", args),
            LogLevel::Error => tracing::error!(target: "seqcache", "{}", args),
        }
    }
}
