//! Logging abstraction layer.
//!
//! Cache components that embedders construct take an `Arc<dyn Logger>`
//! instead of writing to `tracing` directly, so a host application can
//! route cache messages into its own log.
//!
//! - [`Logger`]: the interface components log through
//! - [`TracingLogger`]: forwards to the `tracing` crate
//! - [`NoOpLogger`]: discards everything
//! - [`CaptureLogger`]: keeps messages in memory
//!
//! ```
//! use seqcache::log::{Logger, NoOpLogger};
//! use seqcache::log_info;
//! use std::sync::Arc;
//!
//! struct Renderer {
//!     logger: Arc<dyn Logger>,
//! }
//!
//! impl Renderer {
//!     fn frame_done(&self, frame: i32) {
//!         log_info!(self.logger, "Rendered frame {}", frame);
//!     }
//! }
//!
//! Renderer { logger: Arc::new(NoOpLogger) }.frame_done(1);
//! ```

mod capture;
mod noop;
mod tracing_adapter;
mod r#trait;

pub use capture::CaptureLogger;
pub use noop::NoOpLogger;
pub use r#trait::{LogLevel, Logger};
pub use tracing_adapter::TracingLogger;
