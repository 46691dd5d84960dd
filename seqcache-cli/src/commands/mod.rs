//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (path, show, init)
//! - [`disk`] - Disk cache maintenance (stats, inspect, gc, clear)

pub mod common;
pub mod config;
pub mod disk;
