//! docferry common library
//!
//! Process-level plumbing shared by the docferry binaries.
//!
//! - **Logging**: [`logging::LogConfig`] and [`logging::init_logging`] set up
//!   `tracing` output to the console, rotated files, or both.

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod logging;

pub use logging::{init_logging, LogConfig, LogGuard};
