//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod dedupe;
pub mod failures;
pub mod purge;
pub mod reconcile;
pub mod status;
pub mod upload;
