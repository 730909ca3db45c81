//! Command module for the bed-usage CLI
//!
//! Each subcommand lives in its own module and takes the resolved
//! configuration from the caller.

pub mod replay;
pub mod stats;
pub mod watch;

pub use replay::run_replay;
pub use stats::run_stats;
pub use watch::{run_watch, WatchOptions};
