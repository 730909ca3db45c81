//! Bed Usage Library
//!
//! Interprets a 3D printer's G-code command stream and keeps usage statistics:
//! material extruded, material extruded on the first layer, and time the
//! heated bed spends at a non-zero target temperature. Session totals reset at
//! every job start; lifetime totals are kept durably in SQLite.
//!
//! ## Architecture Overview
//!
//! - [`interpreter`] - per-command G-code interpretation (coordinate mode, layer tracking, E deltas)
//! - [`session`] - thread-safe session accumulator with pending deltas and the bed hold state
//! - [`store`] - durable lifetime totals with versioned schema migration
//! - [`probe`] - bed target temperature sources
//! - [`notify`] - snapshot fan-out to subscribers
//! - [`reconciler`] - periodic flush, hold tracking, persistence and change-detected notification
//! - [`service`] - [`UsageTracker`], the facade a host drives
//! - [`config`] - configuration management with environment variable support
//! - [`logging`] - structured logging with JSON and pretty-print formats
//! - [`display`] - terminal and JSON output for the CLI
//!
//! ## Main Entry Point
//!
//! ```rust,no_run
//! use bed_usage::{StatsStore, StreamTargetProbe, UsageTracker};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = Arc::new(StatsStore::open_in_memory()?);
//! let probe = Arc::new(StreamTargetProbe::new());
//! let mut tracker = UsageTracker::new(store, probe, 64);
//!
//! tracker.start(Duration::from_secs(1))?;
//! tracker.on_job_started();
//! tracker.handle_command("M83");
//! tracker.handle_command(";LAYER:1");
//! tracker.handle_command("G1 X10 E2.5");
//! tracker.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod display;
pub mod error;
pub mod interpreter;
pub mod logging;
pub mod models;
pub mod notify;
pub mod probe;
pub mod reconciler;
pub mod service;
pub mod session;
pub mod store;

// Command modules
pub mod commands;

pub use error::{BedUsageError, CommandParseError, ProbeError};
pub use interpreter::CommandInterpreter;
pub use models::*;
pub use notify::{NotificationHub, NotificationSink, Subscriber, Subscription};
pub use probe::{FileProbe, StreamTargetProbe, TemperatureProbe};
pub use reconciler::{Reconciler, ReconcilerHandle, TickReport};
pub use service::UsageTracker;
pub use session::{HoldState, SessionAccumulator, SessionTotals};
pub use store::{LifetimeStore, StatsStore};
