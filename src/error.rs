//! Error types for usage tracking.
//!
//! Interpreter and probe failures are recoverable and have their own types so
//! callers can match on them without touching store errors. Everything that
//! can stop the tracker from starting lives in [`BedUsageError`].

use thiserror::Error;

/// Result type alias for store and service operations.
pub type Result<T> = std::result::Result<T, BedUsageError>;

/// Main error type for the durable side of the tracker.
#[derive(Error, Debug)]
pub enum BedUsageError {
    /// Persisted schema is newer than this build understands
    #[error("Stats schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: u32, supported: u32 },

    /// Reading or writing the durable stats failed
    #[error("Stats store I/O failed: {0}")]
    StoreIo(#[from] rusqlite::Error),

    /// Preparing the data directory failed
    #[error("Failed to prepare data directory: {0}")]
    DataDir(#[from] std::io::Error),
}

/// A motion command carried a word that is not a letter followed by a number.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Malformed word `{token}` in command `{command}`")]
pub struct CommandParseError {
    pub command: String,
    pub token: String,
}

impl CommandParseError {
    pub fn new(command: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            token: token.into(),
        }
    }
}

/// The bed temperature source could not be read.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProbeError {
    /// Source is not connected or not readable
    #[error("Temperature source unavailable: {0}")]
    Unavailable(String),

    /// Source answered with something that is not a temperature
    #[error("Temperature source returned malformed value: {0}")]
    Malformed(String),
}
