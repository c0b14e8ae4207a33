//! Error types for calwatch.

use thiserror::Error;

/// Errors that can occur while loading, filtering or comparing calendars.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("ICS parse error: {0}")]
    Parse(String),

    #[error("Event without UID at position {0}")]
    MissingUid(usize),

    #[error("Duplicate event '{0}' in calendar")]
    DuplicateEvent(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for calwatch operations.
pub type WatchResult<T> = Result<T, WatchError>;
