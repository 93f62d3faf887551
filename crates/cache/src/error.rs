//! Cache Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The underlying blob store failed.
    #[display("storage error")]
    Storage,
    /// A stored page set could not be decoded. Evict it and regenerate.
    #[display("corrupt page set: {_0}")]
    Corrupt(#[error(not(source))] &'static str),
    /// Page sets must contain at least one page.
    #[display("refusing to store an empty page set")]
    EmptyPageSet,
    /// Reading or writing a packed page set failed.
    #[display("I/O error")]
    Io,
    /// A blocking task panicked or was cancelled.
    #[display("background task failed")]
    Task,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage | Self::Io)
    }
}
