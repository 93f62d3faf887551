//! Render Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A render error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for render operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("pdftoppm not detected on your system")]
    ExecutableNotFound,
    /// Scale must be a finite, positive number.
    #[display("invalid render scale: {_0}")]
    InvalidScale(#[error(not(source))] f32),
    /// Page numbers are 1-indexed.
    #[display("invalid page number: {_0}")]
    InvalidPage(#[error(not(source))] usize),
    /// The renderer exited with a non-zero exit code.
    #[display("renderer exited with code: {_0}")]
    RendererFailed(#[error(not(source))] i32),
    /// The renderer was killed by a signal (no exit code).
    #[display("renderer was terminated")]
    RendererTerminated,
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RendererTerminated | Self::Io)
    }
}
