//! Content Source Error Types

use derive_more::{Display, Error};
use quire_storage::{ArtifactId, ObjectId};

/// A content source error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for content source operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The repository could not be reached.
    #[display("content source unavailable")]
    Unavailable,
    #[display("file not found: {_0}")]
    FileNotFound(#[error(not(source))] ArtifactId),
    #[display("parent object not found: {_0}")]
    ParentNotFound(#[error(not(source))] ObjectId),
    /// A download didn't deliver the number of bytes announced for the file.
    #[display("expected {expected} bytes, received {actual}")]
    SizeMismatch {
        #[error(not(source))]
        expected: u64,
        #[error(not(source))]
        actual: u64,
    },
    /// The repository refused to create an object.
    #[display("object rejected: {_0}")]
    Rejected(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }
}
