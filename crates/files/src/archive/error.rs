//! Error types for the [`archive`](super) module.

use derive_more::{Display, Error};
use quire_storage::ArtifactId;

/// An archive error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of an archive failure. Every failure aborts the whole
/// archive; there are no partial results.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// No root objects were requested.
    #[display("there are no objects to archive")]
    EmptyRequest,
    /// A batch fetch of objects from the content source failed.
    #[display("failed to fetch objects")]
    Fetch,
    /// Downloading a member file failed.
    #[display("failed to download file {_0}")]
    Download(#[error(not(source))] ArtifactId),
    /// Writing to the in-memory ZIP failed.
    #[display("failed to write archive")]
    Write,
    /// A blocking archive task panicked or was cancelled.
    #[display("archive task failed")]
    Task,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch | Self::Download(_))
    }
}
