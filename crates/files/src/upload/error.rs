//! Error types for the [`upload`](super) module.

use derive_more::{Display, Error};
use quire_storage::ObjectId;

/// An upload error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for upload operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of an upload failure.
///
/// ### Validation Errors
/// Raised before any object is created:
/// - [`ErrorKind::NoFiles`]
/// - [`ErrorKind::DeniedExtension`]
/// - [`ErrorKind::ParentNotContainer`]
/// - [`ErrorKind::MissingFileType`]
///
/// ### Dependency Errors
/// - [`ErrorKind::ParentNotFound`]
/// - [`ErrorKind::Fetch`]
/// - [`ErrorKind::Create`]
/// - [`ErrorKind::Timestamp`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("there are no files")]
    NoFiles,
    #[display("file extension is not allowed: {_0}")]
    DeniedExtension(#[error(not(source))] String),
    #[display("parent not found: {_0}")]
    ParentNotFound(#[error(not(source))] ObjectId),
    /// The parent is neither mountable nor a project folder.
    #[display("parent is not mountable")]
    ParentNotContainer,
    /// Repository metadata has no `File` type to create objects with.
    #[display("file type is not found")]
    MissingFileType,
    /// Fetching the parent, its children or the metadata failed.
    #[display("failed to query the content source")]
    Fetch,
    /// The content source refused or failed to create an object.
    #[display("failed to create object")]
    Create,
    /// The upload time could not be formatted for a renamed file.
    #[display("failed to format upload timestamp")]
    Timestamp,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch | Self::Create)
    }
}
