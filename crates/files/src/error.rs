//! Files Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. The archive and upload modules have
//! their own error kinds; they are raised into these at the service boundary.

use crate::archive::error::{Error as ArchiveError, ErrorKind as ArchiveErrorKind};
use crate::upload::error::{Error as UploadError, ErrorKind as UploadErrorKind};
use derive_more::{Display, Error};

/// A files error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for files operations.
pub type Result<T> = std::result::Result<T, Error>;

/// What went wrong, from the point of view of whoever made the request.
///
/// ### Client Errors
/// - [`ErrorKind::Validation`]
/// - [`ErrorKind::NotFound`]
///
/// ### Server Errors
/// - [`ErrorKind::Generation`]
/// - [`ErrorKind::Upstream`]
/// - [`ErrorKind::Storage`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Malformed input, rejected before any I/O.
    #[display("{_0}")]
    Validation(#[error(not(source))] String),
    /// The referenced file doesn't exist upstream.
    #[display("not found")]
    NotFound,
    /// Rendering or archive assembly failed.
    #[display("generation failed")]
    Generation,
    /// The content source failed or returned inconsistent data.
    #[display("content source failed")]
    Upstream,
    /// The artifact cache failed.
    #[display("cache storage failed")]
    Storage,
}

impl ErrorKind {
    /// Returns `true` if the request itself was at fault (a 4xx response),
    /// `false` if the service was (a 5xx response).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NotFound)
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream | Self::Storage)
    }

    /// Raise an archive error into a files error, keeping the archive frame in
    /// the error tree.
    #[track_caller]
    pub fn archive(err: ArchiveError) -> Error {
        let kind = match &*err {
            ArchiveErrorKind::EmptyRequest => Self::Validation((*err).to_string()),
            ArchiveErrorKind::Fetch | ArchiveErrorKind::Download(_) => Self::Upstream,
            ArchiveErrorKind::Write | ArchiveErrorKind::Task => Self::Generation,
        };
        err.raise(kind)
    }

    /// Raise an upload error into a files error, keeping the upload frame in
    /// the error tree.
    #[track_caller]
    pub fn upload(err: UploadError) -> Error {
        let kind = match &*err {
            UploadErrorKind::NoFiles
            | UploadErrorKind::DeniedExtension(_)
            | UploadErrorKind::ParentNotContainer
            | UploadErrorKind::MissingFileType => Self::Validation((*err).to_string()),
            UploadErrorKind::ParentNotFound(_) | UploadErrorKind::Fetch | UploadErrorKind::Create => {
                Self::Upstream
            },
            UploadErrorKind::Timestamp => Self::Generation,
        };
        err.raise(kind)
    }
}
