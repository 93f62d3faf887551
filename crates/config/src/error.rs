//! Config Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration loading.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("configuration file not found: {}", _0.display())]
    FileNotFound(#[error(not(source))] PathBuf),
    /// Only TOML, YAML and JSON files are understood.
    #[display("unsupported configuration format: {}", _0.display())]
    UnsupportedFormat(#[error(not(source))] PathBuf),
    /// A source could not be parsed or didn't match the expected shape.
    #[display("invalid configuration")]
    Invalid,
    #[display("storage root must be an absolute path: {}", _0.display())]
    RelativeStorageRoot(#[error(not(source))] PathBuf),
    #[display("thumbnail scale must be a positive number: {_0}")]
    InvalidScale(#[error(not(source))] f32),
    #[display("denied extension must not be empty")]
    EmptyExtension,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
