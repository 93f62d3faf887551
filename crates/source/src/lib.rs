//! Upstream object repository.
//!
//! The repository owns every object, its children and its file bytes. This
//! crate only describes how to talk to it; nothing here caches object
//! metadata.

pub mod error;
#[cfg(feature = "mock")]
mod mock;
pub mod models;

use crate::error::Result;
#[cfg(feature = "mock")]
pub use crate::mock::{MockSource, SourceCall};
use crate::models::{Metadata, NewObject, TreeNode};
use async_trait::async_trait;
use quire_storage::{ArtifactId, ObjectId};
use std::sync::Arc;

pub type SourceHandle = Arc<dyn ContentSource + Send + Sync>;

/// Supplies object metadata, children and raw file bytes on demand.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch many objects in one round trip. Unknown ids are left out of the
    /// result rather than reported as errors.
    async fn get_objects(&self, ids: &[ObjectId]) -> Result<Vec<TreeNode>>;

    /// Download the raw bytes of a file. `expected_size` is the size announced
    /// for the file and is used to validate the transfer.
    async fn download(&self, file: ArtifactId, expected_size: u64) -> Result<Vec<u8>>;

    async fn metadata(&self) -> Result<Metadata>;

    /// Create a new single-file object, returning its id.
    async fn create_object(&self, object: NewObject) -> Result<ObjectId>;
}
