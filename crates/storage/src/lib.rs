//! Durable keyed blob storage.
//!
//! Every cached artifact lives in a [`BlobStore`] under its [`ArtifactId`].
//! Callers only ever see readers and writers, never the on-disk location.

pub mod backend;
pub mod error;
mod id;

pub use crate::backend::{BlobRead, BlobSink, BlobStore, BoxBlobRead, BoxBlobSink};
pub use crate::id::{ArtifactId, ObjectId};
use std::sync::Arc;

pub type BlobHandle = Arc<dyn BlobStore + Send + Sync>;
