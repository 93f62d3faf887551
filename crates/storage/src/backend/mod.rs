//! Blob store trait and implementations.
//!
//! This module defines the [`BlobStore`] trait, a keyed byte store mapping an
//! [`ArtifactId`] to exactly one durable blob. The id→location index is the
//! single source of truth for whether a blob exists.

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalBlobStore;
#[cfg(feature = "mock")]
pub use self::mock::MockBlobStore;
use crate::error::{ErrorKind, Result};
use crate::{ArtifactId, ObjectId};
use async_trait::async_trait;
use std::io::{Read, Seek, Write};

pub type BoxBlobRead = Box<dyn BlobRead>;
pub type BoxBlobSink = Box<dyn BlobSink>;

/// A readable, seekable view of a stored blob.
///
/// Seeking matters for packed artifacts (page sets) where a caller wants one
/// small piece without reading everything before it.
pub trait BlobRead: Read + Seek + Send {}
impl<T: Read + Seek + Send> BlobRead for T {}

/// An exclusive, scoped writer for a single blob.
///
/// Nothing written to a sink is visible to readers until [`commit`](Self::commit)
/// succeeds; dropping an uncommitted sink discards everything written to it.
/// Sinks are synchronous so they can be driven from inside
/// [`spawn_blocking`](tokio::task::spawn_blocking).
pub trait BlobSink: Write + Send {
    /// Atomically publish the written bytes under the sink's id, replacing any
    /// previous blob for that id.
    fn commit(self: Box<Self>) -> Result<()>;
}

/// Unified interface for blob stores.
///
/// Creating a blob for an id that already exists is allowed and overwrites it
/// (last committed writer wins). Callers that need at-most-once generation
/// must coordinate above this layer; the store only guarantees that a reader
/// never observes a half-written blob.
///
/// # Examples
///
/// ```
/// use quire_storage::{ArtifactId, BlobStore, error::Result};
///
/// async fn copy_blob(store: &dyn BlobStore, from: ArtifactId, to: ArtifactId) -> Result<usize> {
///     let data = store.read(from).await?;
///     store.write(to, &data).await?;
///     Ok(data.len())
/// }
/// ```
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Name of the configured store (used for logging only).
    fn name(&self) -> &str;

    /// Number of blobs currently recorded in the index.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check whether a blob is recorded for `id`.
    async fn exists(&self, id: ArtifactId) -> Result<bool>;

    /// Open a new exclusive sink for `id`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::io::Write;
    /// # use quire_storage::{ArtifactId, BlobStore, error::{ErrorKind, Result}};
    /// # async fn example(store: &dyn BlobStore, id: ArtifactId) -> Result<()> {
    /// let mut sink = store.create(id).await?;
    /// tokio::task::spawn_blocking(move || -> Result<()> {
    ///     sink.write_all(b"\x89PNG...").map_err(ErrorKind::Io)?;
    ///     sink.commit()
    /// })
    /// .await
    /// .unwrap()?;
    /// # Ok(())
    /// # }
    /// ```
    async fn create(&self, id: ArtifactId) -> Result<BoxBlobSink>;

    /// Write a complete blob in one go, replacing any previous one.
    async fn write(&self, id: ArtifactId, data: &[u8]) -> Result<()>;

    /// Open a blob for streaming, seekable reads.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the id is
    /// unknown.
    async fn open(&self, id: ArtifactId) -> Result<BoxBlobRead>;

    /// Read the complete blob.
    ///
    /// Default implementation drains [`open()`](Self::open) into a [`Vec`] on
    /// a blocking thread.
    async fn read(&self, id: ArtifactId) -> Result<Vec<u8>> {
        let mut reader = self.open(id).await?;
        let buffer = tokio::task::spawn_blocking(move || {
            let mut buffer = Vec::new();
            reader.read_to_end(&mut buffer).map(|_| buffer)
        })
        .await
        .map_err(|e| ErrorKind::BackendError(e.to_string()))?
        .map_err(ErrorKind::Io)?;
        Ok(buffer)
    }

    /// Remove the blob and its index entry.
    ///
    /// Deleting an unknown id is a no-op, not an error.
    async fn delete(&self, id: ArtifactId) -> Result<()>;

    /// Record that `object` currently points at the blob `id`.
    fn associate(&self, object: ObjectId, id: ArtifactId);

    /// The blob `object` currently points at, if any.
    fn reference(&self, object: ObjectId) -> Option<ArtifactId>;

    /// Decouple `object` from its cached artifact, returning the artifact it
    /// pointed at. The blob itself is left alone; it may still be referenced
    /// elsewhere.
    fn clear_reference(&self, object: ObjectId) -> Option<ArtifactId>;
}
