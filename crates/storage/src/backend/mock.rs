//! In-memory blob store for testing.

use crate::backend::{BlobSink, BlobStore, BoxBlobRead, BoxBlobSink};
use crate::error::{ErrorKind, Result};
use crate::{ArtifactId, ObjectId};
use async_trait::async_trait;
use dashmap::DashMap;
use std::io::{Cursor, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// In-memory blob store for testing.
///
/// Blobs are kept in a [`DashMap`], so all trait methods operate on `&self`
/// without external synchronisation. Writes can be made to fail on demand to
/// exercise persistence-failure paths.
///
/// # Examples
///
/// ```
/// use quire_storage::{ArtifactId, BlobStore, backend::MockBlobStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let id = ArtifactId::new_v4();
/// let store = MockBlobStore::with_blobs([(id, b"\x89PNG")]);
/// assert!(store.exists(id).await?);
/// # Ok(())
/// # }
/// ```
pub struct MockBlobStore {
    name: String,
    storage: Arc<DashMap<ArtifactId, Vec<u8>>>,
    references: DashMap<ObjectId, ArtifactId>,
    fail_writes: Arc<AtomicBool>,
    commits: Arc<AtomicUsize>,
}

impl Default for MockBlobStore {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            storage: Arc::new(DashMap::new()),
            references: DashMap::new(),
            fail_writes: Arc::new(AtomicBool::new(false)),
            commits: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MockBlobStore {
    /// Create a mock store pre-populated with blobs.
    pub fn with_blobs(blobs: impl IntoIterator<Item = (ArtifactId, impl Into<Vec<u8>>)>) -> Self {
        let store = Self::default();
        for (id, data) in blobs {
            store.storage.insert(id, data.into());
        }
        store
    }

    /// Change the name of the mock store.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make every subsequent write (and commit) fail with an I/O error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes since creation.
    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    fn write_failure() -> ErrorKind {
        ErrorKind::Io(std::io::Error::other("mock write failure"))
    }
}

#[async_trait]
impl BlobStore for MockBlobStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.storage.len()
    }

    async fn exists(&self, id: ArtifactId) -> Result<bool> {
        Ok(self.storage.contains_key(&id))
    }

    async fn create(&self, id: ArtifactId) -> Result<BoxBlobSink> {
        Ok(Box::new(MockSink {
            id,
            buffer: Vec::new(),
            storage: self.storage.clone(),
            fail: self.fail_writes.clone(),
            commits: self.commits.clone(),
        }))
    }

    async fn write(&self, id: ArtifactId, data: &[u8]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            exn::bail!(Self::write_failure());
        }
        self.storage.insert(id, data.to_vec());
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn open(&self, id: ArtifactId) -> Result<BoxBlobRead> {
        let data = self.storage.get(&id).map(|entry| entry.value().clone());
        let data = data.ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(id)))?;
        Ok(Box::new(Cursor::new(data)))
    }

    async fn delete(&self, id: ArtifactId) -> Result<()> {
        self.storage.remove(&id);
        Ok(())
    }

    fn associate(&self, object: ObjectId, id: ArtifactId) {
        self.references.insert(object, id);
    }

    fn reference(&self, object: ObjectId) -> Option<ArtifactId> {
        self.references.get(&object).map(|entry| *entry.value())
    }

    fn clear_reference(&self, object: ObjectId) -> Option<ArtifactId> {
        self.references.remove(&object).map(|(_, id)| id)
    }
}

struct MockSink {
    id: ArtifactId,
    buffer: Vec<u8>,
    storage: Arc<DashMap<ArtifactId, Vec<u8>>>,
    fail: Arc<AtomicBool>,
    commits: Arc<AtomicUsize>,
}
impl Write for MockSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
impl BlobSink for MockSink {
    fn commit(self: Box<Self>) -> Result<()> {
        let MockSink { id, buffer, storage, fail, commits } = *self;
        if fail.load(Ordering::SeqCst) {
            exn::bail!(MockBlobStore::write_failure());
        }
        storage.insert(id, buffer);
        commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
