//! Page and thumbnail repository on top of two blob stores.

use crate::error::{ErrorKind, Result};
use crate::pageset::{self, PageIndex};
use exn::ResultExt;
use quire_storage::error::ErrorKind as StorageErrorKind;
use quire_storage::{ArtifactId, BlobHandle, BoxBlobRead};
use tokio::task::{JoinHandle, spawn_blocking};

/// Cache of derived artifacts, keyed by the id of the source file they were
/// derived from.
///
/// Pages and thumbnails live in separate stores and have independent
/// lifecycles: either may exist without the other. Absence is never an error;
/// getters return an empty or `None` result on a miss.
///
/// Cloning is cheap; clones share the same underlying stores.
#[derive(Clone)]
pub struct ArtifactCache {
    pages: BlobHandle,
    thumbnails: BlobHandle,
}
impl ArtifactCache {
    pub fn new(pages: BlobHandle, thumbnails: BlobHandle) -> Self {
        Self { pages, thumbnails }
    }

    /// Open a blob, treating an unknown id as a miss.
    async fn open(store: &BlobHandle, id: ArtifactId) -> Result<Option<BoxBlobRead>> {
        match store.open(id).await {
            Ok(reader) => Ok(Some(reader)),
            Err(e) if matches!(&*e, StorageErrorKind::NotFound(_)) => Ok(None),
            Err(e) => Err(e).or_raise(|| ErrorKind::Storage),
        }
    }

    // =========================================================================
    // Get/Fetch
    // =========================================================================

    /// Every cached page of `id`, page 1 first. Empty on a miss.
    pub async fn get_pages(&self, id: ArtifactId) -> Result<Vec<Vec<u8>>> {
        let Some(mut reader) = Self::open(&self.pages, id).await? else {
            return Ok(Vec::new());
        };
        spawn_blocking(move || {
            let index = PageIndex::read_from(&mut reader)?;
            index.read_all(&mut reader)
        })
        .await
        .or_raise(|| ErrorKind::Task)?
    }

    /// A single cached page (1-indexed). `None` on a miss or when `page` is
    /// outside the cached set.
    pub async fn get_page(&self, id: ArtifactId, page: usize) -> Result<Option<Vec<u8>>> {
        let Some(mut reader) = Self::open(&self.pages, id).await? else {
            return Ok(None);
        };
        spawn_blocking(move || {
            let index = PageIndex::read_from(&mut reader)?;
            index.read_page(&mut reader, page)
        })
        .await
        .or_raise(|| ErrorKind::Task)?
    }

    /// Number of cached pages for `id`, reading only the page-set header.
    pub async fn page_count(&self, id: ArtifactId) -> Result<Option<usize>> {
        let Some(mut reader) = Self::open(&self.pages, id).await? else {
            return Ok(None);
        };
        let count = spawn_blocking(move || pageset::read_count(&mut reader)).await.or_raise(|| ErrorKind::Task)??;
        Ok(Some(count))
    }

    pub async fn get_thumbnail(&self, id: ArtifactId) -> Result<Option<Vec<u8>>> {
        match self.thumbnails.read(id).await {
            Ok(image) => Ok(Some(image)),
            Err(e) if matches!(&*e, StorageErrorKind::NotFound(_)) => Ok(None),
            Err(e) => Err(e).or_raise(|| ErrorKind::Storage),
        }
    }

    // =========================================================================
    // Put
    // =========================================================================

    /// Store the complete page set for `id`, replacing any previous one.
    ///
    /// The set is packed into a single sink and only becomes visible when the
    /// sink commits, so readers see either the old set or the new one.
    pub async fn put_pages(&self, id: ArtifactId, pages: Vec<Vec<u8>>) -> Result<()> {
        if pages.is_empty() {
            exn::bail!(ErrorKind::EmptyPageSet);
        }
        let mut sink = self.pages.create(id).await.or_raise(|| ErrorKind::Storage)?;
        let count = pages.len();
        let bytes = spawn_blocking(move || -> Result<u64> {
            let bytes = pageset::pack(&pages, &mut sink)?;
            sink.commit().or_raise(|| ErrorKind::Storage)?;
            Ok(bytes)
        })
        .await
        .or_raise(|| ErrorKind::Task)??;
        tracing::debug!(%id, pages = count, bytes, store = self.pages.name(), "Cached page set");
        Ok(())
    }

    pub async fn put_thumbnail(&self, id: ArtifactId, image: &[u8]) -> Result<()> {
        self.thumbnails.write(id, image).await.or_raise(|| ErrorKind::Storage)?;
        tracing::debug!(%id, bytes = image.len(), store = self.thumbnails.name(), "Cached thumbnail");
        Ok(())
    }

    /// Persist a page set in the background.
    ///
    /// The caller already holds the rendered pages, so failures are logged and
    /// dropped rather than returned. The handle is only useful to tests and
    /// graceful shutdown; it never resolves to an error.
    pub fn persist_pages(&self, id: ArtifactId, pages: Vec<Vec<u8>>) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            if let Err(e) = cache.put_pages(id, pages).await {
                tracing::warn!(%id, error = ?e, "Failed to persist rendered pages");
            }
        })
    }

    /// Persist a thumbnail in the background. See [`persist_pages`](Self::persist_pages).
    pub fn persist_thumbnail(&self, id: ArtifactId, image: Vec<u8>) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            if let Err(e) = cache.put_thumbnail(id, &image).await {
                tracing::warn!(%id, error = ?e, "Failed to persist rendered thumbnail");
            }
        })
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Drop both the page set and the thumbnail for `id`. Unknown ids are fine.
    pub async fn evict(&self, id: ArtifactId) -> Result<()> {
        self.pages.delete(id).await.or_raise(|| ErrorKind::Storage)?;
        self.thumbnails.delete(id).await.or_raise(|| ErrorKind::Storage)?;
        tracing::debug!(%id, "Evicted cached artifacts");
        Ok(())
    }
}
