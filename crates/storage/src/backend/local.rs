//! Local filesystem blob store.
//!
//! Blobs are stored as `{id}.dat` files in a configured directory and accessed
//! via `tokio::fs` for async I/O. The id→path index lives in memory.

use crate::backend::{BlobStore, BoxBlobRead, BoxBlobSink};
use crate::error::{ErrorKind, Result};
use crate::{ArtifactId, BlobSink, ObjectId};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::fs::create_dir_all as sync_create_dir;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::fs;

const BLOB_EXTENSION: &str = "dat";

type Index = Arc<DashMap<ArtifactId, PathBuf>>;

fn map_io_error(e: std::io::Error, id: ArtifactId, path: &Path) -> ErrorKind {
    match e.kind() {
        std::io::ErrorKind::NotFound => ErrorKind::NotFound(id),
        std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
        _ => ErrorKind::Io(e),
    }
}

/// Move a completely written file into place and index it. The index entry is
/// held throughout, so a delete of the same id runs entirely before or after.
fn publish(
    index: &Index,
    id: ArtifactId,
    target: PathBuf,
    persist: impl FnOnce(&Path) -> std::io::Result<()>,
) -> std::result::Result<(), ErrorKind> {
    let entry = index.entry(id);
    persist(&target).map_err(|e| map_io_error(e, id, &target))?;
    entry.insert(target);
    Ok(())
}

/// Local filesystem blob store.
///
/// Every blob is a single file named after its id. Writes go to a temporary
/// file in the same directory first and are renamed into place, so a reader
/// either sees the previous blob or the new one, never a torn write. Writes for
/// different ids never share a handle or a lock.
///
/// The index is not persisted. After a restart it is empty until
/// [`reindex()`](Self::reindex) is called, even if blobs remain on disk.
///
/// # Examples
///
/// ```no_run
/// use quire_storage::backend::LocalBlobStore;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = LocalBlobStore::new("pages", "/var/cache/quire/pages")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBlobStore {
    name: String,
    /// Directory holding every blob of this store
    root: PathBuf,
    index: Index,
    references: Arc<DashMap<ObjectId, ArtifactId>>,
}
impl LocalBlobStore {
    /// Create a new local blob store rooted at an absolute directory, creating
    /// the directory if it doesn't exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPath`](ErrorKind::InvalidPath) if the path is relative
    /// or exists but isn't a directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Use non-async here; it'll only happen once on service start and
            // it's not worth the hassle of making the constructor async.
            sync_create_dir(&root).map_err(|e| match e.kind() {
                std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(root.clone()),
                _ => ErrorKind::Io(e),
            })?;
        }
        Ok(Self {
            name: name.into(),
            root,
            index: Arc::new(DashMap::new()),
            references: Arc::new(DashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, id: ArtifactId) -> PathBuf {
        self.root.join(format!("{id}.{BLOB_EXTENSION}"))
    }

    fn indexed_path(&self, id: ArtifactId) -> Result<PathBuf> {
        // Clone the path out so the shard guard is released before any await.
        let path = self.index.get(&id).map(|entry| entry.value().clone());
        path.ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(id)))
    }

    /// Rebuild the in-memory index from the blob files found in the root.
    ///
    /// Files that don't look like blobs (temporary files from interrupted
    /// writes, anything not named `{uuid}.dat`) are skipped. Returns the number
    /// of blobs now indexed.
    pub async fn reindex(&self) -> Result<usize> {
        let mut entries = fs::read_dir(&self.root).await.map_err(ErrorKind::Io)?;
        let mut discovered = 0;
        while let Some(entry) = entries.next_entry().await.map_err(ErrorKind::Io)? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(BLOB_EXTENSION) {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|stem| stem.to_str()).and_then(|stem| stem.parse().ok()) else {
                tracing::debug!(store = %self.name, path = %path.display(), "Skipping unrecognised file during reindex");
                continue;
            };
            if !entry.file_type().await.map_err(ErrorKind::Io)?.is_file() {
                continue;
            }
            self.index.insert(id, path);
            discovered += 1;
        }
        tracing::info!(store = %self.name, blobs = discovered, "Rebuilt blob index from disk");
        Ok(discovered)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    async fn exists(&self, id: ArtifactId) -> Result<bool> {
        Ok(self.index.contains_key(&id))
    }

    async fn create(&self, id: ArtifactId) -> Result<BoxBlobSink> {
        let target = self.blob_path(id);
        let root = self.root.clone();
        // NamedTempFile::new_in is blocking; keep it off the async workers.
        let file = tokio::task::spawn_blocking(move || NamedTempFile::new_in(root))
            .await
            .map_err(|e| ErrorKind::BackendError(e.to_string()))?
            .map_err(|e| map_io_error(e, id, &target))?;
        Ok(Box::new(LocalSink { id, target, file, index: self.index.clone() }))
    }

    async fn write(&self, id: ArtifactId, data: &[u8]) -> Result<()> {
        let target = self.blob_path(id);
        let staging = self.root.join(format!(".{id}.{}.tmp", uuid::Uuid::new_v4().simple()));
        if let Err(e) = fs::write(&staging, data).await {
            _ = fs::remove_file(&staging).await;
            exn::bail!(map_io_error(e, id, &staging));
        }
        let index = self.index.clone();
        let moved = staging.clone();
        let published = tokio::task::spawn_blocking(move || {
            publish(&index, id, target, |target| std::fs::rename(&moved, target))
        })
        .await
        .map_err(|e| ErrorKind::BackendError(e.to_string()))?;
        if let Err(e) = published {
            _ = fs::remove_file(&staging).await;
            exn::bail!(e);
        }
        tracing::trace!(store = %self.name, %id, bytes = data.len(), "Blob written");
        Ok(())
    }

    async fn open(&self, id: ArtifactId) -> Result<BoxBlobRead> {
        let path = self.indexed_path(id)?;
        let file = fs::File::open(&path).await.map_err(|e| map_io_error(e, id, &path))?;
        Ok(Box::new(file.into_std().await))
    }

    async fn read(&self, id: ArtifactId) -> Result<Vec<u8>> {
        let path = self.indexed_path(id)?;
        Ok(fs::read(&path).await.map_err(|e| map_io_error(e, id, &path))?)
    }

    async fn delete(&self, id: ArtifactId) -> Result<()> {
        let index = self.index.clone();
        let removed = tokio::task::spawn_blocking(move || {
            // Unlink while holding the entry so a concurrent publish can't
            // land between the unlink and the index removal.
            let Entry::Occupied(entry) = index.entry(id) else {
                return Ok(false);
            };
            match std::fs::remove_file(entry.get()) {
                Ok(()) => {},
                // Someone got there first; the blob is gone either way.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
                Err(e) => return Err(map_io_error(e, id, entry.get())),
            }
            entry.remove();
            Ok(true)
        })
        .await
        .map_err(|e| ErrorKind::BackendError(e.to_string()))??;
        if removed {
            tracing::trace!(store = %self.name, %id, "Blob deleted");
        }
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

/// Sink backed by a temporary file in the store's root, persisted (renamed)
/// over the blob path on commit.
struct LocalSink {
    id: ArtifactId,
    target: PathBuf,
    file: NamedTempFile,
    index: Index,
}
impl Write for LocalSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}
impl BlobSink for LocalSink {
    fn commit(self: Box<Self>) -> Result<()> {
        let LocalSink { id, target, mut file, index } = *self;
        file.flush().map_err(ErrorKind::Io)?;
        publish(&index, id, target, |target| file.persist(target).map(drop).map_err(|e| e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, SeekFrom};

    fn store() -> (tempfile::TempDir, LocalBlobStore) {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new("test", temp_dir.path()).unwrap();
        (temp_dir, store)
    }

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalBlobStore::new("name", temp_dir.path()).is_ok());
        assert!(LocalBlobStore::new("name", "relative/path").is_err());
        assert!(LocalBlobStore::new("name", "./relative").is_err());
    }

    #[test]
    fn test_new_creates_missing_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("a/b/pages");
        LocalBlobStore::new("name", &root).unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn test_new_rejects_file_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("not-a-dir");
        std::fs::write(&file, b"data").unwrap();
        let err = LocalBlobStore::new("name", &file).err().unwrap();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let (_dir, store) = store();
        let id = ArtifactId::new_v4();
        store.write(id, b"Hello, world!").await.unwrap();
        assert!(store.exists(id).await.unwrap());
        assert_eq!(store.read(id).await.unwrap(), b"Hello, world!");
        assert!(store.root().join(format!("{id}.dat")).is_file());
    }

    #[tokio::test]
    async fn test_write_overwrites() {
        let (_dir, store) = store();
        let id = ArtifactId::new_v4();
        store.write(id, b"first").await.unwrap();
        store.write(id, b"second").await.unwrap();
        assert_eq!(store.read(id).await.unwrap(), b"second");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_sink_invisible_until_commit() {
        let (_dir, store) = store();
        let id = ArtifactId::new_v4();
        let mut sink = store.create(id).await.unwrap();
        sink.write_all(b"pending").unwrap();
        assert!(!store.exists(id).await.unwrap());
        sink.commit().unwrap();
        assert_eq!(store.read(id).await.unwrap(), b"pending");
    }

    #[tokio::test]
    async fn test_dropped_sink_leaves_nothing_behind() {
        let (dir, store) = store();
        let id = ArtifactId::new_v4();
        let mut sink = store.create(id).await.unwrap();
        sink.write_all(b"abandoned").unwrap();
        drop(sink);
        assert!(!store.exists(id).await.unwrap());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_open_is_seekable() {
        let (_dir, store) = store();
        let id = ArtifactId::new_v4();
        store.write(id, b"0123456789").await.unwrap();
        let mut reader = store.open(id).await.unwrap();
        reader.seek(SeekFrom::Start(6)).unwrap();
        let mut rest = String::new();
        reader.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "6789");
    }

    #[tokio::test]
    async fn test_open_unknown_is_not_found() {
        let (_dir, store) = store();
        let id = ArtifactId::new_v4();
        let err = store.open(id).await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::NotFound(missing) if *missing == id));
        let err = store.read(id).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (_dir, store) = store();
        let id = ArtifactId::new_v4();
        store.write(id, b"data").await.unwrap();
        store.delete(id).await.unwrap();
        assert!(!store.exists(id).await.unwrap());
        assert!(!store.root().join(format!("{id}.dat")).exists());
        // Unknown ids: twice, no error, no residual mapping.
        let unknown = ArtifactId::new_v4();
        store.delete(unknown).await.unwrap();
        store.delete(unknown).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_file() {
        let (_dir, store) = store();
        let id = ArtifactId::new_v4();
        store.write(id, b"data").await.unwrap();
        std::fs::remove_file(store.root().join(format!("{id}.dat"))).unwrap();
        store.delete(id).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_index_not_persisted_without_reindex() {
        let (dir, store) = store();
        let id = ArtifactId::new_v4();
        store.write(id, b"survivor").await.unwrap();

        let restarted = LocalBlobStore::new("test", dir.path()).unwrap();
        assert!(!restarted.exists(id).await.unwrap());
        std::fs::write(dir.path().join("garbage.dat"), b"x").unwrap();
        std::fs::write(dir.path().join(".tmpAbCdEf"), b"x").unwrap();
        assert_eq!(restarted.reindex().await.unwrap(), 1);
        assert_eq!(restarted.read(id).await.unwrap(), b"survivor");
    }

    #[tokio::test]
    async fn test_clear_reference_keeps_blob() {
        let (_dir, store) = store();
        let object = ObjectId::new_v4();
        let id = ArtifactId::new_v4();
        store.write(id, b"data").await.unwrap();
        store.associate(object, id);
        assert_eq!(store.reference(object), Some(id));
        assert_eq!(store.clear_reference(object), Some(id));
        assert_eq!(store.reference(object), None);
        assert_eq!(store.clear_reference(object), None);
        assert!(store.exists(id).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_delete_racing_write_keeps_index_in_sync() {
        let (_dir, store) = store();
        let id = ArtifactId::new_v4();
        for _ in 0..64 {
            let writer = {
                let store = store.clone();
                tokio::spawn(async move { store.write(id, b"fresh").await.unwrap() })
            };
            let deleter = {
                let store = store.clone();
                tokio::spawn(async move { store.delete(id).await.unwrap() })
            };
            writer.await.unwrap();
            deleter.await.unwrap();
            let on_disk = store.root().join(format!("{id}.dat")).is_file();
            assert_eq!(store.exists(id).await.unwrap(), on_disk);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_to_different_ids() {
        let (_dir, store) = store();
        let handles: Vec<_> = (0..32u8)
            .map(|n| {
                let store = store.clone();
                tokio::spawn(async move {
                    let id = ArtifactId::from_u128(u128::from(n) + 1);
                    store.write(id, &[n; 64]).await.unwrap();
                    id
                })
            })
            .collect();
        for (n, handle) in handles.into_iter().enumerate() {
            let id = handle.await.unwrap();
            assert_eq!(store.read(id).await.unwrap(), vec![n as u8; 64]);
        }
        assert_eq!(store.len(), 32);
    }
}
