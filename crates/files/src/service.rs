use crate::error::{ErrorKind, Result};
use crate::upload::Denylist;
use crate::{archive, pipeline, upload};
use exn::ResultExt;
use quire_cache::ArtifactCache;
use quire_config::Config;
use quire_render::{PopplerRenderer, RendererHandle};
use quire_source::SourceHandle;
use quire_source::models::UploadFile;
use quire_storage::backend::LocalBlobStore;
use quire_storage::{ArtifactId, ObjectId};
use std::str::FromStr;
use std::sync::Arc;
use time::OffsetDateTime;

/// Service settings that aren't collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct FilesConfig {
    pub thumbnail_scale: f32,
    pub denied_extensions: Vec<String>,
}
impl Default for FilesConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}
impl From<&Config> for FilesConfig {
    fn from(config: &Config) -> Self {
        Self {
            thumbnail_scale: config.render.thumbnail_scale,
            denied_extensions: config.upload.denied_extensions.clone(),
        }
    }
}

/// The file service: page previews, thumbnails, raw downloads, archives and
/// uploads.
///
/// Built once at start-up from its collaborators and shared by cloning (all
/// clones share the same cache and handles). Every method maps one request.
#[derive(Clone)]
pub struct Files {
    source: SourceHandle,
    renderer: RendererHandle,
    cache: ArtifactCache,
    thumbnail_scale: f32,
    denylist: Arc<Denylist>,
}
impl Files {
    pub fn new(source: SourceHandle, renderer: RendererHandle, cache: ArtifactCache, config: FilesConfig) -> Self {
        Self {
            source,
            renderer,
            cache,
            thumbnail_scale: config.thumbnail_scale,
            denylist: Arc::new(Denylist::new(&config.denied_extensions)),
        }
    }

    /// Build the service with on-disk caches and the Poppler renderer
    /// described by `config`.
    pub async fn from_config(config: &Config, source: SourceHandle) -> Result<Self> {
        config.validate().map_err(|e| ErrorKind::Validation((*e).to_string()))?;
        let pages = LocalBlobStore::new("pages", config.storage.pages_dir()).or_raise(|| ErrorKind::Storage)?;
        let thumbnails =
            LocalBlobStore::new("thumbnails", config.storage.thumbnails_dir()).or_raise(|| ErrorKind::Storage)?;
        if config.storage.rebuild_index {
            pages.reindex().await.or_raise(|| ErrorKind::Storage)?;
            thumbnails.reindex().await.or_raise(|| ErrorKind::Storage)?;
        }
        let renderer = match &config.render.executable {
            Some(executable) => PopplerRenderer::new(executable),
            None => PopplerRenderer::discover().or_raise(|| ErrorKind::Generation)?,
        };
        let cache = ArtifactCache::new(Arc::new(pages), Arc::new(thumbnails));
        Ok(Self::new(source, Arc::new(renderer), cache, FilesConfig::from(config)))
    }

    /// Parse an identifier supplied by a client.
    pub fn parse_id<T: FromStr>(value: &str) -> Result<T> {
        value.parse().map_err(|_| exn::Exn::from(ErrorKind::Validation(format!("malformed identifier: {value}"))))
    }

    /// Number of pages in `file`, rendering at `scale` on a cache miss.
    pub async fn page_count(&self, file: ArtifactId, size: u64, scale: f32) -> Result<usize> {
        if !scale.is_finite() || scale <= 0.0 {
            exn::bail!(ErrorKind::Validation(format!("invalid scale: {scale}")));
        }
        pipeline::page_count(&self.source, &self.renderer, &self.cache, file, size, scale).await
    }

    /// A cached page image (1-indexed), empty if absent.
    pub async fn page_content(&self, file: ArtifactId, page: usize) -> Result<Vec<u8>> {
        pipeline::page(&self.cache, file, page).await
    }

    /// The raw source file, straight from the content source.
    pub async fn file(&self, file: ArtifactId, size: u64) -> Result<Vec<u8>> {
        pipeline::download(&self.source, file, size).await
    }

    pub async fn thumbnail(&self, file: ArtifactId, size: u64) -> Result<Vec<u8>> {
        pipeline::thumbnail(&self.source, &self.renderer, &self.cache, file, size, self.thumbnail_scale).await
    }

    /// ZIP archive of everything below `objects`.
    pub async fn archive(&self, objects: &[ObjectId]) -> Result<Vec<u8>> {
        archive::build(&self.source, objects).await.map_err(ErrorKind::archive)
    }

    /// Create one object per file under `parent`.
    pub async fn upload(&self, parent: ObjectId, files: Vec<UploadFile>) -> Result<Vec<ObjectId>> {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        upload::upload(&self.source, &self.denylist, parent, files, now).await.map_err(ErrorKind::upload)
    }

    /// Forget every cached artifact of `file`, e.g. after its content changed.
    pub async fn invalidate(&self, file: ArtifactId) -> Result<()> {
        self.cache.evict(file).await.or_raise(|| ErrorKind::Storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_render::MockRenderer;
    use quire_source::models::{FileRef, Metadata, ObjectType, TreeNode};
    use quire_source::{MockSource, SourceCall};
    use quire_storage::backend::MockBlobStore;
    use std::io::Cursor;

    struct Harness {
        files: Files,
        source: Arc<MockSource>,
        renderer: Arc<MockRenderer>,
        cache: ArtifactCache,
    }

    fn harness(pages: usize) -> Harness {
        let source = Arc::new(MockSource::new(Metadata {
            types: vec![ObjectType::new(1, "Project").mountable(), ObjectType::new(2, "File").with_files()],
        }));
        let renderer = Arc::new(MockRenderer::with_pages((1..=pages).map(|i| vec![i as u8])));
        let cache = ArtifactCache::new(Arc::new(MockBlobStore::default()), Arc::new(MockBlobStore::default()));
        let files = Files::new(source.clone(), renderer.clone(), cache.clone(), FilesConfig::default());
        Harness { files, source, renderer, cache }
    }

    #[test]
    fn test_parse_id() {
        let id: ArtifactId = Files::parse_id("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        assert_eq!(id.to_string(), "67e55044-10b1-426f-9247-bb680e5fe0c8");
        let err = Files::parse_id::<ObjectId>("not-a-uuid").unwrap_err();
        assert!(err.is_client_error());
        assert!(matches!(&*err, ErrorKind::Validation(msg) if msg.contains("not-a-uuid")));
    }

    #[tokio::test]
    async fn test_page_count_hit_skips_source_and_renderer() {
        let h = harness(2);
        let file = ArtifactId::new_v4();
        h.cache.put_pages(file, vec![vec![1]; 5]).await.unwrap();
        assert_eq!(h.files.page_count(file, 100, 1.0).await.unwrap(), 5);
        assert!(h.source.calls().is_empty());
        assert!(h.renderer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_scale_is_client_error() {
        let h = harness(1);
        let err = h.files.page_count(ArtifactId::new_v4(), 1, 0.0).await.unwrap_err();
        assert!(err.is_client_error());
        assert!(h.source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_thumbnail_uses_configured_scale() {
        let h = harness(3);
        let file = ArtifactId::new_v4();
        h.source.insert_file(file, b"doc".to_vec());
        assert_eq!(h.files.thumbnail(file, 3).await.unwrap(), vec![1u8]);
        assert_eq!(h.renderer.calls()[0].scale, 0.2);
    }

    #[tokio::test]
    async fn test_missing_page_is_empty() {
        let h = harness(1);
        assert!(h.files.page_content(ArtifactId::new_v4(), 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_passthrough() {
        let h = harness(1);
        let file = ArtifactId::new_v4();
        h.source.insert_file(file, b"raw bytes".to_vec());
        assert_eq!(h.files.file(file, 9).await.unwrap(), b"raw bytes");
        assert_eq!(h.files.file(file, 9).await.unwrap(), b"raw bytes");
        assert_eq!(h.source.calls(), [SourceCall::Download(file), SourceCall::Download(file)]);
        let err = h.files.file(ArtifactId::new_v4(), 1).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_empty_archive_is_validation_error() {
        let h = harness(1);
        let err = h.files.archive(&[]).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Validation(_)));
        assert!(h.source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_archive() {
        let h = harness(1);
        let file = FileRef::new(ArtifactId::new_v4(), "plan.pdf", 4);
        h.source.insert_file(file.id, b"plan".to_vec());
        let node = TreeNode::new(ObjectId::new_v4(), "Plan", ObjectType::new(3, "Drawing").with_files()).with_file(file);
        h.source.insert(node.clone());
        let bytes = h.files.archive(&[node.id]).await.unwrap();
        let zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(zip.file_names().collect::<Vec<_>>(), ["Plan.pdf"]);
    }

    #[tokio::test]
    async fn test_upload_denied_extension() {
        let h = harness(1);
        let err = h.files.upload(ObjectId::new_v4(), vec![UploadFile::new("tool.exe", "MZ")]).await.unwrap_err();
        assert!(err.is_client_error());
        assert!(h.source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_upload_parent_missing_is_upstream_error() {
        let h = harness(1);
        let err = h.files.upload(ObjectId::new_v4(), vec![UploadFile::new("a.pdf", "pdf")]).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Upstream));
        assert!(!err.is_client_error());
    }

    #[tokio::test]
    async fn test_upload() {
        let h = harness(1);
        let parent = TreeNode::new(ObjectId::new_v4(), "Project", ObjectType::new(1, "Project").mountable());
        h.source.insert(parent.clone());
        let ids = h.files.upload(parent.id, vec![UploadFile::new("a.pdf", "pdf")]).await.unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(h.source.created()[0].id, ids[0]);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let h = harness(2);
        let file = ArtifactId::new_v4();
        h.source.insert_file(file, b"doc".to_vec());
        h.cache.put_pages(file, vec![vec![9]; 4]).await.unwrap();
        h.files.invalidate(file).await.unwrap();
        assert_eq!(h.files.page_count(file, 3, 1.0).await.unwrap(), 2);
        assert_eq!(h.renderer.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_from_config_with_rebuilt_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.root = dir.path().to_path_buf();
        config.render.executable = Some("/nonexistent/pdftoppm".into());
        let source: SourceHandle = Arc::new(MockSource::default());
        let file = ArtifactId::new_v4();

        let first = Files::from_config(&config, source.clone()).await.unwrap();
        first.cache.put_pages(file, vec![b"cached".to_vec(); 3]).await.unwrap();

        // Without a rebuild the new process has no idea the blob exists.
        let cold = Files::from_config(&config, source.clone()).await.unwrap();
        assert!(cold.page_content(file, 1).await.unwrap().is_empty());

        config.storage.rebuild_index = true;
        let warm = Files::from_config(&config, source).await.unwrap();
        assert_eq!(warm.page_count(file, 0, 1.0).await.unwrap(), 3);
        assert_eq!(warm.page_content(file, 2).await.unwrap(), b"cached");
    }

    #[tokio::test]
    async fn test_from_config_rejects_invalid_config() {
        let mut config = Config::default();
        config.storage.root = "relative".into();
        let source: SourceHandle = Arc::new(MockSource::default());
        let err = Files::from_config(&config, source).await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::Validation(_)));
    }
}
