//! Cache-or-generate for page images and thumbnails.
//!
//! Every request follows the same steps: look the artifact up in the cache,
//! otherwise download the source file, render it on a blocking thread, hand
//! the result to the cache in the background and return it.
//!
//! There is no coordination between requests. Concurrent requests for the
//! same cold file each render it and each persist their result; the last
//! persist wins. Renders are deterministic, so every writer stores the same
//! page set.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use quire_cache::ArtifactCache;
use quire_cache::error::{Error as CacheError, ErrorKind as CacheErrorKind};
use quire_render::RendererHandle;
use quire_source::SourceHandle;
use quire_source::error::ErrorKind as SourceErrorKind;
use quire_storage::ArtifactId;
use tokio::task::{JoinHandle, spawn_blocking};
use tracing::instrument;

/// A cache lookup where a corrupt entry is evicted and treated as a miss.
async fn lookup<T>(
    cache: &ArtifactCache,
    file: ArtifactId,
    result: std::result::Result<Option<T>, CacheError>,
) -> Result<Option<T>> {
    match result {
        Ok(found) => Ok(found),
        Err(e) if matches!(&*e, CacheErrorKind::Corrupt(_)) => {
            tracing::warn!(%file, error = ?e, "Evicting corrupt cache entry");
            cache.evict(file).await.or_raise(|| ErrorKind::Storage)?;
            Ok(None)
        },
        Err(e) => Err(e).or_raise(|| ErrorKind::Storage),
    }
}

/// Download a source file. A file the source doesn't know is reported as
/// [`ErrorKind::NotFound`].
pub(crate) async fn download(source: &SourceHandle, file: ArtifactId, size: u64) -> Result<Vec<u8>> {
    match source.download(file, size).await {
        Ok(data) => Ok(data),
        Err(e) if matches!(&*e, SourceErrorKind::FileNotFound(_)) => Err(e).or_raise(|| ErrorKind::NotFound),
        Err(e) => Err(e).or_raise(|| ErrorKind::Upstream),
    }
}

/// Number of pages in `file`, rendering (and caching) every page on a miss.
///
/// A cached page set answers without contacting the content source or the
/// renderer. A document that renders to no pages returns `0` and caches
/// nothing.
pub async fn page_count(
    source: &SourceHandle,
    renderer: &RendererHandle,
    cache: &ArtifactCache,
    file: ArtifactId,
    size: u64,
    scale: f32,
) -> Result<usize> {
    page_count_inner(source, renderer, cache, file, size, scale).await.map(|(count, _)| count)
}

#[instrument(skip(source, renderer, cache), fields(%file))]
pub(crate) async fn page_count_inner(
    source: &SourceHandle,
    renderer: &RendererHandle,
    cache: &ArtifactCache,
    file: ArtifactId,
    size: u64,
    scale: f32,
) -> Result<(usize, Option<JoinHandle<()>>)> {
    if let Some(count) = lookup(cache, file, cache.page_count(file).await).await? {
        tracing::trace!(count, "Page count served from cache");
        return Ok((count, None));
    }
    let document = download(source, file, size).await?;
    let renderer = renderer.clone();
    let pages = spawn_blocking(move || renderer.render_pages(&document, scale))
        .await
        .or_raise(|| ErrorKind::Generation)?
        .or_raise(|| ErrorKind::Generation)?;
    let count = pages.len();
    tracing::debug!(count, "Rendered pages");
    if count == 0 {
        return Ok((0, None));
    }
    Ok((count, Some(cache.persist_pages(file, pages))))
}

/// Thumbnail of `file`: its first page rendered at `scale`.
///
/// Returns an empty image (and caches nothing) if the renderer produced no
/// image.
pub async fn thumbnail(
    source: &SourceHandle,
    renderer: &RendererHandle,
    cache: &ArtifactCache,
    file: ArtifactId,
    size: u64,
    scale: f32,
) -> Result<Vec<u8>> {
    thumbnail_inner(source, renderer, cache, file, size, scale).await.map(|(image, _)| image)
}

#[instrument(skip(source, renderer, cache), fields(%file))]
pub(crate) async fn thumbnail_inner(
    source: &SourceHandle,
    renderer: &RendererHandle,
    cache: &ArtifactCache,
    file: ArtifactId,
    size: u64,
    scale: f32,
) -> Result<(Vec<u8>, Option<JoinHandle<()>>)> {
    if let Some(image) = lookup(cache, file, cache.get_thumbnail(file).await).await? {
        tracing::trace!(bytes = image.len(), "Thumbnail served from cache");
        return Ok((image, None));
    }
    let document = download(source, file, size).await?;
    let renderer = renderer.clone();
    let image = spawn_blocking(move || renderer.render_page(&document, 1, scale))
        .await
        .or_raise(|| ErrorKind::Generation)?
        .or_raise(|| ErrorKind::Generation)?;
    let Some(image) = image else {
        tracing::debug!("Renderer produced no thumbnail");
        return Ok((Vec::new(), None));
    };
    let persist = cache.persist_thumbnail(file, image.clone());
    Ok((image, Some(persist)))
}

/// A single cached page (1-indexed). Empty if the page isn't cached; pages
/// are never generated on this path.
#[instrument(skip(cache), fields(%file))]
pub async fn page(cache: &ArtifactCache, file: ArtifactId, page: usize) -> Result<Vec<u8>> {
    Ok(lookup(cache, file, cache.get_page(file, page).await).await?.unwrap_or_default())
}
