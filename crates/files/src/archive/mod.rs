//! Tree archives.
//!
//! Walks the object tree below a set of roots and packs one representative
//! file per node into a flat ZIP archive. Folder structure is not reproduced:
//! only files appear, named by the rules in [`representative`] and kept unique
//! by [`EntryNames`].
//!
//! The walk uses an explicit stack rather than recursion, and each node's
//! children are fetched from the content source in a single batch. An object
//! is queued at most once, so a cycle in the tree can't stall the walk. Member
//! bytes are always downloaded fresh; nothing here touches the artifact cache.
//! Any fetch, download or write failure aborts the whole archive.

pub mod error;
mod naming;
mod select;
mod writer;

pub use self::naming::{CONFLICT_SUFFIX, EntryNames};
pub use self::select::{
    ArchiveEntry, NodeKind, PLAIN_FILE_TYPE, is_pdf_like, is_system_file, is_xps_like, representative,
};
use crate::archive::error::{ErrorKind, Result};
use crate::archive::writer::ArchiveWriter;
use exn::ResultExt;
use quire_source::SourceHandle;
use quire_source::models::TreeNode;
use quire_storage::ObjectId;
use std::collections::HashSet;
use tracing::instrument;

/// Build a ZIP archive of everything below `roots` (roots included).
///
/// Returns [`ErrorKind::EmptyRequest`] without contacting the content source
/// if `roots` is empty.
#[instrument(skip_all, fields(roots = roots.len()))]
pub async fn build(source: &SourceHandle, roots: &[ObjectId]) -> Result<Vec<u8>> {
    if roots.is_empty() {
        exn::bail!(ErrorKind::EmptyRequest);
    }
    let mut stack: Vec<TreeNode> = source.get_objects(roots).await.or_raise(|| ErrorKind::Fetch)?;
    let mut seen: HashSet<ObjectId> = roots.iter().copied().collect();
    let mut names = EntryNames::default();
    let mut writer = ArchiveWriter::new();

    while let Some(node) = stack.pop() {
        let ids: Vec<ObjectId> =
            node.children.iter().map(|child| child.object_id).filter(|id| seen.insert(*id)).collect();
        if !ids.is_empty() {
            let children = source.get_objects(&ids).await.or_raise(|| ErrorKind::Fetch)?;
            stack.extend(children);
        }
        let Some(entry) = representative(&node) else {
            continue;
        };
        let ArchiveEntry { name, source: file } = entry;
        let data = source.download(file.id, file.size).await.or_raise(|| ErrorKind::Download(file.id))?;
        let name = names.claim(name);
        tracing::debug!(object = %node.id, file = %file.id, entry = %name, bytes = data.len(), "Adding archive entry");
        writer = writer.append(name, data).await?;
    }

    let entries = writer.entries();
    let archive = writer.finish().await?;
    tracing::info!(entries, bytes = archive.len(), "Built archive");
    Ok(archive)
}
