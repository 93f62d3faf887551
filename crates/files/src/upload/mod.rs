//! Uploading new files under an existing container object.
//!
//! Every file becomes a new object of the repository's `File` type, titled
//! after the file. Validation happens up front: if any file is rejected,
//! nothing is created.

pub mod error;
mod rename;

pub use self::rename::{UploadNames, timestamped};
use crate::upload::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use quire_source::SourceHandle;
use quire_source::models::{NewObject, UploadFile};
use quire_storage::ObjectId;
use std::collections::{BTreeMap, HashSet};
use time::OffsetDateTime;
use tracing::instrument;

/// Attribute holding an object's title.
pub const TITLE_ATTRIBUTE: &str = "Title 4C281306-E329-423A-AF45-7B39EC30273F";
/// Type every uploaded object is created as.
pub const FILE_TYPE: &str = "File";
/// Non-mountable parent type that still accepts uploads.
pub const PROJECT_FOLDER_TYPE: &str = "Project_folder";

/// Case-insensitive set of file extensions that are never accepted.
#[derive(Debug, Clone, Default)]
pub struct Denylist {
    extensions: HashSet<String>,
}
impl Denylist {
    /// Extensions may be given with or without the leading dot.
    pub fn new<S: AsRef<str>>(extensions: impl IntoIterator<Item = S>) -> Self {
        let extensions =
            extensions.into_iter().map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase()).collect();
        Self { extensions }
    }

    /// Whether any extension in `name` is denied, not only the last one:
    /// `payload.dll.pdf` is rejected. Trailing dots and whitespace are ignored
    /// since Windows strips them when saving (`setup.exe.` is `setup.exe`).
    pub fn denies(&self, name: &str) -> bool {
        let name = name.trim_end_matches(|c: char| c == '.' || c.is_whitespace());
        name.split('.')
            .skip(1)
            .any(|ext| self.extensions.contains(&ext.trim().to_ascii_lowercase()))
    }
}

/// Create one object per file under `parent`, returning the new ids in the
/// same order as `files`.
///
/// A file whose name matches the title of an existing `File` child (or of a
/// file earlier in the same upload) is titled
/// `{stem} [{YYYY-MM-DD HH-MM-SS}]{extension}` using `now`.
#[instrument(skip_all, fields(%parent, files = files.len()))]
pub async fn upload(
    source: &SourceHandle,
    denylist: &Denylist,
    parent: ObjectId,
    files: Vec<UploadFile>,
    now: OffsetDateTime,
) -> Result<Vec<ObjectId>> {
    if files.is_empty() {
        exn::bail!(ErrorKind::NoFiles);
    }
    if let Some(file) = files.iter().find(|file| denylist.denies(&file.name)) {
        exn::bail!(ErrorKind::DeniedExtension(file.name.clone()));
    }

    let parent_node = source.get_objects(&[parent]).await.or_raise(|| ErrorKind::Fetch)?.into_iter().next();
    let Some(parent_node) = parent_node else {
        exn::bail!(ErrorKind::ParentNotFound(parent));
    };
    if !parent_node.object_type.is_mountable && parent_node.object_type.name != PROJECT_FOLDER_TYPE {
        exn::bail!(ErrorKind::ParentNotContainer);
    }
    let metadata = source.metadata().await.or_raise(|| ErrorKind::Fetch)?;
    let file_type = metadata.type_named(FILE_TYPE).ok_or_raise(|| ErrorKind::MissingFileType)?;

    let existing_ids: Vec<ObjectId> = parent_node
        .children
        .iter()
        .filter(|child| child.type_id == file_type.id)
        .map(|child| child.object_id)
        .collect();
    let existing = if existing_ids.is_empty() {
        Vec::new()
    } else {
        source.get_objects(&existing_ids).await.or_raise(|| ErrorKind::Fetch)?
    };
    let mut names = UploadNames::new(
        existing
            .iter()
            .filter_map(|node| node.attribute(TITLE_ATTRIBUTE))
            .filter(|title| !title.is_empty())
            .map(str::to_string),
    );

    let mut created = Vec::with_capacity(files.len());
    for file in files {
        let title = names.claim(&file.name, now)?;
        if title != file.name {
            tracing::debug!(original = %file.name, renamed = %title, "Renamed colliding upload");
        }
        let request = NewObject {
            id: ObjectId::new_v4(),
            parent,
            type_id: file_type.id,
            attributes: BTreeMap::from([(TITLE_ATTRIBUTE.to_string(), title)]),
            file,
        };
        created.push(source.create_object(request).await.or_raise(|| ErrorKind::Create)?);
    }
    tracing::info!(created = created.len(), "Uploaded files");
    Ok(created)
}
