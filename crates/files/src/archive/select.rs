//! Choosing which file stands in for a node, and what it is called.

use quire_source::models::{FileRef, ObjectType, TreeNode};
use std::path::Path;

/// Type name of plain project files.
pub const PLAIN_FILE_TYPE: &str = "Project_file";

const SYSTEM_FILE_NAMES: [&str; 2] = ["thumbs.db", "desktop.ini"];
const SYSTEM_FILE_EXTENSIONS: [&str; 3] = ["sig", "p7s", "tmp"];
const XPS_EXTENSIONS: [&str; 3] = ["xps", "oxps", "dwfx"];
const PDF_EXTENSIONS: [&str; 1] = ["pdf"];

/// How a node contributes to an archive, decided once from its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A plain project file: any non-system file, archived under its own name.
    PlainFile,
    /// Any other type carrying files: only XPS-like or PDF-like files, archived
    /// under the node's title.
    OtherFileBearing,
    /// Folders and everything else; never archived themselves.
    NoFiles,
}
impl From<&ObjectType> for NodeKind {
    fn from(object_type: &ObjectType) -> Self {
        if !object_type.has_files {
            Self::NoFiles
        } else if object_type.name == PLAIN_FILE_TYPE {
            Self::PlainFile
        } else {
            Self::OtherFileBearing
        }
    }
}

/// A file about to be written into an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Name inside the archive, before collision handling.
    pub name: String,
    pub source: FileRef,
}

fn extension(name: &str) -> Option<String> {
    Path::new(name).extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase)
}

fn has_extension(name: &str, set: &[&str]) -> bool {
    extension(name).is_some_and(|ext| set.contains(&ext.as_str()))
}

/// Files the repository keeps for itself: hidden files, Office lock files,
/// shell metadata, signatures.
pub fn is_system_file(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.starts_with('.')
        || lower.starts_with("~$")
        || SYSTEM_FILE_NAMES.contains(&lower.as_str())
        || has_extension(&lower, &SYSTEM_FILE_EXTENSIONS)
}

pub fn is_xps_like(name: &str) -> bool {
    has_extension(name, &XPS_EXTENSIONS)
}

pub fn is_pdf_like(name: &str) -> bool {
    has_extension(name, &PDF_EXTENSIONS)
}

/// Entry names become paths inside the archive; keep them flat.
fn flatten(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}

/// Pick the representative file of `node` and name its entry, or `None` if the
/// node contributes nothing.
pub fn representative(node: &TreeNode) -> Option<ArchiveEntry> {
    match NodeKind::from(&node.object_type) {
        NodeKind::NoFiles => None,
        NodeKind::PlainFile => {
            let file = node.files.iter().find(|f| !is_system_file(&f.name))?;
            Some(ArchiveEntry { name: flatten(&file.name), source: file.clone() })
        },
        NodeKind::OtherFileBearing => {
            let file = node.files.iter().find(|f| is_xps_like(&f.name) || is_pdf_like(&f.name))?;
            // Keep the original casing of the extension.
            let extension = Path::new(&file.name)
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| format!(".{ext}"))
                .unwrap_or_default();
            Some(ArchiveEntry { name: flatten(&format!("{}{extension}", node.title)), source: file.clone() })
        },
    }
}
