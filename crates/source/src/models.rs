//! Read-only views of repository objects, and the requests used to create new
//! ones.

use quire_storage::{ArtifactId, ObjectId};
use std::collections::BTreeMap;

/// Repository-assigned identifier of an object type.
pub type TypeId = u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectType {
    pub id: TypeId,
    pub name: String,
    /// Objects of this type carry file snapshots.
    pub has_files: bool,
    /// Objects of this type are top-level containers other objects can be
    /// created under.
    pub is_mountable: bool,
}
impl ObjectType {
    pub fn new(id: TypeId, name: impl Into<String>) -> Self {
        Self { id, name: name.into(), has_files: false, is_mountable: false }
    }

    pub fn with_files(mut self) -> Self {
        self.has_files = true;
        self
    }

    pub fn mountable(mut self) -> Self {
        self.is_mountable = true;
        self
    }
}

/// A child as listed on its parent: enough to fetch it, not the object itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildRef {
    pub object_id: ObjectId,
    pub type_id: TypeId,
}

/// One file of an object's current snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub id: ArtifactId,
    pub name: String,
    pub size: u64,
}
impl FileRef {
    pub fn new(id: ArtifactId, name: impl Into<String>, size: u64) -> Self {
        Self { id, name: name.into(), size }
    }
}

/// A repository object as returned by a batch fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub id: ObjectId,
    pub title: String,
    pub object_type: ObjectType,
    pub children: Vec<ChildRef>,
    /// Files of the object's actual snapshot, in repository order.
    pub files: Vec<FileRef>,
    pub attributes: BTreeMap<String, String>,
}
impl TreeNode {
    pub fn new(id: ObjectId, title: impl Into<String>, object_type: ObjectType) -> Self {
        Self {
            id,
            title: title.into(),
            object_type,
            children: Vec::new(),
            files: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_child(mut self, child: &TreeNode) -> Self {
        self.children.push(child.as_child());
        self
    }

    pub fn with_file(mut self, file: FileRef) -> Self {
        self.files.push(file);
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn as_child(&self) -> ChildRef {
        ChildRef { object_id: self.id, type_id: self.object_type.id }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Repository-wide metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub types: Vec<ObjectType>,
}
impl Metadata {
    pub fn type_named(&self, name: &str) -> Option<&ObjectType> {
        self.types.iter().find(|t| t.name == name)
    }
}

/// A file supplied by a client for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub data: Vec<u8>,
}
impl UploadFile {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into(), data: data.into() }
    }
}

/// Request to create a single-file object under `parent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewObject {
    /// Client-chosen identifier for the new object.
    pub id: ObjectId,
    pub parent: ObjectId,
    pub type_id: TypeId,
    pub attributes: BTreeMap<String, String>,
    pub file: UploadFile,
}
