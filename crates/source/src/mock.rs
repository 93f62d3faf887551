//! In-memory object repository for testing.

use crate::ContentSource;
use crate::error::{ErrorKind, Result};
use crate::models::{Metadata, NewObject, TreeNode};
use async_trait::async_trait;
use dashmap::DashMap;
use quire_storage::{ArtifactId, ObjectId};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// A single recorded call to a [`MockSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceCall {
    GetObjects(Vec<ObjectId>),
    Download(ArtifactId),
    Metadata,
    CreateObject(ObjectId),
}

/// In-memory repository that records every call made to it.
///
/// Created objects are inserted as children of their parent, so a later fetch
/// of the parent sees them. Fetches and downloads can be made to fail on
/// demand.
#[derive(Debug, Default)]
pub struct MockSource {
    metadata: Metadata,
    objects: DashMap<ObjectId, TreeNode>,
    files: DashMap<ArtifactId, Vec<u8>>,
    created: Mutex<Vec<NewObject>>,
    calls: Mutex<Vec<SourceCall>>,
    fail_fetches: AtomicBool,
    fail_downloads: AtomicBool,
}
impl MockSource {
    pub fn new(metadata: Metadata) -> Self {
        Self { metadata, ..Self::default() }
    }

    pub fn insert(&self, node: TreeNode) {
        self.objects.insert(node.id, node);
    }

    pub fn insert_file(&self, id: ArtifactId, data: impl Into<Vec<u8>>) {
        self.files.insert(id, data.into());
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    pub fn fail_downloads(&self, fail: bool) {
        self.fail_downloads.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<SourceCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// Every object created so far, in creation order.
    pub fn created(&self) -> Vec<NewObject> {
        self.created.lock().map(|created| created.clone()).unwrap_or_default()
    }

    fn record(&self, call: SourceCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl ContentSource for MockSource {
    async fn get_objects(&self, ids: &[ObjectId]) -> Result<Vec<TreeNode>> {
        self.record(SourceCall::GetObjects(ids.to_vec()));
        if self.fail_fetches.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Unavailable);
        }
        Ok(ids.iter().filter_map(|id| self.objects.get(id).map(|node| node.value().clone())).collect())
    }

    async fn download(&self, file: ArtifactId, expected_size: u64) -> Result<Vec<u8>> {
        self.record(SourceCall::Download(file));
        if self.fail_downloads.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Unavailable);
        }
        let data = self.files.get(&file).map(|entry| entry.value().clone());
        let data = data.ok_or_else(|| exn::Exn::from(ErrorKind::FileNotFound(file)))?;
        let actual = data.len() as u64;
        if expected_size != actual {
            exn::bail!(ErrorKind::SizeMismatch { expected: expected_size, actual });
        }
        Ok(data)
    }

    async fn metadata(&self) -> Result<Metadata> {
        self.record(SourceCall::Metadata);
        Ok(self.metadata.clone())
    }

    async fn create_object(&self, object: NewObject) -> Result<ObjectId> {
        self.record(SourceCall::CreateObject(object.id));
        let object_type = self
            .metadata
            .types
            .iter()
            .find(|t| t.id == object.type_id)
            .cloned()
            .ok_or_else(|| exn::Exn::from(ErrorKind::Rejected(format!("unknown type {}", object.type_id))))?;
        let Some(mut parent) = self.objects.get_mut(&object.parent) else {
            exn::bail!(ErrorKind::ParentNotFound(object.parent));
        };
        let mut node = TreeNode::new(object.id, object.file.name.clone(), object_type);
        node.attributes = object.attributes.clone();
        parent.children.push(node.as_child());
        drop(parent);
        self.objects.insert(node.id, node);
        if let Ok(mut created) = self.created.lock() {
            created.push(object.clone());
        }
        Ok(object.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileRef, ObjectType, UploadFile};
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_unknown_objects_omitted() {
        let source = MockSource::default();
        let known = TreeNode::new(ObjectId::new_v4(), "Known", ObjectType::new(1, "Folder"));
        source.insert(known.clone());
        let fetched = source.get_objects(&[ObjectId::new_v4(), known.id]).await.unwrap();
        assert_eq!(fetched, vec![known]);
    }

    #[tokio::test]
    async fn test_download_checks_size() {
        let source = MockSource::default();
        let file = FileRef::new(ArtifactId::new_v4(), "a.pdf", 3);
        source.insert_file(file.id, b"abc".to_vec());
        assert_eq!(source.download(file.id, file.size).await.unwrap(), b"abc");
        let err = source.download(file.id, 4).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::SizeMismatch { expected: 4, actual: 3 }));
        assert_eq!(source.calls(), vec![SourceCall::Download(file.id), SourceCall::Download(file.id)]);
    }

    #[tokio::test]
    async fn test_created_object_becomes_child() {
        let file_type = ObjectType::new(2, "File").with_files();
        let source = MockSource::new(Metadata { types: vec![file_type] });
        let parent = TreeNode::new(ObjectId::new_v4(), "Parent", ObjectType::new(1, "Folder").mountable());
        source.insert(parent.clone());
        let id = ObjectId::new_v4();
        let request = NewObject {
            id,
            parent: parent.id,
            type_id: 2,
            attributes: BTreeMap::new(),
            file: UploadFile::new("notes.txt", "hello"),
        };
        assert_eq!(source.create_object(request).await.unwrap(), id);
        let parent = source.get_objects(&[parent.id]).await.unwrap().remove(0);
        assert_eq!(parent.children.len(), 1);
        assert_eq!(parent.children[0].object_id, id);
        assert_eq!(source.created().len(), 1);
    }
}
