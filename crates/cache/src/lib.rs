//! Derived-artifact cache.
//!
//! This crate keeps the expensive-to-produce artifacts derived from source
//! files: rendered page images and thumbnails. It is a cache, not a source of
//! truth; everything in here can be regenerated from the source file, and a
//! missing entry is a miss, never an error.
//!
//! # Architecture
//! Two independent keyed stores, both layered on a
//! [`BlobStore`](quire_storage::BlobStore) and keyed by [`ArtifactId`](quire_storage::ArtifactId):
//! - **Pages**: every rendered page of a file packed into one blob (see
//!   [`pageset`]), so a page set is either entirely present or entirely absent,
//!   and a single page (or just the count) can be read without touching the
//!   others.
//! - **Thumbnails**: a single image per file, stored verbatim.

pub mod error;
pub mod pageset;
mod repo;

pub use crate::repo::ArtifactCache;
