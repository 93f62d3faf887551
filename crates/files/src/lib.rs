//! Lazy artifact cache and tree-archive generator.
//!
//! The [`Files`] service answers document-preview requests (page counts, page
//! images, thumbnails) from a cache of rendered artifacts, generating and
//! caching them on a miss. It also builds flat ZIP archives of object trees and
//! uploads new files into the repository.
//!
//! # Architecture
//! - [`pipeline`]: cache-or-generate for pages and thumbnails.
//! - [`archive`]: iterative tree walk, entry naming, in-memory ZIP assembly.
//! - [`upload`]: validation and collision-free naming of new objects.
//!
//! Collaborators are injected as handles: the content source
//! ([`SourceHandle`](quire_source::SourceHandle)), the renderer
//! ([`RendererHandle`](quire_render::RendererHandle)) and the
//! [`ArtifactCache`](quire_cache::ArtifactCache).

pub mod archive;
pub mod error;
pub mod pipeline;
mod service;
pub mod upload;

pub use crate::service::{Files, FilesConfig};
