//! Page rendering.
//!
//! The rest of the workspace treats rendering as an opaque, pure function from
//! document bytes to page images. [`Renderer`] is that function;
//! [`PopplerRenderer`] is the production implementation.

pub mod error;
#[cfg(feature = "mock")]
mod mock;
mod poppler;

use crate::error::{ErrorKind, Result};
#[cfg(feature = "mock")]
pub use crate::mock::{MockRenderer, RenderCall};
pub use crate::poppler::PopplerRenderer;
use std::sync::Arc;

pub type RendererHandle = Arc<dyn Renderer + Send + Sync>;

/// Renders document bytes into page images.
///
/// Implementations are synchronous and may block for a long time; async
/// callers should run them inside [`spawn_blocking`](https://docs.rs/tokio/latest/tokio/task/fn.spawn_blocking.html).
/// `scale` is relative to the document's natural size (`1.0` is 72 DPI).
pub trait Renderer {
    /// Render every page, page 1 first. A document without pages renders to
    /// an empty list.
    fn render_pages(&self, document: &[u8], scale: f32) -> Result<Vec<Vec<u8>>>;

    /// Render a single 1-indexed page. `None` when the renderer produced no
    /// image for it.
    fn render_page(&self, document: &[u8], page: usize, scale: f32) -> Result<Option<Vec<u8>>>;
}

pub(crate) fn check_scale(scale: f32) -> Result<f32> {
    if !scale.is_finite() || scale <= 0.0 {
        exn::bail!(ErrorKind::InvalidScale(scale));
    }
    Ok(scale)
}
