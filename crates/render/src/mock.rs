//! Scripted renderer for testing.

use crate::error::{ErrorKind, Result};
use crate::{Renderer, check_scale};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// A single recorded call to a [`MockRenderer`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderCall {
    /// `None` when every page was requested.
    pub page: Option<usize>,
    pub scale: f32,
    pub document: Vec<u8>,
}

/// Renderer that returns pre-scripted pages and records every call.
///
/// # Examples
///
/// ```
/// use quire_render::{MockRenderer, Renderer};
///
/// let renderer = MockRenderer::with_pages([b"page 1".to_vec(), b"page 2".to_vec()]);
/// assert_eq!(renderer.render_pages(b"%PDF", 1.0).unwrap().len(), 2);
/// assert_eq!(renderer.calls().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockRenderer {
    pages: Vec<Vec<u8>>,
    fail: AtomicBool,
    calls: Mutex<Vec<RenderCall>>,
}
impl MockRenderer {
    pub fn with_pages(pages: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self { pages: pages.into_iter().collect(), ..Self::default() }
    }

    /// Make every subsequent render fail as if the renderer crashed.
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    fn record(&self, document: &[u8], page: Option<usize>, scale: f32) -> Result<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RenderCall { page, scale, document: document.to_vec() });
        }
        check_scale(scale)?;
        if self.fail.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::RendererFailed(1));
        }
        Ok(())
    }
}

impl Renderer for MockRenderer {
    fn render_pages(&self, document: &[u8], scale: f32) -> Result<Vec<Vec<u8>>> {
        self.record(document, None, scale)?;
        Ok(self.pages.clone())
    }

    fn render_page(&self, document: &[u8], page: usize, scale: f32) -> Result<Option<Vec<u8>>> {
        self.record(document, Some(page), scale)?;
        if page == 0 {
            exn::bail!(ErrorKind::InvalidPage(page));
        }
        Ok(self.pages.get(page - 1).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_calls() {
        let renderer = MockRenderer::with_pages([b"one".to_vec()]);
        assert_eq!(renderer.render_page(b"doc", 1, 0.2).unwrap(), Some(b"one".to_vec()));
        assert_eq!(renderer.render_page(b"doc", 2, 0.2).unwrap(), None);
        let calls = renderer.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], RenderCall { page: Some(1), scale: 0.2, document: b"doc".to_vec() });
    }

    #[test]
    fn test_failure() {
        let renderer = MockRenderer::default();
        renderer.fail(true);
        let err = renderer.render_pages(b"doc", 1.0).unwrap_err();
        assert!(matches!(&*err, ErrorKind::RendererFailed(1)));
        assert_eq!(renderer.calls().len(), 1);
    }
}
