use crate::error::{ErrorKind, Result};
use crate::{Renderer, check_scale};
use exn::ResultExt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{NamedTempFile, TempDir};
use tracing::instrument;

/// Points per inch in PDF user space; a scale of `1.0` renders at this DPI.
const BASE_DPI: f32 = 72.0;
const OUTPUT_PREFIX: &str = "page";

/// Renders PDF documents to PNG images with Poppler's `pdftoppm`.
///
/// Every call writes the document to a private temporary file and renders into
/// a private temporary directory, so concurrent calls never share state.
#[derive(Debug, Clone)]
pub struct PopplerRenderer {
    executable: PathBuf,
}
impl PopplerRenderer {
    /// Use an explicit `pdftoppm` executable.
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self { executable: executable.into() }
    }

    /// Find `pdftoppm` on `PATH`.
    pub fn discover() -> Result<Self> {
        match which::which("pdftoppm") {
            Ok(path) => {
                tracing::debug!(executable = %path.display(), "Discovered pdftoppm");
                Ok(Self::new(path))
            },
            Err(_) => {
                tracing::info!("pdftoppm executable not found in PATH");
                exn::bail!(ErrorKind::ExecutableNotFound);
            },
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Run `pdftoppm` over `document`, returning the directory the pages were
    /// written to. `page` limits rendering to a single page.
    fn execute(&self, document: &[u8], scale: f32, page: Option<usize>) -> Result<TempDir> {
        let dpi = BASE_DPI * check_scale(scale)?;
        let mut input = NamedTempFile::new().or_raise(|| ErrorKind::Io)?;
        input.write_all(document).or_raise(|| ErrorKind::Io)?;
        input.flush().or_raise(|| ErrorKind::Io)?;
        let output = TempDir::new().or_raise(|| ErrorKind::Io)?;

        let mut command = Command::new(&self.executable);
        command.arg("-png").arg("-r").arg(dpi.to_string());
        if let Some(page) = page {
            let page = page.to_string();
            command.args(["-f", &page, "-l", &page]);
        }
        command.arg(input.path()).arg(output.path().join(OUTPUT_PREFIX));

        let result = command.output().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::ExecutableNotFound,
            _ => ErrorKind::Io,
        })?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            tracing::warn!(status = %result.status, stderr = %stderr.trim(), "pdftoppm failed");
            exn::bail!(match result.status.code() {
                Some(code) => ErrorKind::RendererFailed(code),
                None => ErrorKind::RendererTerminated,
            });
        }
        Ok(output)
    }
}

/// Page number of a `pdftoppm` output file (`page-07.png` is page 7).
///
/// Zero-padding width depends on the document's page count, so the number is
/// parsed rather than the file names sorted.
fn page_number(path: &Path) -> Option<usize> {
    if path.extension()? != "png" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix(OUTPUT_PREFIX)?.strip_prefix('-')?.parse().ok()
}

fn collect_pages(dir: &Path) -> Result<Vec<Vec<u8>>> {
    let mut numbered = Vec::new();
    for entry in std::fs::read_dir(dir).or_raise(|| ErrorKind::Io)? {
        let path = entry.or_raise(|| ErrorKind::Io)?.path();
        if let Some(number) = page_number(&path) {
            numbered.push((number, path));
        }
    }
    numbered.sort_unstable_by_key(|(number, _)| *number);
    numbered.into_iter().map(|(_, path)| std::fs::read(path).or_raise(|| ErrorKind::Io)).collect()
}

impl Renderer for PopplerRenderer {
    #[instrument(skip(self, document), fields(bytes = document.len()))]
    fn render_pages(&self, document: &[u8], scale: f32) -> Result<Vec<Vec<u8>>> {
        let output = self.execute(document, scale, None)?;
        let pages = collect_pages(output.path())?;
        tracing::debug!(pages = pages.len(), "Rendered document");
        Ok(pages)
    }

    #[instrument(skip(self, document), fields(bytes = document.len()))]
    fn render_page(&self, document: &[u8], page: usize, scale: f32) -> Result<Option<Vec<u8>>> {
        if page == 0 {
            exn::bail!(ErrorKind::InvalidPage(page));
        }
        let output = self.execute(document, scale, Some(page))?;
        Ok(collect_pages(output.path())?.into_iter().next())
    }
}
