//! PDF page rendering: the [`PdfEngine`] seam and its PDFium implementation.
//!
//! ## Why a callback-shaped engine?
//!
//! `pdfium-render` ties every `PdfDocument` to the lifetime of the `Pdfium`
//! binding that opened it, and the binding is `!Send`. Rather than fight
//! that with self-referential structs, [`PdfEngine::with_document`] binds,
//! opens, lends the open document to the caller's closure and tears it all
//! down on return. The rasterizer drives its render batches inside that
//! closure, so one binding serves a whole source PDF.
//!
//! ## Binding order
//!
//! 1. An engine built with [`PdfiumEngine::with_library`] binds only there
//! 2. `PDFIUM_LIB_PATH` (explicit library file)
//! 3. The per-user cache: `$PDFGRID_PDFIUM_DIR`, else
//!    `~/.cache/pdfgrid/pdfium/` (platform equivalent via `dirs`)
//! 4. A library next to the running executable
//! 5. The system library search path
//!
//! Candidates 2-4 that do not exist on disk are skipped with a warning.
//! Nothing is downloaded; drop a `libpdfium` into the cache directory to
//! install one. Binding happens lazily, on the first PDF input, so
//! image-only jobs work on machines without PDFium.

use crate::pipeline::raster::PixelPage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Failures from the PDF renderer. Always item- or page-level.
#[derive(Debug, Error)]
pub enum RenderError {
    /// No PDFium library could be loaded.
    #[error("Failed to bind to pdfium library: {0}\nSet PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.")]
    Bind(String),

    /// The document could not be opened (corrupt, encrypted, not a PDF).
    #[error("Failed to open '{path}': {detail}")]
    Open { path: PathBuf, detail: String },

    /// A single page could not be measured or rasterised.
    #[error("Rasterisation failed for page {page}: {detail}")]
    Page { page: usize, detail: String },
}

/// An open PDF whose pages can be measured and rasterised.
pub trait PageSource {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// `(width, height)` of the 0-based page `index`, in points.
    fn page_size(&self, index: usize) -> Result<(f32, f32), RenderError>;

    /// Rasterise page `index` at `scale` pixels per point.
    fn render(&self, index: usize, scale: f32) -> Result<PixelPage, RenderError>;
}

/// Opens PDF files for rendering.
///
/// `Send + Sync` so one engine can be shared by every job in a process;
/// each call to [`with_document`](Self::with_document) is independent.
pub trait PdfEngine: Send + Sync {
    /// Open `path` and lend its pages to `visit`. The document is closed when
    /// this returns; `visit`'s error is passed through unchanged.
    fn with_document(
        &self,
        path: &Path,
        visit: &mut dyn FnMut(&dyn PageSource) -> Result<(), RenderError>,
    ) -> Result<(), RenderError>;
}

/// [`PdfEngine`] backed by Google PDFium through `pdfium-render`.
///
/// Stateless: the library is bound per document because the upstream
/// `Pdfium` type is `!Send`. The OS caches the `dlopen`, so repeat binds
/// are cheap.
#[derive(Debug, Clone, Default)]
pub struct PdfiumEngine {
    library_path: Option<PathBuf>,
}

impl PdfiumEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always bind to the library at `path`, ignoring the search order.
    pub fn with_library(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    fn bind(&self) -> Result<Pdfium, RenderError> {
        let candidates = candidates_from(
            self.library_path.as_deref(),
            std::env::var("PDFIUM_LIB_PATH").ok(),
            pdfium_cache_dir(),
            std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf)),
        );

        let mut last_error = None;
        for candidate in candidates {
            let bound = match &candidate {
                Candidate::File(path) => bind_at(path),
                Candidate::System => Pdfium::bind_to_system_library()
                    .map(Pdfium::new)
                    .map_err(|e| RenderError::Bind(format!("system library: {e}"))),
            };
            match bound {
                Ok(pdfium) => return Ok(pdfium),
                Err(e) => {
                    debug!("PDFium candidate {:?} failed: {}", candidate, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| RenderError::Bind("no PDFium library found".into())))
    }
}

/// One place a PDFium library may be loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Candidate {
    File(PathBuf),
    System,
}

/// Directory searched for a user-installed `libpdfium`.
///
/// `PDFGRID_PDFIUM_DIR` overrides the platform cache location
/// (`~/.cache/pdfgrid/pdfium` on Linux, `~/Library/Caches/pdfgrid/pdfium`
/// on macOS, `%LOCALAPPDATA%\pdfgrid\pdfium` on Windows).
fn pdfium_cache_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("PDFGRID_PDFIUM_DIR") {
        if !dir.is_empty() {
            return Some(PathBuf::from(dir));
        }
    }
    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .map(|base| base.join("pdfgrid").join("pdfium"))
}

/// Ordered bind candidates. Environment and filesystem lookups are done by
/// the caller so the ordering can be checked in isolation.
fn candidates_from(
    explicit: Option<&Path>,
    env_lib: Option<String>,
    cache_dir: Option<PathBuf>,
    exe_dir: Option<PathBuf>,
) -> Vec<Candidate> {
    if let Some(path) = explicit {
        return vec![Candidate::File(path.to_path_buf())];
    }

    let mut candidates = Vec::new();
    if let Some(path) = env_lib.filter(|p| !p.is_empty()).map(PathBuf::from) {
        if path.exists() {
            candidates.push(Candidate::File(path));
        } else {
            warn!("PDFIUM_LIB_PATH '{}' not found; searching further", path.display());
        }
    }
    for dir in cache_dir.into_iter().chain(exe_dir) {
        let path = Pdfium::pdfium_platform_library_name_at_path(&dir);
        if path.exists() {
            candidates.push(Candidate::File(path));
        }
    }
    candidates.push(Candidate::System);
    candidates
}

fn bind_at(path: &Path) -> Result<Pdfium, RenderError> {
    debug!("Binding PDFium from {}", path.display());
    Pdfium::bind_to_library(path)
        .map(Pdfium::new)
        .map_err(|e| RenderError::Bind(format!("{}: {e}", path.display())))
}

impl PdfEngine for PdfiumEngine {
    fn with_document(
        &self,
        path: &Path,
        visit: &mut dyn FnMut(&dyn PageSource) -> Result<(), RenderError>,
    ) -> Result<(), RenderError> {
        let pdfium = self.bind()?;
        let document =
            pdfium
                .load_pdf_from_file(path, None)
                .map_err(|e| RenderError::Open {
                    path: path.to_path_buf(),
                    detail: format!("{e:?}"),
                })?;

        visit(&PdfiumPages {
            document: &document,
        })
    }
}

struct PdfiumPages<'d, 'p> {
    document: &'d PdfDocument<'p>,
}

impl PdfiumPages<'_, '_> {
    fn page(&self, index: usize) -> Result<PdfPage<'_>, RenderError> {
        let page_index = u16::try_from(index).map_err(|_| RenderError::Page {
            page: index + 1,
            detail: format!("page index {index} exceeds u16 maximum"),
        })?;
        self.document
            .pages()
            .get(page_index)
            .map_err(|e| RenderError::Page {
                page: index + 1,
                detail: format!("{e:?}"),
            })
    }
}

impl PageSource for PdfiumPages<'_, '_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_size(&self, index: usize) -> Result<(f32, f32), RenderError> {
        let page = self.page(index)?;
        Ok((page.width().value, page.height().value))
    }

    fn render(&self, index: usize, scale: f32) -> Result<PixelPage, RenderError> {
        let page = self.page(index)?;
        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| RenderError::Page {
                page: index + 1,
                detail: format!("{e:?}"),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} at ×{:.3} → {}x{} px",
            index + 1,
            scale,
            image.width(),
            image.height()
        );

        Ok(PixelPage::from_image(image))
    }
}
