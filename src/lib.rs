//! # pdfgrid
//!
//! Tile photos, scans and PDF pages into a new PDF, several per sheet.
//!
//! ## Why this crate?
//!
//! Printing a stack of receipts, ID photos or slides one per page wastes
//! paper. This crate takes an ordered list of images and PDFs, rasterises
//! every image and every PDF page, and lays them out `N` to a page in a grid
//! that adapts to the sheet orientation and to the shape of the first image
//! on each page. Memory stays flat on long inputs: sources are processed a
//! couple at a time and large PDFs are rendered a few pages at a time.
//!
//! ## Pipeline Overview
//!
//! ```text
//! inputs (paths, file:// URIs, URLs)
//!  │
//!  ├─ 1. Input    resolve to local files, sniff PDF vs image
//!  ├─ 2. Raster   subsampled image decode / batched pdfium render
//!  │              (per-page lopdf split + re-render on failure)
//!  ├─ 3. Layout   rows × cols per output page
//!  ├─ 4. Compose  scale-to-fit and centre in the next cell
//!  ├─ 5. Encode   JPEG by size tier, lossless + soft mask if transparent
//!  └─ 6. Write    lopdf document → bytes
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfgrid::{compose, ComposeConfig, Orientation};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ComposeConfig::builder()
//!         .items_per_page(4)
//!         .orientation(Orientation::Landscape)
//!         .build()?;
//!     let output = compose(&["receipt-1.jpg", "receipt-2.jpg", "statement.pdf"], &config).await?;
//!     std::fs::write("grid.pdf", &output.pdf)?;
//!     eprintln!(
//!         "{} pages, {} inputs skipped",
//!         output.stats.output_pages, output.stats.skipped_items
//!     );
//!     Ok(())
//! }
//! ```
//!
//! Host applications that speak strings and JSON use [`edit_pdf`], which
//! never returns an error and folds every outcome into an [`EditResponse`].
//!
//! ## PDFium
//!
//! PDF inputs are rendered with PDFium through `pdfium-render`. The library
//! is bound lazily from `PDFIUM_LIB_PATH`, the per-user cache directory
//! (`PDFGRID_PDFIUM_DIR`, default `~/.cache/pdfgrid/pdfium`), the executable's
//! directory, or the system library path. Image-only jobs never touch it.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfgrid` binary (clap + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdfgrid = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod job;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ComposeConfig, ComposeConfigBuilder, Orientation, PaperSize, QualityTiers};
pub use error::{ItemError, PdfGridError};
pub use job::{compose, compose_sync, compose_to_file, compose_with, edit_pdf, edit_pdf_with};
pub use output::{ComposeOutput, ComposeStats, EditResponse};
pub use pipeline::input::{FsResolver, InputResolver, ResolveContext, ResolvedInput, SourceKind};
pub use pipeline::layout::GridPlan;
pub use pipeline::render::{PageSource, PdfEngine, PdfiumEngine, RenderError};
pub use progress::{JobProgressCallback, NoopProgressCallback, ProgressCallback};
