//! Error types for the pdfgrid library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PdfGridError`] — **Fatal**: the job cannot produce a document at all
//!   (invalid configuration, nothing could be composed, the document could
//!   not be serialised or written). Returned as `Err(PdfGridError)` from the
//!   top-level `compose*` functions and mapped onto
//!   [`crate::output::EditResponse::Error`] by [`crate::job::edit_pdf`].
//!
//! * [`ItemError`] — **Non-fatal**: a single input could not be resolved,
//!   decoded or rendered. The item contributes zero pages, a warning is
//!   logged, and the job carries on with the remaining inputs.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdfgrid library.
///
/// Item-level failures use [`ItemError`] and never abort a job.
#[derive(Debug, Error)]
pub enum PdfGridError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// Orientation string is not one of the two accepted values.
    #[error("Invalid orientation '{value}': expected \"Retrato\" (portrait) or \"Paisagem\" (landscape)")]
    InvalidOrientation { value: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The caller passed an empty list of input references.
    #[error("No input files were given")]
    NoInputs,

    // ── Job errors ────────────────────────────────────────────────────────
    /// Every input was skipped; the output document would have no pages.
    #[error("None of the {total} inputs produced a page.\nFirst error: {first_error}")]
    NothingComposed { total: usize, first_error: String },

    /// The per-job workspace directory could not be created.
    #[error("Failed to create job workspace in '{dir}': {source}")]
    Workspace {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// lopdf failed to serialise the composed document.
    #[error("Failed to serialise output PDF: {0}")]
    SerializeFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (worker panic, runtime construction).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PdfGridError {
    /// Stable machine-readable code reported across the bridge.
    pub fn code(&self) -> &'static str {
        match self {
            PdfGridError::InvalidOrientation { .. } => "INVALID_ORIENTATION",
            PdfGridError::InvalidConfig(_) => "INVALID_CONFIG",
            PdfGridError::NoInputs => "NO_INPUTS",
            PdfGridError::NothingComposed { .. } => "NOTHING_COMPOSED",
            PdfGridError::Workspace { .. } => "WORKSPACE_FAILED",
            PdfGridError::SerializeFailed(_) => "SERIALIZE_FAILED",
            PdfGridError::OutputWriteFailed { .. } => "OUTPUT_WRITE_FAILED",
            PdfGridError::Internal(_) => "INTERNAL",
        }
    }
}

/// A non-fatal error for a single input item.
///
/// Logged and reported to [`crate::progress::JobProgressCallback::on_item_skipped`];
/// the item is dropped from the output and the job continues.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ItemError {
    /// The resolver returned no file for this reference.
    #[error("Input {index}: file not found for '{reference}'")]
    NotFound { index: usize, reference: String },

    /// Image bounds could not be read, or the image reports a zero dimension.
    #[error("Input {index}: unreadable image bounds ({detail})")]
    ImageBounds { index: usize, detail: String },

    /// Image header was fine but decoding the pixels failed.
    #[error("Input {index}: image decode failed: {detail}")]
    ImageDecode { index: usize, detail: String },

    /// Both the direct renderer and the fallback pipeline failed.
    #[error("Input {index}: PDF could not be rendered: {detail}")]
    PdfUnrenderable { index: usize, detail: String },

    /// A pixel page could not be encoded into the output document.
    #[error("Input {index}: embedding page failed: {detail}")]
    EmbedFailed { index: usize, detail: String },
}

impl ItemError {
    /// 0-based position of the failed item in the caller's input list.
    pub fn index(&self) -> usize {
        match self {
            ItemError::NotFound { index, .. }
            | ItemError::ImageBounds { index, .. }
            | ItemError::ImageDecode { index, .. }
            | ItemError::PdfUnrenderable { index, .. }
            | ItemError::EmbedFailed { index, .. } => *index,
        }
    }
}
