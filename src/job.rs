//! Job entry points.
//!
//! A job takes an ordered list of input references (image files, PDFs,
//! `file://` URIs or URLs) and returns one new PDF with the inputs tiled
//! `items_per_page` to a page. Every job gets its own workspace directory
//! named after a fresh job token; downloads and fallback files live there
//! and the directory is removed when the job returns, on every path.

use crate::config::{ComposeConfig, Orientation};
use crate::error::PdfGridError;
use crate::output::{ComposeOutput, ComposeStats, EditResponse};
use crate::pipeline::input::{FsResolver, InputResolver};
use crate::pipeline::render::{PdfEngine, PdfiumEngine};
use crate::pipeline::schedule::{self, ScheduleReport};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;
use tracing::{debug, info};
use uuid::Uuid;

/// Compose `inputs` into one grid PDF.
///
/// This is the primary entry point for the library. References are resolved
/// with [`FsResolver`] and PDFs rendered with [`PdfiumEngine`].
///
/// # Returns
/// `Ok(ComposeOutput)` when at least one page was placed, even if some
/// inputs were skipped (see `output.stats.skipped_items`).
///
/// # Errors
/// Only fatal errors:
/// - empty input list
/// - nothing could be composed
/// - the workspace could not be created or the document serialised
pub async fn compose<S: AsRef<str>>(
    inputs: &[S],
    config: &ComposeConfig,
) -> Result<ComposeOutput, PdfGridError> {
    compose_with(
        Arc::new(FsResolver::new()),
        Arc::new(PdfiumEngine::new()),
        inputs,
        config,
    )
    .await
}

/// [`compose`] with a caller-supplied resolver and PDF engine.
pub async fn compose_with<S: AsRef<str>>(
    resolver: Arc<dyn InputResolver>,
    engine: Arc<dyn PdfEngine>,
    inputs: &[S],
    config: &ComposeConfig,
) -> Result<ComposeOutput, PdfGridError> {
    let started = Instant::now();
    if inputs.is_empty() {
        return Err(PdfGridError::NoInputs);
    }
    let inputs: Vec<String> = inputs.iter().map(|s| s.as_ref().to_string()).collect();
    let total = inputs.len();

    let token = Uuid::new_v4();
    let workspace = create_workspace(config, &token)?;
    info!(
        "Job {}: {} inputs, {} per page, {} {:?}",
        token, total, config.items_per_page, config.orientation, config.paper
    );
    debug!("Job {}: workspace {}", token, workspace.path().display());

    if let Some(cb) = &config.progress_callback {
        cb.on_job_start(total);
    }

    let report = schedule::run(resolver.as_ref(), engine, &inputs, config, workspace.path()).await?;

    let ScheduleReport {
        composer,
        composed_items,
        skipped_items,
        first_error,
    } = report;

    let placed_images = composer.placed();
    if placed_images == 0 {
        return Err(PdfGridError::NothingComposed {
            total,
            first_error: first_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no pages were produced".to_string()),
        });
    }

    let (pdf, output_pages) = tokio::task::spawn_blocking(move || composer.finish())
        .await
        .map_err(|e| PdfGridError::Internal(format!("Serialise task panicked: {}", e)))??;

    drop(workspace);

    let stats = ComposeStats {
        total_items: total,
        composed_items,
        skipped_items,
        placed_images,
        output_pages,
        duration_ms: started.elapsed().as_millis() as u64,
    };
    info!(
        "Job {} complete: {} pages, {} bytes, {} skipped, {}ms",
        token,
        output_pages,
        pdf.len(),
        skipped_items,
        stats.duration_ms
    );

    if let Some(cb) = &config.progress_callback {
        cb.on_job_complete(total, output_pages);
    }

    Ok(ComposeOutput { pdf, stats })
}

fn create_workspace(config: &ComposeConfig, token: &Uuid) -> Result<TempDir, PdfGridError> {
    let parent = config
        .work_dir
        .clone()
        .unwrap_or_else(std::env::temp_dir);
    std::fs::create_dir_all(&parent).map_err(|e| PdfGridError::Workspace {
        dir: parent.clone(),
        source: e,
    })?;
    tempfile::Builder::new()
        .prefix(&format!("pdfgrid-{token}-"))
        .tempdir_in(&parent)
        .map_err(|e| PdfGridError::Workspace {
            dir: parent,
            source: e,
        })
}

/// Compose and write the PDF straight to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn compose_to_file<S: AsRef<str>>(
    inputs: &[S],
    output_path: impl AsRef<Path>,
    config: &ComposeConfig,
) -> Result<ComposeStats, PdfGridError> {
    let output = compose(inputs, config).await?;
    output.save(output_path).await?;
    Ok(output.stats)
}

pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PdfGridError> {
    let write_err = |e| PdfGridError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

/// Synchronous wrapper around [`compose`].
///
/// Creates a temporary tokio runtime internally.
pub fn compose_sync<S: AsRef<str>>(
    inputs: &[S],
    config: &ComposeConfig,
) -> Result<ComposeOutput, PdfGridError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PdfGridError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(compose(inputs, config))
}

/// The operation exposed to the host application.
///
/// `orientation` is the UI string (`"Retrato"` or `"Paisagem"`, English
/// names accepted). Never panics and never returns a bare error: every
/// failure is folded into [`EditResponse::Error`].
pub async fn edit_pdf<S: AsRef<str>>(
    inputs: &[S],
    items_per_page: usize,
    orientation: &str,
) -> EditResponse {
    edit_pdf_with(inputs, items_per_page, orientation, ComposeConfig::default()).await
}

/// [`edit_pdf`] on top of a base configuration (paper, margins, callback).
pub async fn edit_pdf_with<S: AsRef<str>>(
    inputs: &[S],
    items_per_page: usize,
    orientation: &str,
    base: ComposeConfig,
) -> EditResponse {
    EditResponse::from(run_edit(inputs, items_per_page, orientation, base).await)
}

async fn run_edit<S: AsRef<str>>(
    inputs: &[S],
    items_per_page: usize,
    orientation: &str,
    base: ComposeConfig,
) -> Result<ComposeOutput, PdfGridError> {
    let orientation: Orientation = orientation.parse()?;
    let config = base
        .into_builder()
        .items_per_page(items_per_page)
        .orientation(orientation)
        .build()?;
    compose(inputs, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[tokio::test]
    async fn bad_orientation_is_reported_not_raised() {
        let resp = edit_pdf(&["a.png"], 2, "Diagonal").await;
        match resp {
            EditResponse::Error { code, message } => {
                assert_eq!(code, "INVALID_ORIENTATION");
                assert!(message.contains("Diagonal"));
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn zero_items_per_page_is_invalid_config() {
        let resp = edit_pdf(&["a.png"], 0, "Retrato").await;
        assert!(matches!(resp, EditResponse::Error { ref code, .. } if code == "INVALID_CONFIG"));
    }

    #[tokio::test]
    async fn empty_inputs_are_rejected() {
        let empty: [&str; 0] = [];
        let resp = edit_pdf(&empty, 1, "Paisagem").await;
        assert!(matches!(resp, EditResponse::Error { ref code, .. } if code == "NO_INPUTS"));
    }

    #[tokio::test]
    async fn workspace_is_removed_after_job() {
        let work = tempfile::tempdir().unwrap();
        let image = work.path().join("one.png");
        RgbImage::from_pixel(30, 20, Rgb([5, 5, 5])).save(&image).unwrap();
        let missing = work.path().join("missing.png");

        let config = ComposeConfig::builder()
            .work_dir(work.path().join("jobs"))
            .build()
            .unwrap();
        let inputs = [image.to_string_lossy().to_string()];
        compose(&inputs, &config).await.unwrap();

        let bad = [missing.to_string_lossy().to_string()];
        let err = compose(&bad, &config).await.unwrap_err();
        assert!(matches!(err, PdfGridError::NothingComposed { total: 1, .. }));

        let leftovers = std::fs::read_dir(work.path().join("jobs")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn compose_to_file_writes_atomically() {
        let work = tempfile::tempdir().unwrap();
        let image = work.path().join("one.png");
        RgbImage::from_pixel(30, 20, Rgb([5, 5, 5])).save(&image).unwrap();
        let out = work.path().join("out/grid.pdf");

        let inputs = [image.to_string_lossy().to_string()];
        let stats = compose_to_file(&inputs, &out, &ComposeConfig::default())
            .await
            .unwrap();
        assert_eq!(stats.output_pages, 1);
        assert!(std::fs::read(&out).unwrap().starts_with(b"%PDF"));
        assert!(!out.with_extension("pdf.tmp").exists());
    }
}
