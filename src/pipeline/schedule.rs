//! Batch scheduling: walk the input list a few items at a time.
//!
//! Each batch is resolved concurrently on the async runtime, then handed
//! together with the [`PageComposer`] to one `spawn_blocking` worker that
//! rasterises and places every item in order. When the worker returns, the
//! batch's resolved inputs (and any downloaded files) and pixel buffers have
//! all been dropped, so peak memory is bounded by one batch no matter how
//! long the input list is.
//!
//! Item failures never stop the loop; they are logged, reported to the
//! progress callback and counted.

use crate::config::ComposeConfig;
use crate::error::{ItemError, PdfGridError};
use crate::pipeline::compose::PageComposer;
use crate::pipeline::input::{InputResolver, ResolveContext, ResolvedInput, SourceItem};
use crate::pipeline::raster;
use crate::pipeline::render::PdfEngine;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the scheduler hands back once every input has been processed.
pub struct ScheduleReport {
    pub composer: PageComposer,
    /// Inputs that placed at least one page.
    pub composed_items: usize,
    /// Inputs that placed nothing.
    pub skipped_items: usize,
    /// The first item failure, kept for the "nothing composed" error.
    pub first_error: Option<ItemError>,
}

/// Resolve, rasterise and compose `inputs` in batches of `config.source_batch_size`.
///
/// `workspace` is the job directory; downloads and fallback files go there.
pub async fn run(
    resolver: &dyn InputResolver,
    engine: Arc<dyn PdfEngine>,
    inputs: &[String],
    config: &ComposeConfig,
    workspace: &Path,
) -> Result<ScheduleReport, PdfGridError> {
    let total = inputs.len();
    let batch_size = config.source_batch_size.max(1);
    let ctx = ResolveContext {
        workspace,
        download_timeout_secs: config.download_timeout_secs,
    };

    let mut report = ScheduleReport {
        composer: PageComposer::new(config),
        composed_items: 0,
        skipped_items: 0,
        first_error: None,
    };

    for (batch_no, chunk) in inputs.chunks(batch_size).enumerate() {
        let offset = batch_no * batch_size;
        debug!(
            "Batch {}: resolving inputs {}..={}",
            batch_no + 1,
            offset,
            offset + chunk.len() - 1
        );

        let resolved = join_all(chunk.iter().map(|r| resolver.resolve(r, &ctx))).await;
        let pending: Vec<(usize, String, Option<ResolvedInput>)> = chunk
            .iter()
            .zip(resolved)
            .enumerate()
            .map(|(k, (reference, input))| (offset + k, reference.clone(), input))
            .collect();

        let worker = BatchWorker {
            engine: Arc::clone(&engine),
            config: config.clone(),
            scratch: workspace.to_path_buf(),
            total,
        };
        let composer = report.composer;
        let (composer, outcomes) = tokio::task::spawn_blocking(move || worker.run(composer, pending))
            .await
            .map_err(|e| PdfGridError::Internal(format!("Compose worker panicked: {e}")))?;
        report.composer = composer;

        for outcome in outcomes {
            match outcome {
                Ok(_) => report.composed_items += 1,
                Err(e) => {
                    report.skipped_items += 1;
                    report.first_error.get_or_insert(e);
                }
            }
        }
        debug!("Batch {}: done, buffers released", batch_no + 1);
    }

    info!(
        "Scheduled {} inputs: {} composed, {} skipped, {} pages placed",
        total,
        report.composed_items,
        report.skipped_items,
        report.composer.placed()
    );
    Ok(report)
}

/// Everything the blocking side of one batch needs, owned.
struct BatchWorker {
    engine: Arc<dyn PdfEngine>,
    config: ComposeConfig,
    scratch: PathBuf,
    total: usize,
}

impl BatchWorker {
    fn run(
        self,
        mut composer: PageComposer,
        pending: Vec<(usize, String, Option<ResolvedInput>)>,
    ) -> (PageComposer, Vec<Result<usize, ItemError>>) {
        let mut outcomes = Vec::with_capacity(pending.len());
        for (index, reference, input) in pending {
            let outcome = match input {
                None => Err(ItemError::NotFound { index, reference }),
                Some(input) => {
                    if let Some(cb) = &self.config.progress_callback {
                        cb.on_item_start(index, self.total);
                    }
                    let item = SourceItem {
                        index,
                        reference,
                        input,
                    };
                    raster::rasterize(
                        &item,
                        self.engine.as_ref(),
                        &self.config,
                        &self.scratch,
                        &mut composer,
                    )
                }
            };
            self.report(index, &outcome);
            outcomes.push(outcome);
        }
        (composer, outcomes)
    }

    fn report(&self, index: usize, outcome: &Result<usize, ItemError>) {
        let cb = self.config.progress_callback.as_ref();
        match outcome {
            Ok(pages) => {
                info!("Input {} composed: {} page(s)", index, pages);
                if let Some(cb) = cb {
                    cb.on_item_complete(index, self.total, *pages);
                }
            }
            Err(e) => {
                warn!("Skipping item: {}", e);
                if let Some(cb) = cb {
                    cb.on_item_skipped(index, self.total, &e.to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::input::SourceKind;
    use crate::pipeline::render::PdfiumEngine;
    use crate::progress::JobProgressCallback;
    use async_trait::async_trait;
    use image::{Rgb, RgbImage};
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    /// Resolves `ok-N` to a PNG in `dir`, anything else to `None`.
    struct LoggingResolver {
        dir: PathBuf,
        log: Log,
    }

    #[async_trait]
    impl InputResolver for LoggingResolver {
        async fn resolve(&self, reference: &str, _ctx: &ResolveContext<'_>) -> Option<ResolvedInput> {
            self.log.lock().unwrap().push(format!("resolve {reference}"));
            let path = self.dir.join(format!("{reference}.png"));
            path.exists()
                .then(|| ResolvedInput::local(path, SourceKind::Image))
        }
    }

    struct LoggingCallback(Log);

    impl JobProgressCallback for LoggingCallback {
        fn on_item_start(&self, index: usize, _total: usize) {
            self.0.lock().unwrap().push(format!("start {index}"));
        }
        fn on_item_skipped(&self, index: usize, _total: usize, _reason: &str) {
            self.0.lock().unwrap().push(format!("skip {index}"));
        }
    }

    #[tokio::test]
    async fn batches_resolve_then_compose_in_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["ok-0", "ok-1", "ok-3", "ok-4"] {
            RgbImage::from_pixel(20, 10, Rgb([1, 2, 3]))
                .save(dir.path().join(format!("{name}.png")))
                .unwrap();
        }
        let log: Log = Arc::default();
        let resolver = LoggingResolver {
            dir: dir.path().to_path_buf(),
            log: Arc::clone(&log),
        };
        let config = ComposeConfig::builder()
            .items_per_page(2)
            .progress_callback(Arc::new(LoggingCallback(Arc::clone(&log))))
            .build()
            .unwrap();
        let inputs: Vec<String> = ["ok-0", "ok-1", "missing-2", "ok-3", "ok-4"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let report = run(
            &resolver,
            Arc::new(PdfiumEngine::new()),
            &inputs,
            &config,
            dir.path(),
        )
        .await
        .unwrap();

        assert_eq!(report.composed_items, 4);
        assert_eq!(report.skipped_items, 1);
        assert!(matches!(
            report.first_error,
            Some(ItemError::NotFound { index: 2, .. })
        ));
        assert_eq!(report.composer.placed(), 4);
        assert_eq!(report.composer.output_pages(), 2);

        let log = log.lock().unwrap().clone();
        assert_eq!(
            log,
            vec![
                "resolve ok-0",
                "resolve ok-1",
                "start 0",
                "start 1",
                "resolve missing-2",
                "resolve ok-3",
                "skip 2",
                "start 3",
                "resolve ok-4",
                "start 4",
            ]
        );
    }
}
