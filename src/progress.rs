//! Progress-callback trait for per-item job events.
//!
//! Inject an [`Arc<dyn JobProgressCallback>`] via
//! [`crate::config::ComposeConfigBuilder::progress_callback`] to follow a
//! job as it walks through its inputs. The callback is the only place an
//! embedding application can observe skipped items as they happen; the
//! final [`crate::output::ComposeOutput`] carries counts only.
//!
//! # Example
//!
//! ```rust
//! use pdfgrid::{ComposeConfig, JobProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct PageCounter {
//!     pages: AtomicUsize,
//! }
//!
//! impl JobProgressCallback for PageCounter {
//!     fn on_item_complete(&self, _index: usize, _total: usize, pages: usize) {
//!         self.pages.fetch_add(pages, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(PageCounter { pages: AtomicUsize::new(0) });
//!
//! let config = ComposeConfig::builder()
//!     .progress_callback(counter as Arc<dyn JobProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch scheduler as it processes each input item.
///
/// Items are processed on a blocking worker thread, so implementations must
/// be `Send + Sync`. All methods default to no-ops.
pub trait JobProgressCallback: Send + Sync {
    /// Called once before the first batch is resolved.
    fn on_job_start(&self, total_items: usize) {
        let _ = total_items;
    }

    /// Called before an item is rasterised.
    ///
    /// # Arguments
    /// * `index` — 0-based position in the input list
    /// * `total` — number of inputs in the job
    fn on_item_start(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called when an item has been composed.
    ///
    /// `pages` is the number of pixel pages the item contributed (1 for an
    /// image, up to the page count for a PDF).
    fn on_item_complete(&self, index: usize, total: usize, pages: usize) {
        let _ = (index, total, pages);
    }

    /// Called when an item contributed nothing and was skipped.
    fn on_item_skipped(&self, index: usize, total: usize, reason: &str) {
        let _ = (index, total, reason);
    }

    /// Called once after the document has been serialised.
    fn on_job_complete(&self, total_items: usize, output_pages: usize) {
        let _ = (total_items, output_pages);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl JobProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ComposeConfig`].
pub type ProgressCallback = Arc<dyn JobProgressCallback>;
