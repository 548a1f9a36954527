//! Configuration types for grid composition.
//!
//! All job behaviour is controlled through [`ComposeConfig`], built via its
//! [`ComposeConfigBuilder`]. Only `items_per_page` and `orientation` are
//! user-facing choices in the mobile flow; everything else has a default
//! tuned for phone-camera photos and scanned PDFs.

use crate::error::PdfGridError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Configuration for one composition job.
///
/// Built via [`ComposeConfig::builder()`] or using
/// [`ComposeConfig::default()`] (one item per portrait A4 page).
///
/// # Example
/// ```rust
/// use pdfgrid::{ComposeConfig, Orientation};
///
/// let config = ComposeConfig::builder()
///     .items_per_page(4)
///     .orientation(Orientation::Landscape)
///     .build()
///     .unwrap();
/// assert_eq!(config.items_per_page, 4);
/// ```
#[derive(Clone)]
pub struct ComposeConfig {
    /// Number of source pages/images tiled onto one output page. Must be ≥ 1.
    pub items_per_page: usize,

    /// Output page orientation. Default: portrait.
    pub orientation: Orientation,

    /// Output sheet size. Default: A4.
    pub paper: PaperSize,

    /// Page margin and per-cell gutter, in PDF points. Default: 10.
    pub margin: f32,

    /// Longest edge (in pixels) a source image or PDF page is rasterised at. Default: 1500.
    ///
    /// Images are decoded with a power-of-two reduction that keeps them at or
    /// above this box; PDF pages are rendered so their longer side equals it.
    pub max_dimension: u32,

    /// Source items resolved and decoded together before buffers are released. Default: 2.
    pub source_batch_size: usize,

    /// Page count above which a PDF is rendered in small batches. Default: 20.
    pub large_pdf_threshold: usize,

    /// Render batch for PDFs above `large_pdf_threshold`. Default: 5.
    pub large_pdf_batch: usize,

    /// Render batch for all other PDFs. Default: 10.
    pub small_pdf_batch: usize,

    /// JPEG quality per image size. Default: 60 / 75 / 90.
    pub quality: QualityTiers,

    /// Timeout for downloading `http(s)` references, in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Parent directory for the per-job workspace. Default: the system temp dir.
    pub work_dir: Option<PathBuf>,

    /// Receives per-item events while the job runs.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            items_per_page: 1,
            orientation: Orientation::default(),
            paper: PaperSize::default(),
            margin: 10.0,
            max_dimension: 1500,
            source_batch_size: 2,
            large_pdf_threshold: 20,
            large_pdf_batch: 5,
            small_pdf_batch: 10,
            quality: QualityTiers::default(),
            download_timeout_secs: 120,
            work_dir: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ComposeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposeConfig")
            .field("items_per_page", &self.items_per_page)
            .field("orientation", &self.orientation)
            .field("paper", &self.paper)
            .field("margin", &self.margin)
            .field("max_dimension", &self.max_dimension)
            .field("source_batch_size", &self.source_batch_size)
            .field("large_pdf_threshold", &self.large_pdf_threshold)
            .field("large_pdf_batch", &self.large_pdf_batch)
            .field("small_pdf_batch", &self.small_pdf_batch)
            .field("quality", &self.quality)
            .field("work_dir", &self.work_dir)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn JobProgressCallback>"),
            )
            .finish()
    }
}

impl ComposeConfig {
    /// Create a new builder for `ComposeConfig`.
    pub fn builder() -> ComposeConfigBuilder {
        ComposeConfigBuilder {
            config: Self::default(),
        }
    }

    /// Turn an existing configuration back into a builder.
    pub fn into_builder(self) -> ComposeConfigBuilder {
        ComposeConfigBuilder { config: self }
    }

    /// Output page size in points, already swapped for the orientation.
    pub fn page_size(&self) -> (f32, f32) {
        let (w, h) = self.paper.dimensions();
        match self.orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }

    /// Render batch size for a PDF with `page_count` pages.
    pub fn pdf_batch_size(&self, page_count: usize) -> usize {
        if page_count > self.large_pdf_threshold {
            self.large_pdf_batch
        } else {
            self.small_pdf_batch
        }
    }
}

/// Builder for [`ComposeConfig`].
#[derive(Debug)]
pub struct ComposeConfigBuilder {
    config: ComposeConfig,
}

impl ComposeConfigBuilder {
    pub fn items_per_page(mut self, n: usize) -> Self {
        self.config.items_per_page = n;
        self
    }

    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.config.orientation = orientation;
        self
    }

    pub fn paper(mut self, paper: PaperSize) -> Self {
        self.config.paper = paper;
        self
    }

    pub fn margin(mut self, pt: f32) -> Self {
        self.config.margin = pt;
        self
    }

    pub fn max_dimension(mut self, px: u32) -> Self {
        self.config.max_dimension = px.max(100);
        self
    }

    pub fn source_batch_size(mut self, n: usize) -> Self {
        self.config.source_batch_size = n.max(1);
        self
    }

    /// Override the PDF render batching: `threshold` pages, then `large` / `small` batches.
    pub fn pdf_batching(mut self, threshold: usize, large: usize, small: usize) -> Self {
        self.config.large_pdf_threshold = threshold;
        self.config.large_pdf_batch = large.max(1);
        self.config.small_pdf_batch = small.max(1);
        self
    }

    pub fn quality(mut self, tiers: QualityTiers) -> Self {
        self.config.quality = tiers;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = Some(dir.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ComposeConfig, PdfGridError> {
        let c = &self.config;
        if c.items_per_page == 0 {
            return Err(PdfGridError::InvalidConfig(
                "items per page must be ≥ 1".into(),
            ));
        }
        if !c.margin.is_finite() || c.margin < 0.0 {
            return Err(PdfGridError::InvalidConfig(format!(
                "margin must be a non-negative number, got {}",
                c.margin
            )));
        }
        let (w, h) = c.paper.dimensions();
        if c.margin * 4.0 >= w.min(h) {
            return Err(PdfGridError::InvalidConfig(format!(
                "margin {}pt leaves no room on a {}×{}pt sheet",
                c.margin, w, h
            )));
        }
        c.quality.validate()?;
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Output page orientation.
///
/// Parsed once at the boundary from the UI strings `"Retrato"` and
/// `"Paisagem"` (English `"Portrait"` / `"Landscape"` are accepted too).
/// Any other value is rejected rather than silently mapped to landscape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl FromStr for Orientation {
    type Err = PdfGridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "retrato" | "portrait" => Ok(Orientation::Portrait),
            "paisagem" | "landscape" => Ok(Orientation::Landscape),
            _ => Err(PdfGridError::InvalidOrientation {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Portrait => f.write_str("portrait"),
            Orientation::Landscape => f.write_str("landscape"),
        }
    }
}

/// Standard sheet sizes, portrait dimensions in PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperSize {
    /// 210 × 297 mm (default).
    #[default]
    A4,
    /// 8.5 × 11 in.
    Letter,
    /// 8.5 × 14 in.
    Legal,
}

impl PaperSize {
    /// `(width, height)` in points for the portrait sheet.
    pub fn dimensions(&self) -> (f32, f32) {
        match self {
            PaperSize::A4 => (mm_to_pt(210.0), mm_to_pt(297.0)),
            PaperSize::Letter => (612.0, 792.0),
            PaperSize::Legal => (612.0, 1008.0),
        }
    }
}

impl FromStr for PaperSize {
    type Err = PdfGridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "a4" => Ok(PaperSize::A4),
            "letter" => Ok(PaperSize::Letter),
            "legal" => Ok(PaperSize::Legal),
            other => Err(PdfGridError::InvalidConfig(format!(
                "unknown paper size '{other}' (expected a4, letter or legal)"
            ))),
        }
    }
}

fn mm_to_pt(mm: f32) -> f32 {
    mm * 72.0 / 25.4
}

/// JPEG quality per source size, for images without transparency.
///
/// Large photos dominate the output size, so they get the lowest tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityTiers {
    /// Used at 8 megapixels and above.
    pub low: u8,
    /// Used from 4 up to 8 megapixels.
    pub medium: u8,
    /// Used below 4 megapixels.
    pub high: u8,
}

impl Default for QualityTiers {
    fn default() -> Self {
        Self {
            low: 60,
            medium: 75,
            high: 90,
        }
    }
}

impl QualityTiers {
    /// Pick the tier for an image of `pixel_count` pixels.
    pub fn for_pixels(&self, pixel_count: u64) -> u8 {
        const MEGAPIXEL: u64 = 1_000_000;
        if pixel_count >= 8 * MEGAPIXEL {
            self.low
        } else if pixel_count >= 4 * MEGAPIXEL {
            self.medium
        } else {
            self.high
        }
    }

    fn validate(&self) -> Result<(), PdfGridError> {
        for q in [self.low, self.medium, self.high] {
            if q == 0 || q > 100 {
                return Err(PdfGridError::InvalidConfig(format!(
                    "JPEG quality must be 1–100, got {q}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orientation_accepts_ui_values() {
        assert_eq!("Retrato".parse::<Orientation>().unwrap(), Orientation::Portrait);
        assert_eq!("Paisagem".parse::<Orientation>().unwrap(), Orientation::Landscape);
        assert_eq!(" paisagem ".parse::<Orientation>().unwrap(), Orientation::Landscape);
        assert_eq!("LANDSCAPE".parse::<Orientation>().unwrap(), Orientation::Landscape);
    }

    #[test]
    fn orientation_rejects_everything_else() {
        for bad in ["", "Selecione...", "Modo Retrato", "retratos", "0"] {
            let err = bad.parse::<Orientation>().unwrap_err();
            assert!(
                matches!(err, PdfGridError::InvalidOrientation { .. }),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn landscape_swaps_page_size() {
        let portrait = ComposeConfig::default();
        let landscape = ComposeConfig::builder()
            .orientation(Orientation::Landscape)
            .build()
            .unwrap();
        let (pw, ph) = portrait.page_size();
        let (lw, lh) = landscape.page_size();
        assert!(pw < ph);
        assert_eq!((pw, ph), (lh, lw));
        assert!((pw - 595.2756).abs() < 0.01);
        assert!((ph - 841.8898).abs() < 0.01);
    }

    #[test]
    fn zero_items_per_page_is_rejected() {
        let err = ComposeConfig::builder().items_per_page(0).build().unwrap_err();
        assert!(matches!(err, PdfGridError::InvalidConfig(_)));
    }

    #[test]
    fn oversized_margin_is_rejected() {
        assert!(ComposeConfig::builder().margin(200.0).build().is_err());
        assert!(ComposeConfig::builder().margin(-1.0).build().is_err());
    }

    #[test]
    fn pdf_batch_size_follows_threshold() {
        let c = ComposeConfig::default();
        assert_eq!(c.pdf_batch_size(1), 10);
        assert_eq!(c.pdf_batch_size(20), 10);
        assert_eq!(c.pdf_batch_size(21), 5);
        assert_eq!(c.pdf_batch_size(300), 5);
    }

    #[test]
    fn quality_tiers_by_megapixels() {
        let q = QualityTiers::default();
        assert_eq!(q.for_pixels(12_000_000), q.low);
        assert_eq!(q.for_pixels(8_000_000), q.low);
        assert_eq!(q.for_pixels(7_999_999), q.medium);
        assert_eq!(q.for_pixels(4_000_000), q.medium);
        assert_eq!(q.for_pixels(1500 * 1125), q.high);
    }

    #[test]
    fn invalid_quality_is_rejected() {
        let bad = QualityTiers {
            low: 0,
            medium: 75,
            high: 90,
        };
        assert!(ComposeConfig::builder().quality(bad).build().is_err());
    }

    #[test]
    fn paper_size_parses() {
        assert_eq!("Letter".parse::<PaperSize>().unwrap(), PaperSize::Letter);
        assert!("b5".parse::<PaperSize>().is_err());
    }
}
