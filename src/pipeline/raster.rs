//! Rasterisation: turn a resolved source item into pixel pages.
//!
//! Images are decoded with a power-of-two subsample so a 48 MP phone photo
//! never lands in memory at full size. PDFs are rendered page by page at a
//! scale that puts the longer side at `max_dimension`, in batches whose size
//! depends on the document's page count. Each batch is handed to the
//! [`PageSink`] and released before the next batch is rendered.
//!
//! If the direct render path fails part way (or at open), the remaining
//! pages are retried through [`crate::pipeline::fallback`].

use crate::config::ComposeConfig;
use crate::error::ItemError;
use crate::pipeline::decode;
use crate::pipeline::encode::EncodeError;
use crate::pipeline::fallback;
use crate::pipeline::input::{SourceItem, SourceKind};
use crate::pipeline::render::PdfEngine;
use image::DynamicImage;
use std::path::Path;
use tracing::{debug, info, warn};

/// A decoded raster ready for placement.
///
/// Pixels are tightly packed, row-major, 8 bits per channel: RGB, or RGBA
/// when `has_alpha` is set.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelPage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub has_alpha: bool,
}

impl std::fmt::Debug for PixelPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelPage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("has_alpha", &self.has_alpha)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

impl PixelPage {
    /// Flatten a decoded image into 8-bit RGB or RGBA.
    pub fn from_image(image: DynamicImage) -> Self {
        let (width, height) = (image.width(), image.height());
        if image.color().has_alpha() {
            Self {
                width,
                height,
                pixels: image.into_rgba8().into_raw(),
                has_alpha: true,
            }
        } else {
            Self {
                width,
                height,
                pixels: image.into_rgb8().into_raw(),
                has_alpha: false,
            }
        }
    }

    pub fn channels(&self) -> usize {
        if self.has_alpha {
            4
        } else {
            3
        }
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Width / height, or 0 for a degenerate page.
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    /// Alpha of pixel `(x, y)`; 255 for pages without an alpha channel.
    pub fn alpha_at(&self, x: u32, y: u32) -> u8 {
        if !self.has_alpha {
            return 255;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4 + 3;
        self.pixels.get(offset).copied().unwrap_or(255)
    }
}

/// Consumer of pixel pages, in source order.
///
/// Taking the page by value lets the consumer release the buffer as soon as
/// it has been encoded.
pub trait PageSink {
    fn accept(&mut self, page: PixelPage) -> Result<(), EncodeError>;
}

impl PageSink for Vec<PixelPage> {
    fn accept(&mut self, page: PixelPage) -> Result<(), EncodeError> {
        self.push(page);
        Ok(())
    }
}

/// Largest power of two `s` such that halving the image `s` times still
/// leaves both halves at or above the target.
///
/// Returns 1 when the image already fits inside the target box.
pub fn sample_size(width: u32, height: u32, target_width: u32, target_height: u32) -> u32 {
    let mut sample = 1u32;
    if height > target_height || width > target_width {
        let half_h = height / 2;
        let half_w = width / 2;
        while sample < (1 << 30)
            && half_h / sample >= target_height
            && half_w / sample >= target_width
        {
            sample *= 2;
        }
    }
    sample
}

/// Render scale (pixels per point) that puts the longer page side at `max_dimension`.
pub fn page_scale(page_width: f32, page_height: f32, max_dimension: u32) -> f32 {
    let max = max_dimension as f32;
    if page_width <= 0.0 || page_height <= 0.0 {
        return 1.0;
    }
    (max / page_width).min(max / page_height)
}

/// Rasterise one source item into `sink`.
///
/// Returns the number of pixel pages delivered. An item that delivers
/// nothing is an error; per-page failures inside a PDF are logged and the
/// page is dropped.
pub fn rasterize(
    item: &SourceItem,
    engine: &dyn PdfEngine,
    config: &ComposeConfig,
    scratch: &Path,
    sink: &mut dyn PageSink,
) -> Result<usize, ItemError> {
    match item.input.kind() {
        SourceKind::Image => {
            let page = rasterize_image(item.index, item.input.path(), config.max_dimension)?;
            sink.accept(page).map_err(|e| ItemError::EmbedFailed {
                index: item.index,
                detail: e.to_string(),
            })?;
            Ok(1)
        }
        SourceKind::Pdf => rasterize_pdf(item, engine, config, scratch, sink),
    }
}

/// Decode an image file with power-of-two subsampling towards a
/// `target` × `target` box.
///
/// The reduction happens inside the decoder where the format allows it
/// (see [`decode`]), so a 48 MP photo never lands in memory at full size.
pub fn rasterize_image(index: usize, path: &Path, target: u32) -> Result<PixelPage, ItemError> {
    let bounds = decode::read_bounds(path).map_err(|e| ItemError::ImageBounds {
        index,
        detail: e.to_string(),
    })?;
    let (width, height) = (bounds.width, bounds.height);
    if width == 0 || height == 0 {
        return Err(ItemError::ImageBounds {
            index,
            detail: format!("{width}x{height}"),
        });
    }

    let sample = sample_size(width, height, target, target);
    let image = decode::decode_sampled(path, bounds, sample).map_err(|e| {
        ItemError::ImageDecode {
            index,
            detail: e.to_string(),
        }
    })?;

    debug!(
        "Decoded image {} ({}x{} px, subsample {}) → {}x{} px",
        index,
        width,
        height,
        sample,
        image.width(),
        image.height()
    );

    Ok(PixelPage::from_image(image))
}

/// Render every page of a PDF item in batches, with fallback.
fn rasterize_pdf(
    item: &SourceItem,
    engine: &dyn PdfEngine,
    config: &ComposeConfig,
    scratch: &Path,
    sink: &mut dyn PageSink,
) -> Result<usize, ItemError> {
    let path = item.input.path();
    let mut delivered = 0usize;
    let mut placed = 0usize;

    let direct = engine.with_document(path, &mut |doc| {
        let total = doc.page_count();
        let batch = config.pdf_batch_size(total);
        info!(
            "Rendering PDF input {} ({} pages, batches of {})",
            item.index, total, batch
        );

        let mut start = 0;
        while start < total {
            let end = (start + batch).min(total);
            let mut rendered = Vec::with_capacity(end - start);
            for page_index in start..end {
                let (w, h) = doc.page_size(page_index)?;
                rendered.push(doc.render(page_index, page_scale(w, h, config.max_dimension))?);
            }

            for (offset, page) in rendered.drain(..).enumerate() {
                match sink.accept(page) {
                    Ok(()) => placed += 1,
                    Err(e) => warn!(
                        "Input {} page {} dropped: {}",
                        item.index,
                        start + offset + 1,
                        e
                    ),
                }
            }
            debug!("Input {}: released render batch {}..{}", item.index, start + 1, end);
            delivered = end;
            start = end;
        }
        Ok(())
    });

    let Err(direct_err) = direct else {
        return finish(item.index, placed, || "document has no pages".to_string());
    };

    warn!(
        "Input {}: direct render failed after {} pages ({}), trying fallback",
        item.index, delivered, direct_err
    );

    match fallback::rerender(engine, path, scratch, delivered, config.max_dimension, sink) {
        Ok(recovered) => {
            placed += recovered;
            finish(item.index, placed, || direct_err.to_string())
        }
        Err(fallback_err) => finish(item.index, placed, || {
            format!("{direct_err}; fallback: {fallback_err}")
        }),
    }
}

fn finish(
    index: usize,
    placed: usize,
    detail: impl FnOnce() -> String,
) -> Result<usize, ItemError> {
    if placed == 0 {
        Err(ItemError::PdfUnrenderable {
            index,
            detail: detail(),
        })
    } else {
        Ok(placed)
    }
}
