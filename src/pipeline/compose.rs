//! Page composition: place pixel pages into grid cells on output pages.
//!
//! The composer owns the [`DocumentWriter`] for the whole job. Each call to
//! [`PageComposer::place`] encodes one pixel page, embeds it, drops the raw
//! buffer and records where it goes on the current output page. A page is
//! closed once it holds `items_per_page` images; the next image opens a new
//! page whose grid is planned from that image's aspect ratio.

use crate::config::{ComposeConfig, Orientation, QualityTiers};
use crate::error::PdfGridError;
use crate::pipeline::encode::{self, EncodeError};
use crate::pipeline::layout::{self, GridPlan};
use crate::pipeline::raster::{PageSink, PixelPage};
use crate::pipeline::writer::{DocumentWriter, PlacedImage};
use tracing::debug;

/// An output page being filled.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPage {
    pub width: f32,
    pub height: f32,
    pub grid: GridPlan,
    pub placed: Vec<PlacedImage>,
}

/// A grid cell in PDF user space. `top` is the cell's upper edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// Cell number `slot` (row-major) of `grid` on a `page_width` × `page_height` page.
pub fn cell_rect(
    page_width: f32,
    page_height: f32,
    margin: f32,
    grid: GridPlan,
    slot: usize,
) -> CellRect {
    let cols = grid.cols.max(1);
    let rows = grid.rows.max(1);
    let width = (page_width - 2.0 * margin) / cols as f32;
    let height = (page_height - 2.0 * margin) / rows as f32;
    let (row, col) = (slot / cols, slot % cols);
    CellRect {
        left: margin + col as f32 * width,
        top: page_height - margin - row as f32 * height,
        width,
        height,
    }
}

/// Points per pixel for an `image_width` × `image_height` image in `cell`.
///
/// Never upscales, and keeps a `margin` gutter inside the cell.
pub fn fit_scale(image_width: f32, image_height: f32, cell: &CellRect, margin: f32) -> f32 {
    if image_width <= 0.0 || image_height <= 0.0 {
        return 0.0;
    }
    ((cell.width - margin) / image_width)
        .min((cell.height - margin) / image_height)
        .min(1.0)
        .max(0.0)
}

/// Scale and centre an image in `cell`; returns `(x, y, width, height)` with
/// `(x, y)` the lower-left corner.
pub fn place_in_cell(
    image_width: f32,
    image_height: f32,
    cell: &CellRect,
    margin: f32,
) -> (f32, f32, f32, f32) {
    let scale = fit_scale(image_width, image_height, cell, margin);
    let (w, h) = (image_width * scale, image_height * scale);
    let x = cell.left + (cell.width - w) / 2.0;
    let y = cell.top - (cell.height - h) / 2.0 - h;
    (x, y, w, h)
}

pub struct PageComposer {
    items_per_page: usize,
    orientation: Orientation,
    page_size: (f32, f32),
    margin: f32,
    quality: QualityTiers,
    writer: DocumentWriter,
    current: Option<OutputPage>,
    placed: usize,
}

impl PageComposer {
    pub fn new(config: &ComposeConfig) -> Self {
        Self {
            items_per_page: config.items_per_page.max(1),
            orientation: config.orientation,
            page_size: config.page_size(),
            margin: config.margin,
            quality: config.quality,
            writer: DocumentWriter::new(),
            current: None,
            placed: 0,
        }
    }

    /// Encode `page`, embed it and place it in the next free cell.
    ///
    /// The pixel buffer is dropped before this returns. On error nothing is
    /// placed and the current page is unchanged.
    pub fn place(&mut self, page: PixelPage) -> Result<(), EncodeError> {
        let encoded = encode::encode(&page, &self.quality)?;
        let (image_width, image_height) = (page.width as f32, page.height as f32);
        let aspect = page.aspect_ratio();
        drop(page);

        let image = self.writer.add_image(encoded);

        let (page_width, page_height) = self.page_size;
        let (items_per_page, orientation, margin) =
            (self.items_per_page, self.orientation, self.margin);
        let current = self.current.get_or_insert_with(|| {
            let grid = layout::plan(items_per_page, aspect, orientation);
            debug!(
                "Opened output page: {}x{} grid (first image aspect {:.2})",
                grid.rows, grid.cols, aspect
            );
            OutputPage {
                width: page_width,
                height: page_height,
                grid,
                placed: Vec::with_capacity(items_per_page),
            }
        });

        let slot = current.placed.len();
        let cell = cell_rect(current.width, current.height, margin, current.grid, slot);
        let (x, y, width, height) = place_in_cell(image_width, image_height, &cell, margin);
        debug!(
            "Cell {} → {:.1},{:.1} {:.1}x{:.1} pt",
            slot, x, y, width, height
        );
        current.placed.push(PlacedImage {
            image,
            x,
            y,
            width,
            height,
        });
        self.placed += 1;

        if slot + 1 >= self.items_per_page {
            self.close_page()?;
        }
        Ok(())
    }

    fn close_page(&mut self) -> Result<(), EncodeError> {
        if let Some(page) = self.current.take() {
            self.writer.add_page(page.width, page.height, &page.placed)?;
        }
        Ok(())
    }

    /// Pixel pages placed so far.
    pub fn placed(&self) -> usize {
        self.placed
    }

    /// Output pages so far, counting a partly filled one.
    pub fn output_pages(&self) -> usize {
        self.writer.page_count() + usize::from(self.current.is_some())
    }

    /// Close the last page and serialise the document.
    ///
    /// Returns the PDF bytes and the number of output pages.
    pub fn finish(mut self) -> Result<(Vec<u8>, usize), PdfGridError> {
        self.close_page()
            .map_err(|e| PdfGridError::SerializeFailed(e.to_string()))?;
        let pages = self.writer.page_count();
        Ok((self.writer.to_bytes()?, pages))
    }
}

impl PageSink for PageComposer {
    fn accept(&mut self, page: PixelPage) -> Result<(), EncodeError> {
        self.place(page)
    }
}
