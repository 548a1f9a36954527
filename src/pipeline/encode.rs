//! Image encoding: [`PixelPage`] → PDF image XObject streams.
//!
//! Opaque pages become `DCTDecode` (JPEG) streams at a quality picked from
//! the pixel count. Pages with any transparent pixel are stored losslessly:
//! the colour planes as a `FlateDecode` RGB stream plus a `DeviceGray`
//! soft mask carrying the alpha channel, so cut-out stickers and logos keep
//! their edges.

use crate::config::QualityTiers;
use crate::pipeline::raster::PixelPage;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use lopdf::{Dictionary, Object, Stream};
use std::io::Write;
use thiserror::Error;
use tracing::debug;

/// Pages above this many pixels are probed on a sparse grid.
pub const SPARSE_PROBE_THRESHOLD: u64 = 1_000_000;
/// Step, in pixels, of the sparse transparency probe on both axes.
pub const SPARSE_PROBE_STEP: u32 = 20;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("JPEG encoding failed: {0}")]
    Jpeg(#[from] image::ImageError),

    #[error("Flate compression failed: {0}")]
    Deflate(#[from] std::io::Error),

    #[error("pixel buffer does not match {width}x{height}")]
    Buffer { width: u32, height: u32 },

    #[error("page content encoding failed: {0}")]
    Content(String),
}

/// How an image was stored in the output document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageCodec {
    Jpeg { quality: u8 },
    Lossless,
}

/// An encoded image, ready to be added to the document.
#[derive(Debug)]
pub struct EncodedImage {
    pub width: u32,
    pub height: u32,
    pub image: Stream,
    /// Alpha channel, present only for lossless pages.
    pub soft_mask: Option<Stream>,
    pub codec: ImageCodec,
}

/// True if any probed pixel has alpha below 255.
///
/// Pages up to [`SPARSE_PROBE_THRESHOLD`] pixels are checked exhaustively;
/// larger ones every [`SPARSE_PROBE_STEP`] pixels in each direction.
pub fn has_transparency(page: &PixelPage) -> bool {
    if !page.has_alpha {
        return false;
    }
    let step = if page.pixel_count() > SPARSE_PROBE_THRESHOLD {
        SPARSE_PROBE_STEP as usize
    } else {
        1
    };
    (0..page.height)
        .step_by(step)
        .any(|y| (0..page.width).step_by(step).any(|x| page.alpha_at(x, y) < 255))
}

/// Encode `page`, choosing JPEG or lossless from its transparency.
pub fn encode(page: &PixelPage, quality: &QualityTiers) -> Result<EncodedImage, EncodeError> {
    let expected = page.pixel_count() as usize * page.channels();
    if page.pixels.len() != expected {
        return Err(EncodeError::Buffer {
            width: page.width,
            height: page.height,
        });
    }

    if has_transparency(page) {
        encode_lossless(page)
    } else {
        encode_jpeg(page, quality.for_pixels(page.pixel_count()))
    }
}

fn rgb_plane(page: &PixelPage) -> Vec<u8> {
    if !page.has_alpha {
        return page.pixels.clone();
    }
    page.pixels
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect()
}

fn encode_jpeg(page: &PixelPage, quality: u8) -> Result<EncodedImage, EncodeError> {
    let rgb = RgbImage::from_raw(page.width, page.height, rgb_plane(page)).ok_or(
        EncodeError::Buffer {
            width: page.width,
            height: page.height,
        },
    )?;

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality).encode_image(&rgb)?;
    debug!(
        "JPEG q{} {}x{} → {} bytes",
        quality,
        page.width,
        page.height,
        jpeg.len()
    );

    let mut dict = image_dict(page.width, page.height, "DeviceRGB");
    dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));

    Ok(EncodedImage {
        width: page.width,
        height: page.height,
        image: Stream::new(dict, jpeg).with_compression(false),
        soft_mask: None,
        codec: ImageCodec::Jpeg { quality },
    })
}

fn encode_lossless(page: &PixelPage) -> Result<EncodedImage, EncodeError> {
    let alpha: Vec<u8> = page.pixels.chunks_exact(4).map(|px| px[3]).collect();
    let color = deflate(&rgb_plane(page))?;
    let mask = deflate(&alpha)?;
    debug!(
        "Flate {}x{} → {} + {} bytes (alpha)",
        page.width,
        page.height,
        color.len(),
        mask.len()
    );

    let mut dict = image_dict(page.width, page.height, "DeviceRGB");
    dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));

    let mut mask_dict = image_dict(page.width, page.height, "DeviceGray");
    mask_dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));

    Ok(EncodedImage {
        width: page.width,
        height: page.height,
        image: Stream::new(dict, color).with_compression(false),
        soft_mask: Some(Stream::new(mask_dict, mask).with_compression(false)),
        codec: ImageCodec::Lossless,
    })
}

fn image_dict(width: u32, height: u32, color_space: &str) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(i64::from(width)));
    dict.set("Height", Object::Integer(i64::from(height)));
    dict.set("ColorSpace", Object::Name(color_space.as_bytes().to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict
}

fn deflate(bytes: &[u8]) -> Result<Vec<u8>, std::io::Error> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}
