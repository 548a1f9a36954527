//! Subsampled image decoding.
//!
//! Large photos are reduced while they are decoded, so the full-resolution
//! bitmap is never allocated:
//!
//! * JPEG: the decoder's DCT scaling (1/2, 1/4, 1/8) produces the reduced
//!   raster directly.
//! * PNG (non-interlaced): rows are streamed and box-filtered into the
//!   output, so only one source row is alive at a time.
//!
//! Anything else (and interlaced PNG, whose passes need the whole frame) is
//! decoded whole under an allocation limit sized to the declared
//! dimensions, then reduced.

use image::imageops::FilterType;
use image::{
    DynamicImage, GrayAlphaImage, GrayImage, ImageFormat, ImageReader, Limits, RgbImage,
    RgbaImage,
};
use jpeg_decoder::PixelFormat;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JPEG: {0}")]
    Jpeg(#[from] jpeg_decoder::Error),

    #[error("PNG: {0}")]
    Png(#[from] png::DecodingError),

    #[error("decoded buffer does not match {width}x{height}")]
    Buffer { width: u32, height: u32 },
}

/// Header facts read before any pixel is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBounds {
    pub width: u32,
    pub height: u32,
    pub format: Option<ImageFormat>,
}

/// Read the dimensions and container format of `path` without decoding.
pub fn read_bounds(path: &Path) -> Result<ImageBounds, image::ImageError> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let format = reader.format();
    let (width, height) = reader.into_dimensions()?;
    Ok(ImageBounds {
        width,
        height,
        format,
    })
}

/// Decode `path` reduced by `sample` (≥ 1) on both axes.
///
/// The result is `max(width / sample, 1)` × `max(height / sample, 1)`.
pub fn decode_sampled(
    path: &Path,
    bounds: ImageBounds,
    sample: u32,
) -> Result<DynamicImage, DecodeError> {
    let sample = sample.max(1);
    let target = (
        (bounds.width / sample).max(1),
        (bounds.height / sample).max(1),
    );
    if sample == 1 {
        return decode_whole(path, bounds, target);
    }

    let reduced = match bounds.format {
        Some(ImageFormat::Jpeg) => decode_jpeg_scaled(path, target)?,
        Some(ImageFormat::Png) => decode_png_boxed(path, sample, target)?,
        _ => None,
    };
    match reduced {
        Some(image) => Ok(image),
        None => decode_whole(path, bounds, target),
    }
}

fn decode_whole(
    path: &Path,
    bounds: ImageBounds,
    target: (u32, u32),
) -> Result<DynamicImage, DecodeError> {
    let mut reader = ImageReader::open(path)?.with_guessed_format()?;
    // 16-bit RGBA is the widest buffer any supported decoder produces.
    let declared = u64::from(bounds.width) * u64::from(bounds.height) * 8;
    let mut limits = Limits::default();
    limits.max_alloc = limits.max_alloc.map(|default| default.max(declared));
    reader.limits(limits);

    debug!(
        "Decoding {}x{} image whole, reducing to {}x{}",
        bounds.width, bounds.height, target.0, target.1
    );
    Ok(reduce(reader.decode()?, target))
}

fn reduce(image: DynamicImage, (width, height): (u32, u32)) -> DynamicImage {
    if image.width() == width && image.height() == height {
        image
    } else {
        image.resize_exact(width, height, FilterType::Triangle)
    }
}

/// DCT-scaled JPEG decode. `None` for pixel formats left to the generic path.
fn decode_jpeg_scaled(
    path: &Path,
    target: (u32, u32),
) -> Result<Option<DynamicImage>, DecodeError> {
    let mut decoder = jpeg_decoder::Decoder::new(BufReader::new(File::open(path)?));
    decoder.read_info()?;
    let Some(info) = decoder.info() else {
        return Ok(None);
    };
    if !matches!(info.pixel_format, PixelFormat::L8 | PixelFormat::RGB24) {
        return Ok(None);
    }

    let requested = (
        u16::try_from(target.0).unwrap_or(u16::MAX),
        u16::try_from(target.1).unwrap_or(u16::MAX),
    );
    let (width, height) = decoder.scale(requested.0, requested.1)?;
    let (width, height) = (u32::from(width), u32::from(height));
    let pixels = decoder.decode()?;
    debug!(
        "JPEG DCT-scaled {}x{} → {}x{}",
        info.width, info.height, width, height
    );

    let image = match info.pixel_format {
        PixelFormat::L8 => GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8),
        _ => RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8),
    }
    .ok_or(DecodeError::Buffer { width, height })?;
    Ok(Some(reduce(image, target)))
}

/// Streamed PNG decode with a `sample` × `sample` box filter.
/// `None` for interlaced files.
fn decode_png_boxed(
    path: &Path,
    sample: u32,
    (width, height): (u32, u32),
) -> Result<Option<DynamicImage>, DecodeError> {
    let mut decoder = png::Decoder::new(BufReader::new(File::open(path)?));
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder.read_info()?;
    if reader.info().interlaced {
        return Ok(None);
    }

    let channels = reader.output_color_type().0.samples();
    let sample = sample as usize;
    let (out_w, out_h) = (width as usize, height as usize);
    let area = (sample * sample) as u64;

    let mut acc = vec![0u64; out_w * channels];
    let mut out = Vec::with_capacity(out_w * out_h * channels);
    let mut y = 0usize;
    while let Some(row) = reader.next_row()? {
        if y / sample >= out_h {
            break;
        }
        let data = row.data();
        for ox in 0..out_w {
            let cell = &mut acc[ox * channels..(ox + 1) * channels];
            for dx in 0..sample {
                let px = (ox * sample + dx) * channels;
                for (sum, &value) in cell.iter_mut().zip(&data[px..px + channels]) {
                    *sum += u64::from(value);
                }
            }
        }
        if y % sample == sample - 1 {
            out.extend(acc.iter().map(|&sum| ((sum + area / 2) / area) as u8));
            acc.fill(0);
        }
        y += 1;
    }
    debug!(
        "PNG streamed {} rows, box {} → {}x{}",
        y, sample, width, height
    );

    let image = match channels {
        1 => GrayImage::from_raw(width, height, out).map(DynamicImage::ImageLuma8),
        2 => GrayAlphaImage::from_raw(width, height, out).map(DynamicImage::ImageLumaA8),
        3 => RgbImage::from_raw(width, height, out).map(DynamicImage::ImageRgb8),
        4 => RgbaImage::from_raw(width, height, out).map(DynamicImage::ImageRgba8),
        _ => None,
    }
    .ok_or(DecodeError::Buffer { width, height })?;
    Ok(Some(image))
}
