//! Dimension math and the blocking resize pipeline

use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageOutputFormat, RgbImage};
use tracing::debug;

use crate::config::{BackgroundColor, OutputFormat, ProcessingOptions};
use crate::error::{HybridResizeError, Result};
use crate::processing::{Dimensions, ResizedImage};

/// Upper bounds on decoded source images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLimits {
    /// Maximum width or height in pixels
    pub max_side: u32,

    /// Maximum total pixel count
    pub max_pixels: u64,
}

impl Default for SourceLimits {
    fn default() -> Self {
        Self {
            max_side: 32_768,
            max_pixels: 500_000_000,
        }
    }
}

impl SourceLimits {
    /// Reject empty or oversized source images
    pub fn check(&self, dims: Dimensions) -> Result<()> {
        if dims.width == 0 || dims.height == 0 {
            return Err(HybridResizeError::validation(
                format!("Image has invalid dimensions {}", dims),
                None,
            ));
        }
        if dims.width > self.max_side || dims.height > self.max_side {
            return Err(HybridResizeError::image_too_large(
                dims.width,
                dims.height,
                u64::from(self.max_side),
                None,
            ));
        }
        if dims.pixels() > self.max_pixels {
            return Err(HybridResizeError::image_too_large(
                dims.width,
                dims.height,
                self.max_pixels,
                None,
            ));
        }
        Ok(())
    }
}

/// Calculate target dimensions for a source image
///
/// With the aspect ratio kept and both targets given, the image is fitted
/// inside the box. A single target scales the other side proportionally.
/// Without the aspect ratio, given targets are used as-is. Every side is at
/// least one pixel.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn calculate_dimensions(
    original: Dimensions,
    width: Option<u32>,
    height: Option<u32>,
    maintain_aspect_ratio: bool,
) -> Dimensions {
    let ow = f64::from(original.width.max(1));
    let oh = f64::from(original.height.max(1));
    let scaled = |v: f64| (v.round() as u32).max(1);

    let (w, h) = match (width, height) {
        (Some(tw), Some(th)) if maintain_aspect_ratio => {
            let ratio = (f64::from(tw) / ow).min(f64::from(th) / oh);
            (scaled(ow * ratio), scaled(oh * ratio))
        }
        (Some(tw), Some(th)) => (tw, th),
        (Some(tw), None) => (tw, scaled(f64::from(tw) * oh / ow)),
        (None, Some(th)) => (scaled(f64::from(th) * ow / oh), th),
        (None, None) => (original.width, original.height),
    };

    Dimensions::new(w.max(1), h.max(1))
}

/// Decode, resize, flatten and encode one payload. Runs on a blocking thread.
pub fn resize_payload(
    payload: &[u8],
    options: &ProcessingOptions,
    limits: SourceLimits,
) -> Result<ResizedImage> {
    let image = image::load_from_memory(payload).map_err(|e| {
        HybridResizeError::validation(format!("Failed to decode image: {}", e), None)
    })?;

    let (ow, oh) = image.dimensions();
    let original = Dimensions::new(ow, oh);
    limits.check(original)?;

    let target = calculate_dimensions(
        original,
        options.width,
        options.height,
        options.maintain_aspect_ratio,
    );

    let resized = if target == original {
        image
    } else {
        image.resize_exact(target.width, target.height, options.algorithm.into())
    };

    let resized = match fill_color(options) {
        Some(rgb) => DynamicImage::ImageRgb8(flatten(&resized, rgb)),
        None => resized,
    };

    let payload = encode(&resized, options)?;

    debug!(
        "Encoded {} -> {} as {} ({} bytes)",
        original,
        target,
        options.format,
        payload.len()
    );

    Ok(ResizedImage {
        payload: payload.into(),
        original_dimensions: original,
        new_dimensions: target,
        format: options.format,
    })
}

/// Background to flatten onto, if the output needs one
fn fill_color(options: &ProcessingOptions) -> Option<[u8; 3]> {
    match options.background_color.and_then(BackgroundColor::rgb) {
        Some(rgb) => Some(rgb),
        None if options.format == OutputFormat::Jpeg => BackgroundColor::WHITE.rgb(),
        None => None,
    }
}

/// Alpha-composite an image over a solid color
#[allow(clippy::cast_possible_truncation)]
pub fn flatten(image: &DynamicImage, background: [u8; 3]) -> RgbImage {
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let px = rgba.get_pixel(x, y).0;
        let alpha = u32::from(px[3]);
        let blend = |fg: u8, bg: u8| {
            ((u32::from(fg) * alpha + u32::from(bg) * (255 - alpha) + 127) / 255) as u8
        };
        image::Rgb([
            blend(px[0], background[0]),
            blend(px[1], background[1]),
            blend(px[2], background[2]),
        ])
    })
}

fn encode(image: &DynamicImage, options: &ProcessingOptions) -> Result<Vec<u8>> {
    let output_format = match options.format {
        OutputFormat::Jpeg => ImageOutputFormat::Jpeg(options.quality.as_percent()),
        OutputFormat::Png => ImageOutputFormat::Png,
        OutputFormat::Webp => ImageOutputFormat::from(image::ImageFormat::WebP),
    };

    let mut buffer = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), output_format)
        .map_err(|e| {
            HybridResizeError::validation(
                format!("Failed to encode {} output: {}", options.format.label(), e),
                None,
            )
        })?;

    Ok(buffer)
}
