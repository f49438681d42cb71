//! Color-mode normalization and resizing.

use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, Rgba, RgbaImage};

use super::{OutputFormat, ResizeSpec};

/// Coerce the bitmap into a color mode the target encoder accepts.
///
/// JPEG gets alpha flattened onto white, or a plain RGB conversion when
/// there is no alpha; GIF keeps RGB and RGBA and converts anything else
/// to RGB; PNG and WebP take every mode as-is.
pub fn normalize_color(img: DynamicImage, format: OutputFormat) -> DynamicImage {
    match format {
        OutputFormat::Jpeg => {
            if img.color().has_alpha() {
                flatten_onto_white(&img)
            } else if img.color() != ColorType::Rgb8 {
                DynamicImage::ImageRgb8(img.to_rgb8())
            } else {
                img
            }
        }
        OutputFormat::Gif => match img.color() {
            ColorType::Rgb8 | ColorType::Rgba8 => img,
            _ => DynamicImage::ImageRgb8(img.to_rgb8()),
        },
        OutputFormat::Png | OutputFormat::Webp => img,
    }
}

/// Composite the image over an opaque white background, dropping alpha.
fn flatten_onto_white(img: &DynamicImage) -> DynamicImage {
    let white = RgbaImage::from_pixel(img.width(), img.height(), Rgba([255, 255, 255, 255]));
    let mut background = DynamicImage::ImageRgba8(white);
    imageops::overlay(&mut background, img, 0, 0);
    DynamicImage::ImageRgb8(background.to_rgb8())
}

/// Apply at most one resize policy, picked in priority order: percent
/// scale, contain-fit box, single-dimension scale, exact resize.
/// Lanczos3 resampling throughout; degenerate targets are a no-op.
pub fn resize(img: DynamicImage, spec: ResizeSpec) -> DynamicImage {
    let (original_width, original_height) = (img.width(), img.height());

    // zero means the form field was left empty
    let width = spec.width.filter(|w| *w > 0);
    let height = spec.height.filter(|h| *h > 0);

    if let Some(percent) = spec.percent.filter(|p| *p != 100) {
        let new_width = scale_by_percent(original_width, percent);
        let new_height = scale_by_percent(original_height, percent);
        if new_width == 0 || new_height == 0 {
            return img;
        }
        return img.resize_exact(new_width, new_height, FilterType::Lanczos3);
    }

    match (width, height, spec.maintain_aspect) {
        (Some(w), Some(h), true) => {
            // contain-fit, never upscaling past the box
            if w >= original_width && h >= original_height {
                img
            } else {
                img.resize(w, h, FilterType::Lanczos3)
            }
        }
        (Some(w), None, true) => {
            let new_height =
                (original_height as f64 * w as f64 / original_width as f64).round() as u32;
            img.resize_exact(w, new_height, FilterType::Lanczos3)
        }
        (None, Some(h), true) => {
            let new_width =
                (original_width as f64 * h as f64 / original_height as f64).round() as u32;
            img.resize_exact(new_width, h, FilterType::Lanczos3)
        }
        (Some(_), _, false) | (None, Some(_), false) => img.resize_exact(
            width.unwrap_or(original_width),
            height.unwrap_or(original_height),
            FilterType::Lanczos3,
        ),
        (None, None, _) => img,
    }
}

// truncating, not rounding
fn scale_by_percent(dim: u32, percent: u32) -> u32 {
    (dim as u64 * percent as u64 / 100).min(u32::MAX as u64) as u32
}
