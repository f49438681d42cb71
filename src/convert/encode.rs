//! Image encoding, with the 1-100 quality scale mapped onto each
//! format's native compression knob.

use anyhow::{anyhow, Context, Result};
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, DynamicImage, ExtendedColorType, ImageEncoder};

use super::OutputFormat;

/// Serialize the bitmap into the target format.
pub fn encode_image(img: &DynamicImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();

    match format {
        OutputFormat::Jpeg => compress_to_jpeg(img, &mut buffer, quality)?,
        OutputFormat::Png => compress_to_png(img, &mut buffer, quality)?,
        OutputFormat::Gif => compress_to_gif(img, &mut buffer)?,
        OutputFormat::Webp => {
            let webp_data = compress_to_webp(img, quality)?;
            buffer.extend_from_slice(&webp_data);
        }
    }

    Ok(buffer)
}

/// Quality maps inversely onto the PNG 0-9 compression-level scale:
/// `level = 9 - round(quality/100 * 9)`.
pub fn png_compression_level(quality: u8) -> u8 {
    9 - ((quality as f32 / 100.0) * 9.0).round() as u8
}

fn compress_to_jpeg<W>(img: &DynamicImage, writer: &mut W, quality: u8) -> Result<()>
where
    W: std::io::Write,
{
    let mut encoder = JpegEncoder::new_with_quality(writer, quality);
    encoder.encode_image(img).context("failed to encode JPEG")?;
    Ok(())
}

fn compress_to_png<W>(img: &DynamicImage, writer: &mut W, quality: u8) -> Result<()>
where
    W: std::io::Write,
{
    // the png encoder exposes presets rather than the 0-9 dial
    let compression_type = match png_compression_level(quality) {
        0..=2 => CompressionType::Fast,
        3..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    };

    let is_grayscale = img.color() == ColorType::L8 || img.color() == ColorType::La8;

    let encoder = PngEncoder::new_with_quality(
        writer,
        compression_type,
        if is_grayscale {
            FilterType::NoFilter
        } else {
            FilterType::Adaptive
        },
    );

    encoder
        .write_image(
            img.as_bytes(),
            img.width(),
            img.height(),
            img.color().into(),
        )
        .context("failed to encode PNG")?;

    Ok(())
}

fn compress_to_webp(img: &DynamicImage, quality: u8) -> Result<webp::WebPMemory> {
    let mut config =
        webp::WebPConfig::new().map_err(|_| anyhow!("failed to initialize WebP config"))?;
    config.quality = quality as f32;
    config.method = 6; // slowest, best compression

    let rgba;
    let rgb;
    let encoder = if img.color().has_alpha() {
        rgba = img.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height())
    } else {
        rgb = img.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), rgb.width(), rgb.height())
    };

    encoder
        .encode_advanced(&config)
        .map_err(|e| anyhow!("failed to encode WebP: {e:?}"))
}

fn compress_to_gif<W>(img: &DynamicImage, writer: &mut W) -> Result<()>
where
    W: std::io::Write,
{
    let mut encoder = GifEncoder::new(writer);
    let color: ExtendedColorType = img.color().into();
    encoder
        .encode(img.as_bytes(), img.width(), img.height(), color)
        .context("failed to encode GIF")?;
    Ok(())
}
