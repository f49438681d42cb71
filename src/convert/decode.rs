//! Image decoding: standard formats from memory, camera RAW through a
//! scoped temp file, HEIC through libheif when compiled in.

use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::{DynamicImage, RgbImage};

/// Extensions identifying camera RAW files, matched case-insensitively
/// against the uploaded filename. No content sniffing.
pub const RAW_EXTENSIONS: &[&str] = &[
    "cr2", "cr3", // Canon
    "nef", "nrw", // Nikon
    "arw", "srf", "sr2", // Sony
    "orf", // Olympus
    "rw2", // Panasonic
    "dng", // Adobe/Universal
    "raw", "rwl", // Leica
    "raf", // Fuji
    "pef", "ptx", // Pentax
    "x3f", // Sigma
    "srw", // Samsung
    "erf", // Epson
    "mrw", // Minolta
    "3fr", // Hasselblad
    "mef", // Mamiya
    "mos", // Leaf
    "kdc", "dcr", // Kodak
];

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Whether the filename names a camera RAW file.
pub fn is_raw_file(filename: &str) -> bool {
    extension_of(filename).is_some_and(|ext| RAW_EXTENSIONS.contains(&ext.as_str()))
}

fn is_heic_file(filename: &str) -> bool {
    matches!(extension_of(filename).as_deref(), Some("heic" | "heif"))
}

/// Decode an upload into a bitmap, dispatching on the filename extension.
pub fn decode_source(filename: &str, data: &[u8]) -> Result<DynamicImage> {
    if is_raw_file(filename) {
        decode_raw(filename, data)
    } else if is_heic_file(filename) {
        decode_heic(data)
    } else {
        image::load_from_memory(data).map_err(Into::into)
    }
}

/// Develop a camera RAW file into an 8-bit sRGB bitmap.
///
/// The RAW loader only reads from paths, so the bytes are staged in a
/// named temp file whose guard removes it on every exit path. Develop
/// settings stay at the pipeline defaults.
fn decode_raw(filename: &str, data: &[u8]) -> Result<DynamicImage> {
    let ext = extension_of(filename).unwrap_or_else(|| "raw".to_string());

    let mut tmp = tempfile::Builder::new()
        .prefix("imgconv-")
        .suffix(&format!(".{ext}"))
        .tempfile()
        .context("failed to create temp file for RAW decode")?;
    tmp.write_all(data)?;
    tmp.flush()?;

    let mut pipeline = imagepipe::Pipeline::new_from_file(tmp.path())
        .map_err(|e| anyhow!("failed to read RAW file: {e}"))?;
    let developed = pipeline
        .output_8bit(None)
        .map_err(|e| anyhow!("failed to develop RAW file: {e}"))?;

    let img = RgbImage::from_raw(
        developed.width as u32,
        developed.height as u32,
        developed.data,
    )
    .ok_or_else(|| anyhow!("RAW decoder returned a malformed buffer"))?;

    Ok(DynamicImage::ImageRgb8(img))
}

#[cfg(feature = "heif")]
fn decode_heic(data: &[u8]) -> Result<DynamicImage> {
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let lib_heif = LibHeif::new();
    let ctx = HeifContext::read_from_bytes(data)?;
    let handle = ctx.primary_image_handle()?;
    let decoded = lib_heif.decode(&handle, ColorSpace::Rgb(RgbChroma::Rgba), None)?;

    let planes = decoded.planes();
    let plane = planes
        .interleaved
        .ok_or_else(|| anyhow!("HEIC decoder returned no interleaved plane"))?;

    let width = plane.width;
    let height = plane.height;
    let row_bytes = width as usize * 4;

    // rows are padded out to the plane stride
    let mut buf = Vec::with_capacity(row_bytes * height as usize);
    for y in 0..height as usize {
        let start = y * plane.stride;
        buf.extend_from_slice(&plane.data[start..start + row_bytes]);
    }

    let img = image::RgbaImage::from_raw(width, height, buf)
        .ok_or_else(|| anyhow!("HEIC decoder returned a malformed buffer"))?;

    Ok(DynamicImage::ImageRgba8(img))
}

#[cfg(not(feature = "heif"))]
fn decode_heic(_data: &[u8]) -> Result<DynamicImage> {
    Err(anyhow!(
        "HEIC support is not compiled into this build (enable the `heif` feature)"
    ))
}
