//! ZIP assembly for multi-file conversion results.

use std::io::{Cursor, Write};

use anyhow::{Context, Result};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::convert::ConvertedImage;

pub const ARCHIVE_NAME: &str = "converted_images.zip";

/// Bundle converted outputs into a deflate ZIP, entries in input order.
pub fn build_zip(images: &[ConvertedImage]) -> Result<Vec<u8>> {
    log::debug!("archiving {} converted images", images.len());

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for image in images {
        zip.start_file(image.filename.as_str(), options)?;
        zip.write_all(&image.data)?;
    }

    let cursor = zip.finish().context("failed to finalize ZIP archive")?;
    Ok(cursor.into_inner())
}
