//! The conversion pipeline: decode, normalize, resize, encode.

pub mod decode;
pub mod encode;
pub mod transform;

use std::path::Path;

use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::error::ConvertError;

/// Formats the encoder can produce. HEIC and RAW are input-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl OutputFormat {
    /// Parse a user-supplied format name, case-insensitive. "JPG" and
    /// "JPEG" are aliases of the same encoder.
    pub fn parse(name: &str) -> Result<Self, ConvertError> {
        match name.to_ascii_uppercase().as_str() {
            "PNG" => Ok(OutputFormat::Png),
            "JPG" | "JPEG" => Ok(OutputFormat::Jpeg),
            "GIF" => Ok(OutputFormat::Gif),
            "WEBP" => Ok(OutputFormat::Webp),
            "HEIC" => Err(ConvertError::HeicOutput),
            other => Err(ConvertError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Gif => "gif",
            OutputFormat::Webp => "webp",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Gif => "image/gif",
            OutputFormat::Webp => "image/webp",
        }
    }
}

pub const OUTPUT_FORMAT_NAMES: &[&str] = &["PNG", "JPG", "JPEG", "GIF", "WEBP"];

/// Input format names reported by the metadata endpoint. HEIC is listed
/// only when the build can actually decode it.
pub fn input_format_names() -> Vec<&'static str> {
    let mut names = vec!["PNG", "JPG", "JPEG", "GIF", "WEBP"];
    if cfg!(feature = "heif") {
        names.push("HEIC");
    }
    names.push("RAW");
    names
}

/// Resize requested by the client. `percent`, when given and not 100,
/// wins over everything else; zero dimensions count as absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeSpec {
    pub percent: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub maintain_aspect: bool,
}

impl Default for ResizeSpec {
    fn default() -> Self {
        Self {
            percent: None,
            width: None,
            height: None,
            maintain_aspect: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConvertOptions {
    pub format: OutputFormat,
    pub quality: u8,
    pub resize: ResizeSpec,
}

/// One uploaded file, fully buffered.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub filename: String,
    pub data: Vec<u8>,
}

/// One converted output; the bytes are in the requested target format.
#[derive(Debug, Clone)]
pub struct ConvertedImage {
    pub filename: String,
    pub data: Vec<u8>,
}

// don't use Path::with_extension, the stem must survive inner dots
fn output_filename(original: &str, format: OutputFormat) -> String {
    let stem = Path::new(original)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    format!("{stem}.{}", format.extension())
}

/// Run the full pipeline for one file.
fn process_file(file: &SourceFile, opts: ConvertOptions) -> Result<ConvertedImage, ConvertError> {
    let img =
        decode::decode_source(&file.filename, &file.data).map_err(|e| ConvertError::Decode {
            filename: file.filename.clone(),
            message: e.to_string(),
        })?;

    log::debug!(
        "decoded {} ({}x{}, {:?})",
        file.filename,
        img.width(),
        img.height(),
        img.color()
    );

    let img = transform::normalize_color(img, opts.format);
    let img = transform::resize(img, opts.resize);

    let data =
        encode::encode_image(&img, opts.format, opts.quality).map_err(|e| ConvertError::Encode {
            filename: file.filename.clone(),
            message: e.to_string(),
        })?;

    Ok(ConvertedImage {
        filename: output_filename(&file.filename, opts.format),
        data,
    })
}

/// Convert a batch of uploads sharing one set of options. Quality is
/// clamped into 1-100 before use.
///
/// Files are converted in parallel but results keep submission order, and
/// the first failure in submission order fails the whole batch; no partial
/// results are returned.
pub fn process_batch(
    files: &[SourceFile],
    opts: ConvertOptions,
) -> Result<Vec<ConvertedImage>, ConvertError> {
    let opts = ConvertOptions {
        quality: opts.quality.clamp(1, 100),
        ..opts
    };

    log::debug!("converting {} files to {:?}", files.len(), opts.format);

    let results: Vec<Result<ConvertedImage, ConvertError>> = files
        .into_par_iter()
        .map(|file| {
            process_file(file, opts).map_err(|e| {
                log::warn!("failed to convert {}: {e}", file.filename);
                e
            })
        })
        .collect();

    results.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encoded(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut data = Cursor::new(Vec::new());
        img.write_to(&mut data, format).unwrap();
        data.into_inner()
    }

    fn rgb_sample(name: &str, w: u32, h: u32, format: ImageFormat) -> SourceFile {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([10, 200, 120])));
        SourceFile {
            filename: name.to_string(),
            data: encoded(img, format),
        }
    }

    fn options(format: OutputFormat) -> ConvertOptions {
        ConvertOptions {
            format,
            quality: 85,
            resize: ResizeSpec::default(),
        }
    }

    #[test]
    fn parse_is_case_insensitive_and_aliases_jpg() {
        assert_eq!(OutputFormat::parse("png").unwrap(), OutputFormat::Png);
        assert_eq!(OutputFormat::parse("WebP").unwrap(), OutputFormat::Webp);
        assert_eq!(OutputFormat::parse("jpg").unwrap(), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::parse("JPEG").unwrap(), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::parse("gif").unwrap(), OutputFormat::Gif);
    }

    #[test]
    fn parse_rejects_heic_with_dedicated_error() {
        let heic = OutputFormat::parse("heic").unwrap_err();
        assert!(matches!(heic, ConvertError::HeicOutput));
        assert!(heic.to_string().contains("HEIC"));

        let bmp = OutputFormat::parse("bmp").unwrap_err();
        assert!(matches!(bmp, ConvertError::UnsupportedFormat(_)));
        assert!(bmp.to_string().contains("Unsupported target format: BMP"));
        assert_ne!(heic.to_string(), bmp.to_string());
    }

    #[test]
    fn output_filename_replaces_extension() {
        assert_eq!(output_filename("photo.png", OutputFormat::Jpeg), "photo.jpg");
        assert_eq!(output_filename("photo.CR2", OutputFormat::Webp), "photo.webp");
        assert_eq!(output_filename("photo", OutputFormat::Png), "photo.png");
    }

    #[test]
    fn output_filename_keeps_inner_dots() {
        assert_eq!(
            output_filename("holiday v1.2 (edited).png", OutputFormat::Gif),
            "holiday v1.2 (edited).gif"
        );
    }

    #[test]
    fn batch_preserves_submission_order() {
        let files = vec![
            rgb_sample("first.png", 64, 48, ImageFormat::Png),
            rgb_sample("second.png", 32, 32, ImageFormat::Png),
        ];

        let outputs = process_batch(&files, options(OutputFormat::Jpeg)).unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].filename, "first.jpg");
        assert_eq!(outputs[1].filename, "second.jpg");

        let first = image::load_from_memory(&outputs[0].data).unwrap();
        assert_eq!((first.width(), first.height()), (64, 48));
        let second = image::load_from_memory(&outputs[1].data).unwrap();
        assert_eq!((second.width(), second.height()), (32, 32));
    }

    #[test]
    fn corrupt_file_fails_whole_batch_naming_it() {
        let files = vec![
            rgb_sample("good.png", 16, 16, ImageFormat::Png),
            SourceFile {
                filename: "broken.bin".to_string(),
                data: b"this is not an image at all".to_vec(),
            },
        ];

        let err = process_batch(&files, options(OutputFormat::Png)).unwrap_err();
        assert!(matches!(err, ConvertError::Decode { .. }));
        assert!(err.to_string().contains("Error processing broken.bin"));
    }

    #[test]
    fn first_failure_in_submission_order_wins() {
        let files = vec![
            SourceFile {
                filename: "bad-one.dat".to_string(),
                data: b"garbage".to_vec(),
            },
            SourceFile {
                filename: "bad-two.dat".to_string(),
                data: b"more garbage".to_vec(),
            },
        ];

        let err = process_batch(&files, options(OutputFormat::Png)).unwrap_err();
        assert!(err.to_string().contains("Error processing bad-one.dat"));
    }

    #[test]
    fn batch_clamps_out_of_range_quality() {
        for quality in [0u8, 255] {
            let files = vec![rgb_sample("q.png", 12, 12, ImageFormat::Png)];
            let opts = ConvertOptions {
                format: OutputFormat::Png,
                quality,
                resize: ResizeSpec::default(),
            };

            let outputs = process_batch(&files, opts).unwrap();
            let img = image::load_from_memory(&outputs[0].data).unwrap();
            assert_eq!((img.width(), img.height()), (12, 12));
        }
    }

    #[test]
    fn every_format_pair_roundtrips_with_same_dimensions() {
        let inputs = [
            ("in.png", ImageFormat::Png),
            ("in.jpg", ImageFormat::Jpeg),
            ("in.gif", ImageFormat::Gif),
            ("in.webp", ImageFormat::WebP),
        ];
        let outputs = [
            (OutputFormat::Png, ImageFormat::Png),
            (OutputFormat::Jpeg, ImageFormat::Jpeg),
            (OutputFormat::Gif, ImageFormat::Gif),
            (OutputFormat::Webp, ImageFormat::WebP),
        ];

        for (name, input_format) in inputs {
            for (target, expected) in outputs {
                let file = rgb_sample(name, 40, 30, input_format);
                let out = process_file(&file, options(target)).unwrap();

                assert_eq!(image::guess_format(&out.data).unwrap(), expected);
                let img = image::load_from_memory(&out.data).unwrap();
                assert_eq!((img.width(), img.height()), (40, 30));
            }
        }
    }

    #[test]
    fn transparency_survives_png_to_png() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 0])));
        let file = SourceFile {
            filename: "clear.png".to_string(),
            data: encoded(img, ImageFormat::Png),
        };

        let out = process_file(&file, options(OutputFormat::Png)).unwrap();
        let img = image::load_from_memory(&out.data).unwrap();
        assert!(img.color().has_alpha());
    }
}
