//! HTTP surface: routing, multipart parsing, response assembly.

use std::str::FromStr;

use axum::extract::multipart::Field;
use axum::extract::Multipart;
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::archive;
use crate::convert::{self, ConvertOptions, ConvertedImage, OutputFormat, ResizeSpec, SourceFile};
use crate::error::ConvertError;

pub fn router() -> Router {
    Router::new()
        .route("/", get(index))
        .route("/convert", post(convert))
        .route("/formats", get(formats))
        .route("/health", get(health))
}

async fn index() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Serialize)]
struct FormatsResponse {
    input_formats: Vec<&'static str>,
    output_formats: Vec<&'static str>,
}

async fn formats() -> Json<FormatsResponse> {
    Json(FormatsResponse {
        input_formats: convert::input_format_names(),
        output_formats: convert::OUTPUT_FORMAT_NAMES.to_vec(),
    })
}

/// Raw `/convert` form fields, collected before validation.
#[derive(Default)]
struct ConvertForm {
    files: Vec<SourceFile>,
    target_format: Option<String>,
    quality: Option<i64>,
    width: Option<u32>,
    height: Option<u32>,
    resize_percent: Option<i64>,
    maintain_aspect_ratio: Option<bool>,
}

async fn convert(mut multipart: Multipart) -> Result<Response, ConvertError> {
    let form = read_form(&mut multipart).await?;

    // the target format is validated before any file is touched
    let target = form
        .target_format
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConvertError::BadRequest("missing form field: target_format".into()))?;
    let format = OutputFormat::parse(target)?;

    if form.files.is_empty() {
        return Err(ConvertError::BadRequest("no files uploaded".into()));
    }

    let opts = ConvertOptions {
        format,
        quality: form.quality.unwrap_or(85).clamp(1, 100) as u8,
        resize: ResizeSpec {
            // a non-positive percent collapses to zero, the resize no-op
            percent: form
                .resize_percent
                .map(|p| p.clamp(0, u32::MAX as i64) as u32),
            width: form.width,
            height: form.height,
            maintain_aspect: form.maintain_aspect_ratio.unwrap_or(true),
        },
    };

    tracing::info!(
        files = form.files.len(),
        format = format.extension(),
        quality = opts.quality,
        "converting batch"
    );

    let files = form.files;
    let outputs = tokio::task::spawn_blocking(move || convert::process_batch(&files, opts))
        .await
        .map_err(|e| ConvertError::Internal(format!("conversion worker failed: {e}")))??;

    download_response(outputs, format)
}

async fn read_form(multipart: &mut Multipart) -> Result<ConvertForm, ConvertError> {
    let mut form = ConvertForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ConvertError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "files" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let data = field.bytes().await.map_err(|e| {
                    ConvertError::BadRequest(format!("failed to read upload {filename}: {e}"))
                })?;
                form.files.push(SourceFile {
                    filename,
                    data: data.to_vec(),
                });
            }
            "target_format" => form.target_format = Some(read_text(field, &name).await?),
            "quality" => form.quality = parse_field(field, &name).await?,
            "width" => form.width = parse_field(field, &name).await?,
            "height" => form.height = parse_field(field, &name).await?,
            "resize_percent" => form.resize_percent = parse_field(field, &name).await?,
            "maintain_aspect_ratio" => {
                form.maintain_aspect_ratio = parse_bool_field(field, &name).await?;
            }
            // unknown fields are ignored
            _ => {}
        }
    }

    Ok(form)
}

async fn read_text(field: Field<'_>, name: &str) -> Result<String, ConvertError> {
    field
        .text()
        .await
        .map_err(|e| ConvertError::BadRequest(format!("failed to read form field {name}: {e}")))
}

/// Parse a numeric field; an empty value counts as absent.
async fn parse_field<T: FromStr>(field: Field<'_>, name: &str) -> Result<Option<T>, ConvertError> {
    let text = read_text(field, name).await?;
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<T>()
        .map(Some)
        .map_err(|_| ConvertError::BadRequest(format!("invalid value for {name}: {text}")))
}

async fn parse_bool_field(field: Field<'_>, name: &str) -> Result<Option<bool>, ConvertError> {
    let text = read_text(field, name).await?;
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    match text.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(Some(true)),
        "false" | "0" | "no" | "off" => Ok(Some(false)),
        other => Err(ConvertError::BadRequest(format!(
            "invalid value for {name}: {other}"
        ))),
    }
}

/// One converted file is returned raw; several come back zipped.
fn download_response(
    mut outputs: Vec<ConvertedImage>,
    format: OutputFormat,
) -> Result<Response, ConvertError> {
    if outputs.len() == 1 {
        let image = outputs.remove(0);
        Ok(attachment(image.data, format.mime_type(), &image.filename))
    } else {
        let data = archive::build_zip(&outputs)
            .map_err(|e| ConvertError::Internal(format!("failed to build ZIP: {e}")))?;
        Ok(attachment(data, "application/zip", archive::ARCHIVE_NAME))
    }
}

fn attachment(data: Vec<u8>, mime: &str, filename: &str) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", sanitize_filename(filename));
    (
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response()
}

// header values reject control characters, and a quote would break the
// quoted-string form
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_control() || c == '"' {
                '_'
            } else {
                c
            }
        })
        .collect()
}
