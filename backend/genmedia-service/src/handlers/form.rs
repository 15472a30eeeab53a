/// Multipart form parsing for the generation endpoints
use actix_multipart::Multipart;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tracing::error;

use crate::error::{AppError, Result};
use crate::services::{codec, filename};

/// An uploaded image part
#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// Sanitized filename
    pub filename: String,
    pub mime_type: String,
    pub data: Bytes,
}

#[derive(Debug, Default)]
pub struct UploadForm {
    pub image: Option<UploadedImage>,
    pub prompt: Option<String>,
}

impl UploadForm {
    /// Non-blank prompt, trimmed
    pub fn prompt(&self) -> Option<&str> {
        self.prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

/// Read the `image` file part and the `prompt` text part.
///
/// The whole body is capped at `max_bytes`; unknown fields are drained and
/// count toward the cap.
pub async fn read_upload_form(mut payload: Multipart, max_bytes: usize) -> Result<UploadForm> {
    let mut form = UploadForm::default();
    let mut total_bytes: usize = 0;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| {
            error!("Error reading multipart body: {}", e);
            AppError::Validation(format!("Malformed multipart body: {e}"))
        })?;

        let name = field.name().unwrap_or_default().to_string();
        let upload_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);
        let declared_mime = field.content_type().map(|m| m.to_string());

        let mut buf = BytesMut::new();
        while let Some(chunk_res) = field.next().await {
            let chunk = chunk_res.map_err(|e| {
                error!("Error reading upload field: {}", e);
                AppError::Validation(format!("Malformed multipart body: {e}"))
            })?;
            total_bytes += chunk.len();
            if total_bytes > max_bytes {
                return Err(AppError::PayloadTooLarge(format!(
                    "Upload exceeds the {max_bytes} byte limit."
                )));
            }
            buf.extend_from_slice(&chunk);
        }

        match (name.as_str(), upload_name) {
            ("image", Some(original)) => {
                let mime_type = codec::resolve_upload_mime(&original, declared_mime.as_deref());
                form.image = Some(UploadedImage {
                    filename: filename::secure_filename(&original),
                    mime_type,
                    data: buf.freeze(),
                });
            }
            ("prompt", None) => {
                let text = String::from_utf8(buf.to_vec()).map_err(|_| {
                    AppError::Validation("Prompt must be valid UTF-8.".to_string())
                })?;
                form.prompt = Some(text);
            }
            _ => {}
        }
    }

    Ok(form)
}
