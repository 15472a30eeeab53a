//! Media codec adapter
//!
//! Wraps uploaded bytes into the inline-data part the generation backend
//! expects, and checks/decodes what comes back.

use crate::error::{AppError, MediaKind, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

const FALLBACK_MIME: &str = "application/octet-stream";

/// Inline media part of a backend request (`{"mimeType": ..., "data": ...}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlinePart {
    pub mime_type: String,
    pub data: String,
}

/// Check an upload before it is forwarded anywhere
pub fn validate(bytes: &[u8], mime_type: &str) -> Result<()> {
    if bytes.is_empty() {
        return Err(AppError::Validation("Uploaded image is empty.".to_string()));
    }
    if mime_type.trim().is_empty() {
        return Err(AppError::Validation(
            "Uploaded image has no content type.".to_string(),
        ));
    }
    Ok(())
}

/// Wrap raw bytes and their declared MIME type into a backend part.
///
/// The MIME type is passed through as-is; the backend rejects values it
/// does not understand.
pub fn wrap(bytes: &[u8], mime_type: &str) -> Result<InlinePart> {
    validate(bytes, mime_type)?;

    Ok(InlinePart {
        mime_type: mime_type.to_string(),
        data: STANDARD.encode(bytes),
    })
}

pub fn ensure_image_mime(mime_type: &str) -> Result<()> {
    if mime_type.starts_with("image/") {
        Ok(())
    } else {
        Err(AppError::UnexpectedMimeType(mime_type.to_string()))
    }
}

/// Pick the MIME type to forward for an upload.
///
/// Browsers often label WebP uploads as octet-stream, so the extension wins.
pub fn resolve_upload_mime(filename: &str, declared: Option<&str>) -> String {
    if filename.to_ascii_lowercase().ends_with(".webp") {
        return "image/webp".to_string();
    }
    match declared.map(str::trim) {
        Some(mime) if !mime.is_empty() => mime.to_string(),
        _ => FALLBACK_MIME.to_string(),
    }
}

/// Decode a base64 payload returned by the backend
pub fn decode_payload(encoded: &str) -> Result<Bytes> {
    STANDARD
        .decode(encoded.trim())
        .map(Bytes::from)
        .map_err(|e| AppError::MalformedResponse(format!("payload is not valid base64: {e}")))
}

/// Does a free-form backend message point at a safety filter?
///
/// Only used when the backend gives no structured reason.
pub fn mentions_safety(text: &str) -> bool {
    text.to_ascii_lowercase().contains("safety")
}

/// Build a safety rejection when `text` mentions a safety filter
pub fn safety_from_text(media: MediaKind, text: &str) -> Option<AppError> {
    mentions_safety(text).then(|| AppError::safety(media, text.to_string()))
}
