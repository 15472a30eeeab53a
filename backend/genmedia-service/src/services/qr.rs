//! QR code rendering for artifact URLs

use crate::error::{AppError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageOutputFormat, Luma};
use qrcode::QrCode;
use std::io::Cursor;

const MIN_DIMENSION: u32 = 256;

/// Render `url` as a PNG QR code
pub fn render_png(url: &str) -> Result<Vec<u8>> {
    let code = QrCode::new(url.as_bytes())
        .map_err(|e| AppError::QrRender(format!("failed to encode QR data: {e}")))?;

    let img = code
        .render::<Luma<u8>>()
        .min_dimensions(MIN_DIMENSION, MIN_DIMENSION)
        .build();

    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageOutputFormat::Png)
        .map_err(|e| AppError::QrRender(format!("failed to encode PNG: {e}")))?;

    Ok(buf.into_inner())
}

/// Render `url` as a base64-encoded PNG QR code
pub fn render_base64_png(url: &str) -> Result<String> {
    render_png(url).map(|png| STANDARD.encode(png))
}
