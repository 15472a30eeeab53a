/// Image generation handler
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::handlers::form::read_upload_form;
use crate::handlers::prompt_preview;
use crate::models::{GenerateImageResponse, GenerationRequest};
use crate::state::AppState;

/// Generate an image from an uploaded image and a prompt
///
/// Multipart fields: `image` (file), `prompt` (text).
pub async fn generate_image(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse> {
    info!("Received request on /generate");
    let form = read_upload_form(payload, state.max_upload_bytes).await?;

    let prompt = form
        .prompt()
        .map(str::to_string)
        .ok_or_else(|| AppError::Validation("No prompt provided.".to_string()));
    let image = form
        .image
        .ok_or_else(|| AppError::Validation("No image file provided.".to_string()))?;
    let prompt = prompt?;

    info!(
        filename = %image.filename,
        prompt = %prompt_preview(&prompt),
        "Processing image"
    );

    let request = GenerationRequest {
        source_image: image.data,
        mime_type: image.mime_type,
        prompt,
        filename: image.filename,
    };

    let artifact = state.generation.generate_image(request).await.map_err(|e| {
        warn!("Image generation failed: {}", e);
        e
    })?;

    Ok(HttpResponse::Ok().json(GenerateImageResponse::from(artifact)))
}
