/// Video generation handlers
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::handlers::form::read_upload_form;
use crate::handlers::prompt_preview;
use crate::models::{GenerationRequest, StartVideoResponse, VideoStatusResponse};
use crate::services::PollOutcome;
use crate::state::AppState;

/// Start a video generation from an uploaded image
///
/// Multipart fields: `image` (file), `prompt` (optional text).
pub async fn generate_video(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse> {
    info!("Received request on /generate-video");
    let form = read_upload_form(payload, state.max_upload_bytes).await?;

    let prompt = form
        .prompt()
        .unwrap_or(&state.default_video_prompt)
        .to_string();
    let image = form.image.ok_or_else(|| {
        AppError::Validation("No image file provided for video generation.".to_string())
    })?;

    info!(
        filename = %image.filename,
        prompt = %prompt_preview(&prompt),
        "Processing image for video"
    );

    let request = GenerationRequest {
        source_image: image.data,
        mime_type: image.mime_type,
        prompt,
        filename: image.filename,
    };

    let operation = state.generation.start_video(request).await.map_err(|e| {
        warn!("Video generation start failed: {}", e);
        e
    })?;

    Ok(HttpResponse::Ok().json(StartVideoResponse {
        operation_name: operation.operation_name,
    }))
}

/// Poll a video operation by the name `generate_video` returned
pub async fn video_status(
    state: web::Data<AppState>,
    operation_name: web::Path<String>,
) -> Result<HttpResponse> {
    let operation_name = operation_name.into_inner();

    let body = match state.poller.poll(&operation_name).await {
        Ok(PollOutcome::Processing) => VideoStatusResponse::Processing,
        Ok(PollOutcome::Done(artifact)) => VideoStatusResponse::from(artifact),
        Err(e) => {
            warn!(operation = %operation_name, "Video status check failed: {}", e);
            return Err(e);
        }
    };

    Ok(HttpResponse::Ok().json(body))
}
