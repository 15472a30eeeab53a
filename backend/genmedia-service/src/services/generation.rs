//! Generation service
//!
//! Orchestrates the synchronous image path and the start of a video
//! operation. Polling lives in [`crate::services::operations`].

use crate::error::{AppError, Result};
use crate::models::{GenerationRequest, PublishedArtifact, VideoGenerationParams, VideoOperation};
use crate::services::backend::GenerationBackend;
use crate::services::codec;
use crate::services::publisher::ArtifactPublisher;
use crate::services::storage;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct GenerationService {
    backend: Arc<dyn GenerationBackend>,
    publisher: ArtifactPublisher,
    images_bucket: String,
    video_params: VideoGenerationParams,
}

impl GenerationService {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        publisher: ArtifactPublisher,
        images_bucket: impl Into<String>,
        video_params: VideoGenerationParams,
    ) -> Self {
        Self {
            backend,
            publisher,
            images_bucket: images_bucket.into(),
            video_params,
        }
    }

    /// Generate an image, store it and return its URL with a QR code
    pub async fn generate_image(&self, request: GenerationRequest) -> Result<PublishedArtifact> {
        ensure_source(&request)?;
        if request.prompt.trim().is_empty() {
            return Err(AppError::Validation("No prompt provided.".to_string()));
        }

        let result = self
            .backend
            .generate_image(&request.prompt, &request.source_image, &request.mime_type)
            .await?;
        codec::ensure_image_mime(&result.mime_type)?;

        let object_key = storage::object_key_for_upload(&request.filename);
        let artifact = self
            .publisher
            .publish(&self.images_bucket, &object_key, result.data, &result.mime_type)
            .await?;

        info!(
            object_key = %artifact.object_key,
            mime_type = %result.mime_type,
            "Generated image stored"
        );
        Ok(artifact)
    }

    /// Start a video operation; the caller polls it by name
    pub async fn start_video(&self, request: GenerationRequest) -> Result<VideoOperation> {
        ensure_source(&request)?;

        let operation = self
            .backend
            .start_video_generation(
                &request.source_image,
                &request.mime_type,
                &request.prompt,
                self.video_params,
            )
            .await?;

        info!(operation = %operation.operation_name, "Video generation started");
        Ok(operation)
    }
}

fn ensure_source(request: &GenerationRequest) -> Result<()> {
    codec::validate(&request.source_image, &request.mime_type)
}
