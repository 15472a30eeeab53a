//! Generation backend seam
//!
//! Handlers and the operation poller only see this trait, so tests can swap
//! in fakes for the remote model service.

use crate::error::{AppError, Result};
use crate::models::{ImageResult, OperationSnapshot, VideoGenerationParams, VideoOperation};
use async_trait::async_trait;

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Synchronously generate an image from a prompt and a source image
    async fn generate_image(
        &self,
        prompt: &str,
        image: &[u8],
        mime_type: &str,
    ) -> Result<ImageResult>;

    /// Start a long-running video generation and return its operation handle
    async fn start_video_generation(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
        params: VideoGenerationParams,
    ) -> Result<VideoOperation>;

    /// Query the current state of a long-running operation
    async fn fetch_operation(&self, operation_name: &str) -> Result<OperationSnapshot>;
}

/// Stand-in installed when the real client could not be built at startup.
///
/// Keeps the process serving liveness checks while every generation call
/// reports the initialization failure.
pub struct UnavailableBackend {
    reason: String,
}

impl UnavailableBackend {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> AppError {
        AppError::BackendUnavailable(self.reason.clone())
    }
}

#[async_trait]
impl GenerationBackend for UnavailableBackend {
    async fn generate_image(&self, _: &str, _: &[u8], _: &str) -> Result<ImageResult> {
        Err(self.error())
    }

    async fn start_video_generation(
        &self,
        _: &[u8],
        _: &str,
        _: &str,
        _: VideoGenerationParams,
    ) -> Result<VideoOperation> {
        Err(self.error())
    }

    async fn fetch_operation(&self, _: &str) -> Result<OperationSnapshot> {
        Err(self.error())
    }
}
