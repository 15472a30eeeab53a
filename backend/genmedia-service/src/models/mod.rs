/// Data models for genmedia-service
///
/// This module defines structures for:
/// - Generation inputs and backend results
/// - Video operation handles and their polled status
/// - HTTP response payloads
///
use bytes::Bytes;
use serde::{Deserialize, Serialize};

// ========================================
// Generation Models
// ========================================

/// One inbound generation call, discarded after dispatch
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub source_image: Bytes,
    pub mime_type: String,
    pub prompt: String,
    /// Sanitized name of the uploaded file
    pub filename: String,
}

/// Image returned synchronously by the backend
#[derive(Debug, Clone)]
pub struct ImageResult {
    pub data: Bytes,
    pub mime_type: String,
}

/// Knobs for the long-running video request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoGenerationParams {
    pub duration_seconds: u32,
    pub fps: u32,
}

impl Default for VideoGenerationParams {
    fn default() -> Self {
        Self {
            duration_seconds: 5,
            fps: 24,
        }
    }
}

// ========================================
// Video Operation Models
// ========================================

/// Opaque handle to a backend long-running operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoOperation {
    pub operation_name: String,
}

/// Error block of a finished operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationError {
    pub code: Option<i32>,
    pub message: String,
}

/// The backend's view of an operation at the moment it was polled
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationSnapshot {
    pub done: bool,
    /// Base64 payload of the first prediction, when present
    pub payload: Option<String>,
    pub mime_type: Option<String>,
    pub error: Option<OperationError>,
    /// Number of results dropped by the backend's content filters
    pub filtered_count: u32,
    pub filtered_reasons: Vec<String>,
}

/// Status of a video operation, derived freshly on every poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoOperationStatus {
    Processing,
    Done { data: Bytes, mime_type: String },
    Failed { detail: String },
}

impl VideoOperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Done { .. } => "done",
            Self::Failed { .. } => "failed",
        }
    }
}

/// A stored artifact together with the QR code of its URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedArtifact {
    pub object_key: String,
    pub url: String,
    /// Base64-encoded PNG
    pub qr_code: String,
}

// ========================================
// HTTP Response Models
// ========================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageResponse {
    pub image_data: String,
    pub qr_code: String,
}

impl From<PublishedArtifact> for GenerateImageResponse {
    fn from(artifact: PublishedArtifact) -> Self {
        Self {
            image_data: artifact.url,
            qr_code: artifact.qr_code,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartVideoResponse {
    pub operation_name: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum VideoStatusResponse {
    Processing,
    Done {
        #[serde(rename = "videoData")]
        video_data: String,
        #[serde(rename = "qrCode")]
        qr_code: String,
    },
}

impl From<PublishedArtifact> for VideoStatusResponse {
    fn from(artifact: PublishedArtifact) -> Self {
        Self::Done {
            video_data: artifact.url,
            qr_code: artifact.qr_code,
        }
    }
}
