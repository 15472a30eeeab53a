/// Error types for genmedia-service
///
/// Every failure raised below the handlers ends up here and is rendered as a
/// JSON body with a single `error` string field.
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for genmedia-service operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Which generation path produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Image => "Image",
            Self::Video => "Video",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or invalid request field
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    /// The operation name handed back by the client is not a backend operation path
    #[error("Invalid operation name: {0}")]
    BadOperationName(String),

    /// The backend declined the request on safety grounds
    #[error("{} generation blocked by safety filters: {reason}", .media.label())]
    SafetyRejected { media: MediaKind, reason: String },

    #[error("Generation backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Generation backend returned no candidates")]
    EmptyResponse,

    #[error("Unexpected MIME type from backend: {0}")]
    UnexpectedMimeType(String),

    /// Non-2xx from a generation request
    #[error("Backend request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("Failed to acquire access token: {0}")]
    AuthFailure(String),

    /// Non-2xx from the operation status endpoint
    #[error("Operation status request failed with status {status}: {body}")]
    UpstreamError { status: u16, body: String },

    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    /// The backend finished the operation with an error
    #[error("{} generation failed: {detail}", .media.label())]
    GenerationFailed { media: MediaKind, detail: String },

    #[error("Storage write failed: {0}")]
    StorageWriteFailure(String),

    #[error("QR code rendering failed: {0}")]
    QrRender(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn safety(media: MediaKind, reason: impl Into<String>) -> Self {
        AppError::SafetyRejected {
            media,
            reason: reason.into(),
        }
    }

    /// Message exposed to API clients
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg) | AppError::PayloadTooLarge(msg) => msg.clone(),
            AppError::BadOperationName(_) => self.to_string(),
            AppError::SafetyRejected { media, .. } => {
                format!("{} generation failed due to safety filters.", media.label())
            }
            _ => format!("An internal server error occurred: {}", self),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadOperationName(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.public_message(),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::MalformedResponse(err.to_string())
    }
}
