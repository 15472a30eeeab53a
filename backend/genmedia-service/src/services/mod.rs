/// Service layer for genmedia-service
///
/// This module provides:
/// - Generation: image generation and video operation start
/// - Operations: polling and finalizing long-running video operations
/// - Backend: the Vertex AI client behind the `GenerationBackend` seam
/// - Storage: GCS uploads and artifact URLs behind the `ArtifactStore` seam
/// - Helpers: media codec, credentials, QR rendering, filename sanitizing
pub mod auth;
pub mod backend;
pub mod codec;
pub mod filename;
pub mod generation;
pub mod operations;
pub mod publisher;
pub mod qr;
pub mod storage;
pub mod vertex;

pub use auth::{MetadataTokenProvider, StaticTokenProvider, TokenProvider};
pub use backend::{GenerationBackend, UnavailableBackend};
pub use generation::GenerationService;
pub use operations::{DedupLimits, PollOutcome, VideoOperationPoller};
pub use publisher::ArtifactPublisher;
pub use storage::{ArtifactStore, GcsArtifactStore};
pub use vertex::VertexClient;
