//! Shared fixtures for HTTP integration tests
//!
//! In-memory stand-ins for the generation backend and the artifact store, so
//! the full actix app runs without Vertex AI or GCS.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use genmedia_service::config::{
    AppConfig, CorsConfig, GcsConfig, OperationFetch, UrlPolicy, VertexConfig, VideoConfig,
    DEFAULT_VIDEO_PROMPT,
};
use genmedia_service::error::{AppError, MediaKind, Result};
use genmedia_service::models::{
    ImageResult, OperationSnapshot, VideoGenerationParams, VideoOperation,
};
use genmedia_service::services::{ArtifactStore, GenerationBackend};
use genmedia_service::Config;
use std::collections::VecDeque;
use std::sync::Mutex;

pub const OPERATION_NAME: &str =
    "projects/demo/locations/us-central1/publishers/google/models/veo-2.0-generate-001/operations/abc-123";

pub const STUB_IMAGE: &[u8] = b"\x89PNG\r\n\x1a\nstub-image";

pub fn test_config() -> Config {
    Config {
        app: AppConfig {
            host: "127.0.0.1".into(),
            port: 8080,
            env: "test".into(),
            max_upload_bytes: 1024 * 1024,
        },
        cors: CorsConfig {
            allowed_origins: vec!["*".into()],
        },
        vertex: VertexConfig {
            project_id: "demo".into(),
            location: "us-central1".into(),
            endpoint: "http://127.0.0.1:1".into(),
            image_model: "gemini-2.0-flash-preview-image-generation".into(),
            video_model: "veo-2.0-generate-001".into(),
            request_timeout_secs: 5,
            access_token: Some("test-token".into()),
            operation_fetch: OperationFetch::Get,
        },
        gcs: GcsConfig {
            images_bucket: "created-images".into(),
            videos_bucket: "created-videos".into(),
            host: "storage.googleapis.com".into(),
            service_account_json: None,
            service_account_json_path: None,
            url_policy: UrlPolicy::Public,
            url_expiry_secs: 3600,
        },
        video: VideoConfig {
            default_prompt: DEFAULT_VIDEO_PROMPT.into(),
            duration_seconds: 5,
            fps: 24,
            finalize_dedup: false,
            dedup_ttl_secs: 3600,
            dedup_capacity: 16,
        },
    }
}

/// What the fake backend saw on its last generation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenCall {
    pub prompt: String,
    pub mime_type: String,
    pub image: Vec<u8>,
}

/// Backend returning fixed bytes and replaying scripted operation snapshots
#[derive(Default)]
pub struct FakeBackend {
    pub last_call: Mutex<Option<SeenCall>>,
    fetches: Mutex<VecDeque<Result<OperationSnapshot>>>,
    image_error: Mutex<Option<AppError>>,
    video_error: Mutex<Option<AppError>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue snapshots for successive `fetch_operation` calls; afterwards the
    /// operation reports processing.
    pub fn with_snapshots(self, snapshots: Vec<OperationSnapshot>) -> Self {
        self.with_fetch_results(snapshots.into_iter().map(Ok).collect())
    }

    /// Like `with_snapshots`, but a fetch may also fail
    pub fn with_fetch_results(self, results: Vec<Result<OperationSnapshot>>) -> Self {
        *self.fetches.lock().unwrap() = results.into();
        self
    }

    pub fn failing_images_with(self, err: AppError) -> Self {
        *self.image_error.lock().unwrap() = Some(err);
        self
    }

    pub fn failing_videos_with(self, err: AppError) -> Self {
        *self.video_error.lock().unwrap() = Some(err);
        self
    }

    pub fn last_call(&self) -> Option<SeenCall> {
        self.last_call.lock().unwrap().clone()
    }

    fn record(&self, prompt: &str, mime_type: &str, image: &[u8]) {
        *self.last_call.lock().unwrap() = Some(SeenCall {
            prompt: prompt.to_string(),
            mime_type: mime_type.to_string(),
            image: image.to_vec(),
        });
    }
}

#[async_trait]
impl GenerationBackend for FakeBackend {
    async fn generate_image(
        &self,
        prompt: &str,
        image: &[u8],
        mime_type: &str,
    ) -> Result<ImageResult> {
        self.record(prompt, mime_type, image);
        if let Some(err) = self.image_error.lock().unwrap().take() {
            return Err(err);
        }
        Ok(ImageResult {
            data: Bytes::from_static(STUB_IMAGE),
            mime_type: "image/png".into(),
        })
    }

    async fn start_video_generation(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
        _params: VideoGenerationParams,
    ) -> Result<VideoOperation> {
        self.record(prompt, mime_type, image);
        if let Some(err) = self.video_error.lock().unwrap().take() {
            return Err(err);
        }
        Ok(VideoOperation {
            operation_name: OPERATION_NAME.into(),
        })
    }

    async fn fetch_operation(&self, _operation_name: &str) -> Result<OperationSnapshot> {
        self.fetches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(OperationSnapshot::default()))
    }
}

pub fn done_snapshot() -> OperationSnapshot {
    OperationSnapshot {
        done: true,
        // "video-bytes"
        payload: Some("dmlkZW8tYnl0ZXM=".into()),
        mime_type: Some("video/mp4".into()),
        ..Default::default()
    }
}

pub fn safety_error() -> AppError {
    AppError::safety(MediaKind::Image, "IMAGE_SAFETY")
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bucket: String,
    pub key: String,
    pub data: Bytes,
    pub content_type: String,
}

/// Artifact store that keeps objects in memory and returns public-style URLs
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<Vec<StoredObject>>,
    write_error: Option<String>,
}

impl MemoryStore {
    /// A store whose every write fails with `reason`
    pub fn failing(reason: &str) -> Self {
        Self {
            write_error: Some(reason.to_string()),
            ..Default::default()
        }
    }

    pub fn objects(&self) -> Vec<StoredObject> {
        self.objects.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn put(
        &self,
        bucket: &str,
        object_key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<String> {
        if let Some(reason) = &self.write_error {
            return Err(AppError::StorageWriteFailure(reason.clone()));
        }
        self.objects.lock().unwrap().push(StoredObject {
            bucket: bucket.to_string(),
            key: object_key.to_string(),
            data,
            content_type: content_type.to_string(),
        });
        self.access_url(bucket, object_key)
    }

    fn access_url(&self, bucket: &str, object_key: &str) -> Result<String> {
        Ok(format!("https://storage.googleapis.com/{bucket}/{object_key}"))
    }
}

/// One part of a multipart body
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        filename: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
}

const BOUNDARY: &str = "genmedia-test-boundary";

/// Encode parts as `multipart/form-data`; returns the content type and body
pub fn multipart(parts: &[Part<'_>]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                filename,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

pub fn jpeg_part(data: &[u8]) -> Part<'_> {
    Part::File {
        name: "image",
        filename: "selfie.jpg",
        content_type: "image/jpeg",
        data,
    }
}
