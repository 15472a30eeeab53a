/// Vertex AI client for image and video generation
///
/// Images go through the synchronous `generateContent` method of a Gemini
/// image model. Videos go through `predictLongRunning` of a Veo model, which
/// returns an operation name that is later fetched by name.
///
/// ## Environment Variables
/// - `GCP_PROJECT_ID`: GCP project ID
/// - `VERTEX_LOCATION`: Vertex AI region (default: us-central1)
/// - `VERTEX_IMAGE_MODEL` / `VERTEX_VIDEO_MODEL`: publisher model IDs
/// - `VERTEX_REQUEST_TIMEOUT_SECS`: per-request timeout (default: 120)
/// - `VERTEX_OPERATION_FETCH`: `get` (default) or `fetch-predict`
use crate::config::{OperationFetch, VertexConfig};
use crate::error::{AppError, MediaKind, Result};
use crate::models::{
    ImageResult, OperationError, OperationSnapshot, VideoGenerationParams, VideoOperation,
};
use crate::services::auth::TokenProvider;
use crate::services::backend::GenerationBackend;
use crate::services::codec::{self, InlinePart};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Finish reasons that mean the candidate was withheld by a content filter
const SAFETY_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "IMAGE_SAFETY",
    "PROHIBITED_CONTENT",
    "IMAGE_PROHIBITED_CONTENT",
    "BLOCKLIST",
    "SPII",
];

pub struct VertexClient {
    config: VertexConfig,
    http_client: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
}

impl VertexClient {
    pub fn new(config: VertexConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AppError::BackendUnavailable(format!("HTTP client error: {e}")))?;

        info!(
            project = %config.project_id,
            location = %config.location,
            image_model = %config.image_model,
            video_model = %config.video_model,
            "Vertex AI client initialized"
        );

        Ok(Self {
            config,
            http_client,
            tokens,
        })
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        let token = self.tokens.access_token().await?;

        self.http_client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::BackendUnavailable(format!("Vertex AI request failed: {e}")))
    }

    /// `{model}:fetchPredictOperation` for the model that owns the operation
    fn fetch_predict_url(&self, operation_name: &str) -> Result<String> {
        let (model, _) = operation_name.split_once("/operations/").ok_or_else(|| {
            AppError::BadOperationName(format!("no operations segment: '{operation_name}'"))
        })?;
        Ok(format!(
            "{}/v1/{}:fetchPredictOperation",
            self.config.endpoint, model
        ))
    }

    /// Turn a non-2xx generation response into a typed error
    async fn request_failure(media: MediaKind, response: reqwest::Response) -> AppError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        error!(status, body = %body, "Vertex AI request rejected");

        // Vertex reports prompt-level safety blocks as plain 400 messages
        let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
            .ok()
            .and_then(|env| env.error.message)
            .unwrap_or_else(|| body.clone());
        codec::safety_from_text(media, &message)
            .unwrap_or(AppError::RequestFailed { status, body })
    }
}

#[async_trait]
impl GenerationBackend for VertexClient {
    async fn generate_image(
        &self,
        prompt: &str,
        image: &[u8],
        mime_type: &str,
    ) -> Result<ImageResult> {
        let part = codec::wrap(image, mime_type)?;
        let url = self
            .config
            .model_url(&self.config.image_model, "generateContent");
        let body = GenerateContentRequest::new(prompt, part);

        info!(
            model = %self.config.image_model,
            input_bytes = image.len(),
            "Calling Vertex AI for image generation"
        );

        let response = self.post_json(&url, &body).await?;
        if !response.status().is_success() {
            return Err(Self::request_failure(MediaKind::Image, response).await);
        }

        let payload: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AppError::MalformedResponse(format!("generateContent body: {e}")))?;

        let result = payload.into_image_result()?;
        debug!(mime_type = %result.mime_type, size = result.data.len(), "Image generated");
        Ok(result)
    }

    async fn start_video_generation(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
        params: VideoGenerationParams,
    ) -> Result<VideoOperation> {
        let part = codec::wrap(image, mime_type)?;
        let url = self
            .config
            .model_url(&self.config.video_model, "predictLongRunning");
        let body = PredictLongRunningRequest::new(prompt, part, params);

        info!(
            model = %self.config.video_model,
            input_bytes = image.len(),
            duration_seconds = params.duration_seconds,
            fps = params.fps,
            "Calling Vertex AI for video generation"
        );

        let response = self.post_json(&url, &body).await?;
        if !response.status().is_success() {
            return Err(Self::request_failure(MediaKind::Video, response).await);
        }

        #[derive(Deserialize)]
        struct OperationHandle {
            #[serde(default)]
            name: String,
        }

        let handle: OperationHandle = response
            .json()
            .await
            .map_err(|e| AppError::MalformedResponse(format!("predictLongRunning body: {e}")))?;

        if handle.name.trim().is_empty() {
            return Err(AppError::MalformedResponse(
                "predictLongRunning returned no operation name".into(),
            ));
        }

        info!(operation = %handle.name, "Started video generation operation");
        Ok(VideoOperation {
            operation_name: handle.name,
        })
    }

    async fn fetch_operation(&self, operation_name: &str) -> Result<OperationSnapshot> {
        let response = match self.config.operation_fetch {
            OperationFetch::Get => {
                let token = self.tokens.access_token().await?;
                let url = format!("{}/v1/{}", self.config.endpoint, operation_name);
                self.http_client
                    .get(&url)
                    .bearer_auth(token)
                    .send()
                    .await
                    .map_err(|e| {
                        AppError::BackendUnavailable(format!("Vertex AI request failed: {e}"))
                    })?
            }
            OperationFetch::FetchPredict => {
                let url = self.fetch_predict_url(operation_name)?;
                let body = FetchOperationRequest { operation_name };
                self.post_json(&url, &body).await?
            }
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(operation = %operation_name, status, "Operation status request failed");
            return Err(AppError::UpstreamError { status, body });
        }

        let text = response
            .text()
            .await
            .map_err(|e| AppError::MalformedResponse(format!("operation body: {e}")))?;
        let operation: OperationResponse = serde_json::from_str(&text)?;

        debug!(operation = %operation_name, done = operation.done, "Fetched operation status");
        Ok(operation.into_snapshot())
    }
}

// ── Request types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FetchOperationRequest<'a> {
    operation_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    #[serde(rename_all = "camelCase")]
    InlineData { inline_data: InlinePart },
    Text { text: String },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
}

impl GenerateContentRequest {
    fn new(prompt: &str, image: InlinePart) -> Self {
        Self {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    RequestPart::InlineData { inline_data: image },
                    RequestPart::Text {
                        text: prompt.to_string(),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["TEXT", "IMAGE"],
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct PredictLongRunningRequest {
    instances: Vec<VideoInstance>,
    parameters: VideoParameters,
}

#[derive(Debug, Serialize)]
struct VideoInstance {
    prompt: String,
    image: EncodedImage,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EncodedImage {
    bytes_base64_encoded: String,
    mime_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoParameters {
    duration_seconds: u32,
    fps: u32,
    sample_count: u32,
}

impl PredictLongRunningRequest {
    fn new(prompt: &str, image: InlinePart, params: VideoGenerationParams) -> Self {
        Self {
            instances: vec![VideoInstance {
                prompt: prompt.to_string(),
                image: EncodedImage {
                    bytes_base64_encoded: image.data,
                    mime_type: image.mime_type,
                },
            }],
            parameters: VideoParameters {
                duration_seconds: params.duration_seconds,
                fps: params.fps,
                sample_count: 1,
            },
        }
    }
}

// ── Response types ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<i32>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    inline_data: Option<InlinePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

impl GenerateContentResponse {
    fn into_image_result(self) -> Result<ImageResult> {
        if let Some(feedback) = self.prompt_feedback {
            if let Some(reason) = feedback.block_reason {
                let detail = feedback.block_reason_message.unwrap_or(reason);
                return Err(AppError::safety(MediaKind::Image, detail));
            }
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or(AppError::EmptyResponse)?;

        if let Some(reason) = candidate.finish_reason.as_deref() {
            if SAFETY_FINISH_REASONS.contains(&reason) {
                return Err(AppError::safety(MediaKind::Image, reason));
            }
        }

        let inline = candidate
            .content
            .into_iter()
            .flat_map(|c| c.parts)
            .find_map(|p| p.inline_data)
            .ok_or(AppError::EmptyResponse)?;

        codec::ensure_image_mime(&inline.mime_type)?;
        let data = codec::decode_payload(&inline.data)?;

        Ok(ImageResult {
            data,
            mime_type: inline.mime_type,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OperationResponse {
    #[serde(default)]
    done: bool,
    #[serde(default)]
    response: Option<OperationResult>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResult {
    #[serde(default)]
    predictions: Vec<EncodedMedia>,
    #[serde(default)]
    videos: Vec<EncodedMedia>,
    #[serde(default)]
    rai_media_filtered_count: Option<u32>,
    #[serde(default)]
    rai_media_filtered_reasons: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EncodedMedia {
    #[serde(default)]
    bytes_base64_encoded: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
}

impl OperationResponse {
    fn into_snapshot(self) -> OperationSnapshot {
        let mut snapshot = OperationSnapshot {
            done: self.done,
            error: self.error.map(|e| OperationError {
                code: e.code,
                message: e.message.unwrap_or_else(|| "unknown error".to_string()),
            }),
            ..Default::default()
        };

        if let Some(result) = self.response {
            snapshot.filtered_count = result.rai_media_filtered_count.unwrap_or(0);
            snapshot.filtered_reasons = result.rai_media_filtered_reasons;

            let first = result
                .predictions
                .into_iter()
                .chain(result.videos)
                .find(|m| m.bytes_base64_encoded.is_some());
            if let Some(media) = first {
                snapshot.payload = media.bytes_base64_encoded;
                snapshot.mime_type = media.mime_type;
            }
        }

        snapshot
    }
}
