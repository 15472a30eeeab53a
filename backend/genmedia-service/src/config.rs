/// Configuration management for genmedia-service
///
/// Loads configuration from environment variables with sensible defaults.
use crate::error::{AppError, Result};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_VIDEO_PROMPT: &str = "make a short, 5 second video from this image";

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub cors: CorsConfig,
    pub vertex: VertexConfig,
    pub gcs: GcsConfig,
    pub video: VideoConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub env: String,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    /// Production deployments log as JSON
    pub fn is_production(&self) -> bool {
        self.env.eq_ignore_ascii_case("production")
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    pub fn allows_any(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct VertexConfig {
    pub project_id: String,
    pub location: String,
    /// Base URL of the Vertex AI REST API, without a trailing slash
    pub endpoint: String,
    pub image_model: String,
    pub video_model: String,
    pub request_timeout_secs: u64,
    /// Static bearer token; when unset the metadata server is used
    pub access_token: Option<String>,
    pub operation_fetch: OperationFetch,
}

/// How a long-running operation is read back
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationFetch {
    /// `GET {endpoint}/v1/{operation_name}`
    Get,
    /// `POST {model}:fetchPredictOperation` with the name in the body
    FetchPredict,
}

impl OperationFetch {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "get" => Ok(Self::Get),
            "fetch-predict" | "fetchpredictoperation" => Ok(Self::FetchPredict),
            other => Err(AppError::Config(format!(
                "VERTEX_OPERATION_FETCH must be 'get' or 'fetch-predict', got '{other}'"
            ))),
        }
    }
}

impl VertexConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn model_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:{}",
            self.endpoint, self.project_id, self.location, model, method
        )
    }
}

/// How stored artifacts are exposed to callers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlPolicy {
    /// Time-limited V4 signed GET URL; bucket stays private
    Signed,
    /// Stable `storage.googleapis.com` URL; bucket must allow public reads
    Public,
}

impl UrlPolicy {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "signed" => Ok(Self::Signed),
            "public" => Ok(Self::Public),
            other => Err(AppError::Config(format!(
                "ARTIFACT_URL_POLICY must be 'signed' or 'public', got '{other}'"
            ))),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct GcsConfig {
    pub images_bucket: String,
    pub videos_bucket: String,
    pub host: String,
    pub service_account_json: Option<String>,
    pub service_account_json_path: Option<String>,
    pub url_policy: UrlPolicy,
    pub url_expiry_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct VideoConfig {
    pub default_prompt: String,
    pub duration_seconds: u32,
    pub fps: u32,
    /// Remember stored objects per operation so repeated polls do not re-upload
    pub finalize_dedup: bool,
    /// How long a finalized operation stays in the dedup record
    pub dedup_ttl_secs: u64,
    /// Most operations the dedup record holds at once
    pub dedup_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let location = env_or("VERTEX_LOCATION", "us-central1");
        let project_id = std::env::var("GCP_PROJECT_ID")
            .or_else(|_| std::env::var("GOOGLE_CLOUD_PROJECT"))
            .map_err(|_| AppError::Config("GCP_PROJECT_ID must be set".to_string()))?;

        let config = Config {
            app: AppConfig {
                host: env_or("GENMEDIA_HOST", "0.0.0.0"),
                port: if std::env::var("PORT").is_ok() {
                    parse_env("PORT", 8080)?
                } else {
                    parse_env("GENMEDIA_PORT", 8080)?
                },
                env: env_or("APP_ENV", "development"),
                max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 20 * 1024 * 1024)?,
            },
            cors: CorsConfig {
                allowed_origins: parse_origins(&env_or("CORS_ALLOWED_ORIGINS", "*")),
            },
            vertex: VertexConfig {
                endpoint: std::env::var("VERTEX_ENDPOINT")
                    .map(|e| e.trim_end_matches('/').to_string())
                    .unwrap_or_else(|_| format!("https://{location}-aiplatform.googleapis.com")),
                project_id,
                location,
                image_model: env_or(
                    "VERTEX_IMAGE_MODEL",
                    "gemini-2.0-flash-preview-image-generation",
                ),
                video_model: env_or("VERTEX_VIDEO_MODEL", "veo-2.0-generate-001"),
                request_timeout_secs: parse_env("VERTEX_REQUEST_TIMEOUT_SECS", 120)?,
                access_token: std::env::var("GCP_ACCESS_TOKEN")
                    .ok()
                    .filter(|t| !t.is_empty()),
                operation_fetch: OperationFetch::parse(&env_or("VERTEX_OPERATION_FETCH", "get"))?,
            },
            gcs: GcsConfig {
                images_bucket: env_or("CREATED_IMAGES_BUCKET", "created-images"),
                videos_bucket: env_or("CREATED_VIDEOS_BUCKET", "created-videos"),
                host: env_or("GCS_HOST", "storage.googleapis.com"),
                service_account_json: std::env::var("GCS_SERVICE_ACCOUNT_JSON").ok(),
                service_account_json_path: std::env::var("GCS_SERVICE_ACCOUNT_JSON_PATH")
                    .or_else(|_| std::env::var("GOOGLE_APPLICATION_CREDENTIALS"))
                    .ok(),
                url_policy: UrlPolicy::parse(&env_or("ARTIFACT_URL_POLICY", "signed"))?,
                url_expiry_secs: parse_env("ARTIFACT_URL_EXPIRY_SECS", 3600)?,
            },
            video: VideoConfig {
                default_prompt: env_or("VIDEO_DEFAULT_PROMPT", DEFAULT_VIDEO_PROMPT),
                duration_seconds: 5,
                fps: 24,
                finalize_dedup: parse_flag("VIDEO_FINALIZE_DEDUP", false)?,
                dedup_ttl_secs: parse_env("VIDEO_FINALIZE_DEDUP_TTL_SECS", 24 * 60 * 60)?,
                dedup_capacity: parse_env("VIDEO_FINALIZE_DEDUP_CAPACITY", 10_000)?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Cross-field checks that single-variable parsing cannot catch
    pub fn validate(&self) -> Result<()> {
        if self.app.port == 0 {
            return Err(AppError::Config("PORT must be non-zero".to_string()));
        }
        if self.app.max_upload_bytes == 0 {
            return Err(AppError::Config(
                "MAX_UPLOAD_BYTES must be non-zero".to_string(),
            ));
        }
        if self.video.finalize_dedup && self.video.dedup_capacity == 0 {
            return Err(AppError::Config(
                "VIDEO_FINALIZE_DEDUP_CAPACITY must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: '{raw}'"))),
        Err(_) => Ok(default),
    }
}

fn parse_flag(key: &str, default: bool) -> Result<bool> {
    match std::env::var(key) {
        Ok(raw) => flag_value(&raw)
            .ok_or_else(|| AppError::Config(format!("{key} must be true or false, got '{raw}'"))),
        Err(_) => Ok(default),
    }
}

fn flag_value(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
