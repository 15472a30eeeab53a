/// GCS artifact store for generated media
///
/// Objects are written through V4 signed PUT URLs and handed back either as
/// time-limited signed GET URLs or as public `storage.googleapis.com` URLs,
/// depending on `ARTIFACT_URL_POLICY`.
use crate::config::{GcsConfig, UrlPolicy};
use crate::error::{AppError, Result};
use crate::services::filename;
use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Client as HttpClient;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256};
use std::fs;
use std::time::Duration;
use uuid::Uuid;

/// Characters that must be percent-encoded in the path component
const PATH_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Lifetime of the signed URL used for the upload itself
const UPLOAD_URL_EXPIRY_SECS: u64 = 300;

/// Longest lifetime GCS accepts for a V4 signature (7 days)
const MAX_SIGNED_URL_EXPIRY_SECS: u64 = 604_800;

/// Durable object storage for generated artifacts
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Write `data` as `bucket/object_key` and return a URL the caller can fetch.
    ///
    /// Keys must be unique per artifact; existing objects are never updated.
    async fn put(
        &self,
        bucket: &str,
        object_key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<String>;

    /// Fresh URL for an object written earlier by `put`.
    ///
    /// Signed URLs expire, so callers serving a stored object again ask for
    /// a new one instead of reusing an old URL.
    fn access_url(&self, bucket: &str, object_key: &str) -> Result<String>;
}

/// Object key for an artifact derived from an uploaded file
pub fn object_key_for_upload(original_filename: &str) -> String {
    format!(
        "{}_{}",
        Uuid::new_v4().simple(),
        filename::secure_filename(original_filename)
    )
}

/// Object key for a finalized video
pub fn object_key_for_video() -> String {
    format!("{}.mp4", Uuid::new_v4())
}

/// Service account signing identity
struct ServiceAccount {
    client_email: String,
    private_key: RsaPrivateKey,
}

impl ServiceAccount {
    fn load(cfg: &GcsConfig) -> Result<Self> {
        // Load service account JSON (inline or from file)
        let raw_json = if let Some(ref inline) = cfg.service_account_json {
            inline.clone()
        } else if let Some(ref path) = cfg.service_account_json_path {
            fs::read_to_string(path).map_err(|e| {
                AppError::Config(format!(
                    "Failed to read GCS service account JSON at {}: {e}",
                    path
                ))
            })?
        } else {
            return Err(AppError::Config(
                "GCS artifact store requested but no service account JSON provided".into(),
            ));
        };

        Self::from_json(&raw_json)
    }

    fn from_json(raw_json: &str) -> Result<Self> {
        #[derive(serde::Deserialize)]
        struct Sa {
            client_email: String,
            private_key: String,
        }
        let sa: Sa = serde_json::from_str(raw_json)
            .map_err(|e| AppError::Config(format!("Invalid service account JSON: {e}")))?;

        let private_key = RsaPrivateKey::from_pkcs8_pem(&sa.private_key).map_err(|e| {
            AppError::Config(format!("Failed to parse service account private key: {e}"))
        })?;

        Ok(Self {
            client_email: sa.client_email,
            private_key,
        })
    }
}

/// GCS-backed artifact store
pub struct GcsArtifactStore {
    account: ServiceAccount,
    host: String,
    /// Scheme + host used for upload requests; differs from `host` only in tests
    upload_base: String,
    url_policy: UrlPolicy,
    url_expiry: Duration,
    http_client: HttpClient,
}

impl GcsArtifactStore {
    /// Create a new GCS artifact store from configuration
    pub fn from_config(cfg: &GcsConfig) -> Result<Self> {
        let account = ServiceAccount::load(cfg)?;
        Self::with_account(account, cfg)
    }

    fn with_account(account: ServiceAccount, cfg: &GcsConfig) -> Result<Self> {
        if cfg.url_expiry_secs == 0 || cfg.url_expiry_secs > MAX_SIGNED_URL_EXPIRY_SECS {
            return Err(AppError::Config(format!(
                "ARTIFACT_URL_EXPIRY_SECS must be between 1 and {MAX_SIGNED_URL_EXPIRY_SECS}"
            )));
        }

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {e}")))?;

        tracing::info!(
            images_bucket = %cfg.images_bucket,
            videos_bucket = %cfg.videos_bucket,
            url_policy = ?cfg.url_policy,
            "GCS artifact store initialized"
        );

        Ok(Self {
            account,
            host: cfg.host.clone(),
            upload_base: format!("https://{}", cfg.host),
            url_policy: cfg.url_policy,
            url_expiry: Duration::from_secs(cfg.url_expiry_secs),
            http_client,
        })
    }

    /// Generate a V4 signed URL for a given HTTP method
    fn sign_url(
        &self,
        method: &str,
        bucket: &str,
        object_path: &str,
        expires_in: Duration,
    ) -> Result<String> {
        let now = chrono::Utc::now();
        let datestamp = now.format("%Y%m%d").to_string();
        let timestamp = now.format("%Y%m%dT%H%M%SZ").to_string();

        let credential_scope = format!("{datestamp}/auto/storage/goog4_request");
        let credential = format!("{}/{}", self.account.client_email, credential_scope);

        let canonical_uri = canonical_uri(bucket, object_path);

        let canonical_headers = format!("host:{}\n", self.host);
        let signed_headers = "host";

        let expires = expires_in.as_secs();
        let mut query_items = vec![
            ("X-Goog-Algorithm", "GOOG4-RSA-SHA256".to_string()),
            (
                "X-Goog-Credential",
                urlencoding::encode(&credential).into_owned(),
            ),
            ("X-Goog-Date", timestamp.clone()),
            ("X-Goog-Expires", expires.to_string()),
            ("X-Goog-SignedHeaders", signed_headers.to_string()),
        ];

        query_items.sort_by(|a, b| a.0.cmp(b.0));
        let canonical_query = query_items
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let canonical_request = format!(
            "{method}\n{canonical_uri}\n{canonical_query}\n{canonical_headers}\n{signed_headers}\nUNSIGNED-PAYLOAD"
        );
        let canonical_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));

        let string_to_sign =
            format!("GOOG4-RSA-SHA256\n{timestamp}\n{credential_scope}\n{canonical_hash}");

        let signing_key = SigningKey::<Sha256>::new(self.account.private_key.clone());
        let signature = signing_key.sign(string_to_sign.as_bytes()).to_bytes();
        let signature_hex = hex::encode(signature);

        Ok(format!(
            "{canonical_uri}?{canonical_query}&X-Goog-Signature={signature_hex}"
        ))
    }

}

fn canonical_uri(bucket: &str, object_path: &str) -> String {
    let encoded_object = utf8_percent_encode(object_path, PATH_SET).to_string();
    format!(
        "/{}{}",
        bucket,
        if encoded_object.starts_with('/') {
            encoded_object
        } else {
            format!("/{}", encoded_object)
        }
    )
}

#[async_trait]
impl ArtifactStore for GcsArtifactStore {
    async fn put(
        &self,
        bucket: &str,
        object_key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<String> {
        let signed = self.sign_url(
            "PUT",
            bucket,
            object_key,
            Duration::from_secs(UPLOAD_URL_EXPIRY_SECS),
        )?;
        let size = data.len();

        let response = self
            .http_client
            .put(format!("{}{}", self.upload_base, signed))
            .header("Content-Type", content_type)
            .body(data)
            .send()
            .await
            .map_err(|e| AppError::StorageWriteFailure(format!("GCS upload failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::StorageWriteFailure(format!(
                "GCS upload failed with status {}: {}",
                status, body
            )));
        }

        tracing::info!(
            bucket = %bucket,
            object_key = %object_key,
            size,
            content_type,
            "Uploaded artifact to GCS"
        );
        self.access_url(bucket, object_key)
    }

    fn access_url(&self, bucket: &str, object_key: &str) -> Result<String> {
        match self.url_policy {
            UrlPolicy::Signed => {
                let signed = self.sign_url("GET", bucket, object_key, self.url_expiry)?;
                Ok(format!("https://{}{}", self.host, signed))
            }
            UrlPolicy::Public => Ok(format!(
                "https://{}{}",
                self.host,
                canonical_uri(bucket, object_key)
            )),
        }
    }
}
