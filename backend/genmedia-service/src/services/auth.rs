//! Bearer tokens for Google Cloud API calls

use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Supplies OAuth2 access tokens for backend calls
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// Fixed token, typically from `gcloud auth print-access-token` during local development
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String> {
        if self.token.is_empty() {
            return Err(AppError::AuthFailure("static access token is empty".into()));
        }
        Ok(self.token.clone())
    }
}

/// Token from the GCE / Cloud Run metadata server of the attached service account
pub struct MetadataTokenProvider {
    http_client: reqwest::Client,
    url: String,
}

impl MetadataTokenProvider {
    pub fn new() -> Result<Self> {
        Self::with_url(METADATA_TOKEN_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(format!("HTTP client error: {e}")))?;

        Ok(Self {
            http_client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl TokenProvider for MetadataTokenProvider {
    async fn access_token(&self) -> Result<String> {
        let response = self
            .http_client
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| AppError::AuthFailure(format!("metadata request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::AuthFailure(format!(
                "metadata server returned {}",
                response.status()
            )));
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::AuthFailure(format!("failed to parse token response: {e}")))?;

        Ok(token.access_token)
    }
}
