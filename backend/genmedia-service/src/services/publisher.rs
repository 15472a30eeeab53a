//! Finalize sequence shared by the image path and the video poller:
//! store the bytes, derive the URL, render its QR code.

use crate::error::Result;
use crate::models::PublishedArtifact;
use crate::services::qr;
use crate::services::storage::ArtifactStore;
use bytes::Bytes;
use std::sync::Arc;

#[derive(Clone)]
pub struct ArtifactPublisher {
    store: Arc<dyn ArtifactStore>,
}

impl ArtifactPublisher {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    pub async fn publish(
        &self,
        bucket: &str,
        object_key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<PublishedArtifact> {
        let url = self.store.put(bucket, object_key, data, content_type).await?;
        Self::with_qr(object_key, url)
    }

    /// Hand out an already stored object again, with a newly issued URL
    pub fn reissue(&self, bucket: &str, object_key: &str) -> Result<PublishedArtifact> {
        let url = self.store.access_url(bucket, object_key)?;
        Self::with_qr(object_key, url)
    }

    fn with_qr(object_key: &str, url: String) -> Result<PublishedArtifact> {
        let qr_code = qr::render_base64_png(&url)?;
        Ok(PublishedArtifact {
            object_key: object_key.to_string(),
            url,
            qr_code,
        })
    }
}
