/// Shared application state, built once at startup and handed to every worker
use crate::config::Config;
use crate::models::VideoGenerationParams;
use crate::services::{
    ArtifactPublisher, ArtifactStore, DedupLimits, GenerationBackend, GenerationService,
    VideoOperationPoller,
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub generation: GenerationService,
    pub poller: Arc<VideoOperationPoller>,
    pub max_upload_bytes: usize,
    pub default_video_prompt: String,
}

impl AppState {
    pub fn new(
        config: &Config,
        backend: Arc<dyn GenerationBackend>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        let publisher = ArtifactPublisher::new(store);

        let generation = GenerationService::new(
            backend.clone(),
            publisher.clone(),
            config.gcs.images_bucket.clone(),
            VideoGenerationParams {
                duration_seconds: config.video.duration_seconds,
                fps: config.video.fps,
            },
        );

        let mut poller =
            VideoOperationPoller::new(backend, publisher, config.gcs.videos_bucket.clone());
        if config.video.finalize_dedup {
            poller = poller.with_finalize_dedup(DedupLimits {
                ttl: Duration::from_secs(config.video.dedup_ttl_secs),
                capacity: config.video.dedup_capacity,
            });
        }

        Self {
            generation,
            poller: Arc::new(poller),
            max_upload_bytes: config.app.max_upload_bytes,
            default_video_prompt: config.video.default_prompt.clone(),
        }
    }
}
