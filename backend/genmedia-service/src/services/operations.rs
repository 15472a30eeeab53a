//! Video operation poller
//!
//! Drives the lifecycle of a long-running video generation:
//!
//! ```text
//! PROCESSING ──done + payload──▶ DONE    (finalize: store, URL, QR)
//!      │
//!      └──────done + error─────▶ FAILED
//! ```
//!
//! Nothing about an operation is kept here. Every poll asks the backend for
//! the live state, so a poll that fails in transit can simply be retried.
//! The caller owns the poll interval and the overall deadline.
//!
//! Each poll that observes `done` finalizes again and writes a new object,
//! unless the finalize dedup record is enabled. That record keeps object keys
//! only, bounded in age and count, and issues a fresh URL per served poll.

use crate::error::{AppError, MediaKind, Result};
use crate::models::{OperationSnapshot, PublishedArtifact, VideoOperationStatus};
use crate::services::backend::GenerationBackend;
use crate::services::codec;
use crate::services::publisher::ArtifactPublisher;
use crate::services::storage;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const DEFAULT_VIDEO_MIME: &str = "video/mp4";

/// What a single poll reports back to the HTTP layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Processing,
    Done(PublishedArtifact),
}

/// Reject operation names that are not backend operation resource paths
pub fn validate_operation_name(name: &str) -> Result<()> {
    let bad = |why: &str| Err(AppError::BadOperationName(format!("{why}: '{name}'")));

    if name.is_empty() {
        return bad("empty");
    }
    if name.starts_with('/') || name.ends_with('/') {
        return bad("leading or trailing slash");
    }
    if name.chars().any(|c| c.is_whitespace() || c.is_control() || c == '?' || c == '#') {
        return bad("illegal character");
    }
    if name.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return bad("empty or relative path segment");
    }
    if !name.contains("/operations/") {
        return bad("not an operation resource");
    }
    Ok(())
}

/// Derive the operation status from one backend snapshot
pub fn interpret(snapshot: OperationSnapshot) -> Result<VideoOperationStatus> {
    if !snapshot.done {
        return Ok(VideoOperationStatus::Processing);
    }

    if let Some(err) = snapshot.error {
        if let Some(safety) = codec::safety_from_text(MediaKind::Video, &err.message) {
            return Err(safety);
        }
        let detail = match err.code {
            Some(code) => format!("{} (code {})", err.message, code),
            None => err.message,
        };
        return Ok(VideoOperationStatus::Failed { detail });
    }

    match snapshot.payload {
        Some(encoded) => Ok(VideoOperationStatus::Done {
            data: codec::decode_payload(&encoded)?,
            mime_type: snapshot
                .mime_type
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_VIDEO_MIME.to_string()),
        }),
        None if snapshot.filtered_count > 0 => {
            let reason = if snapshot.filtered_reasons.is_empty() {
                format!("{} result(s) filtered", snapshot.filtered_count)
            } else {
                snapshot.filtered_reasons.join("; ")
            };
            Err(AppError::safety(MediaKind::Video, reason))
        }
        None => Err(AppError::MalformedResponse(
            "operation is done but carries no encoded video".into(),
        )),
    }
}

/// Bounds of the finalize dedup record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupLimits {
    /// How long a finalized operation is remembered
    pub ttl: Duration,
    /// Most operations remembered at once; the oldest are evicted first
    pub capacity: usize,
}

impl Default for DedupLimits {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 60 * 60),
            capacity: 10_000,
        }
    }
}

struct FinalizedVideo {
    object_key: String,
    finalized_at: Instant,
}

/// Object key per finalized operation name.
///
/// Only the key is kept. Signed URLs expire, so every served poll gets a
/// freshly issued one.
struct FinalizeRecord {
    entries: DashMap<String, FinalizedVideo>,
    limits: DedupLimits,
}

impl FinalizeRecord {
    fn new(limits: DedupLimits) -> Self {
        Self {
            entries: DashMap::new(),
            limits,
        }
    }

    fn lookup(&self, operation_name: &str) -> Option<String> {
        let ttl = self.limits.ttl;
        self.entries
            .remove_if(operation_name, |_, v| v.finalized_at.elapsed() >= ttl);
        self.entries
            .get(operation_name)
            .map(|entry| entry.object_key.clone())
    }

    /// Record `object_key` unless a concurrent poll got there first; returns the kept key
    fn remember(&self, operation_name: &str, object_key: &str) -> String {
        let full = self.entries.len() >= self.limits.capacity;
        if full && !self.entries.contains_key(operation_name) {
            self.evict();
        }
        self.entries
            .entry(operation_name.to_string())
            .or_insert_with(|| FinalizedVideo {
                object_key: object_key.to_string(),
                finalized_at: Instant::now(),
            })
            .object_key
            .clone()
    }

    fn evict(&self) {
        let ttl = self.limits.ttl;
        self.entries.retain(|_, v| v.finalized_at.elapsed() < ttl);

        while self.entries.len() >= self.limits.capacity.max(1) {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.finalized_at)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

pub struct VideoOperationPoller {
    backend: Arc<dyn GenerationBackend>,
    publisher: ArtifactPublisher,
    videos_bucket: String,
    finalized: Option<FinalizeRecord>,
}

impl VideoOperationPoller {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        publisher: ArtifactPublisher,
        videos_bucket: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            publisher,
            videos_bucket: videos_bucket.into(),
            finalized: None,
        }
    }

    /// Remember the object stored per operation and serve it again on later polls
    pub fn with_finalize_dedup(mut self, limits: DedupLimits) -> Self {
        self.finalized = Some(FinalizeRecord::new(limits));
        self
    }

    /// Operations currently held by the dedup record
    pub fn remembered(&self) -> usize {
        self.finalized.as_ref().map_or(0, FinalizeRecord::len)
    }

    pub async fn poll(&self, operation_name: &str) -> Result<PollOutcome> {
        validate_operation_name(operation_name)?;

        if let Some(object_key) = self
            .finalized
            .as_ref()
            .and_then(|record| record.lookup(operation_name))
        {
            debug!(
                operation = %operation_name,
                object_key = %object_key,
                "Serving previously finalized video"
            );
            let artifact = self.publisher.reissue(&self.videos_bucket, &object_key)?;
            return Ok(PollOutcome::Done(artifact));
        }

        let snapshot = self.backend.fetch_operation(operation_name).await?;
        let status = interpret(snapshot)?;
        debug!(operation = %operation_name, status = status.as_str(), "Polled video operation");

        match status {
            VideoOperationStatus::Processing => Ok(PollOutcome::Processing),
            VideoOperationStatus::Failed { detail } => {
                warn!(operation = %operation_name, detail = %detail, "Video operation failed");
                Err(AppError::GenerationFailed {
                    media: MediaKind::Video,
                    detail,
                })
            }
            VideoOperationStatus::Done { data, mime_type } => {
                let artifact = self.finalize(operation_name, data, &mime_type).await?;
                Ok(PollOutcome::Done(artifact))
            }
        }
    }

    async fn finalize(
        &self,
        operation_name: &str,
        data: Bytes,
        mime_type: &str,
    ) -> Result<PublishedArtifact> {
        let object_key = storage::object_key_for_video();
        let artifact = self
            .publisher
            .publish(&self.videos_bucket, &object_key, data, mime_type)
            .await?;

        info!(
            operation = %operation_name,
            object_key = %object_key,
            "Finalized video operation"
        );

        let Some(record) = self.finalized.as_ref() else {
            return Ok(artifact);
        };
        let kept = record.remember(operation_name, &object_key);
        if kept == object_key {
            Ok(artifact)
        } else {
            // A concurrent poll finalized first; serve its object
            self.publisher.reissue(&self.videos_bucket, &kept)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImageResult, OperationError, VideoGenerationParams, VideoOperation};
    use crate::services::storage::ArtifactStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const OP: &str = "projects/p/locations/us-central1/publishers/google/models/veo/operations/42";

    /// Backend that replays a queue of snapshots, one per fetch
    struct ScriptedBackend {
        snapshots: Mutex<Vec<Result<OperationSnapshot>>>,
        fetches: Mutex<usize>,
    }

    impl ScriptedBackend {
        fn new(mut script: Vec<Result<OperationSnapshot>>) -> Self {
            script.reverse();
            Self {
                snapshots: Mutex::new(script),
                fetches: Mutex::new(0),
            }
        }

        fn fetches(&self) -> usize {
            *self.fetches.lock().unwrap()
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        async fn generate_image(&self, _: &str, _: &[u8], _: &str) -> Result<ImageResult> {
            unreachable!("image path not used by the poller")
        }

        async fn start_video_generation(
            &self,
            _: &[u8],
            _: &str,
            _: &str,
            _: VideoGenerationParams,
        ) -> Result<VideoOperation> {
            unreachable!("start path not used by the poller")
        }

        async fn fetch_operation(&self, _: &str) -> Result<OperationSnapshot> {
            *self.fetches.lock().unwrap() += 1;
            self.snapshots
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(OperationSnapshot::default()))
        }
    }

    /// Store that stamps every issued URL with an increasing issue number,
    /// standing in for signed URLs that differ per signing time
    #[derive(Default)]
    struct CountingStore {
        objects: Mutex<Vec<(String, String, Bytes, String)>>,
        issued: AtomicUsize,
    }

    #[async_trait]
    impl ArtifactStore for CountingStore {
        async fn put(&self, bucket: &str, key: &str, data: Bytes, ct: &str) -> Result<String> {
            self.objects.lock().unwrap().push((
                bucket.to_string(),
                key.to_string(),
                data,
                ct.to_string(),
            ));
            self.access_url(bucket, key)
        }

        fn access_url(&self, bucket: &str, key: &str) -> Result<String> {
            let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!(
                "https://storage.googleapis.com/{bucket}/{key}?issued={n}"
            ))
        }
    }

    fn limits(ttl: Duration, capacity: usize) -> DedupLimits {
        DedupLimits { ttl, capacity }
    }

    fn pending() -> Result<OperationSnapshot> {
        Ok(OperationSnapshot::default())
    }

    fn finished() -> Result<OperationSnapshot> {
        Ok(OperationSnapshot {
            done: true,
            payload: Some("AAECAw==".into()),
            mime_type: Some("video/mp4".into()),
            ..Default::default()
        })
    }

    fn poller(
        script: Vec<Result<OperationSnapshot>>,
    ) -> (VideoOperationPoller, Arc<ScriptedBackend>, Arc<CountingStore>) {
        let backend = Arc::new(ScriptedBackend::new(script));
        let store = Arc::new(CountingStore::default());
        let poller = VideoOperationPoller::new(
            backend.clone(),
            ArtifactPublisher::new(store.clone()),
            "created-videos",
        );
        (poller, backend, store)
    }

    #[test]
    fn operation_names_are_validated() {
        assert!(validate_operation_name(OP).is_ok());
        for bad in [
            "",
            "/projects/p/operations/1",
            "projects/p/operations/1/",
            "projects/p/../operations/1",
            "projects/p//operations/1",
            "projects/p/operations/1?alt=media",
            "projects/p/operations/ 1",
            "projects/p/models/veo",
        ] {
            assert!(
                matches!(validate_operation_name(bad), Err(AppError::BadOperationName(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn not_done_is_processing() {
        let status = interpret(OperationSnapshot::default()).unwrap();
        assert_eq!(status, VideoOperationStatus::Processing);
    }

    #[test]
    fn done_with_payload_decodes_bytes() {
        let status = interpret(finished().unwrap()).unwrap();
        assert_eq!(
            status,
            VideoOperationStatus::Done {
                data: Bytes::from_static(&[0, 1, 2, 3]),
                mime_type: "video/mp4".into()
            }
        );
    }

    #[test]
    fn missing_mime_defaults_to_mp4() {
        let status = interpret(OperationSnapshot {
            done: true,
            payload: Some("AQ==".into()),
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(status, VideoOperationStatus::Done { ref mime_type, .. } if mime_type == "video/mp4"));
    }

    #[test]
    fn done_with_error_is_failed() {
        let status = interpret(OperationSnapshot {
            done: true,
            error: Some(OperationError {
                code: Some(13),
                message: "internal".into(),
            }),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            status,
            VideoOperationStatus::Failed {
                detail: "internal (code 13)".into()
            }
        );
    }

    #[test]
    fn filtered_result_is_safety_rejection() {
        let err = interpret(OperationSnapshot {
            done: true,
            filtered_count: 1,
            filtered_reasons: vec!["Person generation is blocked".into()],
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(
            err,
            AppError::SafetyRejected { media: MediaKind::Video, ref reason } if reason == "Person generation is blocked"
        ));
    }

    #[test]
    fn done_without_payload_is_malformed() {
        let err = interpret(OperationSnapshot {
            done: true,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, AppError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn processing_polls_have_no_side_effects() {
        let (poller, backend, store) = poller(vec![pending(), pending(), pending()]);

        for _ in 0..3 {
            assert_eq!(poller.poll(OP).await.unwrap(), PollOutcome::Processing);
        }
        assert_eq!(backend.fetches(), 3);
        assert!(store.objects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn done_poll_finalizes_once_per_observation() {
        let (poller, _, store) = poller(vec![pending(), finished()]);

        assert_eq!(poller.poll(OP).await.unwrap(), PollOutcome::Processing);
        let outcome = poller.poll(OP).await.unwrap();

        let objects = store.objects.lock().unwrap();
        assert_eq!(objects.len(), 1);
        let (bucket, key, data, ct) = &objects[0];
        assert_eq!(bucket, "created-videos");
        assert!(key.ends_with(".mp4"));
        assert_eq!(&data[..], &[0, 1, 2, 3]);
        assert_eq!(ct, "video/mp4");

        match outcome {
            PollOutcome::Done(artifact) => {
                assert_eq!(
                    artifact.url,
                    format!("https://storage.googleapis.com/created-videos/{key}?issued=1")
                );
                assert!(!artifact.qr_code.is_empty());
            }
            other => panic!("expected done, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn repeated_done_polls_refinalize_without_dedup() {
        let (poller, _, store) = poller(vec![finished(), finished()]);

        let first = poller.poll(OP).await.unwrap();
        let second = poller.poll(OP).await.unwrap();

        assert_eq!(store.objects.lock().unwrap().len(), 2);
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn dedup_serves_first_object_with_fresh_url() {
        let (poller, backend, store) = poller(vec![finished(), finished()]);
        let poller = poller.with_finalize_dedup(DedupLimits::default());

        let first = match poller.poll(OP).await.unwrap() {
            PollOutcome::Done(artifact) => artifact,
            other => panic!("expected done, got {other:?}"),
        };
        let second = match poller.poll(OP).await.unwrap() {
            PollOutcome::Done(artifact) => artifact,
            other => panic!("expected done, got {other:?}"),
        };

        assert_eq!(store.objects.lock().unwrap().len(), 1);
        assert_eq!(backend.fetches(), 1);
        assert_eq!(first.object_key, second.object_key);
        assert!(first.url.ends_with("?issued=1"));
        assert!(second.url.ends_with("?issued=2"));
        assert_ne!(first.qr_code, second.qr_code);
    }

    #[tokio::test]
    async fn expired_dedup_entries_are_finalized_again() {
        let (poller, backend, store) = poller(vec![finished(), finished()]);
        let poller = poller.with_finalize_dedup(limits(Duration::ZERO, 16));

        poller.poll(OP).await.unwrap();
        poller.poll(OP).await.unwrap();

        assert_eq!(backend.fetches(), 2);
        assert_eq!(store.objects.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn dedup_record_is_bounded() {
        let script = (0..5).map(|_| finished()).collect();
        let (poller, _, _) = poller(script);
        let poller = poller.with_finalize_dedup(limits(Duration::from_secs(3600), 3));

        for i in 0..5 {
            let name = format!("projects/p/locations/l/operations/{i}");
            poller.poll(&name).await.unwrap();
        }

        assert_eq!(poller.remembered(), 3);
    }

    #[tokio::test]
    async fn evicts_oldest_entry_first() {
        let (poller, backend, _) = poller((0..4).map(|_| finished()).collect());
        let poller = poller.with_finalize_dedup(limits(Duration::from_secs(3600), 2));
        let names: Vec<String> = (0..3)
            .map(|i| format!("projects/p/locations/l/operations/{i}"))
            .collect();

        for name in &names {
            poller.poll(name).await.unwrap();
        }
        assert_eq!(backend.fetches(), 3);

        // newest is still remembered, oldest was evicted
        poller.poll(&names[2]).await.unwrap();
        assert_eq!(backend.fetches(), 3);
        poller.poll(&names[0]).await.unwrap();
        assert_eq!(backend.fetches(), 4);
    }

    #[tokio::test]
    async fn transient_errors_leave_no_trace() {
        let (poller, _, store) = poller(vec![
            Err(AppError::UpstreamError {
                status: 503,
                body: "try later".into(),
            }),
            finished(),
        ]);

        assert!(matches!(
            poller.poll(OP).await,
            Err(AppError::UpstreamError { status: 503, .. })
        ));
        assert!(store.objects.lock().unwrap().is_empty());

        assert!(matches!(poller.poll(OP).await, Ok(PollOutcome::Done(_))));
        assert_eq!(store.objects.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_operation_surfaces_generation_failure() {
        let (poller, _, store) = poller(vec![Ok(OperationSnapshot {
            done: true,
            error: Some(OperationError {
                code: None,
                message: "quota".into(),
            }),
            ..Default::default()
        })]);

        assert!(matches!(
            poller.poll(OP).await,
            Err(AppError::GenerationFailed { media: MediaKind::Video, .. })
        ));
        assert!(store.objects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn bad_name_never_reaches_backend() {
        let (poller, backend, _) = poller(vec![]);
        assert!(matches!(
            poller.poll("../../etc").await,
            Err(AppError::BadOperationName(_))
        ));
        assert_eq!(backend.fetches(), 0);
    }
}
