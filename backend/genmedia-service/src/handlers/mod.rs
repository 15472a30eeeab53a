/// HTTP handlers for genmedia-service
///
/// This module contains handlers for:
/// - Health: liveness check
/// - Generate: synchronous image generation
/// - Video: start a video operation and poll its status
pub mod form;
pub mod generate;
pub mod health;
pub mod video;

pub use generate::generate_image;
pub use health::health_check;
pub use video::{generate_video, video_status};

/// First characters of a prompt, for log lines
pub(crate) fn prompt_preview(prompt: &str) -> String {
    const PREVIEW_CHARS: usize = 30;
    let mut preview: String = prompt.chars().take(PREVIEW_CHARS).collect();
    if prompt.chars().count() > PREVIEW_CHARS {
        preview.push_str("...");
    }
    preview
}
