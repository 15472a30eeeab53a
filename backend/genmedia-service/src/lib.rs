//! GenMedia Service
//!
//! Glue service in front of Vertex AI: turns an uploaded image and a prompt
//! into a generated image or video, stores the result in GCS and hands back
//! its URL with a QR code.

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;

use actix_web::web;

// Public re-exports
pub use config::Config;
pub use error::{AppError, Result};
pub use state::AppState;

/// Register every HTTP route; shared by the binary and the integration tests
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(handlers::health_check))
        .route("/generate", web::post().to(handlers::generate_image))
        .route("/generate-video", web::post().to(handlers::generate_video))
        .route(
            "/video-status/{operation_name:.*}",
            web::get().to(handlers::video_status),
        );
}
