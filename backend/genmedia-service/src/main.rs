/// GenMedia Service - HTTP Server
///
/// Accepts image uploads, drives Vertex AI generation and publishes the
/// results to GCS.
use actix_cors::Cors;
use actix_web::{middleware as actix_middleware, web, App, HttpServer};
use anyhow::{Context, Result};
use genmedia_service::services::{
    GcsArtifactStore, GenerationBackend, MetadataTokenProvider, StaticTokenProvider,
    TokenProvider, UnavailableBackend, VertexClient,
};
use genmedia_service::{AppState, Config};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize tracing; JSON lines in production, human-readable elsewhere
    let json_logs = config.app.is_production();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info,genmedia_service=debug".into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    tracing::info!(env = %config.app.env, "Starting genmedia-service");

    let backend = build_backend(&config);
    let store = Arc::new(
        GcsArtifactStore::from_config(&config.gcs).context("Failed to initialize GCS store")?,
    );
    let state = web::Data::new(AppState::new(&config, backend, store));

    if config.video.finalize_dedup {
        tracing::info!(
            ttl_secs = config.video.dedup_ttl_secs,
            capacity = config.video.dedup_capacity,
            "Video finalize dedup enabled"
        );
    }

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("HTTP server listening on {}", bind_address);

    let cors_config = config.cors.clone();
    HttpServer::new(move || {
        let mut cors = Cors::default();
        if cors_config.allows_any() {
            cors = cors.allow_any_origin();
        } else {
            for origin in &cors_config.allowed_origins {
                cors = cors.allowed_origin(origin);
            }
        }
        cors = cors.allow_any_method().allow_any_header().max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(actix_middleware::Logger::default())
            .configure(genmedia_service::configure)
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {bind_address}"))?
    .run()
    .await
    .context("HTTP server error")?;

    Ok(())
}

/// Build the Vertex AI client, or a stand-in that reports why it could not be built
fn build_backend(config: &Config) -> Arc<dyn GenerationBackend> {
    let tokens: genmedia_service::Result<Arc<dyn TokenProvider>> =
        match &config.vertex.access_token {
            Some(token) => Ok(Arc::new(StaticTokenProvider::new(token.clone()))),
            None => MetadataTokenProvider::new().map(|p| Arc::new(p) as Arc<dyn TokenProvider>),
        };

    match tokens.and_then(|tokens| VertexClient::new(config.vertex.clone(), tokens)) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!("Failed to initialize Vertex AI client: {}", e);
            tracing::warn!("Generation endpoints will report the backend as unavailable");
            Arc::new(UnavailableBackend::new(e.to_string()))
        }
    }
}
