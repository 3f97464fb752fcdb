pub mod api;
pub mod config;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::StreamConfig;
use crate::infrastructure::storage::StorageRoots;
use crate::services::ingest::IngestPipeline;
use crate::services::playback::PlaybackService;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Stored CSV outputs are named `processed_<original name>`.
pub const PROCESSED_PREFIX: &str = "processed_";

/// Headroom on top of `max_file_size` for multipart framing.
const MULTIPART_OVERHEAD: usize = 10 * 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::stream::upload::upload_csv,
        api::handlers::stream::upload::upload_video,
        api::handlers::stream::list::list_videos,
        api::handlers::stream::watch::watch_video,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::stream::UploadResponse,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "stream", description = "Streaming upload and playback endpoints"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: StreamConfig,
    pub video_ingest: Arc<IngestPipeline>,
    pub csv_ingest: Arc<IngestPipeline>,
    pub playback: Arc<PlaybackService>,
}

impl AppState {
    pub fn new(config: StreamConfig, roots: StorageRoots) -> Self {
        let video_ingest = IngestPipeline::new(
            roots.uploads.clone(),
            config.max_file_size,
            config.idle_timeout(),
            config.io_buffer_size,
        );
        let csv_ingest = IngestPipeline::new(
            roots.processed,
            config.max_file_size,
            config.idle_timeout(),
            config.io_buffer_size,
        )
        .with_prefix(PROCESSED_PREFIX);
        let playback = PlaybackService::new(
            roots.uploads,
            config.range_chunk_size,
            config.io_buffer_size,
            config.video_extensions.clone(),
        );

        Self {
            config,
            video_ingest: Arc::new(video_ingest),
            csv_ingest: Arc::new(csv_ingest),
            playback: Arc::new(playback),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let upload_limit = state.config.max_file_size + MULTIPART_OVERHEAD;

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/stream/csv",
            post(api::handlers::stream::upload_csv).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/stream/video",
            post(api::handlers::stream::upload_video).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/stream/video/list", get(api::handlers::stream::list_videos))
        .route(
            "/stream/video/watch/:name",
            get(api::handlers::stream::watch_video),
        )
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(cors_layer(&state.config.allowed_origins))
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin: {}", o);
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any)
}
