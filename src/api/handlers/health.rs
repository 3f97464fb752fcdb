use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use std::path::Path;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub uploads: String,
    pub processed: String,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let uploads = directory_status(state.playback.storage().root()).await;
    let processed = directory_status(state.csv_ingest.storage().root()).await;

    let status = if uploads == "ready" && processed == "ready" {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        uploads: uploads.to_string(),
        processed: processed.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn directory_status(path: &Path) -> &'static str {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => "ready",
        _ => "missing",
    }
}
