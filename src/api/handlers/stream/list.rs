use crate::AppState;
use crate::api::error::AppError;
use axum::{Json, extract::State};

#[utoipa::path(
    get,
    path = "/stream/video/list",
    responses(
        (status = 200, description = "Stored video filenames", body = Vec<String>)
    ),
    tag = "stream"
)]
pub async fn list_videos(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    let videos = state.playback.list().await?;
    tracing::debug!("Listing {} videos", videos.len());
    Ok(Json(videos))
}
