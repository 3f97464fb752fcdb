use crate::AppState;
use crate::api::error::AppError;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

#[utoipa::path(
    get,
    path = "/stream/video/watch/{name}",
    params(
        ("name" = String, Path, description = "Stored video filename"),
        ("Range" = Option<String>, Header, description = "Single byte range, e.g. bytes=0-1048575")
    ),
    responses(
        (status = 200, description = "Whole video"),
        (status = 206, description = "Requested byte range"),
        (status = 400, description = "Invalid filename"),
        (status = 404, description = "Video not found"),
        (status = 416, description = "Range not satisfiable")
    ),
    tag = "stream"
)]
pub async fn watch_video(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let range_header = headers.get(header::RANGE).map(|v| v.to_str().unwrap_or(""));

    let stream = state.playback.open(&name, range_header).await?;
    let slice = stream.slice;

    let mut response = (
        [
            (header::CONTENT_TYPE, stream.content_type),
            (header::ACCEPT_RANGES, "bytes".to_string()),
            (header::CONTENT_DISPOSITION, stream.content_disposition),
        ],
        Body::from_stream(stream.body),
    )
        .into_response();

    response
        .headers_mut()
        .insert(header::CONTENT_LENGTH, HeaderValue::from(slice.length));

    if slice.partial {
        *response.status_mut() = StatusCode::PARTIAL_CONTENT;
        let content_range = HeaderValue::from_str(&slice.content_range())
            .map_err(|e| AppError::Internal(format!("Invalid Content-Range: {}", e)))?;
        response
            .headers_mut()
            .insert(header::CONTENT_RANGE, content_range);
    }

    Ok(response)
}
