use super::types::UploadResponse;
use crate::AppState;
use crate::api::error::AppError;
use crate::services::ingest::{IngestError, IngestPipeline, UploadedAsset};
use crate::services::transform::{CsvTransform, PassThroughTransform, ProgressTransform};
use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
};
use futures::TryStreamExt;
use std::time::Duration;
use tokio::time::timeout;

#[utoipa::path(
    post,
    path = "/stream/csv",
    request_body(content = Multipart, description = "CSV file upload"),
    responses(
        (status = 200, description = "CSV processed and stored", body = UploadResponse),
        (status = 400, description = "No file part or invalid filename"),
        (status = 413, description = "Upload too large"),
        (status = 500, description = "Pipeline failure")
    ),
    tag = "stream"
)]
pub async fn upload_csv(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let max_record = state.config.max_csv_record_size;
    let asset = ingest_first_file(multipart, &state.csv_ingest, || {
        vec![
            Box::new(CsvTransform::new(max_record)) as Box<dyn PassThroughTransform>,
            Box::new(ProgressTransform::new("CSV")),
        ]
    })
    .await?;

    Ok(Json(UploadResponse {
        message: "CSV processed successfully".to_string(),
        filename: asset.stored_name,
        size: asset.size_bytes,
    }))
}

#[utoipa::path(
    post,
    path = "/stream/video",
    request_body(content = Multipart, description = "Video file upload"),
    responses(
        (status = 200, description = "Video stored", body = UploadResponse),
        (status = 400, description = "No file part or invalid filename"),
        (status = 413, description = "Upload too large"),
        (status = 500, description = "Pipeline failure")
    ),
    tag = "stream"
)]
pub async fn upload_video(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let asset = ingest_first_file(multipart, &state.video_ingest, || {
        vec![Box::new(ProgressTransform::new("video")) as Box<dyn PassThroughTransform>]
    })
    .await?;

    tracing::info!("Uploaded video size: {} bytes", asset.size_bytes);

    Ok(Json(UploadResponse {
        message: "Video uploaded successfully".to_string(),
        filename: asset.stored_name,
        size: asset.size_bytes,
    }))
}

/// Streams the first part carrying a filename through `pipeline`.
async fn ingest_first_file(
    mut multipart: Multipart,
    pipeline: &IngestPipeline,
    transforms: impl FnOnce() -> Vec<Box<dyn PassThroughTransform>>,
) -> Result<UploadedAsset, AppError> {
    let idle = pipeline.idle_timeout();
    let mut stalled = false;

    let result: Result<UploadedAsset, AppError> = async {
        loop {
            let next = timeout(idle, multipart.next_field()).await.map_err(|_| {
                stalled = true;
                AppError::Pipeline(format!("timed out after {:?} waiting on multipart field", idle))
            })?;
            let Some(field) = next.map_err(multipart_error)? else {
                break;
            };
            let Some(original_name) = field.file_name().map(str::to_string) else {
                continue;
            };

            let body = field.map_err(std::io::Error::other);
            let asset = pipeline
                .ingest(&original_name, body, transforms())
                .await
                .map_err(|e| {
                    stalled = matches!(e, IngestError::Timeout(..));
                    AppError::from(e)
                })?;
            return Ok(asset);
        }

        Err(AppError::BadRequest("No file uploaded".to_string()))
    }
    .await;

    match result {
        Ok(asset) => Ok(asset),
        Err(e) if stalled => {
            tracing::warn!("Upload stalled: {}. Dropping the connection body", e);
            Err(e)
        }
        Err(e) => {
            // Consume the rest of the body so the client sees our response
            // instead of a connection reset
            tracing::warn!("Upload failed early: {}. Consuming remaining stream...", e);
            drain(&mut multipart, idle).await;
            Err(e)
        }
    }
}

/// Reads and discards what is left of the body, giving up on the first
/// await that stays idle for `idle`.
async fn drain(multipart: &mut Multipart, idle: Duration) {
    while let Ok(Ok(Some(mut field))) = timeout(idle, multipart.next_field()).await {
        loop {
            match timeout(idle, field.chunk()).await {
                Ok(Ok(Some(_))) => continue,
                Ok(Ok(None)) => break,
                _ => return,
            }
        }
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::BadRequest(e.body_text())
    }
}
