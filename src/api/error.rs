use crate::services::ingest::IngestError;
use axum::{
    Json,
    body::Body,
    extract::multipart::MultipartError,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Range Not Satisfiable: resource is {0} bytes")]
    RangeNotSatisfiable(u64),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Pipeline failure: {0}")]
    Pipeline(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::InvalidFilename(e) => AppError::BadRequest(e.to_string()),
            IngestError::TooLarge { limit } => AppError::PayloadTooLarge(format!(
                "Upload exceeds the maximum allowed size of {} MB",
                limit / 1024 / 1024
            )),
            // The multipart layer reports the body limit as a read error
            IngestError::Source(e) if is_body_limit(&e) => AppError::PayloadTooLarge(
                "Request body exceeds the maximum allowed limit".to_string(),
            ),
            other => AppError::Pipeline(other.to_string()),
        }
    }
}

fn is_body_limit(err: &std::io::Error) -> bool {
    let from_multipart = err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<MultipartError>())
        .is_some_and(|e| e.status() == StatusCode::PAYLOAD_TOO_LARGE);
    from_multipart || err.to_string().contains("length limit exceeded")
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::RangeNotSatisfiable(total_size) => {
                // 416 carries no body, only the current size
                return Response::builder()
                    .status(StatusCode::RANGE_NOT_SATISFIABLE)
                    .header(header::CONTENT_RANGE, format!("bytes */{}", total_size))
                    .body(Body::empty())
                    .unwrap_or_else(|_| StatusCode::RANGE_NOT_SATISFIABLE.into_response());
            }
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            AppError::Pipeline(cause) => {
                tracing::error!("Upload pipeline failed: {}", cause);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to process upload".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Anyhow(e) => {
                tracing::error!("Anyhow error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::transform::TransformError;
    use crate::utils::validation::validate_filename;

    #[test]
    fn test_range_error_has_no_body() {
        let response = AppError::RangeNotSatisfiable(1234).into_response();
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(
            response.headers().get(header::CONTENT_RANGE).unwrap(),
            "bytes */1234"
        );
    }

    #[test]
    fn test_ingest_error_mapping() {
        let invalid = IngestError::InvalidFilename(validate_filename("../x").unwrap_err());
        assert!(matches!(AppError::from(invalid), AppError::BadRequest(_)));

        let too_large = IngestError::TooLarge { limit: 100 * 1024 * 1024 };
        assert!(matches!(AppError::from(too_large), AppError::PayloadTooLarge(_)));

        let limit = IngestError::Source(std::io::Error::other("length limit exceeded"));
        assert!(matches!(AppError::from(limit), AppError::PayloadTooLarge(_)));

        let malformed = IngestError::Transform(TransformError::Malformed {
            record: 2,
            reason: "bad".to_string(),
        });
        assert!(matches!(AppError::from(malformed), AppError::Pipeline(_)));
    }

    #[test]
    fn test_pipeline_failure_is_generic() {
        let response = AppError::Pipeline("disk full at /srv/uploads".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
