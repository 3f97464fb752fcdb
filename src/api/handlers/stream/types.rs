use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    /// Name the upload was stored under
    pub filename: String,
    /// Bytes durable on disk
    pub size: u64,
}
