use crate::api::error::AppError;
use crate::services::range::{self, ServedSlice};
use crate::services::storage::LocalStorage;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use std::io::SeekFrom;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, Take};
use tokio_util::io::ReaderStream;

/// An opened video, positioned and limited to the slice being served.
pub struct VideoStream {
    pub slice: ServedSlice,
    pub content_type: String,
    pub content_disposition: String,
    pub body: ReaderStream<Take<File>>,
}

/// Serves stored videos, whole or by byte range.
pub struct PlaybackService {
    storage: LocalStorage,
    range_chunk_size: u64,
    read_buffer_size: usize,
    extensions: Vec<String>,
}

impl PlaybackService {
    pub fn new(
        storage: LocalStorage,
        range_chunk_size: u64,
        read_buffer_size: usize,
        extensions: Vec<String>,
    ) -> Self {
        Self {
            storage,
            range_chunk_size,
            read_buffer_size,
            extensions,
        }
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    /// Playable videos in the uploads root.
    pub async fn list(&self) -> Result<Vec<String>, AppError> {
        self.storage
            .list_by_extension(&self.extensions)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to list videos: {}", e)))
    }

    pub async fn open(&self, name: &str, range_header: Option<&str>) -> Result<VideoStream, AppError> {
        let path = self
            .storage
            .resolve(name)
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        // Size comes from the open handle so a concurrent rename onto this
        // path cannot change it under us.
        let mut file = File::open(&path).await.map_err(|e| {
            tracing::debug!("Video lookup failed for {}: {}", path.display(), e);
            AppError::NotFound("Video not found".to_string())
        })?;
        let metadata = file.metadata().await.map_err(|e| {
            tracing::debug!("Video stat failed for {}: {}", path.display(), e);
            AppError::NotFound("Video not found".to_string())
        })?;
        if !metadata.is_file() {
            return Err(AppError::NotFound("Video not found".to_string()));
        }
        let total_size = metadata.len();

        let slice = range::resolve(total_size, range_header, self.range_chunk_size).map_err(|e| {
            tracing::warn!("Rejected range {:?} for {}: {}", range_header, name, e);
            AppError::RangeNotSatisfiable(total_size)
        })?;

        if slice.start > 0 {
            file.seek(SeekFrom::Start(slice.start))
                .await
                .map_err(|e| AppError::Internal(format!("Seek failed: {}", e)))?;
        }

        if slice.partial {
            tracing::info!("🎞️ Streaming video chunk: {}", slice.content_range());
        } else {
            tracing::info!("🎞️ Streaming entire video: {} bytes", total_size);
        }

        let (content_type, content_disposition) = resolve_video_headers(name);
        Ok(VideoStream {
            slice,
            content_type,
            content_disposition,
            body: ReaderStream::with_capacity(file.take(slice.length), self.read_buffer_size),
        })
    }
}

/// Resolve content-type and inline content-disposition for a stored video.
pub fn resolve_video_headers(filename: &str) -> (String, String) {
    let extension = filename.rsplit('.').next().unwrap_or("").to_lowercase();
    let content_type = match extension.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "ogg" | "ogv" => "video/ogg",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        _ => "application/octet-stream",
    }
    .to_string();

    let (stem, extension_part) = match filename.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (filename, None),
    };
    let mut fallback_filename = ascii_header_safe(stem, 64);
    if fallback_filename.is_empty() {
        fallback_filename.push_str("video");
    }
    if let Some(ext) = extension_part
        .map(|e| ascii_header_safe(e, 16))
        .filter(|e| !e.is_empty())
    {
        fallback_filename.push('.');
        fallback_filename.push_str(&ext);
    }

    // RFC 5987 percent-encoding for UTF-8 filename
    let encoded_filename = utf8_percent_encode(filename, NON_ALPHANUMERIC).to_string();

    let content_disposition = format!(
        "inline; filename=\"{}\"; filename*=UTF-8''{}",
        fallback_filename, encoded_filename
    );

    (content_type, content_disposition)
}

fn ascii_header_safe(raw: &str, max_chars: usize) -> String {
    raw.chars()
        .filter(|c| c.is_ascii() && !c.is_control() && *c != '"' && *c != '\\' && *c != ';')
        .take(max_chars)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    async fn service_with(name: &str, data: &[u8]) -> (tempfile::TempDir, PlaybackService) {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join(name), data).await.unwrap();
        let service = PlaybackService::new(
            LocalStorage::new(dir.path()),
            4,
            2,
            vec!["mp4".to_string()],
        );
        (dir, service)
    }

    async fn collect(stream: VideoStream) -> Vec<u8> {
        stream
            .body
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_full_file() {
        let (_dir, service) = service_with("a.mp4", b"0123456789").await;
        let stream = service.open("a.mp4", None).await.unwrap();
        assert!(!stream.slice.partial);
        assert_eq!(stream.slice.length, 10);
        assert_eq!(stream.content_type, "video/mp4");
        assert_eq!(collect(stream).await, b"0123456789");
    }

    #[tokio::test]
    async fn test_range_reads_exact_slice() {
        let (_dir, service) = service_with("a.mp4", b"0123456789").await;

        let stream = service.open("a.mp4", Some("bytes=3-7")).await.unwrap();
        assert_eq!(stream.slice.content_range(), "bytes 3-7/10");
        assert_eq!(collect(stream).await, b"34567");

        // open end is capped by the configured chunk (4 bytes here)
        let stream = service.open("a.mp4", Some("bytes=5-")).await.unwrap();
        assert_eq!(collect(stream).await, b"5678");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let (_dir, service) = service_with("a.mp4", b"x").await;
        let err = service.open("missing.mp4", None).await.err().unwrap();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_directory_is_not_found() {
        let (dir, service) = service_with("a.mp4", b"x").await;
        tokio::fs::create_dir(dir.path().join("dir.mp4")).await.unwrap();
        let err = service.open("dir.mp4", None).await.err().unwrap();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unsatisfiable_range() {
        let (_dir, service) = service_with("a.mp4", b"0123456789").await;
        let err = service.open("a.mp4", Some("bytes=10-")).await.err().unwrap();
        assert!(matches!(err, AppError::RangeNotSatisfiable(10)));
    }

    #[tokio::test]
    async fn test_traversal_is_rejected() {
        let (_dir, service) = service_with("a.mp4", b"x").await;
        let err = service.open("../a.mp4", None).await.err().unwrap();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_resolve_video_headers() {
        let (content_type, disposition) = resolve_video_headers("clip.MP4");
        assert_eq!(content_type, "video/mp4");
        assert_eq!(
            disposition,
            "inline; filename=\"clip.MP4\"; filename*=UTF-8''clip%2EMP4"
        );

        let (content_type, disposition) = resolve_video_headers("日本.webm");
        assert_eq!(content_type, "video/webm");
        assert!(disposition.starts_with("inline; filename=\"video.webm\";"));

        let (_, disposition) = resolve_video_headers("日本");
        assert!(disposition.starts_with("inline; filename=\"video\";"));

        assert_eq!(resolve_video_headers("raw.bin").0, "application/octet-stream");
    }
}
