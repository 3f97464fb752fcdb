use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the streaming endpoints
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Directory holding raw video uploads (default: "uploads")
    pub uploads_dir: PathBuf,

    /// Directory holding transformed uploads (default: "processed")
    pub processed_dir: PathBuf,

    /// Maximum upload payload in bytes (default: 100 MB)
    pub max_file_size: usize,

    /// Slice served when a range request omits its end (default: 10 MB)
    pub range_chunk_size: u64,

    /// Read/write buffer used by the transfer engine (default: 64 KB)
    pub io_buffer_size: usize,

    /// Idle timeout for body reads and disk writes in seconds (default: 30)
    pub idle_timeout_secs: u64,

    /// Largest partial CSV record kept between chunks (default: 1 MB)
    pub max_csv_record_size: usize,

    /// Extensions listed as playable videos, without the dot (default: "mp4")
    pub video_extensions: Vec<String>,

    /// Allowed CORS Origins (comma separated, "*" allows any)
    pub allowed_origins: Vec<String>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from("uploads"),
            processed_dir: PathBuf::from("processed"),
            max_file_size: 100 * 1024 * 1024,   // 100 MB
            range_chunk_size: 10 * 1024 * 1024, // 10 MB
            io_buffer_size: 64 * 1024,
            idle_timeout_secs: 30,
            max_csv_record_size: 1024 * 1024,
            video_extensions: vec!["mp4".to_string()],
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:5173".to_string(),
            ],
        }
    }
}

impl StreamConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            uploads_dir: env::var("UPLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.uploads_dir),

            processed_dir: env::var("PROCESSED_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.processed_dir),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            range_chunk_size: env::var("RANGE_CHUNK_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &u64| *v > 0)
                .unwrap_or(default.range_chunk_size),

            io_buffer_size: env::var("IO_BUFFER_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &usize| *v > 0)
                .unwrap_or(default.io_buffer_size),

            idle_timeout_secs: env::var("IDLE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.idle_timeout_secs),

            max_csv_record_size: env::var("MAX_CSV_RECORD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_csv_record_size),

            video_extensions: env::var("VIDEO_EXTENSIONS")
                .ok()
                .map(|v| parse_list(&v, |s| s.trim_start_matches('.').to_lowercase()))
                .filter(|v| !v.is_empty())
                .unwrap_or(default.video_extensions),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| parse_list(&v, str::to_string))
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Development config rooted at the given directories, any origin allowed
    pub fn development(uploads_dir: impl Into<PathBuf>, processed_dir: impl Into<PathBuf>) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
            processed_dir: processed_dir.into(),
            allowed_origins: vec!["*".to_string()],
            ..Self::default()
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

fn parse_list(raw: &str, normalize: impl Fn(&str) -> String) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(normalize)
        .collect()
}
