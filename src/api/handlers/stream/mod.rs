pub mod list;
pub mod types;
pub mod upload;
pub mod watch;

// Re-export all types
pub use types::*;

// Re-export all handlers
pub use list::list_videos;
pub use upload::{upload_csv, upload_video};
pub use watch::watch_video;
