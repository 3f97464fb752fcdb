pub mod ingest;
pub mod playback;
pub mod range;
pub mod storage;
pub mod transform;
