use crate::services::storage::LocalStorage;
use crate::services::transform::{PassThroughTransform, TransformChain, TransformError};
use crate::utils::keyed_mutex::KeyedMutex;
use crate::utils::validation::ValidationError;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufWriter};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid filename: {0}")]
    InvalidFilename(#[from] ValidationError),

    #[error("failed to read upload body: {0}")]
    Source(io::Error),

    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("failed to write upload: {0}")]
    Write(io::Error),

    #[error("timed out after {0:?} waiting on {1}")]
    Timeout(Duration, &'static str),

    #[error("upload exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

/// A file that completed the pipeline and is visible under its final name.
#[derive(Debug, Clone)]
pub struct UploadedAsset {
    pub original_name: String,
    pub stored_name: String,
    pub stored_path: PathBuf,
    pub size_bytes: u64,
}

/// Streams request bodies through transforms into one storage root.
pub struct IngestPipeline {
    storage: LocalStorage,
    prefix: String,
    locks: KeyedMutex,
    max_file_size: usize,
    idle_timeout: Duration,
    buffer_size: usize,
}

impl IngestPipeline {
    pub fn new(
        storage: LocalStorage,
        max_file_size: usize,
        idle_timeout: Duration,
        buffer_size: usize,
    ) -> Self {
        Self {
            storage,
            prefix: String::new(),
            locks: KeyedMutex::new(),
            max_file_size,
            idle_timeout,
            buffer_size,
        }
    }

    /// Stores outputs as `<prefix><original name>`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn destination_name(&self, original_name: &str) -> String {
        format!("{}{}", self.prefix, original_name)
    }

    /// Runs one upload end to end.
    ///
    /// Bytes land in a hidden staging file next to the destination and are
    /// renamed onto the final name only after everything was written and
    /// synced. Any failure, or dropping the returned future, removes the
    /// staging file. Uploads to the same destination run one at a time.
    pub async fn ingest<S>(
        &self,
        original_name: &str,
        body: S,
        transforms: Vec<Box<dyn PassThroughTransform>>,
    ) -> Result<UploadedAsset, IngestError>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        crate::utils::validation::validate_filename(original_name)?;
        let stored_name = self.destination_name(original_name);
        let destination = self.storage.resolve(&stored_name)?;

        let guard = self.locks.lock(&stored_name).await;
        let result = self
            .write_staged(&destination, body, TransformChain::new(transforms))
            .await;
        drop(guard);
        self.locks.cleanup();

        let size_bytes = result?;
        tracing::info!(
            "💾 Stored {} as {} ({} bytes)",
            original_name,
            destination.display(),
            size_bytes
        );

        Ok(UploadedAsset {
            original_name: original_name.to_string(),
            stored_name,
            stored_path: destination,
            size_bytes,
        })
    }

    async fn write_staged<S>(
        &self,
        destination: &std::path::Path,
        body: S,
        mut chain: TransformChain,
    ) -> Result<u64, IngestError>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        let staging = tempfile::Builder::new()
            .prefix(".ingest-")
            .suffix(".part")
            .tempfile_in(self.storage.root())
            .map_err(IngestError::Write)?;
        let file = tokio::fs::File::from_std(staging.reopen().map_err(IngestError::Write)?);
        let mut writer = BufWriter::with_capacity(self.buffer_size, file);

        let mut body = std::pin::pin!(body);
        let mut received: u64 = 0;

        loop {
            let next = tokio::time::timeout(self.idle_timeout, body.next())
                .await
                .map_err(|_| IngestError::Timeout(self.idle_timeout, "request body"))?;
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(IngestError::Source)?;

            received += chunk.len() as u64;
            if received > self.max_file_size as u64 {
                return Err(IngestError::TooLarge {
                    limit: self.max_file_size,
                });
            }

            for out in chain.push(chunk)? {
                self.write_chunk(&mut writer, &out).await?;
            }
        }

        for out in chain.finish()? {
            self.write_chunk(&mut writer, &out).await?;
        }

        tokio::time::timeout(self.idle_timeout, writer.flush())
            .await
            .map_err(|_| IngestError::Timeout(self.idle_timeout, "flush"))?
            .map_err(IngestError::Write)?;
        writer
            .get_ref()
            .sync_all()
            .await
            .map_err(IngestError::Write)?;
        drop(writer);

        staging
            .persist(destination)
            .map_err(|e| IngestError::Write(e.error))?;

        let metadata = tokio::fs::metadata(destination)
            .await
            .map_err(IngestError::Write)?;
        Ok(metadata.len())
    }

    async fn write_chunk(
        &self,
        writer: &mut BufWriter<tokio::fs::File>,
        chunk: &[u8],
    ) -> Result<(), IngestError> {
        tokio::time::timeout(self.idle_timeout, writer.write_all(chunk))
            .await
            .map_err(|_| IngestError::Timeout(self.idle_timeout, "disk write"))?
            .map_err(IngestError::Write)
    }
}
