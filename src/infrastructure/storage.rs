use crate::config::StreamConfig;
use crate::services::storage::LocalStorage;
use anyhow::Context;
use tracing::info;

pub struct StorageRoots {
    pub uploads: LocalStorage,
    pub processed: LocalStorage,
}

/// Opens both storage roots, creating the directories when missing.
pub async fn setup_storage(config: &StreamConfig) -> anyhow::Result<StorageRoots> {
    let uploads = LocalStorage::new(&config.uploads_dir);
    let processed = LocalStorage::new(&config.processed_dir);

    for (label, storage) in [("Uploads", &uploads), ("Processed", &processed)] {
        storage
            .ensure_root()
            .await
            .with_context(|| format!("failed to create {}", storage.root().display()))?;
        info!("📁 {} directory ready: {}", label, storage.root().display());
    }

    Ok(StorageRoots { uploads, processed })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_setup_creates_both_roots() {
        let dir = tempfile::tempdir().unwrap();
        let config = StreamConfig::development(dir.path().join("u"), dir.path().join("p"));

        let roots = setup_storage(&config).await.unwrap();
        assert!(roots.uploads.root().is_dir());
        assert!(roots.processed.root().is_dir());
    }
}
