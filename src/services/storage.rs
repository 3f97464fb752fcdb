use crate::utils::validation::{ValidationError, has_extension, validate_filename};
use std::io;
use std::path::{Path, PathBuf};

/// A directory on local disk whose direct children are stored assets.
///
/// The listing of the directory is the index; there is no other catalog.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the root directory if it does not exist yet.
    pub async fn ensure_root(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Maps a client-supplied name to its path under the root.
    /// The name is validated first; this is the only place names are joined.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, ValidationError> {
        let name = validate_filename(name)?;
        Ok(self.root.join(name))
    }

    /// Names of regular files whose extension is in `extensions`, sorted.
    /// Hidden entries (staging files) are skipped.
    pub async fn list_by_extension(&self, extensions: &[String]) -> io::Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') || !has_extension(&name, extensions) {
                continue;
            }
            names.push(name);
        }

        names.sort();
        Ok(names)
    }
}
