use async_trait::async_trait;
use dispatch_core::{CoreResult, KeyValueStorage};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::StorageError;

/// One JSON document per namespace under a directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write leaves the previous state intact.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, namespace: &str) -> Result<PathBuf, StorageError> {
        let valid = !namespace.is_empty()
            && namespace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            && !namespace.starts_with('.');
        if !valid {
            return Err(StorageError::InvalidNamespace(namespace.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", namespace)))
    }
}

#[async_trait]
impl KeyValueStorage for FileStorage {
    async fn load(&self, namespace: &str) -> CoreResult<Option<String>> {
        let path = self.path_for(namespace)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::from(e).into()),
        }
    }

    async fn save(&self, namespace: &str, value: &str) -> CoreResult<()> {
        let path = self.path_for(namespace)?;
        let tmp = path.with_extension("json.tmp");

        tokio::fs::write(&tmp, value).await.map_err(StorageError::from)?;
        tokio::fs::rename(&tmp, &path).await.map_err(StorageError::from)?;
        debug!(path = %path.display(), bytes = value.len(), "Saved offer state");
        Ok(())
    }

    async fn clear(&self, namespace: &str) -> CoreResult<()> {
        let path = self.path_for(namespace)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::from(e).into()),
        }
    }
}
