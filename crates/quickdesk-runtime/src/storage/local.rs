use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use quickdesk_core::config::StorageConfig;
use quickdesk_core::error::{DeskError, Result};
use quickdesk_core::storage::{is_safe_key, ObjectStore};

/// Attachment bucket kept in a directory on the local filesystem.
///
/// Objects live at `{root}/{bucket}/{key}` and are served back by the
/// gateway under `{public_base_url}/{key}`.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    dir: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    pub fn new(dir: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(
            Path::new(&config.root).join(&config.bucket),
            config.public_base_url.clone(),
        )
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        if !is_safe_key(key) {
            return Err(DeskError::InvalidArgument(format!(
                "Invalid object key '{}'",
                key
            )));
        }
        Ok(self.dir.join(key))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| DeskError::Storage(format!("Failed to write {}: {}", path, e)))?;

        tracing::debug!(path, content_type, size = bytes.len(), "Stored object");
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let target = self.resolve(path)?;
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DeskError::Storage(format!("Failed to read {}: {}", path, e))),
        }
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DeskError::Storage(format!(
                "Failed to remove {}: {}",
                path, e
            ))),
        }
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base_url, path)
    }
}
