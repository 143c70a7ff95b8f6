use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;

/// Named JSON documents.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read a document; `None` when it does not exist yet.
    async fn read_json(&self, name: &str) -> Result<Option<Value>>;

    /// Replace a document.
    async fn write_json(&self, name: &str, value: &Value) -> Result<()>;
}

/// Documents stored as files under one directory.
pub struct LocalJsonStore {
    root: PathBuf,
}

impl LocalJsonStore {
    /// Store rooted at `root`; the directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(AppError::InvalidInput(format!(
                "Invalid document name: {}",
                name
            )));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl BlobStore for LocalJsonStore {
    async fn read_json(&self, name: &str) -> Result<Option<Value>> {
        let path = self.path_for(name)?;

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::Persistence(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            AppError::Persistence(format!("Corrupt JSON in {}: {}", path.display(), e))
        })
    }

    async fn write_json(&self, name: &str, value: &Value) -> Result<()> {
        let path = self.path_for(name)?;
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            AppError::Persistence(format!("Failed to create {}: {}", self.root.display(), e))
        })?;

        let body = serde_json::to_vec_pretty(value)
            .map_err(|e| AppError::Internal(format!("Failed to encode {}: {}", name, e)))?;

        // Readers never observe a half-written document.
        let tmp = self.root.join(format!(".{}.tmp", name));
        tokio::fs::write(&tmp, body).await.map_err(|e| {
            AppError::Persistence(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            AppError::Persistence(format!("Failed to replace {}: {}", path.display(), e))
        })?;

        Ok(())
    }
}
