use super::{merge_record, ObjectStore, Record, RecordStore};
use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::identity::Identity;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Write next to the target, then rename, so readers never see a torn file
async fn write_staged(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let staging = PathBuf::from(format!("{}.partial", path.display()));
    fs::write(&staging, bytes)
        .await
        .map_err(|e| io_error(&staging, e))?;
    fs::rename(&staging, path)
        .await
        .map_err(|e| io_error(path, e))
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Object store backed by a directory tree, served under a public base URL
pub struct FsObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsObjectStore {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(root: P, public_base_url: S) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.objects_path, config.public_base_url.clone())
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() || key.split('/').any(|part| part.is_empty() || part == "..") {
            return Err(StorageError::Unavailable {
                details: format!("refusing to store under key '{}'", key),
            });
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(
        &self,
        key: &str,
        data: Arc<Vec<u8>>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let path = self.object_path(key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }

        write_staged(&path, data.as_slice()).await?;

        info!(
            "Stored object {} ({} bytes, {})",
            key,
            data.len(),
            content_type
        );
        Ok(())
    }

    async fn public_url(&self, key: &str) -> Result<String, StorageError> {
        let path = self.object_path(key)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(format!("{}/{}", self.public_base_url, key)),
            Ok(_) => Err(StorageError::NotFound {
                key: key.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                key: key.to_string(),
            }),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

/// Record store keeping one JSON document per key
pub struct FsRecordStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FsRecordStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.records_path)
    }

    fn record_path(&self, collection: &str, key: &Identity) -> PathBuf {
        self.root
            .join(collection)
            .join(format!("{}.json", key.as_str()))
    }

    async fn read_record(&self, path: &Path) -> Result<Option<Record>, StorageError> {
        match fs::read_to_string(path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(path, e)),
        }
    }
}

#[async_trait]
impl RecordStore for FsRecordStore {
    async fn upsert(
        &self,
        collection: &str,
        key: &Identity,
        partial: Record,
    ) -> Result<(), StorageError> {
        let path = self.record_path(collection, key);
        let _guard = self.write_lock.lock().await;

        let mut record = self.read_record(&path).await?.unwrap_or_default();
        merge_record(&mut record, partial);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }

        let json = serde_json::to_string_pretty(&record)?;
        write_staged(&path, json.as_bytes()).await?;

        debug!("Upserted {}/{} at {}", collection, key, path.display());
        Ok(())
    }

    async fn fetch(
        &self,
        collection: &str,
        key: &Identity,
    ) -> Result<Option<Record>, StorageError> {
        self.read_record(&self.record_path(collection, key)).await
    }
}
