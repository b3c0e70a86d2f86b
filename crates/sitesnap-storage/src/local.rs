use crate::keys::{validate_key, StorageKey};
use crate::traits::{ObjectStorage, StorageError, StorageResult, StoredObject};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage implementation
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for photo files (e.g., "/var/lib/sitesnap/media")
    /// * `base_url` - Base URL the directory is served from (e.g., "http://localhost:8080/media")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    /// Convert storage key to filesystem path, refusing anything that could leave `base_path`.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        validate_key(storage_key)?;

        let path = self.base_path.join(storage_key);
        if path.strip_prefix(&self.base_path).is_err() {
            return Err(StorageError::InvalidKey(
                "Storage key resolves outside storage directory".to_string(),
            ));
        }

        Ok(path)
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

async fn write_fully(file: &mut fs::File, data: &[u8]) -> std::io::Result<()> {
    file.write_all(data).await?;
    // tokio surfaces deferred write errors on flush, not on sync_all
    file.flush().await?;
    file.sync_all().await
}

/// Write `data` into the freshly created `file` at `path`.
///
/// A failed write removes the partial file so a retry under the same key can
/// create it again.
async fn write_new_object(path: &Path, mut file: fs::File, data: &[u8]) -> StorageResult<()> {
    let written = write_fully(&mut file, data).await;
    drop(file);

    let Err(e) = written else {
        return Ok(());
    };

    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(rm) if rm.kind() == ErrorKind::NotFound => {}
        Err(rm) => {
            tracing::warn!(
                path = %path.display(),
                error = %rm,
                "Failed to remove partially written file"
            );
        }
    }

    Err(StorageError::BackendError(format!(
        "Failed to write file {}: {}",
        path.display(),
        e
    )))
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn put(
        &self,
        key: &StorageKey,
        data: Bytes,
        _content_type: &str,
    ) -> StorageResult<StoredObject> {
        let path = self.key_to_path(key.as_str())?;
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        // create_new: an existing object is never overwritten
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => StorageError::Conflict(key.to_string()),
                _ => StorageError::BackendError(format!(
                    "Failed to create file {}: {}",
                    path.display(),
                    e
                )),
            })?;

        write_new_object(&path, file, &data).await?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(StoredObject {
            path: key.to_string(),
        })
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(key = %key, "Local storage delete successful");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(key = %key, "Local storage delete: object already absent");
                Ok(())
            }
            Err(e) => Err(StorageError::IoError(e)),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use uuid::Uuid;

    async fn storage(dir: &TempDir) -> LocalStorage {
        LocalStorage::new(dir.path(), "http://localhost:8080/media/".to_string())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn put_writes_bytes_under_key() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;
        let key = StorageKey::generate(Uuid::new_v4(), Uuid::new_v4(), "jpg");

        let stored = storage
            .put(&key, Bytes::from_static(b"jpeg-bytes"), "image/jpeg")
            .await
            .unwrap();

        assert_eq!(stored.path, key.as_str());
        let on_disk = std::fs::read(dir.path().join(key.as_str())).unwrap();
        assert_eq!(on_disk, b"jpeg-bytes");
    }

    #[tokio::test]
    async fn second_put_to_same_key_conflicts() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;
        let key = StorageKey::parse("site/2024/01/user/1-abc.jpg").unwrap();

        storage
            .put(&key, Bytes::from_static(b"one"), "image/jpeg")
            .await
            .unwrap();
        let err = storage
            .put(&key, Bytes::from_static(b"two"), "image/jpeg")
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Conflict(_)));
        let on_disk = std::fs::read(dir.path().join(key.as_str())).unwrap();
        assert_eq!(on_disk, b"one");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn failed_write_leaves_no_file_behind() {
        // Writes to /dev/full fail with ENOSPC.
        let full = match fs::OpenOptions::new().write(true).open("/dev/full").await {
            Ok(file) => file,
            Err(_) => return,
        };
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;
        let key = StorageKey::parse("site/2024/03/user/3-ghi.jpg").unwrap();
        let path = storage.key_to_path(key.as_str()).unwrap();
        storage.ensure_parent_dir(&path).await.unwrap();
        std::fs::write(&path, b"partial").unwrap();

        let err = write_new_object(&path, full, &[0u8; 4096])
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::BackendError(_)));
        assert!(!path.exists());

        // The same key can be written again.
        storage
            .put(&key, Bytes::from_static(b"retry"), "image/jpeg")
            .await
            .unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"retry");
    }

    #[tokio::test]
    async fn delete_missing_object_is_ok() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;
        storage.delete("site/2024/01/user/none.jpg").await.unwrap();
    }

    #[tokio::test]
    async fn delete_removes_object() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;
        let key = StorageKey::parse("s/2024/02/u/2-def.png").unwrap();
        storage
            .put(&key, Bytes::from_static(b"x"), "image/png")
            .await
            .unwrap();

        storage.delete(key.as_str()).await.unwrap();
        assert!(!dir.path().join(key.as_str()).exists());
    }

    #[tokio::test]
    async fn public_url_joins_base_and_key() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;
        assert_eq!(
            storage.public_url("a/b.jpg"),
            "http://localhost:8080/media/a/b.jpg"
        );
    }

    #[tokio::test]
    async fn traversal_key_rejected_on_delete() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;
        let err = storage.delete("../outside.jpg").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }
}
