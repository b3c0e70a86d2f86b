//! Access to the bytes behind a [`LocalAsset`].

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use sitesnap_core::models::LocalAsset;
use tokio::fs;

use crate::error::IngestError;

#[async_trait]
pub trait AssetReader: Send + Sync {
    /// Byte length of the asset, read without loading its content.
    async fn size(&self, asset: &LocalAsset) -> Result<u64, IngestError>;

    async fn read(&self, asset: &LocalAsset) -> Result<Bytes, IngestError>;
}

/// Reads assets addressed by `file://` URIs or plain filesystem paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsAssetReader;

impl FsAssetReader {
    fn path_of(asset: &LocalAsset) -> Result<PathBuf, IngestError> {
        let uri = asset.uri.trim();
        if uri.is_empty() {
            return Err(IngestError::InvalidAsset("asset has no location".to_string()));
        }

        match uri.strip_prefix("file://") {
            Some(rest) => {
                let decoded = urlencoding::decode(rest)
                    .map_err(|e| IngestError::InvalidAsset(format!("bad file URI {}: {}", uri, e)))?;
                Ok(PathBuf::from(decoded.into_owned()))
            }
            None if uri.contains("://") => Err(IngestError::InvalidAsset(format!(
                "unsupported asset location: {}",
                uri
            ))),
            None => Ok(PathBuf::from(uri)),
        }
    }
}

#[async_trait]
impl AssetReader for FsAssetReader {
    async fn size(&self, asset: &LocalAsset) -> Result<u64, IngestError> {
        let path = Self::path_of(asset)?;
        let metadata = fs::metadata(&path).await.map_err(|e| {
            IngestError::InvalidAsset(format!("cannot stat {}: {}", path.display(), e))
        })?;
        if !metadata.is_file() {
            return Err(IngestError::InvalidAsset(format!(
                "{} is not a file",
                path.display()
            )));
        }
        Ok(metadata.len())
    }

    async fn read(&self, asset: &LocalAsset) -> Result<Bytes, IngestError> {
        let path = Self::path_of(asset)?;
        let data = fs::read(&path).await.map_err(|e| {
            IngestError::InvalidAsset(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(Bytes::from(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn reads_file_uri_with_escaped_characters() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site photo.jpg");
        std::fs::write(&path, b"abc").unwrap();

        let uri = format!(
            "file://{}",
            path.to_string_lossy().replace(' ', "%20")
        );
        let asset = LocalAsset::new(uri);

        assert_eq!(FsAssetReader.size(&asset).await.unwrap(), 3);
        assert_eq!(FsAssetReader.read(&asset).await.unwrap(), Bytes::from_static(b"abc"));
    }

    #[tokio::test]
    async fn missing_file_is_invalid_asset() {
        let asset = LocalAsset::new("/definitely/not/here.jpg");
        let err = FsAssetReader.size(&asset).await.unwrap_err();
        assert!(matches!(err, IngestError::InvalidAsset(_)));
    }

    #[tokio::test]
    async fn remote_locations_rejected() {
        let asset = LocalAsset::new("https://example.com/a.jpg");
        let err = FsAssetReader.read(&asset).await.unwrap_err();
        assert!(matches!(err, IngestError::InvalidAsset(_)));
    }
}
