use crate::keys::StorageKey;
use crate::traits::{ObjectStorage, StorageError, StorageResult, StoredObject};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use sitesnap_api_client::{ApiClient, ApiError};

/// Bucket on the hosted backend.
#[derive(Clone, Debug)]
pub struct SupabaseStorage {
    client: ApiClient,
    bucket: String,
}

impl SupabaseStorage {
    pub fn new(client: ApiClient, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// Split client failures into transport and storage-reported classes.
fn map_api_error(err: ApiError, key: &str) -> StorageError {
    match err {
        ApiError::Transport(e) => StorageError::Transport(e.to_string()),
        ApiError::Status {
            status, code, message,
        } => {
            if status == 409 || code.as_deref() == Some("409") {
                StorageError::Conflict(key.to_string())
            } else {
                StorageError::Rejected { status, message }
            }
        }
        other => StorageError::BackendError(other.to_string()),
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn put(
        &self,
        key: &StorageKey,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<StoredObject> {
        let size = data.len();
        let start = std::time::Instant::now();

        let uploaded = self
            .client
            .upload_object(&self.bucket, key.as_str(), data, content_type)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Bucket upload failed"
                );
                map_api_error(e, key.as_str())
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Bucket upload successful"
        );

        Ok(StoredObject {
            path: uploaded.path,
        })
    }

    fn public_url(&self, key: &str) -> String {
        self.client.public_url(&self.bucket, key)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        crate::keys::validate_key(key)?;
        self.client
            .remove_objects(&self.bucket, &[key])
            .await
            .map_err(|e| map_api_error(e, key))?;

        tracing::info!(bucket = %self.bucket, key = %key, "Bucket delete successful");
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Supabase
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;

    fn storage(server: &mockito::Server) -> SupabaseStorage {
        let client = ApiClient::new(&server.url(), "anon", Duration::from_secs(5)).unwrap();
        SupabaseStorage::new(client, "site-media")
    }

    #[tokio::test]
    async fn duplicate_key_maps_to_conflict() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", mockito::Matcher::Any)
            .with_status(400)
            .with_body(r#"{"statusCode":"409","error":"Duplicate","message":"The resource already exists"}"#)
            .create_async()
            .await;

        let key = StorageKey::generate(Uuid::new_v4(), Uuid::new_v4(), "jpg");
        let err = storage(&server)
            .put(&key, Bytes::from_static(b"x"), "image/jpeg")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn server_error_is_storage_class() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", mockito::Matcher::Any)
            .with_status(503)
            .with_body(r#"{"message":"unavailable"}"#)
            .create_async()
            .await;

        let key = StorageKey::generate(Uuid::new_v4(), Uuid::new_v4(), "jpg");
        let err = storage(&server)
            .put(&key, Bytes::from_static(b"x"), "image/jpeg")
            .await
            .unwrap_err();
        assert_eq!(err.failure_class(), crate::FailureClass::Storage);
        assert!(matches!(err, StorageError::Rejected { status: 503, .. }));
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_class() {
        // Nothing listens on port 9 (discard) on the loopback interface in test sandboxes.
        let client = ApiClient::new("http://127.0.0.1:9", "anon", Duration::from_secs(2)).unwrap();
        let storage = SupabaseStorage::new(client, "site-media");
        let key = StorageKey::generate(Uuid::new_v4(), Uuid::new_v4(), "jpg");

        let err = storage
            .put(&key, Bytes::from_static(b"x"), "image/jpeg")
            .await
            .unwrap_err();
        assert_eq!(err.failure_class(), crate::FailureClass::Transport);
    }
}
