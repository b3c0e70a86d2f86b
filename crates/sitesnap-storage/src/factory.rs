#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-supabase")]
use crate::SupabaseStorage;
use crate::{ObjectStorage, StorageBackend, StorageError, StorageResult};
use sitesnap_api_client::ApiClient;
use sitesnap_core::SiteSnapConfig;
use std::sync::Arc;

/// Create a storage backend based on configuration
///
/// The hosted backend shares `client` (and therefore its session) with the rest of
/// the process.
#[cfg_attr(not(feature = "storage-supabase"), allow(unused_variables))]
pub async fn create_storage(
    config: &SiteSnapConfig,
    client: &ApiClient,
) -> StorageResult<Arc<dyn ObjectStorage>> {
    match config.storage_backend {
        #[cfg(feature = "storage-supabase")]
        StorageBackend::Supabase => {
            if config.photo_bucket.is_empty() {
                return Err(StorageError::ConfigError(
                    "SITESNAP_PHOTO_BUCKET not configured".to_string(),
                ));
            }
            let storage = SupabaseStorage::new(client.clone(), config.photo_bucket.clone());
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-supabase"))]
        StorageBackend::Supabase => Err(StorageError::ConfigError(
            "Hosted storage backend not available (storage-supabase feature not enabled)"
                .to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config.local_storage_path.clone().ok_or_else(|| {
                StorageError::ConfigError("SITESNAP_LOCAL_STORAGE_PATH not configured".to_string())
            })?;
            let base_url = config.local_storage_base_url.clone().ok_or_else(|| {
                StorageError::ConfigError(
                    "SITESNAP_LOCAL_STORAGE_BASE_URL not configured".to_string(),
                )
            })?;

            let storage = LocalStorage::new(base_path, base_url).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}
