//! Photo ingestion pipeline
//!
//! validate → derive key → upload with retry → resolve URL → persist metadata,
//! deleting the uploaded object again when the metadata insert fails.

use std::sync::Arc;

use sitesnap_core::constants::MAX_PHOTO_SIZE_BYTES;
use sitesnap_core::models::{LocalAsset, NewPhotoRecord, UploadedPhoto};
use sitesnap_db::PhotoStore;
use sitesnap_storage::{ObjectStorage, StorageKey};
use uuid::Uuid;

use crate::assets::AssetReader;
use crate::auth::{Principal, PrincipalResolver};
use crate::error::IngestError;
use crate::policy::{AuthenticatedUploadPolicy, UploadPolicy};
use crate::retry::{upload_with_retry, RetryPolicy};

/// Uploads one photo and records its metadata.
///
/// Holds no per-call state; concurrent calls touch only resources scoped to their
/// own storage key.
#[derive(Clone)]
pub struct PhotoIngestService {
    storage: Arc<dyn ObjectStorage>,
    photos: Arc<dyn PhotoStore>,
    principals: Arc<dyn PrincipalResolver>,
    assets: Arc<dyn AssetReader>,
    policy: Arc<dyn UploadPolicy>,
    retry: RetryPolicy,
    max_size_bytes: u64,
}

impl PhotoIngestService {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        photos: Arc<dyn PhotoStore>,
        principals: Arc<dyn PrincipalResolver>,
        assets: Arc<dyn AssetReader>,
    ) -> Self {
        Self {
            storage,
            photos,
            principals,
            assets,
            policy: Arc::new(AuthenticatedUploadPolicy),
            retry: RetryPolicy::default(),
            max_size_bytes: MAX_PHOTO_SIZE_BYTES,
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn UploadPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_size_bytes(mut self, max_size_bytes: u64) -> Self {
        self.max_size_bytes = max_size_bytes;
        self
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Ingest `asset` for `site_id` on behalf of `acting_user_id`.
    ///
    /// Not idempotent: calling twice with the same bytes stores two objects under
    /// two keys and inserts two rows.
    pub async fn ingest_photo(
        &self,
        asset: &LocalAsset,
        site_id: Uuid,
        acting_user_id: Uuid,
    ) -> Result<UploadedPhoto, IngestError> {
        let principal = self.resolve_principal(acting_user_id).await?;

        if site_id.is_nil() {
            return Err(IngestError::InvalidAsset("site id is empty".to_string()));
        }

        let size = self.assets.size(asset).await?;
        self.check_size(size)?;

        let data = self.assets.read(asset).await?;
        // The file may have grown between stat and read.
        self.check_size(data.len() as u64)?;
        let file_size = data.len();

        // Policies may query the relational store, so they run only for in-limit assets.
        self.policy.authorize_upload(&principal, site_id).await?;

        let key = StorageKey::generate(site_id, acting_user_id, &asset.extension());
        let content_type = asset.content_type();

        tracing::info!(
            key = %key,
            site_id = %site_id,
            user_id = %acting_user_id,
            original_name = %asset.original_name(),
            file_size,
            "Processing photo upload"
        );

        let stored =
            upload_with_retry(self.storage.as_ref(), &key, data, content_type, &self.retry).await?;
        let public_url = self.storage.public_url(key.as_str());

        let record = NewPhotoRecord {
            site_id,
            user_id: acting_user_id,
            file_name: key.to_string(),
            original_name: asset.original_name().to_string(),
            file_size: file_size as i64,
            mime_type: content_type.to_string(),
            storage_path: stored.path,
            public_url: public_url.clone(),
            width: asset.width.and_then(|w| i32::try_from(w).ok()),
            height: asset.height.and_then(|h| i32::try_from(h).ok()),
        };

        match self.photos.insert_photo(&record).await {
            Ok(photo) => {
                tracing::info!(
                    photo_id = %photo.id,
                    key = %key,
                    public_url = %public_url,
                    "Photo uploaded"
                );
                Ok(UploadedPhoto {
                    photo,
                    url: public_url,
                })
            }
            Err(insert_err) => {
                tracing::error!(
                    error = %insert_err,
                    key = %key,
                    site_id = %site_id,
                    "Failed to save photo metadata, removing uploaded object"
                );
                if let Err(cleanup_err) = self.storage.delete(key.as_str()).await {
                    tracing::warn!(
                        error = %cleanup_err,
                        key = %key,
                        "Failed to clean up uploaded object after metadata error"
                    );
                }
                Err(IngestError::Persistence(insert_err))
            }
        }
    }

    async fn resolve_principal(&self, acting_user_id: Uuid) -> Result<Principal, IngestError> {
        let principal = match self.principals.current_principal().await {
            Ok(Some(principal)) => principal,
            Ok(None) => return Err(IngestError::AuthRequired),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "Could not resolve the current principal, treating the session as signed out"
                );
                return Err(IngestError::AuthRequired);
            }
        };

        if principal.user_id != acting_user_id {
            tracing::warn!(
                principal = %principal.user_id,
                acting_user_id = %acting_user_id,
                "Acting user does not match the signed-in principal"
            );
            return Err(IngestError::AuthRequired);
        }

        Ok(principal)
    }

    fn check_size(&self, size: u64) -> Result<(), IngestError> {
        if size > self.max_size_bytes {
            return Err(IngestError::AssetTooLarge {
                size,
                limit: self.max_size_bytes,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::MinimumRoleUploadPolicy;
    use crate::test_helpers::*;
    use sitesnap_core::models::Role;
    use sitesnap_db::DbError;
    use sitesnap_storage::StorageError;

    struct Fixture {
        storage: Arc<MockStorage>,
        photos: Arc<MockPhotoStore>,
        assets: Arc<InMemoryAssets>,
        user: Uuid,
        service: PhotoIngestService,
    }

    fn fixture() -> Fixture {
        let storage = Arc::new(MockStorage::new());
        let photos = Arc::new(MockPhotoStore::new());
        let assets = Arc::new(InMemoryAssets::new());
        let user = Uuid::new_v4();
        let service = PhotoIngestService::new(
            storage.clone(),
            photos.clone(),
            Arc::new(StaticPrincipal::signed_in(user)),
            assets.clone(),
        );
        Fixture {
            storage,
            photos,
            assets,
            user,
            service,
        }
    }

    #[tokio::test]
    async fn successful_ingest_records_metadata() {
        let f = fixture();
        let asset = f
            .assets
            .add("file:///a.PNG", vec![7u8; 1024])
            .with_file_name("a.PNG")
            .with_mime_type("image/png")
            .with_dimensions(640, 480);
        let site = Uuid::new_v4();

        let uploaded = f.service.ingest_photo(&asset, site, f.user).await.unwrap();

        let photo = &uploaded.photo;
        assert_eq!(photo.site_id, site);
        assert_eq!(photo.user_id, f.user);
        assert_eq!(photo.original_name, "a.PNG");
        assert_eq!(photo.file_size, 1024);
        assert_eq!(photo.mime_type, "image/png");
        assert_eq!(photo.width, Some(640));
        assert!(photo.file_name.ends_with(".png"));
        assert!(photo.file_name.starts_with(&format!("{}/", site)));
        assert_eq!(photo.storage_path, photo.file_name);
        assert_eq!(uploaded.url, f.storage.public_url(&photo.file_name));
        assert!(f.storage.contains(&photo.file_name));
        assert_eq!(f.photos.len(), 1);
    }

    #[tokio::test]
    async fn missing_principal_is_auth_required() {
        let f = fixture();
        let service = PhotoIngestService::new(
            f.storage.clone(),
            f.photos.clone(),
            Arc::new(StaticPrincipal::signed_out()),
            f.assets.clone(),
        );
        let asset = f.assets.add("a.jpg", vec![1]);

        let err = service
            .ingest_photo(&asset, Uuid::new_v4(), f.user)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::AuthRequired));
        assert_eq!(f.storage.put_count(), 0);
    }

    #[tokio::test]
    async fn acting_user_must_be_the_principal() {
        let f = fixture();
        let asset = f.assets.add("a.jpg", vec![1]);

        let err = f
            .service
            .ingest_photo(&asset, Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::AuthRequired));
    }

    #[tokio::test]
    async fn denied_policy_stops_before_storage() {
        let f = fixture();
        let service = f.service.clone().with_policy(Arc::new(DenyAllPolicy));
        let asset = f.assets.add("a.jpg", vec![1]);

        let err = service
            .ingest_photo(&asset, Uuid::new_v4(), f.user)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::NotPermitted(_)));
        assert_eq!(f.storage.put_count(), 0);
    }

    #[tokio::test]
    async fn oversized_asset_skips_role_lookup() {
        let f = fixture();
        let profiles = Arc::new(MockProfileStore::new());
        profiles.insert(f.user, Role::Admin);
        let service = f
            .service
            .clone()
            .with_max_size_bytes(16)
            .with_policy(Arc::new(MinimumRoleUploadPolicy::new(
                profiles.clone(),
                Role::Manager,
            )));
        let asset = f.assets.add("big.jpg", vec![0; 17]);

        let err = service
            .ingest_photo(&asset, Uuid::new_v4(), f.user)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IngestError::AssetTooLarge { size: 17, limit: 16 }
        ));
        assert_eq!(profiles.role_lookup_count(), 0);
        assert_eq!(f.storage.put_count(), 0);
        assert_eq!(f.photos.insert_count(), 0);
    }

    #[tokio::test]
    async fn role_policy_checked_for_in_limit_asset() {
        let f = fixture();
        let profiles = Arc::new(MockProfileStore::new());
        profiles.insert(f.user, Role::User);
        let service = f
            .service
            .clone()
            .with_policy(Arc::new(MinimumRoleUploadPolicy::new(
                profiles.clone(),
                Role::Manager,
            )));
        let asset = f.assets.add("a.jpg", vec![1]);

        let err = service
            .ingest_photo(&asset, Uuid::new_v4(), f.user)
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::NotPermitted(_)));
        assert_eq!(profiles.role_lookup_count(), 1);
        assert_eq!(f.storage.put_count(), 0);
    }

    #[tokio::test]
    async fn nil_site_rejected() {
        let f = fixture();
        let asset = f.assets.add("a.jpg", vec![1]);
        let err = f
            .service
            .ingest_photo(&asset, Uuid::nil(), f.user)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::InvalidAsset(_)));
    }

    #[tokio::test]
    async fn exactly_at_limit_is_accepted() {
        let f = fixture();
        let service = f.service.clone().with_max_size_bytes(16);
        let asset = f.assets.add("a.jpg", vec![0; 16]);
        assert!(service
            .ingest_photo(&asset, Uuid::new_v4(), f.user)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn insert_failure_deletes_object_and_surfaces_persistence_error() {
        let f = fixture();
        f.photos.fail_next(DbError::Constraint {
            code: "23503".into(),
            message: "site does not exist".into(),
        });
        f.storage.fail_delete(StorageError::Transport("reset".into()));
        let asset = f.assets.add("a.jpg", vec![1, 2, 3]);

        let err = f
            .service
            .ingest_photo(&asset, Uuid::new_v4(), f.user)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IngestError::Persistence(DbError::Constraint { .. })
        ));
        assert_eq!(f.storage.put_keys(), f.storage.delete_keys());
        assert_eq!(f.storage.delete_keys().len(), 1);
    }
}
