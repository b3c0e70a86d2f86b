//! Site photo gallery.

use std::sync::Arc;

use sitesnap_core::models::{PhotoRecord, Role};
use sitesnap_core::AppError;
use sitesnap_db::{PhotoStore, ProfileStore};
use sitesnap_storage::ObjectStorage;
use uuid::Uuid;

use crate::auth::PrincipalResolver;

#[derive(Clone)]
pub struct GalleryService {
    photos: Arc<dyn PhotoStore>,
    profiles: Arc<dyn ProfileStore>,
    storage: Arc<dyn ObjectStorage>,
    principals: Arc<dyn PrincipalResolver>,
}

impl GalleryService {
    pub fn new(
        photos: Arc<dyn PhotoStore>,
        profiles: Arc<dyn ProfileStore>,
        storage: Arc<dyn ObjectStorage>,
        principals: Arc<dyn PrincipalResolver>,
    ) -> Self {
        Self {
            photos,
            profiles,
            storage,
            principals,
        }
    }

    /// Photos of a site, newest first.
    pub async fn list_photos(&self, site_id: Uuid) -> Result<Vec<PhotoRecord>, AppError> {
        Ok(self.photos.list_for_site(site_id).await?)
    }

    /// Delete a photo owned by the caller (admins may delete any photo).
    ///
    /// The stored object is removed first; failing to remove it is logged and the
    /// row is deleted anyway.
    pub async fn delete_photo(&self, photo_id: Uuid) -> Result<(), AppError> {
        let principal = self
            .principals
            .current_principal()
            .await?
            .ok_or_else(|| AppError::Unauthorized("Sign in to delete photos".to_string()))?;

        let photo = self
            .photos
            .get_photo(photo_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("photo {}", photo_id)))?;

        if photo.user_id != principal.user_id {
            let role = self.profiles.get_role(principal.user_id).await?;
            if role != Role::Admin {
                return Err(AppError::Forbidden(
                    "Only the uploader or an admin can delete this photo".to_string(),
                ));
            }
        }

        if let Err(e) = self.storage.delete(&photo.storage_path).await {
            tracing::warn!(
                error = %e,
                photo_id = %photo_id,
                storage_path = %photo.storage_path,
                "Failed to delete photo object, removing record anyway"
            );
        }

        self.photos.delete_photo(photo_id).await?;
        tracing::info!(photo_id = %photo_id, user_id = %principal.user_id, "Photo deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use sitesnap_storage::StorageError;

    struct Fixture {
        photos: Arc<MockPhotoStore>,
        profiles: Arc<MockProfileStore>,
        storage: Arc<MockStorage>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                photos: Arc::new(MockPhotoStore::new()),
                profiles: Arc::new(MockProfileStore::new()),
                storage: Arc::new(MockStorage::new()),
            }
        }

        fn gallery_for(&self, user: Uuid) -> GalleryService {
            GalleryService::new(
                self.photos.clone(),
                self.profiles.clone(),
                self.storage.clone(),
                Arc::new(StaticPrincipal::signed_in(user)),
            )
        }
    }

    #[tokio::test]
    async fn owner_deletes_object_and_row() {
        let f = Fixture::new();
        let owner = Uuid::new_v4();
        let photo = f.photos.seed(Uuid::new_v4(), owner);
        f.storage.seed(&photo.storage_path);

        f.gallery_for(owner).delete_photo(photo.id).await.unwrap();

        assert_eq!(f.photos.len(), 0);
        assert!(!f.storage.contains(&photo.storage_path));
    }

    #[tokio::test]
    async fn other_user_is_forbidden() {
        let f = Fixture::new();
        let photo = f.photos.seed(Uuid::new_v4(), Uuid::new_v4());
        let stranger = Uuid::new_v4();
        f.profiles.insert(stranger, Role::Manager);

        let err = f.gallery_for(stranger).delete_photo(photo.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(f.photos.len(), 1);
    }

    #[tokio::test]
    async fn admin_deletes_even_when_object_removal_fails() {
        let f = Fixture::new();
        let photo = f.photos.seed(Uuid::new_v4(), Uuid::new_v4());
        let admin = Uuid::new_v4();
        f.profiles.insert(admin, Role::Admin);
        f.storage.fail_delete(StorageError::Transport("reset".into()));

        f.gallery_for(admin).delete_photo(photo.id).await.unwrap();
        assert_eq!(f.photos.len(), 0);
    }

    #[tokio::test]
    async fn unknown_photo_is_not_found() {
        let f = Fixture::new();
        let err = f
            .gallery_for(Uuid::new_v4())
            .delete_photo(Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
