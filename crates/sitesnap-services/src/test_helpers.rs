//! In-memory doubles for the service layer's collaborators.
//!
//! No network or database is needed; failures are scripted per call.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use sitesnap_core::models::{
    LocalAsset, NewPhotoRecord, NewSite, PhotoRecord, Profile, ProfileUpdate, Role, Site,
};
use sitesnap_core::AppError;
use sitesnap_db::{DbError, DbResult, PhotoStore, ProfileStore, SiteStore};
use sitesnap_storage::{
    ObjectStorage, StorageBackend, StorageError, StorageKey, StorageResult, StoredObject,
};
use uuid::Uuid;

use crate::assets::AssetReader;
use crate::auth::{Principal, PrincipalResolver};
use crate::error::IngestError;
use crate::policy::UploadPolicy;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Object storage kept in a map. Refuses to overwrite, like the real backends.
#[derive(Default)]
pub struct MockStorage {
    objects: Mutex<HashMap<String, Bytes>>,
    put_failures: Mutex<VecDeque<StorageError>>,
    delete_failures: Mutex<VecDeque<StorageError>>,
    put_keys: Mutex<Vec<String>>,
    delete_keys: Mutex<Vec<String>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next unscripted `put` fail with `err`. Calls queue up.
    pub fn fail_next(&self, err: StorageError) {
        lock(&self.put_failures).push_back(err);
    }

    pub fn fail_delete(&self, err: StorageError) {
        lock(&self.delete_failures).push_back(err);
    }

    pub fn seed(&self, key: &str) {
        lock(&self.objects).insert(key.to_string(), Bytes::new());
    }

    pub fn contains(&self, key: &str) -> bool {
        lock(&self.objects).contains_key(key)
    }

    pub fn object_count(&self) -> usize {
        lock(&self.objects).len()
    }

    pub fn put_count(&self) -> usize {
        lock(&self.put_keys).len()
    }

    /// Keys of every `put` call, including failed ones.
    pub fn put_keys(&self) -> Vec<String> {
        lock(&self.put_keys).clone()
    }

    pub fn delete_keys(&self) -> Vec<String> {
        lock(&self.delete_keys).clone()
    }
}

#[async_trait]
impl ObjectStorage for MockStorage {
    async fn put(
        &self,
        key: &StorageKey,
        data: Bytes,
        _content_type: &str,
    ) -> StorageResult<StoredObject> {
        lock(&self.put_keys).push(key.to_string());
        if let Some(err) = lock(&self.put_failures).pop_front() {
            return Err(err);
        }

        let mut objects = lock(&self.objects);
        if objects.contains_key(key.as_str()) {
            return Err(StorageError::Conflict(key.to_string()));
        }
        objects.insert(key.to_string(), data);
        Ok(StoredObject {
            path: key.to_string(),
        })
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://storage.test/object/public/site-media/{}", key)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        lock(&self.delete_keys).push(key.to_string());
        if let Some(err) = lock(&self.delete_failures).pop_front() {
            return Err(err);
        }
        lock(&self.objects).remove(key);
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

/// `site_photos` in memory.
#[derive(Default)]
pub struct MockPhotoStore {
    rows: Mutex<Vec<PhotoRecord>>,
    insert_failures: Mutex<VecDeque<DbError>>,
    insert_calls: Mutex<usize>,
}

impl MockPhotoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, err: DbError) {
        lock(&self.insert_failures).push_back(err);
    }

    pub fn len(&self) -> usize {
        lock(&self.rows).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert_count(&self) -> usize {
        *lock(&self.insert_calls)
    }

    pub fn records(&self) -> Vec<PhotoRecord> {
        lock(&self.rows).clone()
    }

    /// Store a row directly, bypassing the insert path.
    pub fn seed(&self, site_id: Uuid, user_id: Uuid) -> PhotoRecord {
        let key = StorageKey::generate(site_id, user_id, "jpg").into_string();
        let record = PhotoRecord {
            id: Uuid::new_v4(),
            site_id,
            user_id,
            file_name: key.clone(),
            original_name: "captured-photo".to_string(),
            file_size: 1,
            mime_type: "image/jpeg".to_string(),
            storage_path: key.clone(),
            public_url: format!("https://storage.test/object/public/site-media/{}", key),
            width: None,
            height: None,
            created_at: Utc::now(),
        };
        lock(&self.rows).push(record.clone());
        record
    }
}

#[async_trait]
impl PhotoStore for MockPhotoStore {
    async fn insert_photo(&self, photo: &NewPhotoRecord) -> DbResult<PhotoRecord> {
        *lock(&self.insert_calls) += 1;
        if let Some(err) = lock(&self.insert_failures).pop_front() {
            return Err(err);
        }

        let record = PhotoRecord {
            id: Uuid::new_v4(),
            site_id: photo.site_id,
            user_id: photo.user_id,
            file_name: photo.file_name.clone(),
            original_name: photo.original_name.clone(),
            file_size: photo.file_size,
            mime_type: photo.mime_type.clone(),
            storage_path: photo.storage_path.clone(),
            public_url: photo.public_url.clone(),
            width: photo.width,
            height: photo.height,
            created_at: Utc::now(),
        };
        lock(&self.rows).push(record.clone());
        Ok(record)
    }

    async fn list_for_site(&self, site_id: Uuid) -> DbResult<Vec<PhotoRecord>> {
        let mut rows: Vec<PhotoRecord> = lock(&self.rows)
            .iter()
            .filter(|r| r.site_id == site_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn get_photo(&self, id: Uuid) -> DbResult<Option<PhotoRecord>> {
        Ok(lock(&self.rows).iter().find(|r| r.id == id).cloned())
    }

    async fn delete_photo(&self, id: Uuid) -> DbResult<()> {
        lock(&self.rows).retain(|r| r.id != id);
        Ok(())
    }
}

/// `profiles` in memory.
#[derive(Default)]
pub struct MockProfileStore {
    profiles: Mutex<HashMap<Uuid, Profile>>,
    role_lookups: Mutex<usize>,
}

impl MockProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: Uuid, role: Role) {
        lock(&self.profiles).insert(
            id,
            Profile {
                id,
                username: None,
                full_name: None,
                avatar_url: None,
                role,
                created_at: Some(Utc::now()),
                updated_at: None,
            },
        );
    }

    pub fn role_of(&self, id: Uuid) -> Option<Role> {
        lock(&self.profiles).get(&id).map(|p| p.role)
    }

    pub fn role_lookup_count(&self) -> usize {
        *lock(&self.role_lookups)
    }
}

#[async_trait]
impl ProfileStore for MockProfileStore {
    async fn get_profile(&self, id: Uuid) -> DbResult<Option<Profile>> {
        Ok(lock(&self.profiles).get(&id).cloned())
    }

    async fn ensure_profile(
        &self,
        id: Uuid,
        username: Option<String>,
        full_name: Option<String>,
    ) -> DbResult<Profile> {
        let mut profiles = lock(&self.profiles);
        let profile = profiles.entry(id).or_insert_with(|| Profile {
            id,
            username,
            full_name,
            avatar_url: None,
            role: Role::User,
            created_at: Some(Utc::now()),
            updated_at: None,
        });
        Ok(profile.clone())
    }

    async fn get_role(&self, id: Uuid) -> DbResult<Role> {
        *lock(&self.role_lookups) += 1;
        Ok(self.role_of(id).unwrap_or_default())
    }

    async fn update_role(&self, id: Uuid, role: Role) -> DbResult<Profile> {
        let mut profiles = lock(&self.profiles);
        let profile = profiles
            .get_mut(&id)
            .ok_or_else(|| DbError::NotFound(format!("profile {}", id)))?;
        profile.role = role;
        Ok(profile.clone())
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> DbResult<Profile> {
        let mut profiles = lock(&self.profiles);
        let profile = profiles
            .get_mut(&id)
            .ok_or_else(|| DbError::NotFound(format!("profile {}", id)))?;
        if let Some(username) = &update.username {
            profile.username = Some(username.clone());
        }
        if let Some(full_name) = &update.full_name {
            profile.full_name = Some(full_name.clone());
        }
        if let Some(avatar_url) = &update.avatar_url {
            profile.avatar_url = Some(avatar_url.clone());
        }
        if let Some(role) = update.role {
            profile.role = role;
        }
        Ok(profile.clone())
    }

    async fn list_profiles(&self) -> DbResult<Vec<Profile>> {
        let mut all: Vec<Profile> = lock(&self.profiles).values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}

/// `sites` in memory.
#[derive(Default)]
pub struct MockSiteStore {
    sites: Mutex<Vec<Site>>,
}

impl MockSiteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SiteStore for MockSiteStore {
    async fn list_sites(&self) -> DbResult<Vec<Site>> {
        let mut sites = lock(&self.sites).clone();
        sites.reverse();
        Ok(sites)
    }

    async fn add_site(&self, site: &NewSite) -> DbResult<Site> {
        let created = Site {
            id: Uuid::new_v4(),
            name: site.name.clone(),
            address: site.address.clone(),
            status: site.status,
            project_code: site.project_code.clone(),
            created_at: Some(Utc::now()),
        };
        lock(&self.sites).push(created.clone());
        Ok(created)
    }

    async fn get_site(&self, id: Uuid) -> DbResult<Option<Site>> {
        Ok(lock(&self.sites).iter().find(|s| s.id == id).cloned())
    }
}

/// Fixed answer to "who is signed in".
pub struct StaticPrincipal(Option<Principal>);

impl StaticPrincipal {
    pub fn signed_in(user_id: Uuid) -> Self {
        Self(Some(Principal {
            user_id,
            email: None,
        }))
    }

    pub fn signed_out() -> Self {
        Self(None)
    }
}

#[async_trait]
impl PrincipalResolver for StaticPrincipal {
    async fn current_principal(&self) -> Result<Option<Principal>, AppError> {
        Ok(self.0.clone())
    }
}

pub struct DenyAllPolicy;

#[async_trait]
impl UploadPolicy for DenyAllPolicy {
    async fn authorize_upload(
        &self,
        _principal: &Principal,
        site_id: Uuid,
    ) -> Result<(), IngestError> {
        Err(IngestError::NotPermitted(format!("site {} is closed", site_id)))
    }
}

/// Asset bytes keyed by URI.
#[derive(Default)]
pub struct InMemoryAssets {
    files: Mutex<HashMap<String, Bytes>>,
    reads: Mutex<usize>,
}

impl InMemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `data` under `uri` and return a bare asset pointing at it.
    pub fn add(&self, uri: &str, data: Vec<u8>) -> LocalAsset {
        lock(&self.files).insert(uri.to_string(), Bytes::from(data));
        LocalAsset::new(uri)
    }

    pub fn read_count(&self) -> usize {
        *lock(&self.reads)
    }
}

#[async_trait]
impl AssetReader for InMemoryAssets {
    async fn size(&self, asset: &LocalAsset) -> Result<u64, IngestError> {
        lock(&self.files)
            .get(&asset.uri)
            .map(|b| b.len() as u64)
            .ok_or_else(|| IngestError::InvalidAsset(format!("no such asset: {}", asset.uri)))
    }

    async fn read(&self, asset: &LocalAsset) -> Result<Bytes, IngestError> {
        *lock(&self.reads) += 1;
        lock(&self.files)
            .get(&asset.uri)
            .cloned()
            .ok_or_else(|| IngestError::InvalidAsset(format!("no such asset: {}", asset.uri)))
    }
}
