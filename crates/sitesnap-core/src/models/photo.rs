use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted metadata row for one uploaded photo (`site_photos`).
///
/// Exists only when both the storage write and the row insert succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub id: Uuid,
    pub site_id: Uuid,
    pub user_id: Uuid,
    /// The storage key the bytes were written under
    pub file_name: String,
    pub original_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub storage_path: String,
    pub public_url: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for `site_photos`; `id` and `created_at` are assigned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPhotoRecord {
    pub site_id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    pub original_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub storage_path: String,
    pub public_url: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

/// Successful ingestion result: the stored row and its public URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedPhoto {
    pub photo: PhotoRecord,
    pub url: String,
}
