//! Fixed names and limits used by the hosted backend schema.

/// Object-storage bucket holding site photos.
pub const PHOTO_BUCKET: &str = "site-media";

/// Photos larger than this are rejected before any network call (5 MiB).
pub const MAX_PHOTO_SIZE_BYTES: u64 = 5 * 1024 * 1024;

pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";
pub const DEFAULT_EXTENSION: &str = "jpg";
/// Stored as `original_name` when the capture produced no file name.
pub const DEFAULT_ORIGINAL_NAME: &str = "captured-photo";

pub const PHOTOS_TABLE: &str = "site_photos";
pub const PROFILES_TABLE: &str = "profiles";
pub const SITES_TABLE: &str = "sites";
