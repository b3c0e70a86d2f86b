//! SiteSnap Storage Library
//!
//! This crate provides the object-storage abstraction used by the photo pipeline,
//! the storage key derivation, and backends for the hosted bucket and the local
//! filesystem.
//!
//! # Storage key format
//!
//! `{site_id}/{yyyy}/{mm}/{user_id}/{unix_millis}-{token}.{ext}`
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in the
//! `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-supabase")]
pub mod supabase;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::StorageKey;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use sitesnap_core::StorageBackend;
#[cfg(feature = "storage-supabase")]
pub use supabase::SupabaseStorage;
pub use traits::{FailureClass, ObjectStorage, StorageError, StorageResult, StoredObject};
