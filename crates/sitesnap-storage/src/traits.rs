//! Storage abstraction trait
//!
//! This module defines the `ObjectStorage` trait that all storage backends implement,
//! and the error type whose [`FailureClass`] drives the upload backoff.

use crate::keys::StorageKey;
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Which side of the wire a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The storage service answered and reported an error
    Storage,
    /// No answer: connection, DNS, timeout or reset
    Transport,
}

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Object already exists: {0}")]
    Conflict(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    pub fn failure_class(&self) -> FailureClass {
        match self {
            StorageError::Transport(_) => FailureClass::Transport,
            _ => FailureClass::Storage,
        }
    }
}

impl From<StorageError> for sitesnap_core::AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConfigError(msg) => sitesnap_core::AppError::Config(msg),
            other => sitesnap_core::AppError::Storage(other.to_string()),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Where a successful write landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Path of the object within its bucket
    pub path: String,
}

/// Object storage abstraction
///
/// The photo pipeline depends on exactly these three capabilities; backends are
/// injected so tests can substitute in-memory doubles.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Write `data` under `key`. Must not overwrite an existing object.
    async fn put(
        &self,
        key: &StorageKey,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<StoredObject>;

    /// Publicly retrievable URL for a key. Constructed, never fails.
    fn public_url(&self, key: &str) -> String;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
