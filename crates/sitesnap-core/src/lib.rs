//! SiteSnap Core Library
//!
//! This crate provides core domain models, error types, configuration and constants
//! that are shared across all SiteSnap components.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::SiteSnapConfig;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use storage_types::StorageBackend;
