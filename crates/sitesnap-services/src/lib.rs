//! SiteSnap Services Layer
//!
//! This crate is the business service layer: the photo ingestion pipeline with its
//! retry/backoff upload and compensating cleanup, the sequential batch coordinator,
//! principal resolution and the upload policy, and the site, user and gallery
//! directories. Every backend collaborator is injected as a trait object so the
//! services can be driven against in-memory doubles.

pub mod assets;
pub mod auth;
pub mod batch;
pub mod connection;
pub mod error;
pub mod ingest;
pub mod photos;
pub mod policy;
pub mod retry;
pub mod sites;
pub mod users;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use assets::{AssetReader, FsAssetReader};
pub use auth::{AuthService, Principal, PrincipalResolver, SessionPrincipalResolver};
pub use batch::{BatchResult, BatchUploader, UploadFailure};
pub use connection::{check_connection, ConnectionReport};
pub use error::IngestError;
pub use ingest::PhotoIngestService;
pub use photos::GalleryService;
pub use policy::{
    policy_from_config, AuthenticatedUploadPolicy, MinimumRoleUploadPolicy, UploadPolicy,
};
pub use retry::{upload_with_retry, RetryPolicy};
pub use sites::{search_sites, SiteDirectory};
pub use users::{BulkOutcome, Selection, UserDirectory, UserQuery, UserSort};
