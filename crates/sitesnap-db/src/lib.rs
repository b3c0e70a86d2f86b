//! Repositories for the SiteSnap data access layer
//!
//! Tables live behind the hosted backend's REST interface; each repository wraps a
//! shared [`ApiClient`](sitesnap_api_client::ApiClient) and exposes a trait so the
//! service layer can be tested against in-memory doubles.

pub mod error;
pub mod photo;
pub mod profile;
pub mod site;

pub use error::{DbError, DbResult};
pub use photo::{PhotoRepository, PhotoStore};
pub use profile::{ProfileRepository, ProfileStore};
pub use site::{SiteRepository, SiteStore};
