pub mod asset;
pub mod auth;
pub mod photo;
pub mod profile;
pub mod site;

pub use asset::LocalAsset;
pub use auth::{AuthUser, Session, SignUpMetadata, SignUpRequest};
pub use photo::{NewPhotoRecord, PhotoRecord, UploadedPhoto};
pub use profile::{Profile, ProfileUpdate, Role};
pub use site::{NewSite, Site, SiteStatus};
