//! Wiring shared by the `sitesnap` binary: tracing, the service graph built from
//! configuration, and sign-in from environment credentials.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use sitesnap_api_client::ApiClient;
use sitesnap_core::models::{AuthUser, LocalAsset};
use sitesnap_core::SiteSnapConfig;
use sitesnap_db::{PhotoRepository, ProfileRepository, SiteRepository};
use sitesnap_services::{
    policy_from_config, AuthService, BatchUploader, FsAssetReader, GalleryService,
    PhotoIngestService, RetryPolicy, SessionPrincipalResolver, SiteDirectory, UserDirectory,
};

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Every service the CLI drives, sharing one backend client.
pub struct App {
    pub config: SiteSnapConfig,
    pub client: ApiClient,
    pub auth: AuthService,
    pub uploader: BatchUploader,
    pub gallery: GalleryService,
    pub sites: SiteDirectory,
    pub users: UserDirectory,
}

impl App {
    pub async fn build(config: SiteSnapConfig) -> anyhow::Result<Self> {
        config.validate()?;

        let client = ApiClient::from_config(&config).context("Failed to create API client")?;
        let storage = sitesnap_storage::create_storage(&config, &client)
            .await
            .context("Failed to initialize photo storage")?;

        let photos = Arc::new(PhotoRepository::new(client.clone()));
        let profiles = Arc::new(ProfileRepository::new(client.clone()));
        let site_store = Arc::new(SiteRepository::new(client.clone()));
        let principals = Arc::new(SessionPrincipalResolver::new(client.clone()));

        let ingest = PhotoIngestService::new(
            storage.clone(),
            photos.clone(),
            principals.clone(),
            Arc::new(FsAssetReader),
        )
        .with_policy(policy_from_config(config.upload_min_role, profiles.clone()))
        .with_retry_policy(RetryPolicy::from_config(&config))
        .with_max_size_bytes(config.max_photo_size_bytes);

        Ok(Self {
            auth: AuthService::new(client.clone(), profiles.clone()),
            uploader: BatchUploader::new(ingest),
            gallery: GalleryService::new(photos, profiles.clone(), storage, principals.clone()),
            sites: SiteDirectory::new(site_store),
            users: UserDirectory::new(profiles, principals),
            client,
            config,
        })
    }

    /// Sign in with `SITESNAP_ACCESS_TOKEN`, or `SITESNAP_EMAIL` and `SITESNAP_PASSWORD`.
    pub async fn sign_in_from_env(&self) -> anyhow::Result<AuthUser> {
        if let Ok(token) = std::env::var("SITESNAP_ACCESS_TOKEN") {
            if !token.trim().is_empty() {
                return Ok(self.auth.use_access_token(token.trim()).await?);
            }
        }

        let email = std::env::var("SITESNAP_EMAIL")
            .context("Set SITESNAP_ACCESS_TOKEN, or SITESNAP_EMAIL and SITESNAP_PASSWORD")?;
        let password =
            std::env::var("SITESNAP_PASSWORD").context("SITESNAP_PASSWORD must be set")?;
        let session = self.auth.sign_in(&email, &password).await?;
        Ok(session.user)
    }
}

/// Content type inferred from a file extension; `None` leaves the default in place.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// Describe a file on disk as an asset to upload.
pub fn asset_from_path(path: &Path) -> LocalAsset {
    let mut asset = LocalAsset::new(path.to_string_lossy());
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        asset = asset.with_file_name(name);
    }
    if let Some(mime) = mime_for_extension(&asset.extension()) {
        asset = asset.with_mime_type(mime);
    }
    asset
}
