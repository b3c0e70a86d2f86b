//! Configuration module
//!
//! Settings for the backend connection, the photo bucket, the upload retry policy and
//! the storage backend. Values come from `SITESNAP_*` environment variables.

use std::env;
use std::time::Duration;

use crate::constants::{MAX_PHOTO_SIZE_BYTES, PHOTO_BUCKET};
use crate::models::Role;
use crate::storage_types::StorageBackend;

const UPLOAD_MAX_ATTEMPTS: u32 = 3;
const STORAGE_RETRY_DELAY_MS: u64 = 1000;
const TRANSPORT_RETRY_DELAY_MS: u64 = 2000;
const HTTP_TIMEOUT_SECS: u64 = 60;

/// Application configuration shared by the CLI and the service layer.
#[derive(Clone, Debug)]
pub struct SiteSnapConfig {
    pub backend_url: String,
    pub anon_key: String,
    pub photo_bucket: String,
    pub max_photo_size_bytes: u64,
    pub upload_max_attempts: u32,
    pub storage_retry_delay_ms: u64,
    pub transport_retry_delay_ms: u64,
    pub http_timeout_secs: u64,
    pub storage_backend: StorageBackend,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    /// When set, uploads require at least this role instead of plain authentication.
    pub upload_min_role: Option<Role>,
    pub environment: String,
}

impl SiteSnapConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend_url = lookup("SITESNAP_BACKEND_URL")
            .ok_or_else(|| anyhow::anyhow!("SITESNAP_BACKEND_URL must be set"))?;
        let anon_key = lookup("SITESNAP_ANON_KEY")
            .ok_or_else(|| anyhow::anyhow!("SITESNAP_ANON_KEY must be set"))?;

        let storage_backend = match lookup("SITESNAP_STORAGE_BACKEND") {
            Some(value) => value.parse::<StorageBackend>()?,
            None => StorageBackend::Supabase,
        };

        let upload_min_role = lookup("SITESNAP_UPLOAD_MIN_ROLE")
            .filter(|v| !v.trim().is_empty())
            .map(|v| v.parse::<Role>())
            .transpose()?;

        Ok(Self {
            backend_url: backend_url.trim_end_matches('/').to_string(),
            anon_key,
            photo_bucket: lookup("SITESNAP_PHOTO_BUCKET").unwrap_or_else(|| PHOTO_BUCKET.to_string()),
            max_photo_size_bytes: parse_or(&lookup, "SITESNAP_MAX_PHOTO_BYTES", MAX_PHOTO_SIZE_BYTES),
            upload_max_attempts: parse_or(&lookup, "SITESNAP_UPLOAD_MAX_ATTEMPTS", UPLOAD_MAX_ATTEMPTS),
            storage_retry_delay_ms: parse_or(
                &lookup,
                "SITESNAP_STORAGE_RETRY_DELAY_MS",
                STORAGE_RETRY_DELAY_MS,
            ),
            transport_retry_delay_ms: parse_or(
                &lookup,
                "SITESNAP_TRANSPORT_RETRY_DELAY_MS",
                TRANSPORT_RETRY_DELAY_MS,
            ),
            http_timeout_secs: parse_or(&lookup, "SITESNAP_HTTP_TIMEOUT_SECS", HTTP_TIMEOUT_SECS),
            storage_backend,
            local_storage_path: lookup("SITESNAP_LOCAL_STORAGE_PATH"),
            local_storage_base_url: lookup("SITESNAP_LOCAL_STORAGE_BASE_URL"),
            upload_min_role,
            environment: lookup("SITESNAP_ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.backend_url.starts_with("https://") || self.backend_url.starts_with("http://")) {
            return Err(anyhow::anyhow!(
                "SITESNAP_BACKEND_URL must be an http(s) URL"
            ));
        }

        if self.anon_key.trim().is_empty() {
            return Err(anyhow::anyhow!("SITESNAP_ANON_KEY must not be empty"));
        }

        if self.upload_max_attempts == 0 {
            return Err(anyhow::anyhow!(
                "SITESNAP_UPLOAD_MAX_ATTEMPTS must be at least 1"
            ));
        }

        if self.max_photo_size_bytes == 0 {
            return Err(anyhow::anyhow!("SITESNAP_MAX_PHOTO_BYTES must be positive"));
        }

        if self.storage_backend == StorageBackend::Local
            && (self.local_storage_path.is_none() || self.local_storage_base_url.is_none())
        {
            return Err(anyhow::anyhow!(
                "SITESNAP_STORAGE_BACKEND=local requires SITESNAP_LOCAL_STORAGE_PATH and SITESNAP_LOCAL_STORAGE_BASE_URL"
            ));
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn storage_retry_delay(&self) -> Duration {
        Duration::from_millis(self.storage_retry_delay_ms)
    }

    pub fn transport_retry_delay(&self) -> Duration {
        Duration::from_millis(self.transport_retry_delay_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
