use sitesnap_core::{ErrorMetadata, LogLevel};
use sitesnap_db::DbError;
use sitesnap_storage::StorageError;

/// Failure of one photo ingestion.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Authentication required to upload photos")]
    AuthRequired,

    #[error("Upload not permitted: {0}")]
    NotPermitted(String),

    #[error("Invalid asset: {0}")]
    InvalidAsset(String),

    #[error("File too large: {size} bytes (max: {limit})")]
    AssetTooLarge { size: u64, limit: u64 },

    #[error("Upload failed after {attempts} attempts: {source}")]
    UploadExhausted {
        attempts: u32,
        #[source]
        source: StorageError,
    },

    #[error("Failed to save photo metadata: {0}")]
    Persistence(#[source] DbError),
}

impl ErrorMetadata for IngestError {
    fn error_code(&self) -> &'static str {
        match self {
            IngestError::AuthRequired => "AUTH_REQUIRED",
            IngestError::NotPermitted(_) => "NOT_PERMITTED",
            IngestError::InvalidAsset(_) => "INVALID_ASSET",
            IngestError::AssetTooLarge { .. } => "ASSET_TOO_LARGE",
            IngestError::UploadExhausted { .. } => "UPLOAD_EXHAUSTED",
            IngestError::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(
            self,
            IngestError::UploadExhausted { .. } | IngestError::Persistence(_)
        )
    }

    fn suggested_action(&self) -> Option<&'static str> {
        match self {
            IngestError::AuthRequired => Some("Sign in and try again"),
            IngestError::NotPermitted(_) => Some("Ask an administrator for upload access"),
            IngestError::InvalidAsset(_) => Some("Check that the photo file exists and is readable"),
            IngestError::AssetTooLarge { .. } => Some("Choose a photo smaller than 5 MB"),
            IngestError::UploadExhausted { .. } => Some("Check your connection and upload again"),
            IngestError::Persistence(_) => Some("Check that the site still exists and retry"),
        }
    }

    fn user_message(&self) -> String {
        match self {
            IngestError::AssetTooLarge { size, limit } => format!(
                "The photo is {:.1} MB; the limit is {:.1} MB",
                *size as f64 / (1024.0 * 1024.0),
                *limit as f64 / (1024.0 * 1024.0)
            ),
            IngestError::UploadExhausted { .. } => {
                "The photo could not be uploaded. Please try again.".to_string()
            }
            IngestError::Persistence(_) => {
                "The photo was not saved. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            IngestError::AuthRequired
            | IngestError::InvalidAsset(_)
            | IngestError::AssetTooLarge { .. } => LogLevel::Debug,
            IngestError::NotPermitted(_) => LogLevel::Warn,
            IngestError::UploadExhausted { .. } | IngestError::Persistence(_) => LogLevel::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_large_reports_both_sizes() {
        let err = IngestError::AssetTooLarge {
            size: 6 * 1024 * 1024,
            limit: 5 * 1024 * 1024,
        };
        assert_eq!(err.error_code(), "ASSET_TOO_LARGE");
        assert!(!err.is_recoverable());
        assert_eq!(err.to_string(), "File too large: 6291456 bytes (max: 5242880)");
        assert_eq!(err.user_message(), "The photo is 6.0 MB; the limit is 5.0 MB");
    }

    #[test]
    fn exhausted_upload_keeps_last_error_as_source() {
        use std::error::Error;

        let err = IngestError::UploadExhausted {
            attempts: 3,
            source: StorageError::Transport("connection reset".to_string()),
        };
        assert!(err.is_recoverable());
        assert_eq!(err.log_level(), LogLevel::Error);
        assert!(err
            .source()
            .map(|s| s.to_string().contains("connection reset"))
            .unwrap_or(false));
    }
}
