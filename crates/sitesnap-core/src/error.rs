//! Error types module
//!
//! `AppError` is the general error of the directory, gallery and auth glue. The photo
//! ingestion pipeline has its own narrower taxonomy in `sitesnap-services`; both
//! describe themselves through [`ErrorMetadata`] so the CLI can report them uniformly.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Self-description of an error for reporting to the user and to logs.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "ASSET_TOO_LARGE")
    fn error_code(&self) -> &'static str;

    /// Whether repeating the same call later can succeed
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the user
    fn suggested_action(&self) -> Option<&'static str>;

    /// User-facing message (may differ from internal error message)
    fn user_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication required: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

/// Static metadata for each variant: (error_code, recoverable, suggested_action, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (&'static str, bool, Option<&'static str>, LogLevel) {
    match err {
        AppError::Backend(_) => (
            "BACKEND_ERROR",
            true,
            Some("Check connectivity and retry"),
            LogLevel::Error,
        ),
        AppError::Database(_) => (
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
        AppError::Storage(_) => (
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
        AppError::InvalidInput(_) => (
            "INVALID_INPUT",
            false,
            Some("Check the supplied values and try again"),
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            "NOT_FOUND",
            false,
            Some("Verify the identifier exists"),
            LogLevel::Debug,
        ),
        AppError::Unauthorized(_) => ("UNAUTHORIZED", false, Some("Sign in first"), LogLevel::Debug),
        AppError::Forbidden(_) => (
            "FORBIDDEN",
            false,
            Some("Ask an administrator for access"),
            LogLevel::Warn,
        ),
        AppError::Config(_) => (
            "CONFIG_ERROR",
            false,
            Some("Check SITESNAP_* environment variables"),
            LogLevel::Error,
        ),
    }
}

impl ErrorMetadata for AppError {
    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).3
    }

    fn user_message(&self) -> String {
        match self {
            AppError::Backend(_) => "Could not reach the backend".to_string(),
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::InvalidInput(ref msg)
            | AppError::NotFound(ref msg)
            | AppError::Unauthorized(ref msg)
            | AppError::Forbidden(ref msg)
            | AppError::Config(ref msg) => msg.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_database() {
        let err = AppError::Database("connection reset".to_string());
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert!(err.is_recoverable());
        assert_eq!(err.user_message(), "Failed to access database");
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_error_metadata_forbidden() {
        let err = AppError::Forbidden("Only administrators can update user roles".to_string());
        assert_eq!(err.error_code(), "FORBIDDEN");
        assert!(!err.is_recoverable());
        assert_eq!(
            err.user_message(),
            "Only administrators can update user roles"
        );
        assert_eq!(err.log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_validation_errors_become_invalid_input() {
        let err = AppError::from(validator::ValidationErrors::new());
        assert_eq!(err.error_code(), "INVALID_INPUT");
    }
}
