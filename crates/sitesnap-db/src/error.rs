use sitesnap_api_client::ApiError;
use sitesnap_core::AppError;
use thiserror::Error;

/// Errors surfaced by the repositories.
#[derive(Debug, Error)]
pub enum DbError {
    /// A table constraint rejected the write (Postgres class 23, or HTTP 409).
    #[error("Constraint violation ({code}): {message}")]
    Constraint { code: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Failed to decode row: {0}")]
    Decode(String),
}

pub type DbResult<T> = Result<T, DbError>;

impl From<ApiError> for DbError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Transport(e) => DbError::Transport(e.to_string()),
            ApiError::Status {
                status,
                code,
                message,
            } => match code {
                Some(code) if code.starts_with("23") => DbError::Constraint { code, message },
                code if status == 409 => DbError::Constraint {
                    code: code.unwrap_or_else(|| "409".to_string()),
                    message,
                },
                _ if status == 401 => DbError::Unauthenticated,
                _ => DbError::Rejected { status, message },
            },
            ApiError::NoSession => DbError::Unauthenticated,
            ApiError::Decode(msg) => DbError::Decode(msg),
            ApiError::Config(msg) => DbError::Rejected {
                status: 0,
                message: msg,
            },
        }
    }
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => AppError::NotFound(what),
            DbError::Unauthenticated => AppError::Unauthorized("Not authenticated".to_string()),
            DbError::Rejected { status: 403, message } => AppError::Forbidden(message),
            DbError::Transport(msg) => AppError::Backend(msg),
            other => AppError::Database(other.to_string()),
        }
    }
}
