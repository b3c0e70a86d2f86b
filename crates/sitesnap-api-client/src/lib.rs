//! Shared HTTP client for the hosted SiteSnap backend.
//!
//! One `ApiClient` is configured per process and handed to every component that needs
//! the backend. It carries the project key, the current session, and the three
//! capability groups the app consumes: auth (`auth`), REST tables (`rest`) and object
//! storage (`storage`).

pub mod auth;
pub mod rest;
pub mod storage;

use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use sitesnap_core::models::Session;
use sitesnap_core::SiteSnapConfig;

pub use auth::SignUpOutcome;
pub use rest::Query;
pub use storage::{BucketInfo, UploadedObject};

/// Errors returned by the backend client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never produced an HTTP response (DNS, connect, timeout, reset).
    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("API request failed with status {status}: {message}")]
    Status {
        status: u16,
        /// Backend-specific error code (Postgres SQLSTATE, storage status code, ...)
        code: Option<String>,
        message: String,
    },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("No active session")]
    NoSession,

    #[error("Client configuration error: {0}")]
    Config(String),
}

impl ApiError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Status { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<ApiError> for sitesnap_core::AppError {
    fn from(err: ApiError) -> Self {
        use sitesnap_core::AppError;
        match err {
            ApiError::NoSession => AppError::Unauthorized("No active session".to_string()),
            ApiError::Status { status: 401, message, .. } => AppError::Unauthorized(message),
            ApiError::Status { status: 403, message, .. } => AppError::Forbidden(message),
            ApiError::Config(msg) => AppError::Config(msg),
            other => AppError::Backend(other.to_string()),
        }
    }
}

/// HTTP client for the hosted backend with the current session attached.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    anon_key: String,
    session: Arc<RwLock<Option<Session>>>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("has_session", &self.session().is_some())
            .finish()
    }
}

impl ApiClient {
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            session: Arc::new(RwLock::new(None)),
        })
    }

    pub fn from_config(config: &SiteSnapConfig) -> ApiResult<Self> {
        Self::new(&config.backend_url, &config.anon_key, config.http_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Replace the current session (sign-in, token injection, sign-out).
    pub fn set_session(&self, session: Option<Session>) {
        let mut guard = self.session.write().unwrap_or_else(|e| e.into_inner());
        *guard = session;
    }

    pub fn session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.session().map(|s| s.access_token)
    }

    /// Attach the project key and the bearer token (session token, else the project key).
    fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token().unwrap_or_else(|| self.anon_key.clone());
        request
            .header("apikey", self.anon_key.as_str())
            .header("Authorization", format!("Bearer {}", bearer))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.apply_auth(self.client.request(method, self.build_url(path)))
    }

    /// Send a request, mapping transport failures and non-success statuses.
    async fn send(&self, request: RequestBuilder) -> ApiResult<Response> {
        let response = request.send().await.map_err(ApiError::Transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(parse_error_body(status.as_u16(), &body))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = self.send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Build a `Status` error from the backend's JSON error body when it has one.
///
/// Auth, REST and storage endpoints each use their own field names for the message
/// and the code.
fn parse_error_body(status: u16, body: &str) -> ApiError {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();

    let field = |names: &[&str]| -> Option<String> {
        let value = parsed.as_ref()?;
        names.iter().find_map(|name| match value.get(*name)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    };

    let message = field(&["message", "msg", "error_description", "error"]).unwrap_or_else(|| {
        if body.is_empty() {
            "Unknown error".to_string()
        } else {
            body.to_string()
        }
    });
    let code = field(&["code", "error_code", "statusCode"]);

    ApiError::Status {
        status,
        code,
        message,
    }
}
