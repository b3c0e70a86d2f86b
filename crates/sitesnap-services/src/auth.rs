//! Sessions and principal resolution.

use std::sync::Arc;

use async_trait::async_trait;
use sitesnap_api_client::ApiClient;
use sitesnap_core::models::{AuthUser, Profile, Session, SignUpRequest};
use sitesnap_core::AppError;
use sitesnap_db::ProfileStore;
use uuid::Uuid;
use validator::Validate;

use sitesnap_api_client::SignUpOutcome;

/// The authenticated identity performing an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: Option<String>,
}

impl From<&AuthUser> for Principal {
    fn from(user: &AuthUser) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
        }
    }
}

/// Resolves who is signed in right now.
#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    /// `None` when nobody is signed in or the session is no longer accepted.
    async fn current_principal(&self) -> Result<Option<Principal>, AppError>;
}

/// Asks the hosted auth service for the user owning the client's session.
#[derive(Clone, Debug)]
pub struct SessionPrincipalResolver {
    client: ApiClient,
}

impl SessionPrincipalResolver {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PrincipalResolver for SessionPrincipalResolver {
    async fn current_principal(&self) -> Result<Option<Principal>, AppError> {
        let user = self.client.get_user().await?;
        Ok(user.as_ref().map(Principal::from))
    }
}

/// Sign-up, sign-in and profile bootstrap.
#[derive(Clone)]
pub struct AuthService {
    client: ApiClient,
    profiles: Arc<dyn ProfileStore>,
}

impl AuthService {
    pub fn new(client: ApiClient, profiles: Arc<dyn ProfileStore>) -> Self {
        Self { client, profiles }
    }

    pub async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, AppError> {
        request.validate()?;
        Ok(self.client.sign_up(request).await?)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AppError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::InvalidInput(
                "Email and password are required".to_string(),
            ));
        }
        Ok(self.client.sign_in_with_password(email.trim(), password).await?)
    }

    /// Adopt an access token issued elsewhere and confirm it with the auth service.
    pub async fn use_access_token(&self, access_token: &str) -> Result<AuthUser, AppError> {
        let placeholder = Session {
            access_token: access_token.to_string(),
            refresh_token: None,
            expires_in: None,
            token_type: Some("bearer".to_string()),
            user: AuthUser {
                id: Uuid::nil(),
                email: None,
                user_metadata: serde_json::Value::Null,
            },
        };
        self.client.set_session(Some(placeholder.clone()));

        match self.client.get_user().await {
            Ok(Some(user)) => {
                self.client.set_session(Some(Session {
                    user: user.clone(),
                    ..placeholder
                }));
                Ok(user)
            }
            Ok(None) => {
                self.client.set_session(None);
                Err(AppError::Unauthorized(
                    "Access token was not accepted".to_string(),
                ))
            }
            Err(e) => {
                self.client.set_session(None);
                Err(e.into())
            }
        }
    }

    pub async fn sign_out(&self) -> Result<(), AppError> {
        Ok(self.client.sign_out().await?)
    }

    pub async fn current_user(&self) -> Result<Option<AuthUser>, AppError> {
        Ok(self.client.get_user().await?)
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), AppError> {
        Ok(self.client.reset_password_for_email(email.trim()).await?)
    }

    pub async fn update_password(&self, new_password: &str) -> Result<AuthUser, AppError> {
        if new_password.len() < 6 {
            return Err(AppError::InvalidInput(
                "Password must be at least 6 characters".to_string(),
            ));
        }
        Ok(self.client.update_password(new_password).await?)
    }

    /// Profile of the signed-in user, created with the `user` role on first use.
    pub async fn current_profile(&self) -> Result<Profile, AppError> {
        let user = self
            .current_user()
            .await?
            .ok_or_else(|| AppError::Unauthorized("Not signed in".to_string()))?;
        self.ensure_profile(&user).await
    }

    pub async fn ensure_profile(&self, user: &AuthUser) -> Result<Profile, AppError> {
        let profile = self
            .profiles
            .ensure_profile(user.id, user.username_hint(), user.full_name_hint())
            .await?;
        Ok(profile)
    }
}
