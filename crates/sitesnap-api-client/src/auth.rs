//! Auth endpoints: sign-up, sign-in, sign-out, current user and password management.

use reqwest::Method;
use serde_json::json;
use sitesnap_core::models::{AuthUser, Session, SignUpRequest};

use crate::{ApiClient, ApiError, ApiResult};

/// Result of a sign-up. `session` is `None` when the project requires email
/// confirmation before the first sign-in.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: AuthUser,
    pub session: Option<Session>,
}

impl ApiClient {
    /// Register a new account. The profile role defaults to `user` on the backend.
    pub async fn sign_up(&self, request: &SignUpRequest) -> ApiResult<SignUpOutcome> {
        let body = json!({
            "email": request.email,
            "password": request.password,
            "data": {
                "username": request.metadata.username,
                "full_name": request.metadata.full_name,
                "avatar_url": request.metadata.avatar_url,
            }
        });

        let value: serde_json::Value = self
            .send_json(self.request(Method::POST, "/auth/v1/signup").json(&body))
            .await?;

        let outcome = if value.get("access_token").is_some() {
            let session: Session = serde_json::from_value(value)
                .map_err(|e| ApiError::Decode(e.to_string()))?;
            self.set_session(Some(session.clone()));
            SignUpOutcome {
                user: session.user.clone(),
                session: Some(session),
            }
        } else {
            let user_value = value.get("user").cloned().unwrap_or(value);
            let user: AuthUser = serde_json::from_value(user_value)
                .map_err(|e| ApiError::Decode(e.to_string()))?;
            SignUpOutcome {
                user,
                session: None,
            }
        };

        tracing::info!(user_id = %outcome.user.id, confirmed = outcome.session.is_some(), "Signed up");
        Ok(outcome)
    }

    /// Exchange email and password for a session and keep it on the client.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> ApiResult<Session> {
        let request = self
            .request(Method::POST, "/auth/v1/token")
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));

        let session: Session = self.send_json(request).await?;
        self.set_session(Some(session.clone()));

        tracing::info!(user_id = %session.user.id, "Signed in");
        Ok(session)
    }

    /// End the current session. Signing out without a session is a no-op.
    pub async fn sign_out(&self) -> ApiResult<()> {
        if self.access_token().is_none() {
            return Ok(());
        }

        let result = self
            .send(self.request(Method::POST, "/auth/v1/logout"))
            .await;
        // The local session is dropped even if the server call fails.
        self.set_session(None);
        result.map(|_| ())
    }

    /// The user owning the current session, or `None` when signed out or the
    /// session is no longer accepted.
    pub async fn get_user(&self) -> ApiResult<Option<AuthUser>> {
        if self.access_token().is_none() {
            return Ok(None);
        }

        match self
            .send_json::<AuthUser>(self.request(Method::GET, "/auth/v1/user"))
            .await
        {
            Ok(user) => Ok(Some(user)),
            Err(ApiError::Status { status: 401, .. }) | Err(ApiError::Status { status: 403, .. }) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn reset_password_for_email(&self, email: &str) -> ApiResult<()> {
        self.send(
            self.request(Method::POST, "/auth/v1/recover")
                .json(&json!({ "email": email })),
        )
        .await?;
        Ok(())
    }

    /// Change the signed-in user's password.
    pub async fn update_password(&self, new_password: &str) -> ApiResult<AuthUser> {
        if self.access_token().is_none() {
            return Err(ApiError::NoSession);
        }

        self.send_json(
            self.request(Method::PUT, "/auth/v1/user")
                .json(&json!({ "password": new_password })),
        )
        .await
    }
}
