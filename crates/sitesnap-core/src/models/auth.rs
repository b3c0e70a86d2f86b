use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Account as reported by the hosted auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl AuthUser {
    /// Username from sign-up metadata, else the local part of the email.
    pub fn username_hint(&self) -> Option<String> {
        self.user_metadata
            .get("username")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| {
                self.email
                    .as_deref()
                    .and_then(|e| e.split('@').next())
                    .filter(|local| !local.is_empty())
                    .map(str::to_string)
            })
    }

    pub fn full_name_hint(&self) -> Option<String> {
        ["full_name", "fullName"]
            .iter()
            .find_map(|key| self.user_metadata.get(*key).and_then(|v| v.as_str()))
            .map(str::to_string)
    }
}

/// Signed-in session returned by the auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    pub user: AuthUser,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignUpMetadata {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
    pub metadata: SignUpMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(email: Option<&str>, metadata: serde_json::Value) -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            email: email.map(str::to_string),
            user_metadata: metadata,
        }
    }

    #[test]
    fn username_prefers_metadata_over_email() {
        let u = user(Some("jo@example.com"), json!({ "username": "jo_site" }));
        assert_eq!(u.username_hint().as_deref(), Some("jo_site"));

        let u = user(Some("jo@example.com"), json!({}));
        assert_eq!(u.username_hint().as_deref(), Some("jo"));

        let u = user(None, serde_json::Value::Null);
        assert_eq!(u.username_hint(), None);
    }

    #[test]
    fn full_name_accepts_both_metadata_spellings() {
        let u = user(None, json!({ "fullName": "Jo Park" }));
        assert_eq!(u.full_name_hint().as_deref(), Some("Jo Park"));
    }

    #[test]
    fn sign_up_request_validates_email_and_password() {
        let request = SignUpRequest {
            email: "not-an-email".to_string(),
            password: "123".to_string(),
            metadata: SignUpMetadata::default(),
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }
}
