//! Upload authorization.
//!
//! Any signed-in user may upload to any site unless a stricter policy is installed.

use std::sync::Arc;

use async_trait::async_trait;
use sitesnap_core::models::Role;
use sitesnap_db::ProfileStore;
use uuid::Uuid;

use crate::auth::Principal;
use crate::error::IngestError;

/// Decides whether `principal` may upload photos to `site_id`.
#[async_trait]
pub trait UploadPolicy: Send + Sync {
    async fn authorize_upload(&self, principal: &Principal, site_id: Uuid)
        -> Result<(), IngestError>;
}

/// Allows every authenticated principal.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthenticatedUploadPolicy;

#[async_trait]
impl UploadPolicy for AuthenticatedUploadPolicy {
    async fn authorize_upload(
        &self,
        _principal: &Principal,
        _site_id: Uuid,
    ) -> Result<(), IngestError> {
        Ok(())
    }
}

/// Requires the principal's profile role to be at least `minimum`.
#[derive(Clone)]
pub struct MinimumRoleUploadPolicy {
    profiles: Arc<dyn ProfileStore>,
    minimum: Role,
}

impl MinimumRoleUploadPolicy {
    pub fn new(profiles: Arc<dyn ProfileStore>, minimum: Role) -> Self {
        Self { profiles, minimum }
    }
}

#[async_trait]
impl UploadPolicy for MinimumRoleUploadPolicy {
    async fn authorize_upload(
        &self,
        principal: &Principal,
        site_id: Uuid,
    ) -> Result<(), IngestError> {
        let role = self.profiles.get_role(principal.user_id).await.map_err(|e| {
            tracing::error!(
                error = %e,
                user_id = %principal.user_id,
                "Role lookup failed, denying upload"
            );
            IngestError::NotPermitted(format!("role lookup failed: {}", e))
        })?;

        if role.satisfies(self.minimum) {
            return Ok(());
        }

        tracing::warn!(
            user_id = %principal.user_id,
            site_id = %site_id,
            role = %role,
            required = %self.minimum,
            "Upload denied by role policy"
        );
        Err(IngestError::NotPermitted(format!(
            "role '{}' is below the required '{}'",
            role, self.minimum
        )))
    }
}

/// Policy selected by configuration.
pub fn policy_from_config(
    minimum: Option<Role>,
    profiles: Arc<dyn ProfileStore>,
) -> Arc<dyn UploadPolicy> {
    match minimum {
        Some(role) => Arc::new(MinimumRoleUploadPolicy::new(profiles, role)),
        None => Arc::new(AuthenticatedUploadPolicy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MockProfileStore;

    fn principal(id: Uuid) -> Principal {
        Principal {
            user_id: id,
            email: None,
        }
    }

    #[tokio::test]
    async fn minimum_role_allows_higher_roles() {
        let profiles = Arc::new(MockProfileStore::new());
        let admin = Uuid::new_v4();
        profiles.insert(admin, Role::Admin);

        let policy = MinimumRoleUploadPolicy::new(profiles, Role::Manager);
        assert!(policy
            .authorize_upload(&principal(admin), Uuid::new_v4())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn minimum_role_denies_plain_users() {
        let profiles = Arc::new(MockProfileStore::new());
        let user = Uuid::new_v4();
        profiles.insert(user, Role::User);

        let policy = MinimumRoleUploadPolicy::new(profiles, Role::Manager);
        let err = policy
            .authorize_upload(&principal(user), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::NotPermitted(_)));
    }

    #[tokio::test]
    async fn unconfigured_policy_allows_any_principal() {
        let policy = policy_from_config(None, Arc::new(MockProfileStore::new()));
        assert!(policy
            .authorize_upload(&principal(Uuid::new_v4()), Uuid::new_v4())
            .await
            .is_ok());
    }
}
