use async_trait::async_trait;
use serde::Serialize;
use sitesnap_api_client::{ApiClient, Query};
use sitesnap_core::constants::PROFILES_TABLE;
use sitesnap_core::models::{Profile, ProfileUpdate, Role};
use uuid::Uuid;

use crate::error::{DbError, DbResult};

/// Persistence of account profiles and roles.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, id: Uuid) -> DbResult<Option<Profile>>;

    /// Return the profile for `id`, creating a default `user` profile if none exists.
    async fn ensure_profile(
        &self,
        id: Uuid,
        username: Option<String>,
        full_name: Option<String>,
    ) -> DbResult<Profile>;

    /// Role of `id`; accounts without a profile are plain users.
    async fn get_role(&self, id: Uuid) -> DbResult<Role>;

    /// Set the role of one account. `NotFound` when no row was updated.
    async fn update_role(&self, id: Uuid, role: Role) -> DbResult<Profile>;

    /// Apply a partial update. `NotFound` when no row was updated.
    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> DbResult<Profile>;

    /// All profiles, newest first.
    async fn list_profiles(&self) -> DbResult<Vec<Profile>>;
}

#[derive(Serialize)]
struct DefaultProfileRow {
    id: Uuid,
    username: Option<String>,
    full_name: Option<String>,
    role: Role,
}

#[derive(Serialize)]
struct RolePatch {
    role: Role,
}

/// Repository for the `profiles` table
#[derive(Clone, Debug)]
pub struct ProfileRepository {
    client: ApiClient,
}

impl ProfileRepository {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn updated_row(rows: Vec<Profile>, id: Uuid) -> DbResult<Profile> {
        rows.into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound(format!("profile {}", id)))
    }
}

#[async_trait]
impl ProfileStore for ProfileRepository {
    #[tracing::instrument(skip(self), fields(db.table = PROFILES_TABLE, db.operation = "select", db.record_id = %id))]
    async fn get_profile(&self, id: Uuid) -> DbResult<Option<Profile>> {
        let query = Query::new().select("*").eq("id", id).limit(1);
        let rows: Vec<Profile> = self.client.select(PROFILES_TABLE, &query).await?;
        Ok(rows.into_iter().next())
    }

    #[tracing::instrument(skip(self), fields(db.table = PROFILES_TABLE, db.operation = "upsert", db.record_id = %id))]
    async fn ensure_profile(
        &self,
        id: Uuid,
        username: Option<String>,
        full_name: Option<String>,
    ) -> DbResult<Profile> {
        if let Some(existing) = self.get_profile(id).await? {
            return Ok(existing);
        }

        tracing::info!(user_id = %id, "Creating default profile");
        let row = DefaultProfileRow {
            id,
            username,
            full_name,
            role: Role::User,
        };
        let profile = self.client.upsert(PROFILES_TABLE, &row, "id").await?;
        Ok(profile)
    }

    async fn get_role(&self, id: Uuid) -> DbResult<Role> {
        Ok(self
            .get_profile(id)
            .await?
            .map(|p| p.role)
            .unwrap_or_default())
    }

    #[tracing::instrument(skip(self), fields(db.table = PROFILES_TABLE, db.operation = "update", db.record_id = %id))]
    async fn update_role(&self, id: Uuid, role: Role) -> DbResult<Profile> {
        let query = Query::new().eq("id", id);
        let rows: Vec<Profile> = self
            .client
            .update(PROFILES_TABLE, &query, &RolePatch { role })
            .await?;
        Self::updated_row(rows, id)
    }

    #[tracing::instrument(skip(self, update), fields(db.table = PROFILES_TABLE, db.operation = "update", db.record_id = %id))]
    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> DbResult<Profile> {
        let query = Query::new().eq("id", id);
        let rows: Vec<Profile> = self.client.update(PROFILES_TABLE, &query, update).await?;
        Self::updated_row(rows, id)
    }

    #[tracing::instrument(skip(self), fields(db.table = PROFILES_TABLE, db.operation = "select"))]
    async fn list_profiles(&self) -> DbResult<Vec<Profile>> {
        let query = Query::new().select("*").order("created_at", false);
        let rows = self.client.select(PROFILES_TABLE, &query).await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::time::Duration;

    const ID: &str = "6f1c1f0e-6a0e-4a47-9c55-0a1a4f1d2b3c";

    fn repo(server: &mockito::Server) -> ProfileRepository {
        ProfileRepository::new(
            ApiClient::new(&server.url(), "anon", Duration::from_secs(5)).unwrap(),
        )
    }

    #[tokio::test]
    async fn update_role_with_no_rows_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PATCH", "/rest/v1/profiles")
            .match_query(Matcher::UrlEncoded("id".into(), format!("eq.{}", ID)))
            .match_body(Matcher::Json(serde_json::json!({"role": "manager"})))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let err = repo(&server)
            .update_role(Uuid::parse_str(ID).unwrap(), Role::Manager)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[tokio::test]
    async fn missing_profile_reads_as_user_role() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/profiles")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let role = repo(&server)
            .get_role(Uuid::parse_str(ID).unwrap())
            .await
            .unwrap();
        assert_eq!(role, Role::User);
    }

    #[tokio::test]
    async fn ensure_profile_creates_default_when_absent() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/profiles")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        let upsert = server
            .mock("POST", "/rest/v1/profiles")
            .match_query(Matcher::UrlEncoded("on_conflict".into(), "id".into()))
            .match_body(Matcher::PartialJson(serde_json::json!({"role": "user", "username": "sam"})))
            .with_status(201)
            .with_body(format!(r#"[{{"id":"{}","username":"sam","role":"user"}}]"#, ID))
            .create_async()
            .await;

        let profile = repo(&server)
            .ensure_profile(Uuid::parse_str(ID).unwrap(), Some("sam".into()), None)
            .await
            .unwrap();
        assert_eq!(profile.username.as_deref(), Some("sam"));
        assert_eq!(profile.role, Role::User);
        upsert.assert_async().await;
    }
}
