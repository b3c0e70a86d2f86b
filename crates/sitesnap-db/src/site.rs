use async_trait::async_trait;
use sitesnap_api_client::{ApiClient, Query};
use sitesnap_core::constants::SITES_TABLE;
use sitesnap_core::models::{NewSite, Site};
use uuid::Uuid;

use crate::error::DbResult;

#[async_trait]
pub trait SiteStore: Send + Sync {
    /// All sites, newest first.
    async fn list_sites(&self) -> DbResult<Vec<Site>>;

    async fn add_site(&self, site: &NewSite) -> DbResult<Site>;

    async fn get_site(&self, id: Uuid) -> DbResult<Option<Site>>;
}

/// Repository for the `sites` table
#[derive(Clone, Debug)]
pub struct SiteRepository {
    client: ApiClient,
}

impl SiteRepository {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SiteStore for SiteRepository {
    #[tracing::instrument(skip(self), fields(db.table = SITES_TABLE, db.operation = "select"))]
    async fn list_sites(&self) -> DbResult<Vec<Site>> {
        let query = Query::new().select("*").order("created_at", false);
        let rows = self.client.select(SITES_TABLE, &query).await?;
        Ok(rows)
    }

    #[tracing::instrument(skip(self, site), fields(db.table = SITES_TABLE, db.operation = "insert"))]
    async fn add_site(&self, site: &NewSite) -> DbResult<Site> {
        let row = self.client.insert(SITES_TABLE, site).await?;
        Ok(row)
    }

    #[tracing::instrument(skip(self), fields(db.table = SITES_TABLE, db.operation = "select", db.record_id = %id))]
    async fn get_site(&self, id: Uuid) -> DbResult<Option<Site>> {
        let query = Query::new().select("*").eq("id", id).limit(1);
        let rows: Vec<Site> = self.client.select(SITES_TABLE, &query).await?;
        Ok(rows.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitesnap_core::models::SiteStatus;
    use std::time::Duration;

    #[tokio::test]
    async fn add_site_posts_row_and_parses_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/sites")
            .match_body(mockito::Matcher::PartialJson(
                serde_json::json!({"name": "Harbor Tower", "status": "on_hold"}),
            ))
            .with_status(201)
            .with_body(
                r#"[{"id":"44444444-4444-4444-8444-444444444444","name":"Harbor Tower","status":"on_hold"}]"#,
            )
            .create_async()
            .await;

        let repo = SiteRepository::new(
            ApiClient::new(&server.url(), "anon", Duration::from_secs(5)).unwrap(),
        );
        let mut new_site = NewSite::new("Harbor Tower");
        new_site.status = SiteStatus::OnHold;

        let site = repo.add_site(&new_site).await.unwrap();
        assert_eq!(site.status, SiteStatus::OnHold);
        assert!(site.address.is_none());
        mock.assert_async().await;
    }
}
