use async_trait::async_trait;
use sitesnap_api_client::{ApiClient, Query};
use sitesnap_core::constants::PHOTOS_TABLE;
use sitesnap_core::models::{NewPhotoRecord, PhotoRecord};
use uuid::Uuid;

use crate::error::DbResult;

/// Persistence of photo metadata rows.
#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Insert one row. Fails on constraint violations (unknown site, policy denial).
    async fn insert_photo(&self, photo: &NewPhotoRecord) -> DbResult<PhotoRecord>;

    /// Photos of one site, newest first.
    async fn list_for_site(&self, site_id: Uuid) -> DbResult<Vec<PhotoRecord>>;

    async fn get_photo(&self, id: Uuid) -> DbResult<Option<PhotoRecord>>;

    async fn delete_photo(&self, id: Uuid) -> DbResult<()>;
}

/// Repository for the `site_photos` table
#[derive(Clone, Debug)]
pub struct PhotoRepository {
    client: ApiClient,
}

impl PhotoRepository {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PhotoStore for PhotoRepository {
    #[tracing::instrument(skip(self, photo), fields(db.table = PHOTOS_TABLE, db.operation = "insert", site_id = %photo.site_id))]
    async fn insert_photo(&self, photo: &NewPhotoRecord) -> DbResult<PhotoRecord> {
        let row = self.client.insert(PHOTOS_TABLE, photo).await?;
        Ok(row)
    }

    #[tracing::instrument(skip(self), fields(db.table = PHOTOS_TABLE, db.operation = "select"))]
    async fn list_for_site(&self, site_id: Uuid) -> DbResult<Vec<PhotoRecord>> {
        let query = Query::new()
            .select("*")
            .eq("site_id", site_id)
            .order("created_at", false);
        let rows = self.client.select(PHOTOS_TABLE, &query).await?;
        Ok(rows)
    }

    #[tracing::instrument(skip(self), fields(db.table = PHOTOS_TABLE, db.operation = "select", db.record_id = %id))]
    async fn get_photo(&self, id: Uuid) -> DbResult<Option<PhotoRecord>> {
        let query = Query::new().select("*").eq("id", id).limit(1);
        let rows: Vec<PhotoRecord> = self.client.select(PHOTOS_TABLE, &query).await?;
        Ok(rows.into_iter().next())
    }

    #[tracing::instrument(skip(self), fields(db.table = PHOTOS_TABLE, db.operation = "delete", db.record_id = %id))]
    async fn delete_photo(&self, id: Uuid) -> DbResult<()> {
        let query = Query::new().eq("id", id);
        self.client.delete_rows(PHOTOS_TABLE, &query).await?;
        Ok(())
    }
}
