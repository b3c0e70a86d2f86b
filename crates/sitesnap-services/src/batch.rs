//! Sequential batch upload.

use serde::Serialize;
use sitesnap_core::models::{LocalAsset, UploadedPhoto};
use sitesnap_core::ErrorMetadata;
use uuid::Uuid;

use crate::error::IngestError;
use crate::ingest::PhotoIngestService;

/// One asset that could not be ingested.
#[derive(Debug, Serialize)]
pub struct UploadFailure {
    pub asset: LocalAsset,
    #[serde(serialize_with = "serialize_reason")]
    pub error: IngestError,
}

impl UploadFailure {
    pub fn reason(&self) -> String {
        self.error.to_string()
    }
}

fn serialize_reason<S: serde::Serializer>(err: &IngestError, s: S) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeStruct;

    let mut state = s.serialize_struct("IngestError", 2)?;
    state.serialize_field("code", err.error_code())?;
    state.serialize_field("message", &err.to_string())?;
    state.end()
}

/// Outcome of a batch, in processing order.
///
/// `successes.len() + failures.len() == total` always holds.
#[derive(Debug, Default, Serialize)]
pub struct BatchResult {
    pub successes: Vec<UploadedPhoto>,
    pub failures: Vec<UploadFailure>,
    pub total: usize,
}

impl BatchResult {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Drives [`PhotoIngestService`] over a list of assets, one at a time.
#[derive(Clone)]
pub struct BatchUploader {
    ingest: PhotoIngestService,
}

impl BatchUploader {
    pub fn new(ingest: PhotoIngestService) -> Self {
        Self { ingest }
    }

    /// Upload `assets` in order. A failing asset is recorded and the batch continues.
    ///
    /// `on_progress` is called once per asset, after it finished, with
    /// `(completed, total)`.
    pub async fn upload_batch(
        &self,
        assets: Vec<LocalAsset>,
        site_id: Uuid,
        acting_user_id: Uuid,
        mut on_progress: Option<&mut (dyn FnMut(usize, usize) + Send)>,
    ) -> BatchResult {
        let total = assets.len();
        let mut result = BatchResult {
            successes: Vec::with_capacity(total),
            failures: Vec::new(),
            total,
        };

        for (index, asset) in assets.into_iter().enumerate() {
            match self
                .ingest
                .ingest_photo(&asset, site_id, acting_user_id)
                .await
            {
                Ok(uploaded) => result.successes.push(uploaded),
                Err(error) => {
                    tracing::warn!(
                        error = %error,
                        error_code = error.error_code(),
                        uri = %asset.uri,
                        index,
                        "Photo in batch failed"
                    );
                    result.failures.push(UploadFailure { asset, error });
                }
            }

            if let Some(callback) = on_progress.as_mut() {
                callback(index + 1, total);
            }
        }

        tracing::info!(
            site_id = %site_id,
            total,
            succeeded = result.successes.len(),
            failed = result.failures.len(),
            "Batch upload finished"
        );

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn empty_batch_reports_nothing() {
        let user = Uuid::new_v4();
        let ingest = PhotoIngestService::new(
            Arc::new(MockStorage::new()),
            Arc::new(MockPhotoStore::new()),
            Arc::new(StaticPrincipal::signed_in(user)),
            Arc::new(InMemoryAssets::new()),
        );
        let mut calls = 0;
        let mut progress = |_: usize, _: usize| calls += 1;

        let result = BatchUploader::new(ingest)
            .upload_batch(Vec::new(), Uuid::new_v4(), user, Some(&mut progress))
            .await;

        assert_eq!(result.total, 0);
        assert!(result.all_succeeded());
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn failure_serializes_code_and_message() {
        let failure = UploadFailure {
            asset: LocalAsset::new("a.jpg"),
            error: IngestError::AuthRequired,
        };
        let value = serde_json::to_value(&failure).unwrap();
        assert_eq!(value["error"]["code"], "AUTH_REQUIRED");
        assert_eq!(value["asset"]["uri"], "a.jpg");
    }
}
