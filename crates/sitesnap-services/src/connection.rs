use serde::Serialize;
use sitesnap_api_client::ApiClient;
use sitesnap_core::AppError;
use uuid::Uuid;

/// What the backend reports for the configured project.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionReport {
    pub backend_url: String,
    pub buckets: Vec<String>,
    pub photo_bucket_present: bool,
    pub user_id: Option<Uuid>,
}

/// List storage buckets and resolve the session user.
pub async fn check_connection(
    client: &ApiClient,
    photo_bucket: &str,
) -> Result<ConnectionReport, AppError> {
    let buckets: Vec<String> = client
        .list_buckets()
        .await?
        .into_iter()
        .map(|b| b.name)
        .collect();
    let user = client.get_user().await?;

    let report = ConnectionReport {
        backend_url: client.base_url().to_string(),
        photo_bucket_present: buckets.iter().any(|b| b == photo_bucket),
        buckets,
        user_id: user.map(|u| u.id),
    };

    tracing::info!(
        buckets = report.buckets.len(),
        photo_bucket_present = report.photo_bucket_present,
        signed_in = report.user_id.is_some(),
        "Connection check complete"
    );
    Ok(report)
}
