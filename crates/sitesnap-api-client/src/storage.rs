//! Object storage endpoints of the hosted backend.

use bytes::Bytes;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{ApiClient, ApiResult};

/// Location of a freshly written object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedObject {
    /// Key within the bucket
    pub path: String,
    /// `bucket/key` as reported by the backend
    pub full_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub public: bool,
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(rename = "Key")]
    key: Option<String>,
}

/// Percent-encode each segment of an object key, keeping the `/` separators.
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

impl ApiClient {
    /// Write an object. Never overwrites: an existing key is reported as an error.
    pub async fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> ApiResult<UploadedObject> {
        let path = format!("/storage/v1/object/{}/{}", bucket, encode_key(key));
        let request = self
            .request(Method::POST, &path)
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .header("cache-control", "max-age=3600")
            .body(data);

        let response: UploadResponse = self.send_json(request).await?;
        Ok(UploadedObject {
            path: key.to_string(),
            full_path: response.key,
        })
    }

    /// Public URL of an object. Pure construction, no network call.
    pub fn public_url(&self, bucket: &str, key: &str) -> String {
        self.build_url(&format!(
            "/storage/v1/object/public/{}/{}",
            bucket,
            encode_key(key)
        ))
    }

    pub async fn remove_objects(&self, bucket: &str, keys: &[&str]) -> ApiResult<()> {
        let request = self
            .request(Method::DELETE, &format!("/storage/v1/object/{}", bucket))
            .json(&json!({ "prefixes": keys }));
        self.send(request).await?;
        Ok(())
    }

    pub async fn list_buckets(&self) -> ApiResult<Vec<BucketInfo>> {
        self.send_json(self.request(Method::GET, "/storage/v1/bucket"))
            .await
    }
}
