//! Upload with linear backoff.
//!
//! The wait before attempt `n + 1` is `n` times a base delay chosen by the failure
//! class of attempt `n`: one base for errors the storage service reported, a longer
//! one for transport failures.

use std::time::Duration;

use bytes::Bytes;
use sitesnap_core::SiteSnapConfig;
use sitesnap_storage::{FailureClass, ObjectStorage, StorageKey, StoredObject};

use crate::error::IngestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub storage_delay: Duration,
    pub transport_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            storage_delay: Duration::from_secs(1),
            transport_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &SiteSnapConfig) -> Self {
        Self {
            max_attempts: config.upload_max_attempts.max(1),
            storage_delay: config.storage_retry_delay(),
            transport_delay: config.transport_retry_delay(),
        }
    }

    /// Wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32, class: FailureClass) -> Duration {
        let base = match class {
            FailureClass::Storage => self.storage_delay,
            FailureClass::Transport => self.transport_delay,
        };
        base * attempt
    }
}

/// Write `data` under `key`, retrying per `policy`.
///
/// The key is fixed across attempts. Exhaustion returns the last storage error.
pub async fn upload_with_retry(
    storage: &dyn ObjectStorage,
    key: &StorageKey,
    data: Bytes,
    content_type: &str,
    policy: &RetryPolicy,
) -> Result<StoredObject, IngestError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        tracing::debug!(key = %key, attempt, max_attempts, "Upload attempt");

        match storage.put(key, data.clone(), content_type).await {
            Ok(stored) => {
                if attempt > 1 {
                    tracing::info!(key = %key, attempt, "Upload succeeded after retry");
                }
                return Ok(stored);
            }
            Err(e) if attempt >= max_attempts => {
                tracing::error!(
                    error = %e,
                    key = %key,
                    attempts = attempt,
                    "Upload failed after all retry attempts"
                );
                return Err(IngestError::UploadExhausted {
                    attempts: attempt,
                    source: e,
                });
            }
            Err(e) => {
                let class = e.failure_class();
                let delay = policy.delay_after(attempt, class);
                tracing::warn!(
                    error = %e,
                    key = %key,
                    attempt,
                    max_attempts,
                    failure_class = ?class,
                    delay_ms = delay.as_millis() as u64,
                    "Upload attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
