//! Session and engine configuration

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// S3 `DeleteObjects` accepts at most this many keys per request.
pub const MAX_DELETE_BATCH_SIZE: usize = 1000;

/// Connection settings for one bucket session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub bucket: String,
    /// Custom endpoint for S3-compatible services (R2, MinIO, ...).
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
}

impl BucketConfig {
    pub fn validate(&self) -> Result<()> {
        if self.access_key_id.trim().is_empty() {
            return Err(Error::InvalidConfig("Access Key ID is required.".to_string()));
        }
        if self.secret_access_key.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "Secret Access Key is required.".to_string(),
            ));
        }
        // S3-compatible endpoints use their own region names ("auto" on R2).
        if self.custom_endpoint().is_none() && !is_valid_aws_region(self.region.trim()) {
            return Err(Error::InvalidConfig(format!(
                "Region format looks invalid (e.g., eu-central-1): '{}'",
                self.region
            )));
        }
        if !is_valid_bucket_name(self.bucket.trim()) {
            return Err(Error::InvalidConfig(format!(
                "Bucket format looks invalid: '{}'",
                self.bucket
            )));
        }
        Ok(())
    }

    pub(crate) fn custom_endpoint(&self) -> Option<&str> {
        self.endpoint_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// `[a-z0-9.-]{3,63}`
pub fn is_valid_bucket_name(bucket: &str) -> bool {
    (3..=63).contains(&bucket.len())
        && bucket
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
}

/// `^[a-z]{2}-[a-z]+-\d$`
pub fn is_valid_aws_region(region: &str) -> bool {
    let parts: Vec<&str> = region.split('-').collect();
    match parts.as_slice() {
        [area, location, number] => {
            area.len() == 2
                && area.chars().all(|c| c.is_ascii_lowercase())
                && !location.is_empty()
                && location.chars().all(|c| c.is_ascii_lowercase())
                && number.len() == 1
                && number.chars().all(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}

/// Tunables for listing, the bulk engines and uploads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub list_page_size: i32,
    pub delete_batch_size: usize,
    /// Width of the worker pool for move, preflight and archive fetches.
    pub worker_concurrency: usize,
    pub preview_text_max_bytes: usize,
    pub multipart_threshold_bytes: u64,
    pub multipart_part_size_bytes: u64,
    pub multipart_concurrency: usize,
    /// Initial backoff of the SDK retry strategy.
    pub retry_base_ms: u64,
    /// Total attempts per backend call, first try included.
    pub retry_max_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            list_page_size: 1000,
            delete_batch_size: MAX_DELETE_BATCH_SIZE,
            worker_concurrency: worker_pool::DEFAULT_CONCURRENCY,
            preview_text_max_bytes: 256 * 1024,
            multipart_threshold_bytes: 10 * 1024 * 1024,
            multipart_part_size_bytes: 8 * 1024 * 1024,
            multipart_concurrency: 4,
            retry_base_ms: 500,
            retry_max_attempts: 5,
        }
    }
}

/// S3 rejects multipart parts below 5 MiB (except the last one).
const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        Ok(config.normalized())
    }

    /// Clamp every value into the range the backend accepts.
    pub fn normalized(mut self) -> Self {
        self.list_page_size = self.list_page_size.clamp(1, 1000);
        self.delete_batch_size = self.delete_batch_size.clamp(1, MAX_DELETE_BATCH_SIZE);
        self.worker_concurrency = self.worker_concurrency.max(1);
        self.multipart_concurrency = self.multipart_concurrency.max(1);
        self.multipart_part_size_bytes = self.multipart_part_size_bytes.max(MIN_PART_SIZE);
        self.multipart_threshold_bytes = self
            .multipart_threshold_bytes
            .max(self.multipart_part_size_bytes);
        self.retry_max_attempts = self.retry_max_attempts.max(1);
        self
    }
}
