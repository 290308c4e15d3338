use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::Region;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::Client;
use std::time::Duration;

use crate::config::{BucketConfig, EngineConfig};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// SDK client for one bucket session. Static credentials only.
///
/// Backoff lives in the transport; the engines never retry a call themselves.
pub fn build_client(bucket: &BucketConfig, engine: &EngineConfig) -> Client {
    let credentials = Credentials::new(
        bucket.access_key_id.trim(),
        bucket.secret_access_key.trim(),
        None,
        None,
        "bucket-browser",
    );

    let retry = RetryConfig::standard()
        .with_max_attempts(engine.retry_max_attempts.max(1))
        .with_initial_backoff(Duration::from_millis(engine.retry_base_ms));
    let timeouts = TimeoutConfig::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build();

    let mut conf = S3ConfigBuilder::new()
        .behavior_version_latest()
        .credentials_provider(credentials)
        .region(Region::new(bucket.region.trim().to_string()))
        .retry_config(retry)
        .timeout_config(timeouts)
        .force_path_style(bucket.force_path_style);

    if let Some(endpoint) = bucket.custom_endpoint() {
        conf = conf.endpoint_url(endpoint);
    }

    Client::from_conf(conf.build())
}
