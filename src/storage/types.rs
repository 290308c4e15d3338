//! Storage types and the S3 client binding

use aws_sdk_s3::Client;
use serde::{Deserialize, Serialize};

use super::s3_client::build_client;
use crate::config::{BucketConfig, EngineConfig};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    pub key: String,
    pub size: i64,
    pub last_modified: String,
    pub etag: String,
}

/// Arguments of one `listObjects` page request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListRequest<'a> {
    pub prefix: &'a str,
    pub delimiter: Option<&'a str>,
    pub max_keys: i32,
    pub continuation_token: Option<&'a str>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListPage {
    /// Raw listing entries, directory markers included.
    pub objects: Vec<StoredObject>,
    pub prefixes: Vec<String>,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ObjectBody {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchDeleteError {
    pub key: String,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchDeleteOutput {
    pub deleted: Vec<String>,
    pub errors: Vec<BatchDeleteError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedPart {
    pub part_number: i32,
    pub etag: String,
}

/// S3 client bound to one bucket.
#[derive(Debug, Clone)]
pub struct S3Store {
    pub(super) client: Client,
    pub(super) bucket: String,
}

impl S3Store {
    /// Validate the session settings and build the SDK client.
    pub fn new(config: &BucketConfig, engine: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let client = build_client(config, engine);
        Ok(Self::from_client(client, config.bucket.trim()))
    }

    pub fn from_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}
