//! Object storage backend
//!
//! This module is organized into submodules:
//! - `types`: Core types and the `S3Store` client binding
//! - `s3_client`: SDK client construction
//! - `list`: Paginated listing
//! - `objects`: Object operations (get, put, copy, delete, head)
//! - `upload`: Multipart upload primitives
//! - `sdk_error`: SDK error mapping

mod list;
mod objects;
mod s3_client;
mod sdk_error;
mod types;
mod upload;

use async_trait::async_trait;

use crate::error::StorageResult;

pub use s3_client::build_client;
pub use types::{
    BatchDeleteError, BatchDeleteOutput, ListPage, ListRequest, ObjectBody, S3Store,
    StoredObject, UploadedPart,
};

/// The storage primitives the engines consume.
///
/// A store is bound to one bucket; keys are full object keys within it.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list_objects(&self, request: ListRequest<'_>) -> StorageResult<ListPage>;

    async fn get_object(&self, key: &str) -> StorageResult<ObjectBody>;

    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> StorageResult<()>;

    async fn copy_object(&self, source_key: &str, destination_key: &str) -> StorageResult<()>;

    /// Deleting a key that does not exist succeeds on S3.
    async fn delete_object(&self, key: &str) -> StorageResult<()>;

    /// One bulk-delete request; the caller keeps `keys` within the backend limit.
    ///
    /// `Err` means the request itself failed. Per-key failures come back in
    /// [`BatchDeleteOutput::errors`].
    async fn delete_objects(&self, keys: &[String]) -> StorageResult<BatchDeleteOutput>;

    /// `Ok(false)` for a missing key, `Err` for anything else that went wrong.
    async fn head_object(&self, key: &str) -> StorageResult<bool>;

    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: Option<&str>,
    ) -> StorageResult<String>;

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Vec<u8>,
    ) -> StorageResult<UploadedPart>;

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> StorageResult<()>;

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> StorageResult<()>;
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_objects(&self, request: ListRequest<'_>) -> StorageResult<ListPage> {
        list::list_objects(self, request).await
    }

    async fn get_object(&self, key: &str) -> StorageResult<ObjectBody> {
        objects::get_object(self, key).await
    }

    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> StorageResult<()> {
        objects::put_object(self, key, bytes, content_type).await
    }

    async fn copy_object(&self, source_key: &str, destination_key: &str) -> StorageResult<()> {
        objects::copy_object(self, source_key, destination_key).await
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        objects::delete_object(self, key).await
    }

    async fn delete_objects(&self, keys: &[String]) -> StorageResult<BatchDeleteOutput> {
        objects::delete_objects(self, keys).await
    }

    async fn head_object(&self, key: &str) -> StorageResult<bool> {
        objects::head_object(self, key).await
    }

    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: Option<&str>,
    ) -> StorageResult<String> {
        upload::create_multipart_upload(self, key, content_type).await
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Vec<u8>,
    ) -> StorageResult<UploadedPart> {
        upload::upload_part(self, key, upload_id, part_number, data).await
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> StorageResult<()> {
        upload::complete_multipart_upload(self, key, upload_id, parts).await
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> StorageResult<()> {
        upload::abort_multipart_upload(self, key, upload_id).await
    }
}
