//! Multipart upload primitives

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};

use super::sdk_error::storage_error;
use super::types::{S3Store, UploadedPart};
use crate::error::{StorageError, StorageResult};

pub(super) async fn create_multipart_upload(
    store: &S3Store,
    key: &str,
    content_type: Option<&str>,
) -> StorageResult<String> {
    let mut request = store
        .client
        .create_multipart_upload()
        .bucket(&store.bucket)
        .key(key);

    if let Some(ct) = content_type {
        request = request.content_type(ct);
    }

    let response = request.send().await.map_err(storage_error)?;
    let upload_id = response
        .upload_id()
        .ok_or_else(|| StorageError::new("ResponseError", "No upload ID returned"))?
        .to_string();

    Ok(upload_id)
}

pub(super) async fn upload_part(
    store: &S3Store,
    key: &str,
    upload_id: &str,
    part_number: i32,
    data: Vec<u8>,
) -> StorageResult<UploadedPart> {
    let response = store
        .client
        .upload_part()
        .bucket(&store.bucket)
        .key(key)
        .upload_id(upload_id)
        .part_number(part_number)
        .body(ByteStream::from(data))
        .send()
        .await
        .map_err(storage_error)?;

    Ok(UploadedPart {
        part_number,
        etag: response.e_tag().unwrap_or_default().to_string(),
    })
}

pub(super) async fn complete_multipart_upload(
    store: &S3Store,
    key: &str,
    upload_id: &str,
    mut parts: Vec<UploadedPart>,
) -> StorageResult<()> {
    // S3 requires ascending part numbers.
    parts.sort_by_key(|part| part.part_number);

    let completed_parts: Vec<CompletedPart> = parts
        .into_iter()
        .map(|part| {
            CompletedPart::builder()
                .part_number(part.part_number)
                .e_tag(part.etag)
                .build()
        })
        .collect();

    let completed_upload = CompletedMultipartUpload::builder()
        .set_parts(Some(completed_parts))
        .build();

    store
        .client
        .complete_multipart_upload()
        .bucket(&store.bucket)
        .key(key)
        .upload_id(upload_id)
        .multipart_upload(completed_upload)
        .send()
        .await
        .map_err(storage_error)?;

    Ok(())
}

pub(super) async fn abort_multipart_upload(
    store: &S3Store,
    key: &str,
    upload_id: &str,
) -> StorageResult<()> {
    store
        .client
        .abort_multipart_upload()
        .bucket(&store.bucket)
        .key(key)
        .upload_id(upload_id)
        .send()
        .await
        .map_err(storage_error)?;

    Ok(())
}
