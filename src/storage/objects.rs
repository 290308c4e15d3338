//! Object operations (get, put, copy, delete, head)

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};

use super::sdk_error::{local_error, storage_error};
use super::types::{BatchDeleteError, BatchDeleteOutput, ObjectBody, S3Store};
use crate::error::StorageResult;

/// Encode each key segment individually, keeping `/` as separator.
fn encode_key_path(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

pub(super) async fn get_object(store: &S3Store, key: &str) -> StorageResult<ObjectBody> {
    let response = store
        .client
        .get_object()
        .bucket(&store.bucket)
        .key(key)
        .send()
        .await
        .map_err(storage_error)?;

    let content_type = response.content_type().map(|s| s.to_string());
    let bytes = response
        .body
        .collect()
        .await
        .map_err(|e| local_error("BodyReadError", e))?
        .into_bytes()
        .to_vec();

    Ok(ObjectBody {
        bytes,
        content_type,
    })
}

pub(super) async fn put_object(
    store: &S3Store,
    key: &str,
    bytes: Vec<u8>,
    content_type: Option<&str>,
) -> StorageResult<()> {
    let mut request = store
        .client
        .put_object()
        .bucket(&store.bucket)
        .key(key)
        .body(ByteStream::from(bytes));

    if let Some(ct) = content_type {
        request = request.content_type(ct);
    }

    request.send().await.map_err(storage_error)?;
    Ok(())
}

pub(super) async fn copy_object(
    store: &S3Store,
    source_key: &str,
    destination_key: &str,
) -> StorageResult<()> {
    let copy_source = format!("{}/{}", store.bucket, encode_key_path(source_key));

    store
        .client
        .copy_object()
        .bucket(&store.bucket)
        .copy_source(copy_source)
        .key(destination_key)
        .send()
        .await
        .map_err(storage_error)?;

    Ok(())
}

pub(super) async fn delete_object(store: &S3Store, key: &str) -> StorageResult<()> {
    store
        .client
        .delete_object()
        .bucket(&store.bucket)
        .key(key)
        .send()
        .await
        .map_err(storage_error)?;
    Ok(())
}

pub(super) async fn delete_objects(
    store: &S3Store,
    keys: &[String],
) -> StorageResult<BatchDeleteOutput> {
    if keys.is_empty() {
        return Ok(BatchDeleteOutput::default());
    }

    let objects = keys
        .iter()
        .map(|key| {
            ObjectIdentifier::builder()
                .key(key)
                .build()
                .map_err(|e| local_error("ConstructionFailure", e))
        })
        .collect::<StorageResult<Vec<ObjectIdentifier>>>()?;

    let delete = Delete::builder()
        .set_objects(Some(objects))
        .quiet(false)
        .build()
        .map_err(|e| local_error("ConstructionFailure", e))?;

    let response = store
        .client
        .delete_objects()
        .bucket(&store.bucket)
        .delete(delete)
        .send()
        .await
        .map_err(storage_error)?;

    let deleted = response
        .deleted()
        .iter()
        .filter_map(|obj| obj.key().map(|k| k.to_string()))
        .collect();

    let errors = response
        .errors()
        .iter()
        .map(|err| BatchDeleteError {
            key: err.key().unwrap_or_default().to_string(),
            code: err.code().unwrap_or("Unknown").to_string(),
            message: err.message().unwrap_or_default().to_string(),
        })
        .collect();

    Ok(BatchDeleteOutput { deleted, errors })
}

pub(super) async fn head_object(store: &S3Store, key: &str) -> StorageResult<bool> {
    let result = store
        .client
        .head_object()
        .bucket(&store.bucket)
        .key(key)
        .send()
        .await;

    match result {
        Ok(_) => Ok(true),
        Err(err) => {
            if err
                .as_service_error()
                .map(|service| service.is_not_found())
                .unwrap_or(false)
            {
                return Ok(false);
            }
            let mapped = storage_error(err);
            if mapped.is_not_found() {
                Ok(false)
            } else {
                Err(mapped)
            }
        }
    }
}
