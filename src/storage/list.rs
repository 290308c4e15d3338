//! Listing operations

use super::sdk_error::storage_error;
use super::types::{ListPage, ListRequest, S3Store, StoredObject};
use crate::error::StorageResult;

/// Fetch one page of `ListObjectsV2`.
pub(super) async fn list_objects(
    store: &S3Store,
    request: ListRequest<'_>,
) -> StorageResult<ListPage> {
    let mut call = store
        .client
        .list_objects_v2()
        .bucket(&store.bucket)
        .max_keys(if request.max_keys > 0 { request.max_keys } else { 1000 });

    if !request.prefix.is_empty() {
        call = call.prefix(request.prefix);
    }
    if let Some(d) = request.delimiter {
        call = call.delimiter(d);
    }
    if let Some(token) = request.continuation_token {
        call = call.continuation_token(token);
    }

    let response = call.send().await.map_err(storage_error)?;

    let objects = response
        .contents()
        .iter()
        .filter_map(|obj| {
            let key = obj.key()?.to_string();
            Some(StoredObject {
                key,
                size: obj.size().unwrap_or(0),
                last_modified: obj
                    .last_modified()
                    .map(|dt| dt.to_string())
                    .unwrap_or_default(),
                etag: obj.e_tag().unwrap_or_default().to_string(),
            })
        })
        .collect();

    let prefixes = response
        .common_prefixes()
        .iter()
        .filter_map(|prefix| prefix.prefix().map(|s| s.to_string()))
        .collect();

    // Some S3-compatible services return a token on the last page; trust IsTruncated.
    let next_token = if response.is_truncated().unwrap_or(false) {
        response.next_continuation_token().map(|s| s.to_string())
    } else {
        None
    };

    Ok(ListPage {
        objects,
        prefixes,
        next_token,
    })
}
