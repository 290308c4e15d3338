//! Batched bulk delete

use log::{info, warn};
use std::collections::HashSet;
use std::sync::Arc;

use super::enumerate::KeyEnumerator;
use super::state::{OperationTracker, ProgressSink};
use super::types::{BulkOperation, ItemFailure, OperationKind, BATCH_ERROR_CODE};
use crate::config::{EngineConfig, MAX_DELETE_BATCH_SIZE};
use crate::error::{Error, Result};
use crate::selection::Selection;
use crate::storage::ObjectStore;

pub struct BulkDeleteEngine {
    store: Arc<dyn ObjectStore>,
    batch_size: usize,
    page_size: i32,
}

impl BulkDeleteEngine {
    pub fn new(store: Arc<dyn ObjectStore>, config: &EngineConfig) -> Self {
        Self {
            store,
            batch_size: config.delete_batch_size.clamp(1, MAX_DELETE_BATCH_SIZE),
            page_size: config.list_page_size,
        }
    }

    /// Delete `keys` in sequential batches.
    ///
    /// Never fails: per-key and whole-batch errors end up in the returned
    /// record. Duplicate keys are sent once.
    pub async fn delete_keys(&self, keys: Vec<String>, sink: &dyn ProgressSink) -> BulkOperation {
        let mut seen = HashSet::new();
        let keys: Vec<String> = keys.into_iter().filter(|k| seen.insert(k.clone())).collect();

        let tracker = OperationTracker::start(OperationKind::Delete, keys.len(), sink);

        for (index, batch) in keys.chunks(self.batch_size).enumerate() {
            let failures = match self.store.delete_objects(batch).await {
                Ok(output) => {
                    info!(
                        "bulk_delete_batch: {} keys={} deleted={} failed={}",
                        index + 1,
                        batch.len(),
                        output.deleted.len(),
                        output.errors.len()
                    );
                    output
                        .errors
                        .into_iter()
                        .map(|err| ItemFailure::new(err.key, err.code, err.message))
                        .collect()
                }
                Err(err) => {
                    warn!(
                        "bulk_delete_batch_failed: {} keys={} error={}",
                        index + 1,
                        batch.len(),
                        err
                    );
                    batch
                        .iter()
                        .map(|key| ItemFailure::new(key.clone(), BATCH_ERROR_CODE, err.to_string()))
                        .collect()
                }
            };
            tracker.record(batch.len(), failures);
        }

        tracker.finish()
    }

    /// Delete everything under `prefix`, including its directory marker.
    ///
    /// Fails before deleting anything if the prefix cannot be enumerated.
    pub async fn delete_prefix(
        &self,
        prefix: &str,
        sink: &dyn ProgressSink,
    ) -> Result<BulkOperation> {
        let enumerator = KeyEnumerator::new(self.store.as_ref(), self.page_size);
        let enumeration = enumerator.enumerate_under(prefix).await?;
        let mut keys = enumeration.keys;
        if enumeration.marker_present {
            keys.push(prefix.to_string());
        }
        info!("bulk_delete_prefix: prefix={} keys={}", prefix, keys.len());
        Ok(self.delete_keys(keys, sink).await)
    }

    /// Delete the direct keys plus everything under the selected prefixes.
    pub async fn delete_selection(
        &self,
        selection: &Selection,
        sink: &dyn ProgressSink,
    ) -> Result<BulkOperation> {
        if selection.is_empty() {
            return Err(Error::EmptySelection);
        }
        let enumerator = KeyEnumerator::new(self.store.as_ref(), self.page_size);
        let resolved = selection.resolve(&enumerator).await?;
        let mut keys = resolved.keys;
        keys.extend(resolved.markers);
        Ok(self.delete_keys(keys, sink).await)
    }

    /// Resubmit exactly the failed keys of `previous` as a fresh operation.
    pub async fn retry(&self, previous: &BulkOperation, sink: &dyn ProgressSink) -> BulkOperation {
        info!("bulk_delete_retry: keys={}", previous.failures.len());
        self.delete_keys(previous.failed_keys(), sink).await
    }
}
