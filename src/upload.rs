//! Object uploads, single-request or multipart

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use worker_pool::WorkerPool;

use crate::config::EngineConfig;
use crate::error::{Result, StorageError};
use crate::storage::{ObjectStore, UploadedPart};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Queued,
    Running,
    Completed,
    Failed,
    /// A multipart upload failed and its parts were discarded.
    Aborted,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadOperation {
    pub key: String,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
    pub status: UploadStatus,
    pub error: Option<String>,
}

impl UploadOperation {
    fn new(key: &str, total_bytes: u64) -> Self {
        Self {
            key: key.to_string(),
            total_bytes,
            transferred_bytes: 0,
            status: UploadStatus::Queued,
            error: None,
        }
    }

    fn fail(&mut self, status: UploadStatus, err: &StorageError) {
        self.status = status;
        self.error = Some(err.describe());
    }
}

/// Error code for a part that could not be read from the local file.
const LOCAL_READ_ERROR_CODE: &str = "LocalReadError";

/// Where multipart bodies come from. Files are read one part at a time.
enum PartSource<'a> {
    Memory(&'a [u8]),
    File(&'a Path),
}

impl PartSource<'_> {
    async fn read(&self, range: Range<u64>) -> std::result::Result<Vec<u8>, StorageError> {
        match self {
            PartSource::Memory(bytes) => {
                Ok(bytes[range.start as usize..range.end as usize].to_vec())
            }
            PartSource::File(path) => read_file_range(path, range).await.map_err(|e| {
                StorageError::new(LOCAL_READ_ERROR_CODE, format!("{}: {}", path.display(), e))
            }),
        }
    }
}

async fn read_file_range(path: &Path, range: Range<u64>) -> std::io::Result<Vec<u8>> {
    let mut file = File::open(path).await?;
    file.seek(SeekFrom::Start(range.start)).await?;
    let mut buffer = vec![0u8; (range.end - range.start) as usize];
    file.read_exact(&mut buffer).await?;
    Ok(buffer)
}

pub struct UploadEngine {
    store: Arc<dyn ObjectStore>,
    multipart_threshold: u64,
    part_size: u64,
    pool: WorkerPool,
}

impl UploadEngine {
    pub fn new(store: Arc<dyn ObjectStore>, config: &EngineConfig) -> Self {
        let config = config.clone().normalized();
        Self {
            store,
            multipart_threshold: config.multipart_threshold_bytes,
            part_size: config.multipart_part_size_bytes,
            pool: WorkerPool::new(config.multipart_concurrency),
        }
    }

    /// Whether an upload to `key` would replace an existing object.
    pub async fn would_overwrite(&self, key: &str) -> Result<bool> {
        Ok(self.store.head_object(key).await?)
    }

    /// Upload a local file. Multipart uploads read each part from disk as it
    /// is sent, so the file never has to fit in memory.
    pub async fn upload_file<P>(
        &self,
        path: &Path,
        key: &str,
        content_type: Option<&str>,
        progress: P,
    ) -> Result<UploadOperation>
    where
        P: Fn(u64, u64),
    {
        let total = tokio::fs::metadata(path).await?.len();
        if total < self.multipart_threshold {
            let bytes = tokio::fs::read(path).await?;
            return Ok(self.upload_bytes(key, bytes, content_type, progress).await);
        }

        let mut operation = UploadOperation::new(key, total);
        operation.status = UploadStatus::Running;
        progress(0, total);
        self.upload_multipart(&mut operation, PartSource::File(path), content_type, &progress)
            .await;
        Ok(operation)
    }

    /// Upload `bytes` to `key`; `progress` receives `(transferred, total)`.
    ///
    /// Failures are reported in the returned operation.
    pub async fn upload_bytes<P>(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
        progress: P,
    ) -> UploadOperation
    where
        P: Fn(u64, u64),
    {
        let total = bytes.len() as u64;
        let mut operation = UploadOperation::new(key, total);
        operation.status = UploadStatus::Running;
        progress(0, total);

        if total < self.multipart_threshold {
            match self.store.put_object(key, bytes, content_type).await {
                Ok(()) => {
                    operation.transferred_bytes = total;
                    operation.status = UploadStatus::Completed;
                    progress(total, total);
                    info!("upload_complete: key={} bytes={}", key, total);
                }
                Err(err) => {
                    warn!("upload_failed: key={} error={}", key, err);
                    operation.fail(UploadStatus::Failed, &err);
                }
            }
            return operation;
        }

        self.upload_multipart(
            &mut operation,
            PartSource::Memory(&bytes),
            content_type,
            &progress,
        )
        .await;
        operation
    }

    async fn upload_multipart<P>(
        &self,
        operation: &mut UploadOperation,
        source: PartSource<'_>,
        content_type: Option<&str>,
        progress: &P,
    ) where
        P: Fn(u64, u64),
    {
        let key = operation.key.clone();
        let total = operation.total_bytes;

        let upload_id = match self.store.create_multipart_upload(&key, content_type).await {
            Ok(id) => id,
            Err(err) => {
                warn!("multipart_create_failed: key={} error={}", key, err);
                operation.fail(UploadStatus::Failed, &err);
                return;
            }
        };

        let parts = part_ranges(total, self.part_size);
        info!(
            "multipart_start: key={} upload_id={} parts={} bytes={}",
            key,
            upload_id,
            parts.len(),
            total
        );

        let transferred = AtomicU64::new(0);
        let store = self.store.as_ref();
        let (source, key_ref, upload_ref) = (&source, key.as_str(), upload_id.as_str());

        let outcome = self
            .pool
            .run_observed(
                parts,
                |(part_number, range)| async move {
                    let body = source.read(range).await?;
                    store
                        .upload_part(key_ref, upload_ref, part_number, body)
                        .await
                },
                |settled| {
                    if settled.result.is_ok() {
                        let (_, range) = settled.item;
                        let len = range.end - range.start;
                        let done = transferred.fetch_add(len, Ordering::SeqCst) + len;
                        progress(done, total);
                    }
                },
            )
            .await;

        operation.transferred_bytes = transferred.load(Ordering::SeqCst);

        let completed = match outcome.failed.first() {
            Some(((part_number, _), err)) => {
                warn!(
                    "multipart_part_failed: key={} part={} error={}",
                    key, part_number, err
                );
                Err(err.clone())
            }
            None => {
                let uploaded: Vec<UploadedPart> =
                    outcome.succeeded.into_iter().map(|(_, part)| part).collect();
                self.store
                    .complete_multipart_upload(&key, &upload_id, uploaded)
                    .await
            }
        };

        match completed {
            Ok(()) => {
                operation.status = UploadStatus::Completed;
                info!("multipart_complete: key={} bytes={}", key, total);
            }
            Err(err) => {
                if let Err(abort_err) = self.store.abort_multipart_upload(&key, &upload_id).await {
                    warn!(
                        "multipart_abort_failed: key={} upload_id={} error={}",
                        key, upload_id, abort_err
                    );
                }
                operation.fail(UploadStatus::Aborted, &err);
            }
        }
    }
}

/// 1-based part numbers with the byte range each covers.
fn part_ranges(total: u64, part_size: u64) -> Vec<(i32, Range<u64>)> {
    let part_size = part_size.max(1);
    (0..total.div_ceil(part_size))
        .map(|index| {
            let start = index * part_size;
            let end = (start + part_size).min(total);
            (index as i32 + 1, start..end)
        })
        .collect()
}
