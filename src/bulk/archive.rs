//! Multi-object archive download

use chrono::{DateTime, Local};
use log::{info, warn};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use worker_pool::WorkerPool;

use super::enumerate::KeyEnumerator;
use super::mover::base_name;
use super::state::{OperationTracker, ProgressSink};
use super::types::{BulkOperation, ItemFailure, OperationKind};
use super::zip_sink::{ArchiveSink, ZipArchiveSink};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::selection::Selection;
use crate::storage::ObjectStore;

/// Error code for an entry the sink refused.
const SINK_ERROR_CODE: &str = "ArchiveError";

/// `s3-download-YYYYMMDD-HHMMSS.<ext>` in local time.
pub fn format_archive_name(at: DateTime<Local>, extension: &str) -> String {
    format!("s3-download-{}.{}", at.format("%Y%m%d-%H%M%S"), extension)
}

/// The thing handed to the download trigger.
#[derive(Debug, Clone)]
pub enum DownloadArtifact {
    /// A single object, returned as stored.
    Object {
        key: String,
        file_name: String,
        content_type: Option<String>,
        bytes: Vec<u8>,
    },
    Archive {
        file_name: String,
        entries: usize,
        bytes: Vec<u8>,
    },
}

impl DownloadArtifact {
    pub fn file_name(&self) -> &str {
        match self {
            DownloadArtifact::Object { file_name, .. } => file_name,
            DownloadArtifact::Archive { file_name, .. } => file_name,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            DownloadArtifact::Object { bytes, .. } => bytes,
            DownloadArtifact::Archive { bytes, .. } => bytes,
        }
    }

    /// Write the artifact into `dir` under its file name.
    pub async fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(self.file_name());
        tokio::fs::write(&path, self.bytes()).await?;
        info!(
            "download_saved: path={} bytes={}",
            path.display(),
            self.bytes().len()
        );
        Ok(path)
    }
}

/// Result of starting a download.
pub enum ArchiveStart<S: ArchiveSink> {
    /// Exactly one key resolved; no archive was built.
    Direct(DownloadArtifact),
    /// Every key has been attempted once. Check the job for failures, retry
    /// them, then finalize.
    Archive(ArchiveJob<S>),
}

pub struct ArchiveDownloadEngine {
    store: Arc<dyn ObjectStore>,
    pool: WorkerPool,
    page_size: i32,
}

impl ArchiveDownloadEngine {
    pub fn new(store: Arc<dyn ObjectStore>, config: &EngineConfig) -> Self {
        Self {
            store,
            pool: WorkerPool::new(config.worker_concurrency),
            page_size: config.list_page_size,
        }
    }

    /// Fetch one object for a direct download.
    pub async fn download_object(&self, key: &str) -> Result<DownloadArtifact> {
        let body = self.store.get_object(key).await?;
        info!("download_object: key={} bytes={}", key, body.bytes.len());
        let file_name = match base_name(key) {
            "" => "download".to_string(),
            name => name.to_string(),
        };
        Ok(DownloadArtifact::Object {
            key: key.to_string(),
            file_name,
            content_type: body.content_type,
            bytes: body.bytes,
        })
    }

    /// Start a zip download of the selection.
    pub async fn start(
        &self,
        selection: &Selection,
        sink: &dyn ProgressSink,
    ) -> Result<ArchiveStart<ZipArchiveSink>> {
        self.start_with(selection, ZipArchiveSink::new(), sink).await
    }

    /// Start a download of the selection into `archive`.
    ///
    /// A lone selected key is fetched directly without listing anything. When
    /// an archive is built, each selected prefix that has a marker object
    /// becomes a directory entry alongside its contents.
    pub async fn start_with<S: ArchiveSink>(
        &self,
        selection: &Selection,
        archive: S,
        sink: &dyn ProgressSink,
    ) -> Result<ArchiveStart<S>> {
        if let Some(key) = selection.single_key() {
            return Ok(ArchiveStart::Direct(self.download_object(key).await?));
        }
        let enumerator = KeyEnumerator::new(self.store.as_ref(), self.page_size);
        let resolved = selection.resolve(&enumerator).await?;
        let mut keys = resolved.keys;
        if keys.len() > 1 {
            keys.extend(resolved.markers);
        }
        self.archive_keys(keys, archive, sink).await
    }

    /// Download `keys` (deduplicated) into `archive`, or directly if only one
    /// key remains.
    pub async fn archive_keys<S: ArchiveSink>(
        &self,
        keys: Vec<String>,
        archive: S,
        sink: &dyn ProgressSink,
    ) -> Result<ArchiveStart<S>> {
        let keys: Vec<String> = keys
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        match keys.as_slice() {
            [] => Err(Error::EmptySelection),
            [key] => Ok(ArchiveStart::Direct(self.download_object(key).await?)),
            _ => {
                let mut job = ArchiveJob {
                    store: self.store.clone(),
                    pool: self.pool,
                    archive: Mutex::new(archive),
                    operation: BulkOperation::new(OperationKind::Archive, keys.len()),
                };
                job.fetch(keys, sink).await;
                Ok(ArchiveStart::Archive(job))
            }
        }
    }
}

/// An archive being filled. Owned by the caller until finalized or dismissed.
pub struct ArchiveJob<S: ArchiveSink> {
    store: Arc<dyn ObjectStore>,
    pool: WorkerPool,
    archive: Mutex<S>,
    operation: BulkOperation,
}

impl<S: ArchiveSink> ArchiveJob<S> {
    pub fn operation(&self) -> &BulkOperation {
        &self.operation
    }

    pub fn failures(&self) -> &[ItemFailure] {
        &self.operation.failures
    }

    /// True once every key is in the archive.
    pub fn is_ready(&self) -> bool {
        !self.operation.has_failures()
    }

    /// Re-fetch only the failed keys into the same archive.
    pub async fn retry_failed(&mut self, sink: &dyn ProgressSink) -> &BulkOperation {
        let keys = self.operation.failed_keys();
        if !keys.is_empty() {
            info!("archive_retry: keys={}", keys.len());
            self.fetch(keys, sink).await;
        }
        &self.operation
    }

    async fn fetch(&mut self, keys: Vec<String>, sink: &dyn ProgressSink) {
        let operation = std::mem::replace(
            &mut self.operation,
            BulkOperation::new(OperationKind::Archive, 0),
        );
        let tracker = OperationTracker::resume(operation, sink);
        let store = self.store.as_ref();
        let archive = &self.archive;

        self.pool
            .run_observed(
                keys,
                |key| async move {
                    let body = store
                        .get_object(&key)
                        .await
                        .map_err(|err| ItemFailure::from_storage(key.clone(), &err))?;
                    let size = body.bytes.len();
                    archive
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .add_entry(&key, body.bytes)
                        .map_err(|err| {
                            ItemFailure::new(key.clone(), SINK_ERROR_CODE, err.to_string())
                        })?;
                    Ok::<usize, ItemFailure>(size)
                },
                |settled| match settled.result {
                    Ok(_) => tracker.record_success(),
                    Err(failure) => tracker.record_failure(failure.clone()),
                },
            )
            .await;

        self.operation = tracker.finish();
    }

    /// Compress everything into one artifact.
    ///
    /// Refused while failures are outstanding. A compression failure consumes
    /// the job; no partial archive is produced.
    pub async fn finalize(self) -> Result<DownloadArtifact> {
        if self.operation.has_failures() {
            return Err(Error::OutstandingFailures(self.operation.failures.len()));
        }
        let archive = self
            .archive
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let entries = archive.entry_count();
        let file_name = format_archive_name(Local::now(), archive.extension());

        let bytes = tokio::task::spawn_blocking(move || archive.finish())
            .await
            .map_err(|e| Error::Finalize(e.to_string()))?
            .inspect_err(|e| warn!("archive_finalize_failed: entries={} error={}", entries, e))?;

        info!(
            "archive_finalize: file={} entries={} bytes={}",
            file_name,
            entries,
            bytes.len()
        );
        Ok(DownloadArtifact::Archive {
            file_name,
            entries,
            bytes,
        })
    }

    /// Close the job without producing anything. In-flight fetches have
    /// already settled by the time a job is handed back, so nothing is cut off.
    pub fn dismiss(self) -> BulkOperation {
        let mut operation = self.operation;
        operation.dismiss();
        info!("bulk_status: {} -> {}", operation.kind, operation.status);
        operation
    }
}
