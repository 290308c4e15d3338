//! Bulk object operations for S3-compatible buckets.
//!
//! A [`BucketSession`] binds an [`ObjectStore`] to one bucket. From it come the
//! bulk engines (delete, move, archive download), the upload engine and the
//! directory-style browsing helpers. Every bulk call returns a
//! [`BulkOperation`] record owned by the caller and reports progress through a
//! [`ProgressSink`].

pub mod browse;
pub mod bulk;
pub mod config;
pub mod error;
pub mod selection;
pub mod session;
pub mod storage;
pub mod upload;

#[cfg(test)]
mod test_utils;

pub use bulk::{
    ArchiveDownloadEngine, ArchiveJob, ArchiveSink, ArchiveStart, BulkDeleteEngine, BulkEvent,
    BulkMoveEngine, BulkOperation, ChannelSink, ConflictReason, DownloadArtifact, ItemFailure,
    KeyEnumerator, MoveConflict, NoopSink, OperationKind, OperationStatus, PreflightReport,
    ProgressSink, ZipArchiveSink,
};
pub use config::{BucketConfig, EngineConfig};
pub use error::{Error, ErrorCategory, Result, StorageError};
pub use selection::Selection;
pub use session::BucketSession;
pub use storage::{ObjectStore, S3Store};
pub use upload::{UploadEngine, UploadOperation, UploadStatus};
