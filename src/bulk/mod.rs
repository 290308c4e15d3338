//! Bulk object operations
//!
//! This module is organized into submodules:
//! - `types`: Operation record, status and failure types
//! - `state`: Progress sinks and the per-operation tracker
//! - `enumerate`: Prefix expansion
//! - `delete`: Batched bulk delete
//! - `mover`: Copy-then-delete moves and conflict preflight
//! - `archive`: Multi-object archive download
//! - `zip_sink`: Archive sinks

mod archive;
mod delete;
mod enumerate;
mod mover;
mod state;
mod types;
mod zip_sink;

pub use archive::{
    format_archive_name, ArchiveDownloadEngine, ArchiveJob, ArchiveStart, DownloadArtifact,
};
pub use delete::BulkDeleteEngine;
pub use enumerate::{Enumeration, KeyEnumerator};
pub use mover::{
    base_name, destination_key, normalize_prefix, plan, BulkMoveEngine, ConflictReason,
    MoveConflict, MovePlanEntry, PreflightReport, COLLISION_ERROR_CODE,
};
pub use state::{BulkEvent, ChannelSink, NoopSink, ProgressSink};
pub use types::{BulkOperation, ItemFailure, OperationKind, OperationStatus, BATCH_ERROR_CODE};
pub use worker_pool::{PoolOutcome, WorkerPool};
pub use zip_sink::{ArchiveSink, ZipArchiveSink};
