//! Bulk move (copy then delete) with conflict preflight

use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use worker_pool::WorkerPool;

use super::state::{OperationTracker, ProgressSink};
use super::types::{BulkOperation, ItemFailure, OperationKind};
use crate::config::EngineConfig;
use crate::error::{Error, Result, StorageError};
use crate::selection::Selection;
use crate::storage::ObjectStore;

/// Error code used when the backend gave none.
const FALLBACK_ERROR_CODE: &str = "Error";

/// Error code for an entry whose destination another entry of the same plan
/// already targets.
pub const COLLISION_ERROR_CODE: &str = "DestinationCollision";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovePlanEntry {
    pub source_key: String,
    pub destination_key: String,
}

impl MovePlanEntry {
    pub fn is_noop(&self) -> bool {
        self.source_key == self.destination_key
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    /// An object already exists at the destination.
    Exists,
    /// Several selected keys share a base name and would land on the same
    /// destination. Only the first of them is moved.
    RepeatedInPlan,
}

/// A destination the move would overwrite.
///
/// `Exists` conflicts are advisory: another writer may create or remove the
/// key between the check and the move, and the move does not check again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveConflict {
    pub destination_key: String,
    pub reason: ConflictReason,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PreflightReport {
    pub conflicts: Vec<MoveConflict>,
    /// Destinations whose existence check failed for a reason other than
    /// "not found".
    pub unverified: Vec<ItemFailure>,
}

impl PreflightReport {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MoveOutcome {
    Moved,
    Unchanged,
}

/// Last path segment of a key.
pub fn base_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// `""` stays the bucket root; anything else gets a trailing `/`.
pub fn normalize_prefix(prefix: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{}/", prefix)
    }
}

pub fn destination_key(source_key: &str, destination_prefix: &str) -> String {
    format!(
        "{}{}",
        normalize_prefix(destination_prefix),
        base_name(source_key)
    )
}

/// Source/destination pairs for `keys`, first occurrence wins.
pub fn plan(keys: &[String], destination_prefix: &str) -> Vec<MovePlanEntry> {
    let mut seen = HashSet::new();
    keys.iter()
        .filter(|key| seen.insert(key.as_str()))
        .map(|key| MovePlanEntry {
            source_key: key.clone(),
            destination_key: destination_key(key, destination_prefix),
        })
        .collect()
}

/// Split a plan into entries that may run and entries whose destination is
/// already claimed by an earlier entry.
///
/// Entries that stay in place claim their key first, so nothing is copied over
/// an object that is itself part of the selection.
fn claim_destinations(plan: Vec<MovePlanEntry>) -> (Vec<MovePlanEntry>, Vec<MovePlanEntry>) {
    let mut claimed: HashSet<String> = plan
        .iter()
        .filter(|entry| entry.is_noop())
        .map(|entry| entry.destination_key.clone())
        .collect();

    let mut runnable = Vec::with_capacity(plan.len());
    let mut colliding = Vec::new();
    for entry in plan {
        if entry.is_noop() || claimed.insert(entry.destination_key.clone()) {
            runnable.push(entry);
        } else {
            colliding.push(entry);
        }
    }
    (runnable, colliding)
}

fn collision_failure(entry: &MovePlanEntry) -> ItemFailure {
    ItemFailure::new(
        entry.source_key.clone(),
        COLLISION_ERROR_CODE,
        format!(
            "another selected object is also moving to {}",
            entry.destination_key
        ),
    )
    .with_destination(entry.destination_key.clone())
}

fn failure_code(err: &StorageError) -> String {
    if err.code.is_empty() {
        FALLBACK_ERROR_CODE.to_string()
    } else {
        err.code.clone()
    }
}

pub struct BulkMoveEngine {
    store: Arc<dyn ObjectStore>,
    pool: WorkerPool,
}

impl BulkMoveEngine {
    pub fn new(store: Arc<dyn ObjectStore>, config: &EngineConfig) -> Self {
        Self {
            store,
            pool: WorkerPool::new(config.worker_concurrency),
        }
    }

    /// Plan a move of the selected objects; prefixes cannot be moved.
    pub fn plan_selection(
        &self,
        selection: &Selection,
        destination_prefix: &str,
    ) -> Result<Vec<MovePlanEntry>> {
        if selection.is_empty() {
            return Err(Error::EmptySelection);
        }
        if selection.has_prefixes() {
            return Err(Error::PrefixMove);
        }
        let keys: Vec<String> = selection.keys().map(str::to_string).collect();
        Ok(plan(&keys, destination_prefix))
    }

    /// Check every destination for an existing object, and report
    /// destinations that several entries of the plan share.
    ///
    /// Entries that would not move (destination equals source) are not
    /// checked against the store.
    pub async fn preflight(&self, plan: &[MovePlanEntry]) -> PreflightReport {
        let (_, colliding) = claim_destinations(plan.to_vec());
        let repeated: BTreeSet<String> = colliding
            .into_iter()
            .map(|entry| entry.destination_key)
            .collect();

        let destinations: Vec<String> = plan
            .iter()
            .filter(|entry| !entry.is_noop())
            .map(|entry| entry.destination_key.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let store = self.store.as_ref();
        let outcome = self
            .pool
            .run(destinations, |destination| async move {
                store.head_object(&destination).await
            })
            .await;

        let mut report = PreflightReport::default();
        for (destination, exists) in outcome.succeeded {
            if exists {
                report.conflicts.push(MoveConflict {
                    destination_key: destination,
                    reason: ConflictReason::Exists,
                });
            }
        }
        for destination in repeated {
            report.conflicts.push(MoveConflict {
                destination_key: destination,
                reason: ConflictReason::RepeatedInPlan,
            });
        }
        for (destination, err) in outcome.failed {
            warn!("move_preflight_unverified: key={} error={}", destination, err);
            report.unverified.push(ItemFailure::from_storage(destination, &err));
        }
        info!(
            "move_preflight: checked={} conflicts={} unverified={}",
            plan.len(),
            report.conflicts.len(),
            report.unverified.len()
        );
        report
    }

    pub async fn move_keys(
        &self,
        keys: &[String],
        destination_prefix: &str,
        sink: &dyn ProgressSink,
    ) -> BulkOperation {
        self.execute(plan(keys, destination_prefix), sink).await
    }

    /// Copy each source to its destination, then delete the source.
    ///
    /// A source is only deleted after its copy succeeded. When the delete
    /// fails the copy is kept and the item is reported as failed. Entries
    /// whose destination an earlier entry already claims fail with
    /// [`COLLISION_ERROR_CODE`] and are neither copied nor deleted.
    pub async fn execute(
        &self,
        plan: Vec<MovePlanEntry>,
        sink: &dyn ProgressSink,
    ) -> BulkOperation {
        let tracker = OperationTracker::start(OperationKind::Move, plan.len(), sink);
        let store = self.store.as_ref();

        let (runnable, colliding) = claim_destinations(plan);
        for entry in &colliding {
            tracker.record_failure(collision_failure(entry));
        }

        let outcome = self
            .pool
            .run_observed(
                runnable,
                |entry| async move { move_one(store, &entry).await },
                |settled| match settled.result {
                    Ok(_) => tracker.record_success(),
                    Err(failure) => tracker.record_failure(failure.clone()),
                },
            )
            .await;

        let unchanged = outcome
            .succeeded
            .iter()
            .filter(|(_, result)| *result == MoveOutcome::Unchanged)
            .count();
        debug!(
            "bulk_move_done: moved={} unchanged={} failed={} collisions={}",
            outcome.succeeded.len() - unchanged,
            unchanged,
            outcome.failed.len(),
            colliding.len()
        );

        tracker.finish()
    }

    /// Resubmit the failed source keys against the same destination prefix.
    pub async fn retry(
        &self,
        previous: &BulkOperation,
        destination_prefix: &str,
        sink: &dyn ProgressSink,
    ) -> BulkOperation {
        info!("bulk_move_retry: keys={}", previous.failures.len());
        self.move_keys(&previous.failed_keys(), destination_prefix, sink).await
    }
}

async fn move_one(
    store: &dyn ObjectStore,
    entry: &MovePlanEntry,
) -> std::result::Result<MoveOutcome, ItemFailure> {
    if entry.is_noop() {
        return Ok(MoveOutcome::Unchanged);
    }

    let fail = |code: String, message: String| {
        ItemFailure::new(entry.source_key.clone(), code, message)
            .with_destination(entry.destination_key.clone())
    };

    store
        .copy_object(&entry.source_key, &entry.destination_key)
        .await
        .map_err(|err| fail(failure_code(&err), err.message))?;

    store.delete_object(&entry.source_key).await.map_err(|err| {
        warn!(
            "move_source_delete_failed: {} -> {} error={}",
            entry.source_key, entry.destination_key, err
        );
        fail(
            failure_code(&err),
            format!(
                "copied to {} but deleting the source failed, the object now exists at both keys: {}",
                entry.destination_key, err.message
            ),
        )
    })?;

    debug!("move_item: {} -> {}", entry.source_key, entry.destination_key);
    Ok(MoveOutcome::Moved)
}
