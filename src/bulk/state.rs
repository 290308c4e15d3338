//! Operation state tracking and progress notification

use log::{info, warn};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;

use super::types::{BulkOperation, ItemFailure, OperationKind, OperationStatus};

/// Push-only surface the engines report into.
///
/// Every callback fires after the tracked state has been updated.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, done: usize, total: usize);

    fn on_item_failure(&self, _failure: &ItemFailure) {}

    fn on_finished(&self, _status: OperationStatus, _summary: &str) {}
}

/// Discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn on_progress(&self, _done: usize, _total: usize) {}
}

/// Event payload forwarded by [`ChannelSink`].
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BulkEvent {
    Progress {
        kind: OperationKind,
        done: usize,
        total: usize,
    },
    ItemFailed {
        kind: OperationKind,
        failure: ItemFailure,
    },
    Finished {
        kind: OperationKind,
        status: OperationStatus,
        summary: String,
    },
}

/// Forwards notifications to whoever holds the receiving end (usually the UI).
#[derive(Debug, Clone)]
pub struct ChannelSink {
    kind: OperationKind,
    sender: mpsc::UnboundedSender<BulkEvent>,
}

impl ChannelSink {
    pub fn new(kind: OperationKind) -> (Self, mpsc::UnboundedReceiver<BulkEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { kind, sender }, receiver)
    }
}

impl ProgressSink for ChannelSink {
    fn on_progress(&self, done: usize, total: usize) {
        let _ = self.sender.send(BulkEvent::Progress {
            kind: self.kind,
            done,
            total,
        });
    }

    fn on_item_failure(&self, failure: &ItemFailure) {
        let _ = self.sender.send(BulkEvent::ItemFailed {
            kind: self.kind,
            failure: failure.clone(),
        });
    }

    fn on_finished(&self, status: OperationStatus, summary: &str) {
        let _ = self.sender.send(BulkEvent::Finished {
            kind: self.kind,
            status,
            summary: summary.to_string(),
        });
    }
}

/// Owns a [`BulkOperation`] while it runs.
///
/// Concurrent completions go through `record_*`; each call is one short critical
/// section followed by the sink notification, so no contribution is lost and the
/// sink never observes a count the record does not hold yet.
pub(crate) struct OperationTracker<'a> {
    operation: Mutex<BulkOperation>,
    sink: &'a dyn ProgressSink,
}

impl<'a> OperationTracker<'a> {
    pub(crate) fn start(kind: OperationKind, total: usize, sink: &'a dyn ProgressSink) -> Self {
        Self::resume(BulkOperation::new(kind, total), sink)
    }

    /// Continue an existing record, e.g. a retry pass over its failed items.
    ///
    /// The failed items are moved back into the "not done" share of the count.
    pub(crate) fn resume(mut operation: BulkOperation, sink: &'a dyn ProgressSink) -> Self {
        let retrying = operation.failures.len();
        operation.items_done = operation.items_done.saturating_sub(retrying);
        operation.failures.clear();
        operation.status = OperationStatus::Running;
        operation.finished_at = None;
        info!(
            "bulk_status: {} -> running total={} done={}",
            operation.kind, operation.items_total, operation.items_done
        );
        sink.on_progress(operation.items_done, operation.items_total);
        Self {
            operation: Mutex::new(operation),
            sink,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BulkOperation> {
        self.operation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn record_success(&self) {
        self.record(1, Vec::new());
    }

    pub(crate) fn record_failure(&self, failure: ItemFailure) {
        self.record(1, vec![failure]);
    }

    /// `settled` items finished, `failures` of them unsuccessfully.
    pub(crate) fn record(&self, settled: usize, failures: Vec<ItemFailure>) {
        let (done, total) = {
            let mut operation = self.lock();
            operation.items_done = (operation.items_done + settled).min(operation.items_total);
            operation.failures.extend(failures.iter().cloned());
            (operation.items_done, operation.items_total)
        };
        for failure in &failures {
            warn!(
                "bulk_item_failed: key={} code={} message={}",
                failure.key, failure.error_code, failure.error_message
            );
            self.sink.on_item_failure(failure);
        }
        self.sink.on_progress(done, total);
    }

    pub(crate) fn finish(self) -> BulkOperation {
        let sink = self.sink;
        let mut operation = self
            .operation
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        operation.settle();
        let summary = operation.summary();
        match operation.status {
            OperationStatus::Completed => info!(
                "bulk_status: {} -> {} total={}",
                operation.kind, operation.status, operation.items_total
            ),
            _ => warn!(
                "bulk_status: {} -> {} total={} failed={}",
                operation.kind,
                operation.status,
                operation.items_total,
                operation.failures.len()
            ),
        }
        sink.on_finished(operation.status, &summary);
        operation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<String>>,
    }

    impl ProgressSink for RecordingSink {
        fn on_progress(&self, done: usize, total: usize) {
            self.events.lock().unwrap().push(format!("progress {}/{}", done, total));
        }

        fn on_item_failure(&self, failure: &ItemFailure) {
            self.events.lock().unwrap().push(format!("failed {}", failure.key));
        }

        fn on_finished(&self, status: OperationStatus, _summary: &str) {
            self.events.lock().unwrap().push(format!("finished {}", status));
        }
    }

    #[test]
    fn tracker_notifies_after_each_mutation() {
        let sink = RecordingSink::default();
        let tracker = OperationTracker::start(OperationKind::Delete, 3, &sink);
        tracker.record_success();
        tracker.record_failure(ItemFailure::new("b", "AccessDenied", "denied"));
        tracker.record_success();
        let operation = tracker.finish();

        assert_eq!(operation.items_done, 3);
        assert_eq!(operation.status, OperationStatus::PartiallyFailed);
        assert_eq!(
            sink.events.into_inner().unwrap(),
            vec![
                "progress 0/3",
                "progress 1/3",
                "failed b",
                "progress 2/3",
                "progress 3/3",
                "finished partially_failed",
            ]
        );
    }

    #[test]
    fn resume_reopens_failed_items() {
        let mut operation = BulkOperation::new(OperationKind::Archive, 4);
        operation.items_done = 4;
        operation.failures = vec![
            ItemFailure::new("c", "NoSuchKey", ""),
            ItemFailure::new("d", "NoSuchKey", ""),
        ];
        operation.settle();

        let tracker = OperationTracker::resume(operation, &NoopSink);
        tracker.record_success();
        tracker.record_success();
        let operation = tracker.finish();

        assert_eq!(operation.items_done, 4);
        assert!(operation.failures.is_empty());
        assert_eq!(operation.status, OperationStatus::Completed);
    }

    #[tokio::test]
    async fn channel_sink_forwards_serializable_events() {
        let (sink, mut events) = ChannelSink::new(OperationKind::Move);
        let tracker = OperationTracker::start(OperationKind::Move, 1, &sink);
        tracker.record_failure(
            ItemFailure::new("a.txt", "AccessDenied", "").with_destination("b/a.txt"),
        );
        tracker.finish();

        assert_eq!(
            events.recv().await,
            Some(BulkEvent::Progress {
                kind: OperationKind::Move,
                done: 0,
                total: 1
            })
        );
        let failed = events.recv().await.unwrap();
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["type"], "item_failed");
        assert_eq!(json["failure"]["destination_key"], "b/a.txt");

        assert!(matches!(events.recv().await, Some(BulkEvent::Progress { done: 1, .. })));
        assert!(matches!(
            events.recv().await,
            Some(BulkEvent::Finished {
                status: OperationStatus::PartiallyFailed,
                ..
            })
        ));
    }
}
