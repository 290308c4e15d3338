//! Fixed-width worker pool for per-item async operations.
//!
//! A pool run spawns `min(concurrency, items.len())` logical workers that share a
//! cursor into the item list. Each worker claims the next unclaimed index until the
//! cursor is exhausted, so every item is attempted exactly once. Workers are
//! multiplexed onto the calling task with `join_all`; nothing is spawned onto the
//! runtime, which keeps the pool usable from any executor.
//!
//! A failing item never stops the pool: its error is recorded and the worker moves
//! on. The run resolves once every item has been attempted.

use futures_util::future::join_all;
use log::debug;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default width used by the bulk engines.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Per-item report handed to the observer of [`WorkerPool::run_observed`].
///
/// `completed` already includes this item, so an observer that mirrors it into a
/// progress view never goes backwards.
pub struct Settled<'a, T, S, E> {
    pub index: usize,
    pub item: &'a T,
    pub result: &'a Result<S, E>,
    pub completed: usize,
    pub total: usize,
}

/// Items partitioned by outcome, each list in input order.
#[derive(Debug)]
pub struct PoolOutcome<T, S, E> {
    pub succeeded: Vec<(T, S)>,
    pub failed: Vec<(T, E)>,
}

impl<T, S, E> Default for PoolOutcome<T, S, E> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T, S, E> PoolOutcome<T, S, E> {
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    concurrency: usize,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl WorkerPool {
    /// A width of zero is treated as one.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub async fn run<T, S, E, F, Fut>(&self, items: Vec<T>, worker: F) -> PoolOutcome<T, S, E>
    where
        T: Clone,
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<S, E>>,
    {
        self.run_observed(items, worker, |_| {}).await
    }

    /// Like [`run`](Self::run), calling `observer` after every item settles.
    ///
    /// The observer runs between two suspension points of the settling worker, so
    /// mutations it performs are never interleaved with another worker's.
    pub async fn run_observed<T, S, E, F, Fut, O>(
        &self,
        items: Vec<T>,
        worker: F,
        observer: O,
    ) -> PoolOutcome<T, S, E>
    where
        T: Clone,
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<S, E>>,
        O: Fn(Settled<'_, T, S, E>),
    {
        let total = items.len();
        if total == 0 {
            return PoolOutcome::default();
        }

        let width = self.concurrency.min(total);
        debug!("worker_pool_start: items={} width={}", total, width);

        let cursor = AtomicUsize::new(0);
        let completed = AtomicUsize::new(0);

        let lanes = {
            let items = &items;
            let worker = &worker;
            let observer = &observer;
            let cursor = &cursor;
            let completed = &completed;

            (0..width).map(move |lane| async move {
                let mut succeeded = Vec::new();
                let mut failed = Vec::new();
                loop {
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    if index >= total {
                        break;
                    }
                    let result = worker(items[index].clone()).await;
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    observer(Settled {
                        index,
                        item: &items[index],
                        result: &result,
                        completed: done,
                        total,
                    });
                    match result {
                        Ok(value) => succeeded.push((index, value)),
                        Err(err) => failed.push((index, err)),
                    }
                }
                debug!(
                    "worker_pool_lane_done: lane={} ok={} failed={}",
                    lane,
                    succeeded.len(),
                    failed.len()
                );
                (succeeded, failed)
            })
        };

        let lane_results = join_all(lanes).await;

        let mut succeeded_at = Vec::new();
        let mut failed_at = Vec::new();
        for (ok, err) in lane_results {
            succeeded_at.extend(ok);
            failed_at.extend(err);
        }
        succeeded_at.sort_by_key(|(index, _)| *index);
        failed_at.sort_by_key(|(index, _)| *index);

        let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
        let mut outcome = PoolOutcome::default();
        for (index, value) in succeeded_at {
            if let Some(item) = slots[index].take() {
                outcome.succeeded.push((item, value));
            }
        }
        for (index, err) in failed_at {
            if let Some(item) = slots[index].take() {
                outcome.failed.push((item, err));
            }
        }

        debug!(
            "worker_pool_finish: items={} ok={} failed={}",
            total,
            outcome.succeeded.len(),
            outcome.failed.len()
        );
        outcome
    }
}
