//! In-memory log of applied writes awaiting block finalization.
//!
//! The pool is not a cache and never evicts by size: it remembers the
//! tail of the log between the last commit of the underlying transaction
//! and the next block finalization, plus the set of requests that failed
//! locally and still have to be surfaced to peers.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use osprey_common::request::{Request, RequestDigest};
use osprey_common::response::Response;
use osprey_common::types::LogOffset;

/// An applied request together with the response produced for it.
///
/// The response is present for locally produced writes and for replayed
/// writes; read trackers are returned to callers but never pooled.
#[derive(Debug, Clone)]
pub struct QueryTracker {
    pub req: Request,
    pub resp: Option<Response>,
}

/// Snapshot of pool occupancy counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStats {
    pub trackers: usize,
    pub failed: usize,
}

/// Ordered in-memory log of applied write trackers plus the failed set,
/// spanning one underlying transaction.
///
/// Keys are the savepoint ids writes were applied at; they are strictly
/// increasing and form a contiguous suffix of the transaction's savepoint
/// sequence. The failed set never overlaps the applied set.
pub struct QueryPool {
    queries: BTreeMap<LogOffset, Arc<QueryTracker>>,
    failed: HashMap<RequestDigest, Request>,
    tracker_count: AtomicUsize,
    failed_count: AtomicUsize,
}

impl QueryPool {
    pub fn new() -> Self {
        Self {
            queries: BTreeMap::new(),
            failed: HashMap::new(),
            tracker_count: AtomicUsize::new(0),
            failed_count: AtomicUsize::new(0),
        }
    }

    /// Append `tracker` under `savepoint`. Caller holds the state's
    /// exclusive lock.
    pub fn enqueue(&mut self, savepoint: LogOffset, tracker: Arc<QueryTracker>) {
        self.queries.insert(savepoint, tracker);
        self.tracker_count.store(self.queries.len(), Ordering::Relaxed);
    }

    /// Record a failed request. Idempotent on equal request digest.
    pub fn set_failed(&mut self, req: &Request) {
        self.failed.entry(req.digest()).or_insert_with(|| req.clone());
        self.failed_count.store(self.failed.len(), Ordering::Relaxed);
    }

    /// Drop a request from the failed set, if present.
    pub fn remove_failed(&mut self, req: &Request) {
        self.failed.remove(&req.digest());
        self.failed_count.store(self.failed.len(), Ordering::Relaxed);
    }

    /// Snapshot of the failed set.
    pub fn failed_list(&self) -> Vec<Request> {
        self.failed.values().cloned().collect()
    }

    /// True iff a tracker exists at `savepoint` and its request digests
    /// equal to `req`.
    pub fn matches(&self, savepoint: LogOffset, req: &Request) -> bool {
        self.queries
            .get(&savepoint)
            .is_some_and(|tracker| tracker.req.digest() == req.digest())
    }

    /// True iff the highest-keyed savepoint in the pool equals
    /// `savepoint`. An empty pool has no extra local tail and matches
    /// anything.
    pub fn match_last(&self, savepoint: LogOffset) -> bool {
        self.queries
            .keys()
            .next_back()
            .map_or(true, |last| *last == savepoint)
    }

    /// Remove all trackers with key ≤ `up_to`.
    pub fn truncate(&mut self, up_to: LogOffset) {
        self.queries = self.queries.split_off(&up_to.next());
        self.tracker_count.store(self.queries.len(), Ordering::Relaxed);
    }

    /// Lowest pooled offset, if any.
    pub fn first_offset(&self) -> Option<LogOffset> {
        self.queries.keys().next().copied()
    }

    /// Pooled offsets in ascending order.
    pub fn offsets(&self) -> Vec<LogOffset> {
        self.queries.keys().copied().collect()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            trackers: self.tracker_count.load(Ordering::Relaxed),
            failed: self.failed_count.load(Ordering::Relaxed),
        }
    }

    /// Consume the pool, yielding the failed requests and the applied
    /// trackers in log order.
    pub fn into_parts(self) -> (Vec<Request>, Vec<Arc<QueryTracker>>) {
        (
            self.failed.into_values().collect(),
            self.queries.into_values().collect(),
        )
    }
}

impl Default for QueryPool {
    fn default() -> Self {
        Self::new()
    }
}
