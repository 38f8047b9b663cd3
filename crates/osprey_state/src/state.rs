//! The state engine proper: savepoint-fenced writes over one long-running
//! write transaction, dirty-read fast paths, peer replay and block
//! reconciliation.
//!
//! Lock discipline: the exclusive lock covers write application, replay,
//! block replay, commit, close and transactional-fallback reads; the
//! shared lock covers statistics; the dirty-read fast path takes no lock
//! at all and relies on the atomic log counter for offset coherence.

use std::collections::VecDeque;
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use osprey_common::block::Block;
use osprey_common::config::StateConfig;
use osprey_common::error::{StateError, StorageError};
use osprey_common::interrupt::Interrupt;
use osprey_common::request::{Query, QueryType, Request};
use osprey_common::response::{Response, ResponseHeader, ResponsePayload, ResponseRow};
use osprey_common::types::{now_unix_us, DatabaseId, LogOffset, NodeId};
use osprey_storage::sqlite::{ExecOutcome, QueryOutput, SqliteStorage, WriteTx};
use osprey_storage::translate::translate;

use crate::pool::{PoolStats, QueryPool, QueryTracker};

/// Outcome tag for the applied-write history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    Failed,
    Replayed,
}

/// One completed write application, kept in the diagnostic ring buffer.
#[derive(Debug, Clone)]
pub struct WriteRecord {
    pub log_offset: LogOffset,
    pub query_count: usize,
    pub affected_rows: i64,
    pub elapsed_us: u64,
    pub outcome: WriteOutcome,
}

/// Ring buffer of recent write applications.
struct WriteHistory {
    buf: VecDeque<WriteRecord>,
    capacity: usize,
}

impl WriteHistory {
    fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, record: WriteRecord) {
        if self.capacity == 0 {
            return;
        }
        if self.buf.len() >= self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(record);
    }

    fn snapshot(&self) -> Vec<WriteRecord> {
        self.buf.iter().cloned().collect()
    }
}

/// Mutable engine state guarded by the exclusive lock.
struct StateCore {
    /// The uncommitted write transaction. `None` only after a fatal
    /// commit error, at which point the state must be recreated.
    unc: Option<WriteTx>,
    pool: QueryPool,
    /// Offset at which the current underlying transaction began.
    origin: LogOffset,
    /// Most recent offset at which finalization authorized a commit; the
    /// rollback target on graceful shutdown.
    cmpoint: LogOffset,
}

impl StateCore {
    fn tx(&self) -> Result<&WriteTx, StateError> {
        self.unc.as_ref().ok_or(StateError::NotOpen)
    }
}

/// Transactional state of one hosted database.
///
/// Process-wide handle; methods synchronize internally. Writers are
/// serialized under the exclusive lock, dirty readers run lock-free on
/// pooled backend connections.
pub struct State {
    node_id: NodeId,
    storage: Arc<SqliteStorage>,
    config: StateConfig,
    /// Next savepoint id; also the externally visible log offset.
    current: AtomicU64,
    /// Set while the open transaction contains uncommitted DDL. Dirty
    /// reads would not see that schema, so reads fall back onto the
    /// write transaction until the next commit clears the flag.
    has_schema_change: AtomicBool,
    closed: AtomicBool,
    history: Mutex<WriteHistory>,
    core: RwLock<StateCore>,
}

impl State {
    /// Bind a new state to `storage`, opening the long-running write
    /// transaction.
    pub fn new(
        node_id: NodeId,
        storage: Arc<SqliteStorage>,
        config: StateConfig,
    ) -> Result<Self, StateError> {
        let unc = storage.begin_write()?;
        let history = Mutex::new(WriteHistory::new(config.history_capacity));
        let state = Self {
            node_id,
            storage,
            config,
            current: AtomicU64::new(0),
            has_schema_change: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            history,
            core: RwLock::new(StateCore {
                unc: Some(unc),
                pool: QueryPool::new(),
                origin: LogOffset::MIN,
                cmpoint: LogOffset::MIN,
            }),
        };
        if let Some(tx) = state.core.read().unc.as_ref() {
            tx.savepoint(LogOffset::MIN)?;
        }
        Ok(state)
    }

    /// Set the initial log offset of the current transaction.
    ///
    /// Construction-time only: takes `&mut self` so it cannot race with
    /// running requests.
    pub fn init_tx(&mut self, offset: LogOffset) -> Result<(), StateError> {
        self.reset_to(offset);
        let core = self.core.get_mut();
        core.origin = offset;
        core.cmpoint = offset;
        core.tx()?.savepoint(offset)?;
        Ok(())
    }

    // ── Log counter ──────────────────────────────────────────────────

    /// Current head of the log: the offset the next accepted write will
    /// be assigned.
    pub fn head_offset(&self) -> LogOffset {
        LogOffset(self.current.load(Ordering::SeqCst))
    }

    fn advance(&self) {
        self.current.fetch_add(1, Ordering::SeqCst);
    }

    fn reset_to(&self, offset: LogOffset) {
        self.current.store(offset.0, Ordering::SeqCst);
    }

    // ── Savepoint bookkeeping ────────────────────────────────────────

    /// Issue a savepoint named after the current counter value. Does not
    /// advance the counter.
    fn issue_savepoint(&self, tx: &WriteTx) -> Result<LogOffset, StorageError> {
        let offset = self.head_offset();
        tx.savepoint(offset)?;
        Ok(offset)
    }

    /// Store `offset` back into the counter and discard every statement
    /// executed after its savepoint.
    fn rollback_to_tx(&self, tx: &WriteTx, offset: LogOffset) -> Result<(), StorageError> {
        self.reset_to(offset);
        tx.rollback_to(offset)
    }

    // ── Dispatch ─────────────────────────────────────────────────────

    /// Execute the queries in `req`, pool the request and persist any
    /// change to the underlying storage.
    pub fn query(&self, req: &Request) -> Result<(Arc<QueryTracker>, Response), StateError> {
        self.query_with(&Interrupt::new(), req)
    }

    /// [`State::query`] with a cancellation handle threaded into each
    /// per-query execution.
    pub fn query_with(
        &self,
        interrupt: &Interrupt,
        req: &Request,
    ) -> Result<(Arc<QueryTracker>, Response), StateError> {
        self.ensure_open()?;
        match req.header.query_type {
            QueryType::Read => self.read(interrupt, req),
            QueryType::Write => self.write(interrupt, req),
            QueryType::Invalid => Err(StateError::InvalidRequest),
        }
    }

    /// Replay a write log from a peer to replicate storage state.
    ///
    /// Read requests are ignored: reads are not replicated, and whether
    /// one would have failed here is unknowable without replaying it, so
    /// failed reads stay in the local pool until the next block producing
    /// cycle surfaces them.
    pub fn replay(&self, req: &Request, resp: &Response) -> Result<(), StateError> {
        self.replay_with(&Interrupt::new(), req, resp)
    }

    /// [`State::replay`] with a cancellation handle.
    pub fn replay_with(
        &self,
        interrupt: &Interrupt,
        req: &Request,
        resp: &Response,
    ) -> Result<(), StateError> {
        self.ensure_open()?;
        match req.header.query_type {
            QueryType::Read => Ok(()),
            QueryType::Write => self.replay_write(interrupt, req, resp),
            QueryType::Invalid => Err(StateError::InvalidRequest),
        }
    }

    // ── Read path ────────────────────────────────────────────────────

    fn read(
        &self,
        interrupt: &Interrupt,
        req: &Request,
    ) -> Result<(Arc<QueryTracker>, Response), StateError> {
        if self.has_schema_change.load(Ordering::SeqCst) {
            self.read_in_tx(interrupt, req)
        } else {
            self.read_dirty(interrupt, req)
        }
    }

    fn read_single<R>(
        interrupt: &Interrupt,
        query: &Query,
        run: R,
    ) -> Result<QueryOutput, StorageError>
    where
        R: FnOnce(&str, &[osprey_common::types::SqlValue]) -> Result<QueryOutput, StorageError>,
    {
        interrupt.check()?;
        let translated = translate(&query.pattern, &query.args)?;
        run(translated.sql, translated.args)
    }

    /// Fast path: a short read transaction on a pooled dirty-reader
    /// connection. Bypasses the writer lock entirely.
    fn read_dirty(
        &self,
        interrupt: &Interrupt,
        req: &Request,
    ) -> Result<(Arc<QueryTracker>, Response), StateError> {
        let offset = self.head_offset();
        let tx = self.storage.begin_dirty_read().map_err(StateError::Storage)?;
        let mut output = QueryOutput::default();
        for (index, query) in req.queries.iter().enumerate() {
            match Self::read_single(interrupt, query, |sql, args| tx.query(sql, args)) {
                Ok(out) => output = out,
                Err(source) => {
                    self.core.write().pool.set_failed(req);
                    if interrupt.is_interrupted() {
                        tracing::warn!(
                            request_id = req.header.request_id,
                            offset = %offset,
                            dirty_read = true,
                            "read query canceled"
                        );
                    }
                    return Err(StateError::QueryFailed { index, source });
                }
            }
        }
        Ok(self.build_read_response(req, offset, output))
    }

    /// Fallback path while uncommitted DDL is pending: run the queries on
    /// the write transaction under the exclusive lock, then roll back to
    /// the snapshot unconditionally.
    fn read_in_tx(
        &self,
        interrupt: &Interrupt,
        req: &Request,
    ) -> Result<(Arc<QueryTracker>, Response), StateError> {
        let mut core = self.core.write();
        let offset = self.head_offset();
        let mut output = QueryOutput::default();
        let mut failure: Option<(usize, StorageError)> = None;
        {
            let tx = core.tx()?;
            tx.savepoint(offset).map_err(StateError::Storage)?;
            for (index, query) in req.queries.iter().enumerate() {
                match Self::read_single(interrupt, query, |sql, args| tx.query(sql, args)) {
                    Ok(out) => output = out,
                    Err(source) => {
                        failure = Some((index, source));
                        break;
                    }
                }
            }
            // The snapshot is discarded no matter how the loop ended.
            if let Err(err) = self.rollback_to_tx(tx, offset) {
                tracing::error!(offset = %offset, error = %err, "fallback read rollback failed");
                return Err(StateError::Storage(err));
            }
        }
        if let Some((index, source)) = failure {
            core.pool.set_failed(req);
            if interrupt.is_interrupted() {
                tracing::warn!(
                    request_id = req.header.request_id,
                    offset = %offset,
                    dirty_read = false,
                    "read query canceled"
                );
            }
            return Err(StateError::QueryFailed { index, source });
        }
        Ok(self.build_read_response(req, offset, output))
    }

    fn build_read_response(
        &self,
        req: &Request,
        offset: LogOffset,
        output: QueryOutput,
    ) -> (Arc<QueryTracker>, Response) {
        let resp = Response {
            header: ResponseHeader {
                request: req.header.clone(),
                request_digest: req.digest(),
                node_id: self.node_id,
                timestamp_us: now_unix_us(),
                row_count: output.rows.len() as u64,
                log_offset: offset,
                affected_rows: 0,
                last_insert_id: 0,
            },
            payload: ResponsePayload {
                columns: output.columns,
                decl_types: output.decl_types,
                rows: output
                    .rows
                    .into_iter()
                    .map(|values| ResponseRow { values })
                    .collect(),
            },
        };
        let tracker = Arc::new(QueryTracker {
            req: req.clone(),
            resp: None,
        });
        (tracker, resp)
    }

    // ── Write path ───────────────────────────────────────────────────

    /// Execute one statement inside the write transaction, raising the
    /// schema-change flag for DDL and advancing the log counter on
    /// success.
    fn write_single(
        &self,
        interrupt: &Interrupt,
        tx: &WriteTx,
        query: &Query,
    ) -> Result<ExecOutcome, StorageError> {
        interrupt.check()?;
        let translated = translate(&query.pattern, &query.args)?;
        let outcome = tx.exec(translated.sql, translated.args)?;
        if translated.contains_ddl {
            self.has_schema_change.store(true, Ordering::SeqCst);
        }
        self.advance();
        Ok(outcome)
    }

    fn write(
        &self,
        interrupt: &Interrupt,
        req: &Request,
    ) -> Result<(Arc<QueryTracker>, Response), StateError> {
        if req.queries.is_empty() {
            return Err(StateError::InvalidRequest);
        }
        let started = Instant::now();
        let mut core = self.core.write();
        let savepoint = self.head_offset();
        let mut total_affected = 0i64;
        let mut last_insert_id = 0i64;
        let mut failure: Option<(usize, StorageError)> = None;
        {
            let tx = core.tx()?;
            for (index, query) in req.queries.iter().enumerate() {
                match self.write_single(interrupt, tx, query) {
                    Ok(outcome) => {
                        total_affected += outcome.affected_rows;
                        last_insert_id = outcome.last_insert_id;
                    }
                    Err(source) => {
                        failure = Some((index, source));
                        break;
                    }
                }
            }
            if failure.is_none() {
                // Name the new head so the next request has a rollback
                // fence.
                if let Err(source) = self.issue_savepoint(tx) {
                    failure = Some((req.queries.len(), source));
                }
            }
            if failure.is_some() {
                if let Err(err) = self.rollback_to_tx(tx, savepoint) {
                    tracing::error!(offset = %savepoint, error = %err, "write rollback failed");
                }
            }
        }
        if let Some((index, source)) = failure {
            core.pool.set_failed(req);
            drop(core);
            self.record_write(savepoint, req.queries.len(), 0, started, WriteOutcome::Failed);
            if interrupt.is_interrupted() {
                tracing::warn!(
                    request_id = req.header.request_id,
                    offset = %savepoint,
                    "write query canceled"
                );
            }
            return Err(if index < req.queries.len() {
                StateError::QueryFailed { index, source }
            } else {
                StateError::Storage(source)
            });
        }

        let resp = Response {
            header: ResponseHeader {
                request: req.header.clone(),
                request_digest: req.digest(),
                node_id: self.node_id,
                timestamp_us: now_unix_us(),
                row_count: 0,
                log_offset: savepoint,
                affected_rows: total_affected,
                last_insert_id,
            },
            payload: ResponsePayload::default(),
        };
        let tracker = Arc::new(QueryTracker {
            req: req.clone(),
            resp: Some(resp.clone()),
        });
        core.pool.remove_failed(req);
        core.pool.enqueue(savepoint, Arc::clone(&tracker));
        drop(core);
        self.record_write(
            savepoint,
            req.queries.len(),
            total_affected,
            started,
            WriteOutcome::Applied,
        );
        tracing::debug!(
            offset = %savepoint,
            queries = req.queries.len(),
            affected = total_affected,
            "write applied"
        );
        Ok((tracker, resp))
    }

    // ── Replay path ──────────────────────────────────────────────────

    fn replay_write(
        &self,
        interrupt: &Interrupt,
        req: &Request,
        resp: &Response,
    ) -> Result<(), StateError> {
        let started = Instant::now();
        let mut core = self.core.write();
        let savepoint = self.head_offset();
        let replaying = resp.header.log_offset;
        if replaying > savepoint {
            return Err(StateError::MissingParent {
                local: savepoint,
                replaying,
            });
        }
        if replaying < savepoint {
            return Err(StateError::QueryConflict {
                local: savepoint,
                replaying,
            });
        }
        let mut total_affected = 0i64;
        let mut failure: Option<(usize, StorageError)> = None;
        {
            let tx = core.tx()?;
            for (index, query) in req.queries.iter().enumerate() {
                match self.write_single(interrupt, tx, query) {
                    Ok(outcome) => total_affected += outcome.affected_rows,
                    Err(source) => {
                        failure = Some((index, source));
                        break;
                    }
                }
            }
            if failure.is_none() {
                if let Err(source) = self.issue_savepoint(tx) {
                    failure = Some((req.queries.len(), source));
                }
            }
            if failure.is_some() {
                if let Err(err) = self.rollback_to_tx(tx, savepoint) {
                    tracing::error!(offset = %savepoint, error = %err, "replay rollback failed");
                }
            }
        }
        if let Some((index, source)) = failure {
            drop(core);
            self.record_write(savepoint, req.queries.len(), 0, started, WriteOutcome::Failed);
            return Err(if index < req.queries.len() {
                StateError::QueryFailed { index, source }
            } else {
                StateError::Storage(source)
            });
        }
        let tracker = Arc::new(QueryTracker {
            req: req.clone(),
            resp: Some(resp.clone()),
        });
        core.pool.remove_failed(req);
        core.pool.enqueue(savepoint, tracker);
        drop(core);
        self.record_write(
            savepoint,
            req.queries.len(),
            total_affected,
            started,
            WriteOutcome::Replayed,
        );
        tracing::debug!(offset = %savepoint, "write replayed");
        Ok(())
    }

    // ── Block committer ──────────────────────────────────────────────

    /// Reconcile a finalized block against the pool and advance the
    /// committed prefix. Skips entries already applied locally (verified
    /// by content digest) and replays the missing ones.
    pub fn replay_block(&self, block: &Block) -> Result<(), StateError> {
        self.replay_block_with(&Interrupt::new(), block)
    }

    /// [`State::replay_block`] with a cancellation handle.
    pub fn replay_block_with(&self, interrupt: &Interrupt, block: &Block) -> Result<(), StateError> {
        self.ensure_open()?;
        let mut core = self.core.write();
        if block.query_txs.is_empty() {
            for req in &block.failed_reqs {
                core.pool.remove_failed(req);
            }
            return Ok(());
        }

        let mut last_savepoint = LogOffset::MIN;
        for (entry, query_tx) in block.query_txs.iter().enumerate() {
            let offset = query_tx.response.log_offset;
            let head = self.head_offset();
            last_savepoint = offset;
            if offset > head {
                return Err(StateError::MissingParent {
                    local: head,
                    replaying: offset,
                });
            }
            // Match and skip an already-pooled write.
            if offset < head {
                if !core.pool.matches(offset, &query_tx.request) {
                    return Err(StateError::QueryConflict {
                        local: head,
                        replaying: offset,
                    });
                }
                continue;
            }
            match query_tx.request.header.query_type {
                QueryType::Write => {}
                QueryType::Read => {
                    tracing::debug!(entry, offset = %offset, "skipping read entry in block");
                    continue;
                }
                QueryType::Invalid => return Err(StateError::InvalidRequest),
            }

            let started = Instant::now();
            let mut total_affected = 0i64;
            let mut failure: Option<(usize, StorageError)> = None;
            {
                let tx = core.tx()?;
                for (index, query) in query_tx.request.queries.iter().enumerate() {
                    match self.write_single(interrupt, tx, query) {
                        Ok(outcome) => total_affected += outcome.affected_rows,
                        Err(source) => {
                            failure = Some((index, source));
                            break;
                        }
                    }
                }
                if failure.is_none() {
                    if let Err(source) = self.issue_savepoint(tx) {
                        failure = Some((query_tx.request.queries.len(), source));
                    }
                }
                if failure.is_some() {
                    if let Err(err) = self.rollback_to_tx(tx, offset) {
                        tracing::error!(offset = %offset, error = %err, "block replay rollback failed");
                    }
                }
            }
            if let Some((index, source)) = failure {
                tracing::error!(entry, query = index, offset = %offset, "block replay aborted");
                return Err(if index < query_tx.request.queries.len() {
                    StateError::QueryFailed { index, source }
                } else {
                    StateError::Storage(source)
                });
            }
            let tracker = Arc::new(QueryTracker {
                req: query_tx.request.clone(),
                resp: Some(Response {
                    header: query_tx.response.clone(),
                    payload: ResponsePayload::default(),
                }),
            });
            core.pool.remove_failed(&query_tx.request);
            core.pool.enqueue(offset, tracker);
            self.record_write(
                offset,
                query_tx.request.queries.len(),
                total_affected,
                started,
                WriteOutcome::Replayed,
            );
        }

        // Purge failed requests the block producer already reported.
        for req in &block.failed_reqs {
            core.pool.remove_failed(req);
        }

        // Finalization test: no extra locally applied writes past the
        // block's tail means the whole transaction is covered and can be
        // committed.
        let finalized = core.pool.match_last(last_savepoint);
        if finalized {
            self.commit_locked(&mut core)?;
        }
        {
            let tx = core.tx()?;
            self.issue_savepoint(tx).map_err(StateError::Storage)?;
        }
        core.pool.truncate(last_savepoint);
        if !finalized {
            // Recovery point: the savepoint of the earliest unfinalized
            // tail write. Used as the rollback target on exit.
            core.cmpoint = core.pool.first_offset().unwrap_or_else(|| self.head_offset());
            tracing::debug!(
                cmpoint = %core.cmpoint,
                trackers = core.pool.stats().trackers,
                "commit point set, tail writes kept for next block"
            );
        }
        tracing::debug!(
            last = %last_savepoint,
            committed = finalized,
            "block reconciled"
        );
        Ok(())
    }

    // ── Commit / close ───────────────────────────────────────────────

    /// Commit the open transaction and begin a fresh one. A failure here
    /// is fatal: the state is left without an open transaction and must
    /// be recreated.
    fn commit_locked(&self, core: &mut StateCore) -> Result<(), StateError> {
        let tx = core.unc.take().ok_or(StateError::NotOpen)?;
        tx.commit().map_err(StateError::Storage)?;
        self.has_schema_change.store(false, Ordering::SeqCst);
        let fresh = self.storage.begin_write().map_err(StateError::Storage)?;
        core.unc = Some(fresh);
        let head = self.head_offset();
        core.origin = head;
        core.cmpoint = head;
        Ok(())
    }

    /// Commit the current transaction and hand back the pooled log for
    /// local block production. The pool is reset.
    pub fn commit_ex(&self) -> Result<(Vec<Request>, Vec<Arc<QueryTracker>>), StateError> {
        self.commit_ex_with(&Interrupt::new())
    }

    /// [`State::commit_ex`] with a cancellation handle.
    pub fn commit_ex_with(
        &self,
        interrupt: &Interrupt,
    ) -> Result<(Vec<Request>, Vec<Arc<QueryTracker>>), StateError> {
        self.ensure_open()?;
        interrupt.check()?;
        let mut core = self.core.write();
        self.commit_locked(&mut core)?;
        {
            let tx = core.tx()?;
            self.issue_savepoint(tx).map_err(StateError::Storage)?;
        }
        let pool = mem::replace(&mut core.pool, QueryPool::new());
        drop(core);
        let (failed, queries) = pool.into_parts();
        tracing::debug!(
            applied = queries.len(),
            failed = failed.len(),
            "transaction committed, pool drained"
        );
        Ok((failed, queries))
    }

    /// Commit (or roll back to the last commit point, then commit) any
    /// outstanding work and shut the engine down. Idempotent.
    pub fn close(&self, commit: bool) -> Result<(), StateError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut core = self.core.write();
        if let Some(tx) = core.unc.take() {
            if !commit {
                // Keep only work up to the last authorized commit point.
                let cmpoint = core.cmpoint;
                self.reset_to(cmpoint);
                tx.rollback_to(cmpoint).map_err(StateError::Storage)?;
            }
            tx.commit().map_err(StateError::Storage)?;
            self.has_schema_change.store(false, Ordering::SeqCst);
        }
        self.storage.close().map_err(StateError::Storage)?;
        tracing::info!(node = %self.node_id, commit, "state closed");
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), StateError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StateError::Closed)
        } else {
            Ok(())
        }
    }

    // ── Diagnostics ──────────────────────────────────────────────────

    /// Log and return pool occupancy.
    pub fn stat(&self, database_id: &DatabaseId) -> PoolStats {
        let stats = {
            let core = self.core.read();
            core.pool.stats()
        };
        tracing::info!(
            database_id = %database_id,
            pooled_failed_requests = stats.failed,
            pooled_query_trackers = stats.trackers,
            "state pool stats"
        );
        stats
    }

    /// Snapshot of recently applied writes.
    pub fn history_snapshot(&self) -> Vec<WriteRecord> {
        self.history.lock().snapshot()
    }

    /// Offsets of trackers currently pooled, ascending.
    pub fn pooled_offsets(&self) -> Vec<LogOffset> {
        self.core.read().pool.offsets()
    }

    /// Offset at which the current underlying transaction began.
    pub fn origin_offset(&self) -> LogOffset {
        self.core.read().origin
    }

    /// Most recent offset at which finalization authorized a commit.
    pub fn commit_point(&self) -> LogOffset {
        self.core.read().cmpoint
    }

    /// True while the open transaction contains uncommitted DDL.
    pub fn has_schema_change(&self) -> bool {
        self.has_schema_change.load(Ordering::SeqCst)
    }

    fn record_write(
        &self,
        log_offset: LogOffset,
        query_count: usize,
        affected_rows: i64,
        started: Instant,
        outcome: WriteOutcome,
    ) {
        let elapsed_us = started.elapsed().as_micros() as u64;
        let threshold_ms = self.config.slow_write_threshold_ms;
        if threshold_ms > 0 && elapsed_us >= threshold_ms * 1_000 {
            tracing::warn!(
                offset = %log_offset,
                elapsed_us,
                queries = query_count,
                "slow write application"
            );
        }
        self.history.lock().push(WriteRecord {
            log_offset,
            query_count,
            affected_rows,
            elapsed_us,
            outcome,
        });
    }
}
