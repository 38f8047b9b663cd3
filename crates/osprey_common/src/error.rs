use thiserror::Error;

use crate::types::LogOffset;

/// Convenience alias for `Result<T, OspreyError>`.
pub type OspreyResult<T> = Result<T, OspreyError>;

/// Convenience alias for `Result<T, StateError>`.
pub type StateResult<T> = Result<T, StateError>;

/// Top-level error type that layer-specific errors convert into.
#[derive(Error, Debug)]
pub enum OspreyError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("state error: {0}")]
    State(#[from] StateError),
}

/// Storage layer errors: backend execution, connection pooling and
/// statement vetting.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(String),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("a write transaction is already open")]
    WriteTxActive,

    #[error("empty statement")]
    EmptyStatement,

    #[error("statement not allowed inside the managed transaction: {0}")]
    ForbiddenStatement(String),

    #[error("query interrupted")]
    Interrupted,

    #[error("query deadline exceeded")]
    DeadlineExceeded,
}

/// State engine errors.
///
/// Per-query failures are local: one request fails, others are
/// unaffected. `Storage` errors raised outside a per-query context
/// (commit, begin, savepoint bookkeeping) are fatal; callers should
/// `close(false)` and recreate the state.
#[derive(Error, Debug)]
pub enum StateError {
    /// The replayed offset is ahead of local state; earlier history must
    /// be synchronized first.
    #[error("missing parent: local state at {local}, replaying {replaying}")]
    MissingParent {
        local: LogOffset,
        replaying: LogOffset,
    },

    /// The replayed offset or content disagrees with what was applied
    /// locally. Irrecoverable without external reconciliation.
    #[error("query conflict: local state at {local}, replaying {replaying}")]
    QueryConflict {
        local: LogOffset,
        replaying: LogOffset,
    },

    #[error("invalid request type")]
    InvalidRequest,

    #[error("query at #{index} failed: {source}")]
    QueryFailed {
        index: usize,
        source: StorageError,
    },

    #[error("state is closed")]
    Closed,

    #[error("no open write transaction; state must be recreated")]
    NotOpen,

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
