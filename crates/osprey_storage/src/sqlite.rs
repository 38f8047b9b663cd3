//! SQLite storage: one serialized writer connection plus a bounded pool
//! of reader connections for dirty reads.
//!
//! The writer connection carries one long-running `BEGIN IMMEDIATE`
//! transaction managed through [`WriteTx`]; individual writes are fenced
//! with named savepoints so each request can be rolled back on its own.
//! Readers run on separate pooled connections in WAL mode and therefore
//! see only committed state: a dirty read never observes the writer's
//! open transaction and never blocks it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{Value, ValueRef};
use rusqlite::Connection;

use osprey_common::config::StorageConfig;
use osprey_common::error::StorageError;
use osprey_common::types::{LogOffset, SqlValue};

/// Map a rusqlite error into the storage error taxonomy.
pub(crate) fn sqlite_err(err: rusqlite::Error) -> StorageError {
    StorageError::Sqlite(err.to_string())
}

fn to_sql_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(v) => Value::Integer(*v),
        SqlValue::Real(v) => Value::Real(*v),
        SqlValue::Text(v) => Value::Text(v.clone()),
        SqlValue::Blob(v) => Value::Blob(v.clone()),
    }
}

fn from_value_ref(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(v) => SqlValue::Integer(v),
        ValueRef::Real(v) => SqlValue::Real(v),
        ValueRef::Text(v) => SqlValue::Text(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Blob(v) => SqlValue::Blob(v.to_vec()),
    }
}

/// Outcome of a single write statement.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecOutcome {
    pub affected_rows: i64,
    pub last_insert_id: i64,
}

/// Materialized result set of a single query.
#[derive(Debug, Clone, Default)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub decl_types: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

fn run_query(conn: &Connection, sql: &str, args: &[SqlValue]) -> Result<QueryOutput, StorageError> {
    let mut stmt = conn.prepare_cached(sql).map_err(sqlite_err)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let decl_types: Vec<String> = stmt
        .columns()
        .iter()
        .map(|c| c.decl_type().unwrap_or("").to_string())
        .collect();
    let count = columns.len();
    let mut rows = stmt
        .query(rusqlite::params_from_iter(args.iter().map(to_sql_value)))
        .map_err(sqlite_err)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(sqlite_err)? {
        let mut values = Vec::with_capacity(count);
        for i in 0..count {
            values.push(from_value_ref(row.get_ref(i).map_err(sqlite_err)?));
        }
        out.push(values);
    }
    Ok(QueryOutput {
        columns,
        decl_types,
        rows: out,
    })
}

/// SQLite-backed storage with one writer and pooled dirty readers.
pub struct SqliteStorage {
    writer: Arc<Mutex<Connection>>,
    readers: Pool<SqliteConnectionManager>,
    write_tx_open: Arc<AtomicBool>,
    path: PathBuf,
}

impl SqliteStorage {
    /// Open (or create) the database at `path` and prepare both
    /// connection roles.
    pub fn open(path: impl AsRef<Path>, config: &StorageConfig) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let writer = Connection::open(&path).map_err(sqlite_err)?;
        let busy = Duration::from_millis(config.busy_timeout_ms);
        writer.busy_timeout(busy).map_err(sqlite_err)?;
        if config.wal {
            writer
                .pragma_update(None, "journal_mode", "WAL")
                .map_err(sqlite_err)?;
        }
        writer
            .pragma_update(None, "synchronous", config.synchronous.as_str())
            .map_err(sqlite_err)?;
        writer
            .pragma_update(None, "cache_size", format!("-{}", config.cache_size_kib))
            .map_err(sqlite_err)?;

        let manager = SqliteConnectionManager::file(&path).with_init(move |conn| {
            conn.busy_timeout(busy)?;
            // Readers must never write, not even by accident.
            conn.pragma_update(None, "query_only", "ON")?;
            Ok(())
        });
        let readers = Pool::builder()
            .max_size(config.read_pool_size)
            .build(manager)
            .map_err(|e| StorageError::Pool(e.to_string()))?;

        tracing::debug!(
            path = %path.display(),
            readers = config.read_pool_size,
            wal = config.wal,
            "storage opened"
        );
        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
            readers,
            write_tx_open: Arc::new(AtomicBool::new(false)),
            path,
        })
    }

    /// Begin the long-running write transaction. At most one may be open
    /// at a time.
    pub fn begin_write(&self) -> Result<WriteTx, StorageError> {
        if self.write_tx_open.swap(true, Ordering::SeqCst) {
            return Err(StorageError::WriteTxActive);
        }
        let begun = {
            let conn = self.writer.lock();
            conn.execute_batch("BEGIN IMMEDIATE").map_err(sqlite_err)
        };
        if let Err(err) = begun {
            self.write_tx_open.store(false, Ordering::SeqCst);
            return Err(err);
        }
        Ok(WriteTx {
            conn: Arc::clone(&self.writer),
            open_flag: Arc::clone(&self.write_tx_open),
            finished: false,
        })
    }

    /// Open a short dirty-read transaction on a pooled reader connection.
    pub fn begin_dirty_read(&self) -> Result<ReadTx, StorageError> {
        let conn = self
            .readers
            .get()
            .map_err(|e| StorageError::Pool(e.to_string()))?;
        conn.execute_batch("BEGIN DEFERRED").map_err(sqlite_err)?;
        Ok(ReadTx { conn })
    }

    /// Flush the WAL back into the main database file. Best-effort: a
    /// busy checkpoint is not an error.
    pub fn close(&self) -> Result<(), StorageError> {
        let conn = self.writer.lock();
        let _ = conn.pragma_update(None, "wal_checkpoint", "PASSIVE");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Handle over the storage's single open write transaction.
///
/// Dropping the handle without committing rolls the transaction back.
pub struct WriteTx {
    conn: Arc<Mutex<Connection>>,
    open_flag: Arc<AtomicBool>,
    finished: bool,
}

impl WriteTx {
    /// Execute a write statement, returning affected rows and the last
    /// insert rowid.
    pub fn exec(&self, sql: &str, args: &[SqlValue]) -> Result<ExecOutcome, StorageError> {
        let conn = self.conn.lock();
        let affected = {
            let mut stmt = conn.prepare_cached(sql).map_err(sqlite_err)?;
            stmt.execute(rusqlite::params_from_iter(args.iter().map(to_sql_value)))
                .map_err(sqlite_err)?
        };
        Ok(ExecOutcome {
            affected_rows: affected as i64,
            last_insert_id: conn.last_insert_rowid(),
        })
    }

    /// Run a read query inside the write transaction (fallback read path
    /// when uncommitted DDL poisons dirty reads).
    pub fn query(&self, sql: &str, args: &[SqlValue]) -> Result<QueryOutput, StorageError> {
        let conn = self.conn.lock();
        run_query(&conn, sql, args)
    }

    /// Issue a savepoint named after `offset`.
    pub fn savepoint(&self, offset: LogOffset) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute_batch(&format!("SAVEPOINT \"{}\"", offset.0))
            .map_err(sqlite_err)
    }

    /// Roll back to the named savepoint, discarding every statement
    /// executed after it while keeping the transaction open.
    pub fn rollback_to(&self, offset: LogOffset) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute_batch(&format!("ROLLBACK TO \"{}\"", offset.0))
            .map_err(sqlite_err)
    }

    /// Commit the transaction, consuming the handle.
    pub fn commit(mut self) -> Result<(), StorageError> {
        self.finished = true;
        let committed = {
            let conn = self.conn.lock();
            conn.execute_batch("COMMIT").map_err(sqlite_err)
        };
        self.open_flag.store(false, Ordering::SeqCst);
        committed
    }

    /// Roll the whole transaction back, consuming the handle.
    pub fn rollback(mut self) -> Result<(), StorageError> {
        self.finished = true;
        let rolled = {
            let conn = self.conn.lock();
            conn.execute_batch("ROLLBACK").map_err(sqlite_err)
        };
        self.open_flag.store(false, Ordering::SeqCst);
        rolled
    }
}

impl Drop for WriteTx {
    fn drop(&mut self) {
        if !self.finished {
            let conn = self.conn.lock();
            if let Err(err) = conn.execute_batch("ROLLBACK") {
                tracing::warn!(error = %err, "implicit write transaction rollback failed");
            }
            self.open_flag.store(false, Ordering::SeqCst);
        }
    }
}

/// A short-lived read transaction on a pooled reader connection.
///
/// Never commits: the transaction is rolled back when the handle drops,
/// returning the connection to the pool.
pub struct ReadTx {
    conn: PooledConnection<SqliteConnectionManager>,
}

impl ReadTx {
    pub fn query(&self, sql: &str, args: &[SqlValue]) -> Result<QueryOutput, StorageError> {
        run_query(&self.conn, sql, args)
    }
}

impl Drop for ReadTx {
    fn drop(&mut self) {
        let _ = self.conn.execute_batch("ROLLBACK");
    }
}
