#![allow(dead_code, unused_imports)]

pub use std::sync::Arc;

pub use osprey_common::block::{Block, QueryTx};
pub use osprey_common::config::{StateConfig, StorageConfig};
pub use osprey_common::error::{OspreyResult, StateError};
pub use osprey_common::request::{Query, QueryType, Request};
pub use osprey_common::response::Response;
pub use osprey_common::types::{DatabaseId, LogOffset, NodeId, SqlValue};
pub use osprey_state::State;
pub use osprey_storage::sqlite::SqliteStorage;

pub fn db() -> DatabaseId {
    DatabaseId("db0".to_string())
}

pub fn open_storage(dir: &tempfile::TempDir) -> Arc<SqliteStorage> {
    Arc::new(
        SqliteStorage::open(dir.path().join("osprey.db"), &StorageConfig::default())
            .expect("open storage"),
    )
}

/// State over a database where `t (v INTEGER)` is already committed.
pub fn setup_with_table(init: u64) -> (tempfile::TempDir, Arc<SqliteStorage>, State) {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = open_storage(&dir);
    let tx = storage.begin_write().expect("begin");
    tx.exec("CREATE TABLE t (v INTEGER)", &[]).expect("create");
    tx.commit().expect("commit");
    let mut state =
        State::new(NodeId(1), Arc::clone(&storage), StateConfig::default()).expect("new state");
    state.init_tx(LogOffset(init)).expect("init tx");
    (dir, storage, state)
}

/// State over an empty database.
pub fn setup(init: u64) -> (tempfile::TempDir, Arc<SqliteStorage>, State) {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = open_storage(&dir);
    let mut state =
        State::new(NodeId(1), Arc::clone(&storage), StateConfig::default()).expect("new state");
    state.init_tx(LogOffset(init)).expect("init tx");
    (dir, storage, state)
}

pub fn write_req(sql: &str) -> Request {
    Request::write(db(), NodeId(1), vec![Query::new(sql)])
}

pub fn read_req(sql: &str) -> Request {
    Request::read(db(), NodeId(1), vec![Query::new(sql)])
}

/// Block finalizing the given locally produced (request, response) pairs.
pub fn block_of(entries: &[(&Request, &Response)]) -> Block {
    Block {
        query_txs: entries
            .iter()
            .map(|(req, resp)| QueryTx {
                request: (*req).clone(),
                response: resp.header.clone(),
            })
            .collect(),
        failed_reqs: vec![],
    }
}

/// First cell of the first row, for `SELECT count(*)`-style probes.
pub fn single_cell(resp: &Response) -> &SqlValue {
    &resp.payload.rows[0].values[0]
}
