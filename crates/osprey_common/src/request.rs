//! Client request envelope: typed query batches with a content-digest
//! identity.
//!
//! Requests are compared across nodes (pool matching, failed-set purging)
//! by a SHA-256 digest over their identity fields and query contents, not
//! by pointer or by full structural equality.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{now_unix_us, DatabaseId, NodeId, SqlValue};

/// Global monotonic request id counter.
static GLOBAL_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a new unique request id.
pub fn next_request_id() -> u64 {
    GLOBAL_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

/// Classification of a request's queries. Dispatch key at the engine
/// entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryType {
    Read,
    Write,
    Invalid,
}

impl QueryType {
    fn digest_tag(self) -> u8 {
        match self {
            QueryType::Read => 0,
            QueryType::Write => 1,
            QueryType::Invalid => 2,
        }
    }
}

/// A statement pattern plus its ordered argument values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub pattern: String,
    pub args: Vec<SqlValue>,
}

impl Query {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(pattern: impl Into<String>, args: Vec<SqlValue>) -> Self {
        Self {
            pattern: pattern.into(),
            args,
        }
    }
}

/// Identifies the issuing node, target database and type of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestHeader {
    pub database_id: DatabaseId,
    pub node_id: NodeId,
    pub query_type: QueryType,
    pub request_id: u64,
    pub timestamp_us: u64,
}

/// Content digest identifying a request across nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestDigest(pub [u8; 32]);

impl fmt::Display for RequestDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// A batch of one or more queries sharing a single [`QueryType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub header: RequestHeader,
    pub queries: Vec<Query>,
}

impl Request {
    pub fn new(
        query_type: QueryType,
        database_id: DatabaseId,
        node_id: NodeId,
        queries: Vec<Query>,
    ) -> Self {
        Self {
            header: RequestHeader {
                database_id,
                node_id,
                query_type,
                request_id: next_request_id(),
                timestamp_us: now_unix_us(),
            },
            queries,
        }
    }

    pub fn read(database_id: DatabaseId, node_id: NodeId, queries: Vec<Query>) -> Self {
        Self::new(QueryType::Read, database_id, node_id, queries)
    }

    pub fn write(database_id: DatabaseId, node_id: NodeId, queries: Vec<Query>) -> Self {
        Self::new(QueryType::Write, database_id, node_id, queries)
    }

    /// SHA-256 content digest over the header identity fields and every
    /// query pattern and argument. The wall-clock timestamp is excluded so
    /// a request shipped to a peer digests identically there.
    pub fn digest(&self) -> RequestDigest {
        let mut hasher = Sha256::new();
        hasher.update(self.header.database_id.0.as_bytes());
        hasher.update(self.header.node_id.0.to_le_bytes());
        hasher.update([self.header.query_type.digest_tag()]);
        hasher.update(self.header.request_id.to_le_bytes());
        let mut buf = Vec::new();
        for query in &self.queries {
            hasher.update((query.pattern.len() as u64).to_le_bytes());
            hasher.update(query.pattern.as_bytes());
            hasher.update((query.args.len() as u64).to_le_bytes());
            for arg in &query.args {
                buf.clear();
                arg.encode_canonical(&mut buf);
                hasher.update(&buf);
            }
        }
        RequestDigest(hasher.finalize().into())
    }
}
