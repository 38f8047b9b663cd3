//! Response envelope: execution metadata plus an optional row payload.

use serde::{Deserialize, Serialize};

use crate::request::{RequestDigest, RequestHeader};
use crate::types::{LogOffset, NodeId, SqlValue};

/// Execution metadata echoed back to the requester.
///
/// `log_offset` is the savepoint id the request was processed at; peers
/// and the block committer use it as the replay position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseHeader {
    /// Echo of the request header.
    pub request: RequestHeader,
    pub request_digest: RequestDigest,
    /// Node that produced this response.
    pub node_id: NodeId,
    pub timestamp_us: u64,
    pub row_count: u64,
    pub log_offset: LogOffset,
    pub affected_rows: i64,
    pub last_insert_id: i64,
}

/// One result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRow {
    pub values: Vec<SqlValue>,
}

/// Result set of a read request. Empty for writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResponsePayload {
    pub columns: Vec<String>,
    pub decl_types: Vec<String>,
    pub rows: Vec<ResponseRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub header: ResponseHeader,
    pub payload: ResponsePayload,
}
