//! Finalized block contents consumed by the state engine.

use serde::{Deserialize, Serialize};

use crate::request::Request;
use crate::response::ResponseHeader;

/// One finalized write: the request together with the response header its
/// origin node produced for it (carrying the original log offset).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryTx {
    pub request: Request,
    pub response: ResponseHeader,
}

/// A finalized, ordered list of write requests plus the failed requests
/// the block producer is purging from peer pools.
///
/// `query_txs` must be ordered by `response.log_offset` ascending; that is
/// the producer's contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Block {
    pub query_txs: Vec<QueryTx>,
    pub failed_reqs: Vec<Request>,
}
