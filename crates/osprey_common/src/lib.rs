pub mod block;
pub mod config;
pub mod error;
pub mod interrupt;
pub mod request;
pub mod response;
pub mod types;

pub use block::{Block, QueryTx};
pub use error::{OspreyError, OspreyResult, StateError, StorageError};
pub use interrupt::Interrupt;
pub use request::{Query, QueryType, Request, RequestDigest, RequestHeader};
pub use response::{Response, ResponseHeader, ResponsePayload, ResponseRow};
pub use types::{DatabaseId, LogOffset, NodeId, SqlValue};
