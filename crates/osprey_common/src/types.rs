use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Unique identifier for a cluster node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct NodeId(pub u64);

/// Identifier of a hosted database instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct DatabaseId(pub String);

/// Position in the write log.
///
/// A log offset doubles as the name of the savepoint a write was applied
/// at: a response carrying offset `n` means the request executed right
/// after `SAVEPOINT "n"`, so replaying the same request from that offset
/// reproduces the post-request state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct LogOffset(pub u64);

impl LogOffset {
    pub const MIN: LogOffset = LogOffset(0);

    pub fn next(self) -> LogOffset {
        LogOffset(self.0 + 1)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

impl fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "db:{}", self.0)
    }
}

impl fmt::Display for LogOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "off:{}", self.0)
    }
}

/// A single scalar value in SQLite's type system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Append a canonical byte encoding of this value to `out`.
    ///
    /// Tag byte followed by a fixed-width or length-prefixed payload, so
    /// distinct values never collide and the encoding is stable across
    /// nodes. Used for request digesting.
    pub fn encode_canonical(&self, out: &mut Vec<u8>) {
        match self {
            SqlValue::Null => out.push(0x00),
            SqlValue::Integer(v) => {
                out.push(0x01);
                out.extend_from_slice(&v.to_le_bytes());
            }
            SqlValue::Real(v) => {
                out.push(0x02);
                out.extend_from_slice(&v.to_bits().to_le_bytes());
            }
            SqlValue::Text(v) => {
                out.push(0x03);
                out.extend_from_slice(&(v.len() as u64).to_le_bytes());
                out.extend_from_slice(v.as_bytes());
            }
            SqlValue::Blob(v) => {
                out.push(0x04);
                out.extend_from_slice(&(v.len() as u64).to_le_bytes());
                out.extend_from_slice(v);
            }
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(v)
    }
}

/// Wall-clock timestamp in microseconds since the Unix epoch.
pub fn now_unix_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
