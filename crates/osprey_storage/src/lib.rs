pub mod sqlite;
pub mod translate;

pub use sqlite::{ExecOutcome, QueryOutput, ReadTx, SqliteStorage, WriteTx};
pub use translate::{translate, Translated};
