//! Statement vetting and classification ahead of execution.
//!
//! The engine controls transaction scope itself, so statements that would
//! alter it (BEGIN, COMMIT, SAVEPOINT, ...) are rejected before they
//! reach the backend. DDL is flagged because uncommitted schema changes
//! are invisible to the dirty-read connections and force reads onto the
//! write transaction until the next commit.

use osprey_common::error::StorageError;
use osprey_common::types::SqlValue;

/// A vetted statement ready for execution.
#[derive(Debug, Clone, Copy)]
pub struct Translated<'a> {
    pub contains_ddl: bool,
    pub sql: &'a str,
    pub args: &'a [SqlValue],
}

/// Keywords that change the schema inside the open transaction.
const DDL_KEYWORDS: &[&str] = &["CREATE", "ALTER", "DROP", "REINDEX"];

/// Keywords that would escape the engine's savepoint discipline.
const FORBIDDEN_KEYWORDS: &[&str] = &[
    "BEGIN", "COMMIT", "END", "ROLLBACK", "SAVEPOINT", "RELEASE", "ATTACH", "DETACH", "VACUUM",
    "PRAGMA",
];

/// Classify and vet a statement; argument binding is positional and
/// passes through untouched.
pub fn translate<'a>(
    pattern: &'a str,
    args: &'a [SqlValue],
) -> Result<Translated<'a>, StorageError> {
    let keyword = leading_keyword(pattern).ok_or(StorageError::EmptyStatement)?;
    if FORBIDDEN_KEYWORDS
        .iter()
        .any(|k| keyword.eq_ignore_ascii_case(k))
    {
        return Err(StorageError::ForbiddenStatement(
            keyword.to_ascii_uppercase(),
        ));
    }
    let contains_ddl = DDL_KEYWORDS.iter().any(|k| keyword.eq_ignore_ascii_case(k));
    Ok(Translated {
        contains_ddl,
        sql: pattern,
        args,
    })
}

/// First keyword of the statement, skipping whitespace and `--` / `/* */`
/// comments.
fn leading_keyword(sql: &str) -> Option<&str> {
    let mut rest = sql;
    loop {
        rest = rest.trim_start();
        if let Some(stripped) = rest.strip_prefix("--") {
            rest = match stripped.find('\n') {
                Some(pos) => &stripped[pos + 1..],
                None => "",
            };
            continue;
        }
        if let Some(stripped) = rest.strip_prefix("/*") {
            rest = match stripped.find("*/") {
                Some(pos) => &stripped[pos + 2..],
                None => "",
            };
            continue;
        }
        break;
    }
    let end = rest
        .char_indices()
        .find(|(_, c)| !c.is_ascii_alphabetic())
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    if end == 0 {
        None
    } else {
        Some(&rest[..end])
    }
}
