//! Backend error classification.
//!
//! Decides whether a failed statement is worth repeating. Integrity violations
//! and malformed statements are fatal; connectivity, locking and timeouts are
//! transient.

use sqlx::error::ErrorKind;
use sqlx::postgres::PgDatabaseError;

/// SQLSTATE classes that describe a temporary condition on the server.
const PG_TRANSIENT_CLASSES: &[&str] = &["08", "53", "57", "58"];

/// Individual SQLSTATE codes outside those classes that are still transient:
/// serialization failure, deadlock, lock not available.
const PG_TRANSIENT_CODES: &[&str] = &["40001", "40P01", "55P03"];

/// SQLite primary result codes: BUSY, LOCKED, NOMEM, IOERR, FULL, CANTOPEN, PROTOCOL.
const SQLITE_TRANSIENT_CODES: &[i32] = &[5, 6, 7, 10, 13, 14, 15];

pub fn is_retryable(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Protocol(_) => true,
        sqlx::Error::Database(db_err) => {
            if !matches!(db_err.kind(), ErrorKind::Other) {
                // unique, foreign key, not null and check violations
                return false;
            }

            let Some(code) = db_err.code() else {
                return false;
            };

            if db_err.try_downcast_ref::<PgDatabaseError>().is_some() {
                is_pg_transient(&code)
            } else {
                is_sqlite_transient(&code)
            }
        }
        _ => false,
    }
}

fn is_pg_transient(code: &str) -> bool {
    PG_TRANSIENT_CODES.contains(&code)
        || PG_TRANSIENT_CLASSES
            .iter()
            .any(|class| code.starts_with(class))
}

fn is_sqlite_transient(code: &str) -> bool {
    // sqlx reports the extended result code, the primary code is its low byte
    code.parse::<i32>()
        .map(|extended| SQLITE_TRANSIENT_CODES.contains(&(extended & 0xff)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pg_codes() {
        assert!(is_pg_transient("08006"));
        assert!(is_pg_transient("40P01"));
        assert!(is_pg_transient("57014"));
        assert!(!is_pg_transient("42601"));
        assert!(!is_pg_transient("23505"));
    }

    #[test]
    fn test_sqlite_codes() {
        assert!(is_sqlite_transient("5"));
        // SQLITE_BUSY_SNAPSHOT
        assert!(is_sqlite_transient("517"));
        assert!(is_sqlite_transient("6"));
        // SQLITE_ERROR, generic SQL error or missing table
        assert!(!is_sqlite_transient("1"));
        // SQLITE_CONSTRAINT_PRIMARYKEY
        assert!(!is_sqlite_transient("1555"));
    }

    #[test]
    fn test_driver_level_errors() {
        assert!(is_retryable(&sqlx::Error::PoolTimedOut));
        assert!(is_retryable(&sqlx::Error::Io(std::io::Error::other("reset"))));
        assert!(!is_retryable(&sqlx::Error::RowNotFound));
        assert!(!is_retryable(&sqlx::Error::ColumnNotFound("name".into())));
    }
}
