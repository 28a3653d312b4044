//! Store contract shared by the SQLite and PostgreSQL backends.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::error::ScanError;

/// A bound parameter or a decoded column value.
///
/// Parameter variants are typed even when empty so PostgreSQL can infer the
/// parameter type of a NULL.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// A NULL read back from the store.
    Null,
    Int(Option<i64>),
    Text(Option<String>),
    Timestamp(Option<NaiveDateTime>),
}

impl SqlValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(Some(value.into()))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(Some(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => *v,
            _ => None,
        }
    }

    /// Timestamp columns, including the text form SQLite hands back.
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Timestamp(v) => *v,
            Self::Text(Some(v)) => ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(v.trim(), f).ok()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(
            self,
            Self::Null | Self::Int(None) | Self::Text(None) | Self::Timestamp(None)
        )
    }
}

/// One result row, columns in select order.
pub type Row = Vec<SqlValue>;

/// Which backend a store talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Postgres,
}

impl FromStr for Backend {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            _ => Err(ScanError::UnknownBackend(s.to_string())),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite => f.write_str("sqlite"),
            Self::Postgres => f.write_str("postgres"),
        }
    }
}

/// Resilient statement execution.
///
/// Every call acquires its own connection and releases it before returning,
/// so concurrent callers never share a connection or a transaction.
/// Statements use numbered placeholders (`$1`, `$2`, ...) on both backends.
///
/// Calls never fail: transient errors are retried with a fixed backoff,
/// non-retryable errors stop immediately, and a call that still fails is
/// logged and yields an empty row set.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::SqliteStore`] - embedded file store
/// - [`crate::infrastructure::persistence::PgStore`] - networked PostgreSQL store
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Store: Send + Sync {
    /// Runs a statement without parameters.
    async fn run_query(&self, sql: &str) -> Vec<Row>;

    /// Runs a parameterized statement once.
    async fn run_one(&self, sql: &str, params: Vec<SqlValue>) -> Vec<Row>;

    /// Runs a parameterized statement once per parameter row, all rows in one
    /// transaction.
    async fn run_batch(&self, sql: &str, rows: Vec<Vec<SqlValue>>) -> Vec<Row>;

    fn backend(&self) -> Backend;
}
