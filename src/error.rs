//! Error types shared across the scanner.
//!
//! Each layer owns one enum:
//!
//! - [`StoreError`] - backend failures, classified as transient or fatal
//! - [`LookupError`] - registry protocol failures, all of them retryable
//! - [`ScanError`] - configuration and orchestration failures that stop a run

use std::fmt;

use thiserror::Error;

/// Failure raised by a store backend for a single attempt.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connectivity, lock and timeout failures. Worth another attempt.
    #[error("transient database error: {0}")]
    Transient(#[source] sqlx::Error),

    /// Malformed statements and integrity violations. Retrying cannot help.
    #[error("non-retryable database error: {0}")]
    Fatal(#[source] sqlx::Error),
}

impl StoreError {
    /// Returns true if the failed attempt may succeed when repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if crate::utils::db_error::is_retryable(&e) {
            Self::Transient(e)
        } else {
            Self::Fatal(e)
        }
    }
}

/// Registry protocol error kinds.
///
/// The names double as the `error_kind` carried by a failed
/// [`QueryOutcome`](crate::domain::entities::QueryOutcome).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupErrorKind {
    PrivateRegistry,
    QuotaExceeded,
    CommandFailed,
    CommandTimeout,
    FailedParsing,
    UnknownTld,
    UnknownDateFormat,
    DecodeError,
}

impl LookupErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrivateRegistry => "WhoisPrivateRegistry",
            Self::QuotaExceeded => "WhoisQuotaExceeded",
            Self::CommandFailed => "CommandFailed",
            Self::CommandTimeout => "CommandTimeout",
            Self::FailedParsing => "FailedParsingOutput",
            Self::UnknownTld => "UnknownTld",
            Self::UnknownDateFormat => "UnknownDateFormat",
            Self::DecodeError => "DataDecodingError",
        }
    }
}

impl fmt::Display for LookupErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single failed registry query.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct LookupError {
    pub kind: LookupErrorKind,
    pub message: String,
}

impl LookupError {
    pub fn new(kind: LookupErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Errors that abort a scan run.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("unknown database type '{0}' (expected 'sqlite' or 'postgres')")]
    UnknownBackend(String),

    #[error("unknown protocol '{0}' (expected 'whois' or 'rdap')")]
    UnknownProtocol(String),

    #[error("unknown scan mode '{0}' (expected 'expiring' or 'recheck')")]
    UnknownScanMode(String),

    #[error("unknown execution strategy '{0}' (expected 'sequential', 'process' or 'thread')")]
    UnknownStrategy(String),

    #[error("invalid table name '{0}'")]
    InvalidTable(String),

    #[error("table '{0}' cannot be read")]
    TableUnavailable(String),

    #[error("read {read} of {expected} rows from '{table}'")]
    IncompleteRead {
        table: String,
        expected: usize,
        read: usize,
    },

    #[error("failed to connect to the database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("worker process error: {0}")]
    Worker(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
