//! Embedded single-file store.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::Connection;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use super::resilient::{StoreRetryPolicy, call_with_retry};
use super::rows::decode_row;
use crate::domain::repositories::{Backend, Row, SqlValue, Store};

/// How long SQLite waits on a locked database file before reporting BUSY.
const BUSY_TIMEOUT: Duration = Duration::from_secs(600);

/// SQLite store backed by one database file.
///
/// The pool is lazy: a connection is opened on first use, borrowed for the
/// duration of a single call and returned right after it.
pub struct SqliteStore {
    pool: SqlitePool,
    policy: StoreRetryPolicy,
}

impl SqliteStore {
    /// Opens (or creates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>, max_connections: u32, policy: StoreRetryPolicy) -> Self {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy_with(options);

        Self { pool, policy }
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;

        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&mut *conn)
            .await?;

        Ok(rows.iter().map(decode_row).collect())
    }

    async fn execute_batch(
        &self,
        sql: &str,
        rows: &[Vec<SqlValue>],
    ) -> Result<Vec<Row>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;
        let mut out = Vec::new();

        for params in rows {
            let fetched = bind_all(sqlx::query(sql), params)
                .fetch_all(&mut *tx)
                .await?;
            out.extend(fetched.iter().map(decode_row));
        }

        tx.commit().await?;
        Ok(out)
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[SqlValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.clone()),
            SqlValue::Timestamp(v) => query.bind(*v),
        };
    }
    query
}

#[async_trait]
impl Store for SqliteStore {
    async fn run_query(&self, sql: &str) -> Vec<Row> {
        call_with_retry(self.policy, sql, || self.execute(sql, &[])).await
    }

    async fn run_one(&self, sql: &str, params: Vec<SqlValue>) -> Vec<Row> {
        call_with_retry(self.policy, sql, || self.execute(sql, &params)).await
    }

    async fn run_batch(&self, sql: &str, rows: Vec<Vec<SqlValue>>) -> Vec<Row> {
        call_with_retry(self.policy, sql, || self.execute_batch(sql, &rows)).await
    }

    fn backend(&self) -> Backend {
        Backend::Sqlite
    }
}
