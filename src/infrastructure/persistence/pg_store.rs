//! PostgreSQL implementation of the store contract.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::Connection;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, Postgres};
use sqlx::query::Query;

use super::resilient::{StoreRetryPolicy, call_with_retry};
use super::rows::decode_row;
use crate::domain::repositories::{Backend, Row, SqlValue, Store};
use crate::error::ScanError;

/// Networked PostgreSQL store.
///
/// Connections are borrowed from a lazily filled pool for the duration of one
/// call. Connection failures surface per call and go through the retry policy.
pub struct PgStore {
    pool: PgPool,
    policy: StoreRetryPolicy,
}

impl PgStore {
    /// Creates a store for `database_url` without connecting yet.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Connect`] if the URL cannot be parsed.
    pub fn connect_lazy(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
        policy: StoreRetryPolicy,
    ) -> Result<Self, ScanError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(database_url)
            .map_err(ScanError::Connect)?;

        Ok(Self { pool, policy })
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
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[SqlValue],
) -> Query<'q, Postgres, PgArguments> {
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
impl Store for PgStore {
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
        Backend::Postgres
    }
}
