//! Store backends.
//!
//! Both backends implement [`Store`](crate::domain::repositories::Store) on top
//! of an SQLx pool and share the same retry policy.
//!
//! - [`SqliteStore`] - embedded single-file store
//! - [`PgStore`] - networked PostgreSQL store

pub mod pg_store;
pub mod resilient;
mod rows;
pub mod schema;
pub mod sqlite_store;

pub use pg_store::PgStore;
pub use resilient::StoreRetryPolicy;
pub use schema::{create_domain_table, create_table_sql, seed_domain_table, table_name};
pub use sqlite_store::SqliteStore;
