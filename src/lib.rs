//! # BulkDNS
//!
//! Bulk domain availability scanner. Candidate domains live in one table per
//! category and TLD (`three_letter_com`, ...); a scan checks every due row
//! against a WHOIS or RDAP registry and writes the answers back in batches.
//!
//! ## Architecture
//!
//! - **Domain Layer** ([`domain`]) - Records, shards, outcomes and the
//!   [`Store`](domain::repositories::Store) / [`RegistryClient`](domain::registry::RegistryClient) traits
//! - **Application Layer** ([`application`]) - Shard planning, shard processing
//!   and the execution strategies
//! - **Infrastructure Layer** ([`infrastructure`]) - SQLite and PostgreSQL
//!   stores, WHOIS and RDAP clients
//!
//! ## Quick Start
//!
//! ```bash
//! export DB_TYPE="sqlite"
//! export SQLITE_PATH="./domain.sqlite3"
//!
//! # Create the tables and fill them with candidates
//! cargo run --bin admin -- init --tld com --seed two_letter three_letter
//!
//! # Check every never-checked or soon-expiring domain
//! cargo run -- scan --tables two_letter,three_letter --tld com --strategy thread
//! ```
//!
//! ## Configuration
//!
//! Settings are loaded from environment variables via [`config::Config`].
//! See [`config`] module for available options.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod telemetry;
pub mod utils;

pub use error::{LookupError, ScanError, StoreError};

/// Commonly used types for external consumers.
///
/// Re-exports frequently used types to simplify imports for library users
/// and integration tests.
pub mod prelude {
    pub use crate::application::execution::{
        CancelPolicy, ScanContext, ScanRequest, ScanSummary, Shutdown, Strategy, WorkerPool,
        run_scan,
    };
    pub use crate::application::services::{ShardPlanner, ShardProcessor, ShardReport};
    pub use crate::domain::entities::{
        Availability, DomainRecord, QueryOutcome, RegistryAnswer, ScanMode, Shard,
    };
    pub use crate::domain::registry::{Protocol, RegistryClient};
    pub use crate::domain::repositories::{Backend, SqlValue, Store};
    pub use crate::error::{LookupError, LookupErrorKind, ScanError};
}
