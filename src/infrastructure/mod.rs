//! Infrastructure layer for external integrations.
//!
//! This layer implements interfaces defined by the domain layer.
//!
//! # Modules
//!
//! - [`persistence`] - SQLite and PostgreSQL store implementations
//! - [`registry`] - WHOIS and RDAP clients

pub mod persistence;
pub mod registry;
