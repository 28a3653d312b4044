//! Repository trait definitions for the domain layer.
//!
//! The scanner reads and writes domain tables through a single [`Store`]
//! contract. Implementations live in `crate::infrastructure::persistence`;
//! a mock is generated via `mockall` for unit tests.

pub mod store;

pub use store::{Backend, Row, SqlValue, Store};

#[cfg(test)]
pub use store::MockStore;
