//! Core domain entities of the scanner.
//!
//! - [`DomainRecord`] - A candidate domain row
//! - [`Shard`] - A disjoint unit of scan work
//! - [`QueryOutcome`] - The normalized result of one registry lookup
//!
//! Entities are plain data; the only logic they carry is the invariant checks
//! and conversions between them.

pub mod domain_record;
pub mod outcome;
pub mod shard;

pub use domain_record::{Availability, DomainRecord, DomainUpdate};
pub use outcome::{QueryOutcome, RegistryAnswer, STATUS_FAILED, STATUS_OK};
pub use shard::{
    EXPIRY_WINDOW_DAYS, RECHECK_AFTER_DAYS, ScanMode, Shard, StalenessFilter,
    expiry_window_end, validate_table_name,
};
