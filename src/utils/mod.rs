//! Helpers shared across layers.
//!
//! - [`retry`] - Bounded retry state machine and delay schedules
//! - [`db_error`] - Transient vs. fatal classification of database errors

pub mod db_error;
pub mod retry;
