//! Normalized result of one registry lookup.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::domain_record::{Availability, DomainUpdate};
use crate::error::LookupErrorKind;

/// Status code of a successful lookup.
pub const STATUS_OK: i32 = 0;

/// Status code of a lookup that failed after exhausting its retries.
pub const STATUS_FAILED: i32 = -1;

/// What a registry said about a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryAnswer {
    /// No record exists.
    Available,
    /// A record exists and expires at the given time.
    Registered { expiry: NaiveDateTime },
}

/// Outcome exchanged between a registry client and the shard processor.
///
/// Never persisted as such; successful outcomes become [`DomainUpdate`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub domain: String,
    pub available: Availability,
    pub expiry: Option<NaiveDateTime>,
    /// Set only on a definitive answer.
    pub checked_at: Option<NaiveDateTime>,
    pub status_code: i32,
    pub error_kind: Option<LookupErrorKind>,
    pub retries_used: u32,
}

impl QueryOutcome {
    pub fn success(
        domain: impl Into<String>,
        answer: RegistryAnswer,
        checked_at: NaiveDateTime,
        retries_used: u32,
    ) -> Self {
        let (available, expiry) = match answer {
            RegistryAnswer::Available => (Availability::Yes, None),
            RegistryAnswer::Registered { expiry } => (Availability::No, Some(expiry)),
        };

        Self {
            domain: domain.into(),
            available,
            expiry,
            checked_at: Some(checked_at),
            status_code: STATUS_OK,
            error_kind: None,
            retries_used,
        }
    }

    pub fn failure(domain: impl Into<String>, kind: LookupErrorKind, retries_used: u32) -> Self {
        Self {
            domain: domain.into(),
            available: Availability::Unknown,
            expiry: None,
            checked_at: None,
            status_code: STATUS_FAILED,
            error_kind: Some(kind),
            retries_used,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == STATUS_OK
    }

    /// Converts a successful outcome into a staged update.
    ///
    /// Returns `None` for failures, which must never reach the store.
    pub fn to_update(&self) -> Option<DomainUpdate> {
        if !self.is_success() {
            return None;
        }
        let checked_at = self.checked_at?;

        Some(DomainUpdate {
            available: self.available,
            expiry: self.expiry,
            checked_at,
            domain: self.domain.clone(),
        })
    }
}
