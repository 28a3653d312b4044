//! Domain record entity, one row per candidate domain name.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::repositories::SqlValue;

/// Availability flag stored in the `avail` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    Yes,
    No,
    /// Never checked.
    Unknown,
}

impl Availability {
    /// Column value: `Y`, `N`, or NULL for unknown.
    pub fn as_flag(&self) -> Option<&'static str> {
        match self {
            Self::Yes => Some("Y"),
            Self::No => Some("N"),
            Self::Unknown => None,
        }
    }

    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag.map(str::trim) {
            Some("Y") => Self::Yes,
            Some("N") => Self::No,
            _ => Self::Unknown,
        }
    }
}

/// A candidate domain as persisted in a category table.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainRecord {
    pub domain: String,
    pub name: String,
    pub tld: String,
    pub available: Availability,
    pub expiry: Option<NaiveDateTime>,
    pub last_checked: Option<NaiveDateTime>,
}

impl DomainRecord {
    /// Creates a never-checked record for `name.tld`.
    pub fn new(name: impl Into<String>, tld: impl Into<String>) -> Self {
        let name = name.into();
        let tld = tld.into();
        Self {
            domain: format!("{name}.{tld}"),
            name,
            tld,
            available: Availability::Unknown,
            expiry: None,
            last_checked: None,
        }
    }

    /// Reads a `domain, name, tld, avail, expiry, updated` row. Blank text
    /// columns count as missing.
    ///
    /// Returns `None` for short rows and rows without a domain.
    pub fn from_row(row: &[SqlValue]) -> Option<Self> {
        let [domain, name, tld, avail, expiry, updated, ..] = row else {
            return None;
        };
        let text = |v: &SqlValue| {
            v.as_str()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Some(Self {
            domain: text(domain)?,
            name: text(name).unwrap_or_default(),
            tld: text(tld).unwrap_or_default(),
            available: Availability::from_flag(avail.as_str()),
            expiry: expiry.as_timestamp(),
            last_checked: updated.as_timestamp(),
        })
    }

    /// Parameters in column order: `domain`, `name`, `tld`, `avail`,
    /// `expiry`, `updated`. Empty names become NULL.
    pub fn to_params(&self) -> Vec<SqlValue> {
        let text = |s: &str| SqlValue::Text(Some(s.to_string()).filter(|s| !s.is_empty()));
        vec![
            text(&self.domain),
            text(&self.name),
            text(&self.tld),
            SqlValue::Text(self.available.as_flag().map(str::to_string)),
            SqlValue::Timestamp(self.expiry),
            SqlValue::Timestamp(self.last_checked),
        ]
    }

    /// Checks the record invariants: a taken domain carries an expiry, an
    /// unknown domain has never been checked.
    pub fn is_consistent(&self) -> bool {
        match self.available {
            Availability::No => self.expiry.is_some(),
            Availability::Unknown => self.last_checked.is_none(),
            Availability::Yes => true,
        }
    }
}

/// A verified lookup result staged for the batched `UPDATE`.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainUpdate {
    pub available: Availability,
    pub expiry: Option<NaiveDateTime>,
    pub checked_at: NaiveDateTime,
    pub domain: String,
}

impl DomainUpdate {
    /// Parameters in statement order: `avail`, `expiry`, `updated`, `domain`.
    pub fn into_params(self) -> Vec<SqlValue> {
        vec![
            SqlValue::Text(self.available.as_flag().map(str::to_string)),
            SqlValue::Timestamp(self.expiry),
            SqlValue::Timestamp(Some(self.checked_at)),
            SqlValue::Text(Some(self.domain)),
        ]
    }
}
