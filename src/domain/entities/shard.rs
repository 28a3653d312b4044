//! Shards: independent, disjoint units of scan work.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::repositories::SqlValue;
use crate::error::ScanError;

/// Domains expiring within this many days are due for a check.
pub const EXPIRY_WINDOW_DAYS: i64 = 30;

/// A checked domain is not looked at again for this many days.
pub const RECHECK_AFTER_DAYS: i64 = 7;

fn midnight(t: NaiveDateTime) -> NaiveDateTime {
    t.date().and_time(NaiveTime::MIN)
}

/// End of the expiry window seen from `now`: midnight,
/// [`EXPIRY_WINDOW_DAYS`] days ahead.
pub fn expiry_window_end(now: NaiveDateTime) -> NaiveDateTime {
    midnight(now + Duration::days(EXPIRY_WINDOW_DAYS))
}

/// Which rows a scan selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Never-checked rows, plus taken rows close to expiry that were not
    /// checked recently.
    Expiring,
    /// Available rows that were not checked recently.
    Recheck,
}

impl FromStr for ScanMode {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "expiring" => Ok(Self::Expiring),
            "recheck" => Ok(Self::Recheck),
            _ => Err(ScanError::UnknownScanMode(s.to_string())),
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expiring => f.write_str("expiring"),
            Self::Recheck => f.write_str("recheck"),
        }
    }
}

/// The staleness predicate of a [`ScanMode`], with its thresholds fixed at
/// construction time.
///
/// Thresholds are truncated to midnight so every query issued during one run
/// on the same day sees the same boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessFilter {
    mode: ScanMode,
    expiring_before: NaiveDateTime,
    checked_before: NaiveDateTime,
}

impl StalenessFilter {
    pub fn at(mode: ScanMode, now: NaiveDateTime) -> Self {
        Self {
            mode,
            expiring_before: expiry_window_end(now),
            checked_before: midnight(now - Duration::days(RECHECK_AFTER_DAYS)),
        }
    }

    pub fn now(mode: ScanMode) -> Self {
        Self::at(mode, Utc::now().naive_utc())
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    /// SQL condition with numbered placeholders starting at `$first`.
    pub fn condition(&self, first: usize) -> String {
        match self.mode {
            ScanMode::Expiring => format!(
                "(updated IS NULL OR (expiry <= ${} AND updated <= ${}))",
                first,
                first + 1
            ),
            ScanMode::Recheck => format!("(avail = 'Y' AND updated <= ${first})"),
        }
    }

    /// Values for the placeholders of [`Self::condition`], in order.
    pub fn params(&self) -> Vec<SqlValue> {
        match self.mode {
            ScanMode::Expiring => vec![
                SqlValue::Timestamp(Some(self.expiring_before)),
                SqlValue::Timestamp(Some(self.checked_before)),
            ],
            ScanMode::Recheck => vec![SqlValue::Timestamp(Some(self.checked_before))],
        }
    }
}

/// A unit of work: every row of `table` whose name starts with `prefix`
/// (every row when `prefix` is `None`) that matches the scan mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shard {
    pub table: String,
    pub prefix: Option<String>,
    pub mode: ScanMode,
}

impl Shard {
    pub fn new(table: impl Into<String>, prefix: Option<String>, mode: ScanMode) -> Self {
        Self {
            table: table.into(),
            prefix,
            mode,
        }
    }

    /// Short identifier used in log lines.
    pub fn key(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}", self.table, prefix),
            None => format!("{}/*", self.table),
        }
    }

    /// Number of leading name characters the shard is keyed on.
    pub fn prefix_len(&self) -> usize {
        self.prefix.as_deref().map_or(0, |p| p.chars().count())
    }

    /// Returns true if no row can belong to both shards.
    pub fn is_disjoint_from(&self, other: &Shard) -> bool {
        if self.table != other.table {
            return true;
        }
        match (&self.prefix, &other.prefix) {
            (Some(a), Some(b)) => !a.starts_with(b.as_str()) && !b.starts_with(a.as_str()),
            _ => false,
        }
    }
}

/// Table names are interpolated into statements, so only plain identifiers
/// are accepted.
pub fn validate_table_name(table: &str) -> Result<(), ScanError> {
    let valid = !table.is_empty()
        && table.len() <= 63
        && table
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(ScanError::InvalidTable(table.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 18)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_scan_mode_parse() {
        assert_eq!("expiring".parse::<ScanMode>().unwrap(), ScanMode::Expiring);
        assert_eq!("RECHECK".parse::<ScanMode>().unwrap(), ScanMode::Recheck);
        assert!(matches!(
            "weekly".parse::<ScanMode>(),
            Err(ScanError::UnknownScanMode(_))
        ));
    }

    #[test]
    fn test_expiring_thresholds_truncated_to_midnight() {
        let filter = StalenessFilter::at(ScanMode::Expiring, noon());
        let params = filter.params();

        let expiring = NaiveDate::from_ymd_opt(2026, 11, 17)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let checked = NaiveDate::from_ymd_opt(2026, 10, 11)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();

        assert_eq!(params, vec![
            SqlValue::Timestamp(Some(expiring)),
            SqlValue::Timestamp(Some(checked)),
        ]);
        assert_eq!(
            filter.condition(1),
            "(updated IS NULL OR (expiry <= $1 AND updated <= $2))"
        );
    }

    #[test]
    fn test_recheck_condition_numbering() {
        let filter = StalenessFilter::at(ScanMode::Recheck, noon());

        assert_eq!(filter.condition(2), "(avail = 'Y' AND updated <= $2)");
        assert_eq!(filter.params().len(), 1);
    }

    #[test]
    fn test_shard_disjointness() {
        let a = Shard::new("three_letter_com", Some("a".into()), ScanMode::Expiring);
        let b = Shard::new("three_letter_com", Some("b".into()), ScanMode::Expiring);
        let ab = Shard::new("three_letter_com", Some("ab".into()), ScanMode::Expiring);
        let whole = Shard::new("three_letter_com", None, ScanMode::Expiring);
        let other = Shard::new("four_letter_com", Some("a".into()), ScanMode::Expiring);

        assert!(a.is_disjoint_from(&b));
        assert!(!a.is_disjoint_from(&ab));
        assert!(!a.is_disjoint_from(&whole));
        assert!(a.is_disjoint_from(&other));
    }

    #[test]
    fn test_shard_key() {
        let shard = Shard::new("four_digit_com", Some("12".into()), ScanMode::Recheck);
        assert_eq!(shard.key(), "four_digit_com/12");
        assert_eq!(shard.prefix_len(), 2);

        let whole = Shard::new("two_digit_com", None, ScanMode::Recheck);
        assert_eq!(whole.key(), "two_digit_com/*");
        assert_eq!(whole.prefix_len(), 0);
    }

    #[test]
    fn test_validate_table_name() {
        assert!(validate_table_name("three_letter_com").is_ok());
        assert!(validate_table_name("three_letter_com; DROP TABLE x").is_err());
        assert!(validate_table_name("1abc").is_err());
        assert!(validate_table_name("").is_err());
    }
}
