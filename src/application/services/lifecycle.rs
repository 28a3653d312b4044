//! Dataset lifecycle between the live, archive and backup stores.
//!
//! - [`transfer`] moves taken domains between live and archive by expiry
//! - [`backup`] replaces a backup table with live plus archive
//! - [`import_names`] seeds a table from a word list, skipping archived names
//!
//! Every table keeps the same name in every store.

use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::domain::entities::{DomainRecord, expiry_window_end, validate_table_name};
use crate::domain::repositories::{Backend, SqlValue, Store};
use crate::error::ScanError;
use crate::infrastructure::persistence::{create_domain_table, seed_domain_table};

/// Rows per transaction when copying or deleting records.
pub const COPY_BATCH_SIZE: usize = 1000;

const RECORD_COLUMNS: &str = "domain, name, tld, avail, expiry, updated";

/// Direction of a [`transfer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transfer {
    /// Live to archive: taken domains expiring after the expiry window.
    Archive,
    /// Archive to live: taken domains expiring within the expiry window.
    Restore,
}

impl Transfer {
    fn condition(self) -> &'static str {
        match self {
            Self::Archive => "avail = 'N' AND expiry > $1",
            Self::Restore => "avail = 'N' AND expiry <= $1",
        }
    }
}

impl fmt::Display for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Archive => f.write_str("archive"),
            Self::Restore => f.write_str("restore"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub table: String,
    /// Rows in the source table before the move.
    pub source_rows: usize,
    pub selected: usize,
    /// Selected domains the destination already held.
    pub duplicates: usize,
    pub inserted: usize,
    /// Selected domains deleted from the source.
    pub removed: usize,
}

/// Moves the taken domains of `table` selected by `direction` from `from`
/// into `to`.
///
/// Domains the destination already holds are not copied again but still
/// leave the source. A domain is deleted from the source only once the
/// destination is seen to hold it.
///
/// # Errors
///
/// - [`ScanError::InvalidTable`] for names that are not plain identifiers
/// - [`ScanError::TableUnavailable`] if either table cannot be read
pub async fn transfer(
    from: &dyn Store,
    to: &dyn Store,
    table: &str,
    direction: Transfer,
    now: NaiveDateTime,
) -> Result<TransferReport, ScanError> {
    validate_table_name(table)?;
    create_domain_table(to, table).await?;

    let mut report = TransferReport {
        table: table.to_string(),
        source_rows: count_rows(from, table).await?,
        ..TransferReport::default()
    };
    if report.source_rows == 0 {
        tracing::warn!(table, %direction, "source table is empty");
        return Ok(report);
    }

    let selected: Vec<DomainRecord> = from
        .run_one(
            &format!(
                "SELECT {RECORD_COLUMNS} FROM {table} WHERE {}",
                direction.condition()
            ),
            vec![SqlValue::Timestamp(Some(expiry_window_end(now)))],
        )
        .await
        .iter()
        .filter_map(|row| DomainRecord::from_row(row))
        .collect();
    report.selected = selected.len();

    tracing::info!(
        table,
        %direction,
        percent = percent(report.selected, report.source_rows),
        selected = report.selected,
        total = report.source_rows,
        "records selected"
    );
    if selected.is_empty() {
        return Ok(report);
    }

    let held = domains_in(to, table).await;
    let (duplicates, fresh): (Vec<&DomainRecord>, Vec<&DomainRecord>) =
        selected.iter().partition(|r| held.contains(&r.domain));
    for record in &duplicates {
        tracing::warn!(table, domain = %record.domain, "already in destination, removing from source");
    }
    report.duplicates = duplicates.len();

    insert_records(to, table, fresh.iter().map(|r| r.to_params())).await;

    let held = domains_in(to, table).await;
    report.inserted = fresh.iter().filter(|r| held.contains(&r.domain)).count();

    let confirmed: Vec<&str> = selected
        .iter()
        .map(|r| r.domain.as_str())
        .filter(|d| held.contains(*d))
        .collect();
    let unconfirmed = selected.len() - confirmed.len();
    if unconfirmed > 0 {
        tracing::error!(table, unconfirmed, "records missing in destination, kept in source");
    }

    let delete_sql = format!("DELETE FROM {table} WHERE domain = $1");
    for chunk in confirmed.chunks(COPY_BATCH_SIZE) {
        let rows = chunk.iter().map(|d| vec![SqlValue::text(*d)]).collect();
        from.run_batch(&delete_sql, rows).await;
    }

    let left = domains_in(from, table).await;
    report.removed = confirmed.iter().filter(|d| !left.contains(**d)).count();

    tracing::info!(
        table,
        %direction,
        inserted = report.inserted,
        duplicates = report.duplicates,
        removed = report.removed,
        "transfer finished"
    );

    Ok(report)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackupReport {
    pub table: String,
    pub live_rows: usize,
    pub archive_rows: usize,
    /// Copied rows that break a record invariant.
    pub inconsistent: usize,
    /// Rows in the backup table afterwards.
    pub written: usize,
}

/// Replaces the copy of `table` in `target` with every record of `live`
/// and, if given, `archive`.
///
/// The backup is cleared only after both sources were read completely.
///
/// # Errors
///
/// - [`ScanError::InvalidTable`] for names that are not plain identifiers
/// - [`ScanError::TableUnavailable`] if a table cannot be read
/// - [`ScanError::IncompleteRead`] if a source returned fewer rows than it
///   counted
pub async fn backup(
    live: &dyn Store,
    archive: Option<&dyn Store>,
    target: &dyn Store,
    table: &str,
) -> Result<BackupReport, ScanError> {
    validate_table_name(table)?;
    create_domain_table(target, table).await?;

    let mut records = read_all(live, table).await?;
    let mut report = BackupReport {
        table: table.to_string(),
        live_rows: records.len(),
        ..BackupReport::default()
    };
    if let Some(archive) = archive {
        let archived = read_all(archive, table).await?;
        report.archive_rows = archived.len();
        records.extend(archived);
    }

    report.inconsistent = records.iter().filter(|r| !r.is_consistent()).count();
    if report.inconsistent > 0 {
        tracing::warn!(table, inconsistent = report.inconsistent, "copying inconsistent records");
    }

    match target.backend() {
        Backend::Sqlite => {
            target.run_query(&format!("DELETE FROM {table}")).await;
            target.run_query("VACUUM").await;
        }
        Backend::Postgres => {
            target.run_query(&format!("TRUNCATE {table}")).await;
        }
    }

    insert_records(target, table, records.iter().map(DomainRecord::to_params)).await;
    report.written = count_rows(target, table).await?;

    if report.written < report.live_rows + report.archive_rows {
        tracing::warn!(
            table,
            written = report.written,
            read = report.live_rows + report.archive_rows,
            "backup holds fewer rows than were read"
        );
    }
    tracing::info!(
        table,
        live = report.live_rows,
        archive = report.archive_rows,
        written = report.written,
        "backup finished"
    );

    Ok(report)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub table: String,
    /// Names handed to the store; names already in the table are kept as is.
    pub offered: usize,
    /// Names skipped because the archive already holds them.
    pub archived: usize,
}

/// Creates `table` in `live` and seeds it with `names`, leaving out names
/// the archive copy of the table already holds.
///
/// # Errors
///
/// - [`ScanError::InvalidTable`] for names that are not plain identifiers
/// - [`ScanError::TableUnavailable`] if the table cannot be created
pub async fn import_names(
    live: &dyn Store,
    archive: Option<&dyn Store>,
    table: &str,
    tld: &str,
    names: Vec<String>,
) -> Result<ImportReport, ScanError> {
    validate_table_name(table)?;
    create_domain_table(live, table).await?;

    let archived = match archive {
        Some(archive) => domains_in(archive, table).await,
        None => HashSet::new(),
    };
    let total = names.len();
    let fresh: Vec<String> = names
        .into_iter()
        .filter(|name| !archived.contains(&format!("{name}.{tld}")))
        .collect();

    let archived = total - fresh.len();
    if archived > 0 {
        tracing::info!(table, archived, "skipping archived names");
    }
    let offered = seed_domain_table(live, table, tld, fresh).await?;

    Ok(ImportReport {
        table: table.to_string(),
        offered,
        archived,
    })
}

/// `count(*)` of `table`; an empty answer means the store could not read it.
async fn count_rows(store: &dyn Store, table: &str) -> Result<usize, ScanError> {
    store
        .run_query(&format!("SELECT count(*) FROM {table}"))
        .await
        .first()
        .and_then(|row| row.first())
        .and_then(SqlValue::as_i64)
        .map(|n| usize::try_from(n).unwrap_or_default())
        .ok_or_else(|| ScanError::TableUnavailable(table.to_string()))
}

async fn domains_in(store: &dyn Store, table: &str) -> HashSet<String> {
    store
        .run_query(&format!("SELECT domain FROM {table}"))
        .await
        .iter()
        .filter_map(|row| row.first().and_then(SqlValue::as_str))
        .map(|d| d.trim().to_string())
        .collect()
}

async fn read_all(store: &dyn Store, table: &str) -> Result<Vec<DomainRecord>, ScanError> {
    let expected = count_rows(store, table).await?;
    let records: Vec<DomainRecord> = store
        .run_query(&format!("SELECT {RECORD_COLUMNS} FROM {table}"))
        .await
        .iter()
        .filter_map(|row| DomainRecord::from_row(row))
        .collect();

    if records.len() < expected {
        return Err(ScanError::IncompleteRead {
            table: table.to_string(),
            expected,
            read: records.len(),
        });
    }
    Ok(records)
}

async fn insert_records<I>(store: &dyn Store, table: &str, rows: I)
where
    I: IntoIterator<Item = Vec<SqlValue>>,
{
    let sql = format!(
        "INSERT INTO {table} ({RECORD_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (domain) DO NOTHING"
    );
    let rows: Vec<Vec<SqlValue>> = rows.into_iter().collect();

    for chunk in rows.chunks(COPY_BATCH_SIZE) {
        store.run_batch(&sql, chunk.to_vec()).await;
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 10000.0).round() / 100.0
}
