//! Domain table layout.

use crate::domain::entities::validate_table_name;
use crate::domain::repositories::{SqlValue, Store};
use crate::error::ScanError;

/// Candidate rows inserted per transaction when seeding a table.
pub const SEED_BATCH_SIZE: usize = 1000;

/// Table holding the candidates of one category for one TLD, e.g.
/// `three_letter_com`.
pub fn table_name(category: &str, tld: &str) -> String {
    format!("{category}_{tld}")
}

/// `CREATE TABLE` statement for a domain table. Valid on both backends.
pub fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\
         domain VARCHAR(300) PRIMARY KEY NOT NULL, \
         name VARCHAR(255), \
         tld VARCHAR(40), \
         avail CHARACTER(1), \
         expiry TIMESTAMP, \
         updated TIMESTAMP)"
    )
}

/// Creates the domain table if it does not exist yet.
///
/// The store swallows failures, so the table is read back after the DDL.
///
/// # Errors
///
/// - [`ScanError::InvalidTable`] for names that are not plain identifiers
/// - [`ScanError::TableUnavailable`] if the table cannot be read afterwards
pub async fn create_domain_table(store: &dyn Store, table: &str) -> Result<(), ScanError> {
    validate_table_name(table)?;
    store.run_query(&create_table_sql(table)).await;

    let rows = store
        .run_query(&format!("SELECT count(*) FROM {table}"))
        .await;
    let Some(count) = rows.first().and_then(|row| row.first()).and_then(SqlValue::as_i64) else {
        tracing::error!(table, "domain table missing after create");
        return Err(ScanError::TableUnavailable(table.to_string()));
    };

    tracing::info!(table, rows = count, "domain table ready");
    Ok(())
}

/// Inserts a never-checked row for every name in `names`. Names already in
/// the table are left untouched.
///
/// Returns the number of names offered to the store.
///
/// # Errors
///
/// Returns [`ScanError::InvalidTable`] for names that are not plain identifiers.
pub async fn seed_domain_table<I>(
    store: &dyn Store,
    table: &str,
    tld: &str,
    names: I,
) -> Result<usize, ScanError>
where
    I: IntoIterator<Item = String>,
{
    validate_table_name(table)?;

    let sql = format!(
        "INSERT INTO {table} (domain, name, tld) VALUES ($1, $2, $3) ON CONFLICT (domain) DO NOTHING"
    );
    let mut offered = 0;
    let mut batch = Vec::with_capacity(SEED_BATCH_SIZE);

    for name in names {
        batch.push(vec![
            SqlValue::text(format!("{name}.{tld}")),
            SqlValue::text(name),
            SqlValue::text(tld),
        ]);
        if batch.len() == SEED_BATCH_SIZE {
            offered += batch.len();
            store.run_batch(&sql, std::mem::take(&mut batch)).await;
            tracing::debug!(table, offered, "seed batch written");
        }
    }
    if !batch.is_empty() {
        offered += batch.len();
        store.run_batch(&sql, batch).await;
    }

    tracing::info!(table, offered, "domain table seeded");
    Ok(offered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::MockStore;

    #[test]
    fn test_table_name() {
        assert_eq!(table_name("three_letter", "com"), "three_letter_com");
    }

    #[tokio::test]
    async fn test_create_rejects_bad_name() {
        let mut store = MockStore::new();
        store.expect_run_query().times(0);

        let result = create_domain_table(&store, "x; DROP TABLE y").await;

        assert!(matches!(result, Err(ScanError::InvalidTable(_))));
    }

    #[tokio::test]
    async fn test_create_issues_ddl() {
        let mut store = MockStore::new();
        store
            .expect_run_query()
            .withf(|sql| sql.starts_with("CREATE TABLE IF NOT EXISTS two_letter_com ("))
            .times(1)
            .returning(|_| Vec::new());
        store
            .expect_run_query()
            .withf(|sql| sql == "SELECT count(*) FROM two_letter_com")
            .times(1)
            .returning(|_| vec![vec![SqlValue::Int(Some(0))]]);

        assert!(create_domain_table(&store, "two_letter_com").await.is_ok());
    }

    #[tokio::test]
    async fn test_create_reports_failed_ddl() {
        let mut store = MockStore::new();
        // Both the DDL and the read-back fail inside the store
        store.expect_run_query().times(2).returning(|_| Vec::new());

        let result = create_domain_table(&store, "two_letter_com").await;

        assert!(matches!(result, Err(ScanError::TableUnavailable(t)) if t == "two_letter_com"));
    }

    #[tokio::test]
    async fn test_seed_batches() {
        let mut store = MockStore::new();
        let mut seq = mockall::Sequence::new();
        store
            .expect_run_batch()
            .withf(|sql, rows| {
                sql.starts_with("INSERT INTO two_digit_com (domain, name, tld)")
                    && rows.len() == SEED_BATCH_SIZE
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Vec::new());
        store
            .expect_run_batch()
            .withf(|_, rows| {
                rows.len() == 5 && rows[0][0] == SqlValue::text("1000.com")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Vec::new());

        let names = (0..1005).map(|i| i.to_string());
        let offered = seed_domain_table(&store, "two_digit_com", "com", names)
            .await
            .unwrap();

        assert_eq!(offered, 1005);
    }
}
