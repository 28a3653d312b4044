//! Partitioning of a scan into disjoint shards.

use std::sync::Arc;

use crate::domain::entities::{ScanMode, Shard, StalenessFilter, validate_table_name};
use crate::domain::repositories::Store;
use crate::error::ScanError;

/// Prefix length used to split a table, chosen by how many names the table's
/// category can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixTier {
    /// The whole table is one shard.
    Whole,
    Chars(usize),
}

impl PrefixTier {
    pub fn len(&self) -> usize {
        match self {
            Self::Whole => 0,
            Self::Chars(n) => *n,
        }
    }
}

/// Static category to tier mapping. Unknown categories get the finest split.
pub fn tier_for_category(category: &str) -> PrefixTier {
    match category {
        "one_digit" | "one_letter" | "two_digit" => PrefixTier::Whole,
        "two_letter" | "two_digit_letter" | "three_digit" | "three_letter" | "three_special" => {
            PrefixTier::Chars(1)
        }
        "three_digit_letter" | "four_digit" | "four_letter" | "four_digit_letter"
        | "four_special" => PrefixTier::Chars(2),
        _ => PrefixTier::Chars(3),
    }
}

/// Tier of a `<category>_<tld>` table.
pub fn tier_for_table(table: &str) -> PrefixTier {
    let category = table.rsplit_once('_').map_or(table, |(category, _)| category);
    tier_for_category(category)
}

/// Reads the store to split tables into shards.
pub struct ShardPlanner {
    store: Arc<dyn Store>,
}

impl ShardPlanner {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Produces the shards of `tables` that have work under `mode`.
    ///
    /// One aggregate query per table. Within a table, shards come smallest
    /// first (ties broken by prefix); tables keep the given order. A table
    /// with no matching rows yields no shard.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidTable`] before touching the store if any
    /// table name is not a plain identifier.
    pub async fn prepare_shards(
        &self,
        tables: &[String],
        mode: ScanMode,
    ) -> Result<Vec<Shard>, ScanError> {
        for table in tables {
            validate_table_name(table)?;
        }

        let filter = StalenessFilter::now(mode);
        let mut shards = Vec::new();

        for table in tables {
            let found = match tier_for_table(table) {
                PrefixTier::Whole => self.whole_table(table, &filter).await,
                PrefixTier::Chars(n) => self.by_prefix(table, n, &filter).await,
            };

            tracing::info!(table = %table, %mode, shards = found.len(), "table sharded");
            shards.extend(found);
        }

        tracing::info!(%mode, tables = tables.len(), shards = shards.len(), "scan prepared");
        Ok(shards)
    }

    async fn whole_table(&self, table: &str, filter: &StalenessFilter) -> Vec<Shard> {
        let sql = format!("SELECT count(*) FROM {table} WHERE {}", filter.condition(1));
        let rows = self.store.run_one(&sql, filter.params()).await;

        let matches = rows
            .first()
            .and_then(|row| row.first())
            .and_then(|v| v.as_i64())
            .unwrap_or(0);

        if matches > 0 {
            vec![Shard::new(table, None, filter.mode())]
        } else {
            Vec::new()
        }
    }

    async fn by_prefix(&self, table: &str, len: usize, filter: &StalenessFilter) -> Vec<Shard> {
        let prefix = format!("substr(name, 1, {len})");
        let sql = format!(
            "SELECT {prefix}, count(*) FROM {table} WHERE {} \
             GROUP BY {prefix} ORDER BY count(*) ASC, {prefix} ASC",
            filter.condition(1)
        );

        self.store
            .run_one(&sql, filter.params())
            .await
            .into_iter()
            .filter_map(|row| match row.first().and_then(|v| v.as_str()) {
                Some(p) if !p.is_empty() => Some(p.to_string()),
                _ => {
                    tracing::warn!(table, "skipping rows without a name");
                    None
                }
            })
            .map(|p| Shard::new(table, Some(p), filter.mode()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::{MockStore, SqlValue};

    fn prefix_row(prefix: &str, count: i64) -> Vec<SqlValue> {
        vec![SqlValue::text(prefix), SqlValue::Int(Some(count))]
    }

    #[test]
    fn test_tiers() {
        assert_eq!(tier_for_table("two_digit_com"), PrefixTier::Whole);
        assert_eq!(tier_for_table("two_letter_com"), PrefixTier::Chars(1));
        assert_eq!(tier_for_table("three_special_net"), PrefixTier::Chars(1));
        assert_eq!(tier_for_table("four_letter_com"), PrefixTier::Chars(2));
        assert_eq!(tier_for_table("five_letter_com"), PrefixTier::Chars(3));
        assert_eq!(tier_for_table("dictionary_com"), PrefixTier::Chars(3));
        assert_eq!(PrefixTier::Whole.len(), 0);
    }

    #[tokio::test]
    async fn test_prefix_shards_keep_query_order() {
        let mut store = MockStore::new();
        store
            .expect_run_one()
            .withf(|sql, params| {
                sql.contains("substr(name, 1, 1)")
                    && sql.contains("FROM three_letter_com")
                    && sql.contains("ORDER BY count(*) ASC")
                    && params.len() == 2
            })
            .times(1)
            .returning(|_, _| vec![prefix_row("q", 3), prefix_row("a", 40), prefix_row("b", 40)]);

        let planner = ShardPlanner::new(Arc::new(store));
        let shards = planner
            .prepare_shards(&["three_letter_com".to_string()], ScanMode::Expiring)
            .await
            .unwrap();

        let prefixes: Vec<_> = shards.iter().map(|s| s.prefix.clone().unwrap()).collect();
        assert_eq!(prefixes, ["q", "a", "b"]);
        assert!(shards.iter().all(|s| s.mode == ScanMode::Expiring));
        for (i, a) in shards.iter().enumerate() {
            for b in &shards[i + 1..] {
                assert!(a.is_disjoint_from(b));
            }
        }
    }

    #[tokio::test]
    async fn test_whole_table_existence_check() {
        let mut store = MockStore::new();
        store
            .expect_run_one()
            .withf(|sql, params| {
                sql.starts_with("SELECT count(*) FROM two_digit_com") && params.len() == 1
            })
            .times(1)
            .returning(|_, _| vec![vec![SqlValue::Int(Some(12))]]);
        store
            .expect_run_one()
            .withf(|sql, _| sql.starts_with("SELECT count(*) FROM one_letter_com"))
            .times(1)
            .returning(|_, _| vec![vec![SqlValue::Int(Some(0))]]);

        let planner = ShardPlanner::new(Arc::new(store));
        let shards = planner
            .prepare_shards(
                &["two_digit_com".to_string(), "one_letter_com".to_string()],
                ScanMode::Recheck,
            )
            .await
            .unwrap();

        assert_eq!(shards, vec![Shard::new("two_digit_com", None, ScanMode::Recheck)]);
    }

    #[tokio::test]
    async fn test_failed_query_yields_no_shards() {
        let mut store = MockStore::new();
        store.expect_run_one().times(1).returning(|_, _| Vec::new());

        let planner = ShardPlanner::new(Arc::new(store));
        let shards = planner
            .prepare_shards(&["four_letter_com".to_string()], ScanMode::Expiring)
            .await
            .unwrap();

        assert!(shards.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_table_rejected_before_queries() {
        let mut store = MockStore::new();
        store.expect_run_one().times(0);

        let planner = ShardPlanner::new(Arc::new(store));
        let result = planner
            .prepare_shards(
                &["two_letter_com".to_string(), "x;--".to_string()],
                ScanMode::Expiring,
            )
            .await;

        assert!(matches!(result, Err(ScanError::InvalidTable(_))));
    }
}
