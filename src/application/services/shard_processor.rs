//! Processing of a single shard: look up every candidate, write results back
//! in batches.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::entities::{DomainUpdate, Shard, StalenessFilter};
use crate::domain::registry::RegistryClient;
use crate::domain::repositories::{SqlValue, Store};

/// Number of staged updates written per batch.
pub const FLUSH_BATCH_SIZE: usize = 40;

/// Summary of one processed shard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardReport {
    pub shard: String,
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    /// Updates handed to the store.
    pub updated: usize,
    pub flushes: usize,
}

impl ShardReport {
    /// Candidates not yet looked up.
    pub fn left(&self) -> usize {
        self.total.saturating_sub(self.processed)
    }

    /// Share of candidates looked up, rounded to one decimal. An empty shard
    /// is complete.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.processed as f64 / self.total as f64 * 1000.0).round() / 10.0
        }
    }
}

/// Runs shards against one registry client.
///
/// Candidates are looked up one after another; there is no concurrency inside
/// a shard. Failed lookups are counted and never written.
pub struct ShardProcessor {
    store: Arc<dyn Store>,
    client: Arc<dyn RegistryClient>,
    lookup_retry_limit: u32,
    worker: String,
}

impl ShardProcessor {
    pub fn new(
        store: Arc<dyn Store>,
        client: Arc<dyn RegistryClient>,
        lookup_retry_limit: u32,
        worker: impl Into<String>,
    ) -> Self {
        Self {
            store,
            client,
            lookup_retry_limit,
            worker: worker.into(),
        }
    }

    pub fn worker(&self) -> &str {
        &self.worker
    }

    pub async fn process(&self, shard: &Shard) -> ShardReport {
        let key = shard.key();
        let mut report = ShardReport {
            shard: key.clone(),
            ..ShardReport::default()
        };

        let domains = self.fetch_candidates(shard).await;
        report.total = domains.len();

        if domains.is_empty() {
            tracing::info!(worker = %self.worker, shard = %key, "nothing to check");
            return report;
        }

        tracing::info!(
            worker = %self.worker,
            shard = %key,
            protocol = %self.client.protocol(),
            total = report.total,
            "shard started"
        );

        let update_sql = format!(
            "UPDATE {} SET avail = $1, expiry = $2, updated = $3 WHERE domain = $4",
            shard.table
        );
        let mut staged: Vec<DomainUpdate> = Vec::with_capacity(FLUSH_BATCH_SIZE);

        for domain in &domains {
            let outcome = self.client.lookup(domain, self.lookup_retry_limit).await;
            report.processed += 1;
            metrics::counter!("bulkdns_lookups_total", "protocol" => self.client.protocol().to_string())
                .increment(1);

            match outcome.to_update() {
                Some(update) => staged.push(update),
                None => {
                    report.failed += 1;
                    metrics::counter!("bulkdns_lookup_failures_total").increment(1);
                    tracing::debug!(
                        worker = %self.worker,
                        domain = %domain,
                        error_kind = ?outcome.error_kind,
                        retries = outcome.retries_used,
                        "lookup failed"
                    );
                }
            }

            let left = report.left();
            let batch_full = left > 0 && staged.len() >= FLUSH_BATCH_SIZE;
            let shard_done = left == 0 && !staged.is_empty();

            if batch_full || shard_done {
                report.updated += staged.len();
                self.flush(&update_sql, std::mem::take(&mut staged)).await;
                report.flushes += 1;
                self.log_progress(&report);
            }
        }

        tracing::info!(
            worker = %self.worker,
            shard = %key,
            percent = report.percent(),
            processed = report.processed,
            total = report.total,
            failed = report.failed,
            left = report.left(),
            flushes = report.flushes,
            "shard finished"
        );

        report
    }

    /// Domain names of the shard's candidate rows, in store order.
    async fn fetch_candidates(&self, shard: &Shard) -> Vec<String> {
        let filter = StalenessFilter::now(shard.mode);
        let mut params = filter.params();

        let mut sql = format!(
            "SELECT name, tld FROM {} WHERE {}",
            shard.table,
            filter.condition(1)
        );
        if let Some(prefix) = &shard.prefix {
            params.push(SqlValue::text(prefix.as_str()));
            sql.push_str(&format!(
                " AND substr(name, 1, {}) = ${}",
                shard.prefix_len(),
                params.len()
            ));
        }

        self.store
            .run_one(&sql, params)
            .await
            .into_iter()
            .filter_map(|row| match (row.first()?.as_str(), row.get(1)?.as_str()) {
                (Some(name), Some(tld)) => Some(format!("{name}.{tld}")),
                _ => None,
            })
            .collect()
    }

    async fn flush(&self, sql: &str, updates: Vec<DomainUpdate>) {
        let rows: Vec<Vec<SqlValue>> = updates.into_iter().map(DomainUpdate::into_params).collect();
        self.store.run_batch(sql, rows).await;
        metrics::counter!("bulkdns_flushes_total").increment(1);
    }

    fn log_progress(&self, report: &ShardReport) {
        tracing::info!(
            worker = %self.worker,
            shard = %report.shard,
            percent = report.percent(),
            processed = report.processed,
            total = report.total,
            failed = report.failed,
            left = report.left(),
            "batch flushed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{QueryOutcome, RegistryAnswer, ScanMode};
    use crate::domain::registry::{MockRegistryClient, Protocol};
    use crate::domain::repositories::MockStore;
    use crate::error::LookupErrorKind;
    use chrono::Utc;
    use std::sync::Mutex;

    fn candidate_rows(n: usize) -> Vec<Vec<SqlValue>> {
        (0..n)
            .map(|i| vec![SqlValue::text(format!("a{i}")), SqlValue::text("com")])
            .collect()
    }

    fn available_client() -> MockRegistryClient {
        let mut client = MockRegistryClient::new();
        client.expect_protocol().return_const(Protocol::Whois);
        client.expect_lookup().returning(|domain, _| {
            QueryOutcome::success(domain, RegistryAnswer::Available, Utc::now().naive_utc(), 0)
        });
        client
    }

    #[tokio::test]
    async fn test_85_successes_flush_40_40_5() {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let recorded = batches.clone();

        let mut store = MockStore::new();
        store
            .expect_run_one()
            .withf(|sql, params| {
                sql.starts_with("SELECT name, tld FROM three_letter_com")
                    && sql.ends_with("AND substr(name, 1, 1) = $3")
                    && params.last() == Some(&SqlValue::text("a"))
            })
            .times(1)
            .returning(|_, _| candidate_rows(85));
        store
            .expect_run_batch()
            .withf(|sql, _| {
                sql == "UPDATE three_letter_com SET avail = $1, expiry = $2, updated = $3 WHERE domain = $4"
            })
            .times(3)
            .returning(move |_, rows| {
                recorded.lock().unwrap().push(rows.len());
                Vec::new()
            });

        let processor = ShardProcessor::new(Arc::new(store), Arc::new(available_client()), 10, "w0");
        let shard = Shard::new("three_letter_com", Some("a".to_string()), ScanMode::Expiring);
        let report = processor.process(&shard).await;

        assert_eq!(*batches.lock().unwrap(), vec![40, 40, 5]);
        assert_eq!(report.processed, 85);
        assert_eq!(report.updated, 85);
        assert_eq!(report.flushes, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(report.left(), 0);
        assert_eq!(report.percent(), 100.0);
    }

    #[test]
    fn test_report_progress() {
        let report = ShardReport {
            shard: "three_letter_com:a".to_string(),
            total: 85,
            processed: 40,
            ..Default::default()
        };

        assert_eq!(report.left(), 45);
        assert_eq!(report.percent(), 47.1);
        assert_eq!(ShardReport::default().percent(), 100.0);
        assert_eq!(ShardReport::default().left(), 0);
    }

    #[tokio::test]
    async fn test_empty_shard_writes_nothing() {
        let mut store = MockStore::new();
        store.expect_run_one().times(1).returning(|_, _| Vec::new());
        store.expect_run_batch().times(0);

        let mut client = MockRegistryClient::new();
        client.expect_lookup().times(0);

        let processor = ShardProcessor::new(Arc::new(store), Arc::new(client), 10, "w0");
        let report = processor
            .process(&Shard::new("two_digit_com", None, ScanMode::Recheck))
            .await;

        assert_eq!(report.total, 0);
        assert_eq!(report.flushes, 0);
    }

    #[tokio::test]
    async fn test_failures_are_counted_not_written() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let recorded = written.clone();

        let mut store = MockStore::new();
        store
            .expect_run_one()
            .times(1)
            .returning(|_, _| candidate_rows(3));
        store.expect_run_batch().times(1).returning(move |_, rows| {
            recorded.lock().unwrap().extend(rows);
            Vec::new()
        });

        let mut client = MockRegistryClient::new();
        client.expect_protocol().return_const(Protocol::Rdap);
        client.expect_lookup().returning(|domain, retry_limit| {
            if domain == "a1.com" {
                QueryOutcome::failure(domain, LookupErrorKind::CommandTimeout, retry_limit)
            } else {
                QueryOutcome::success(domain, RegistryAnswer::Available, Utc::now().naive_utc(), 0)
            }
        });

        let processor = ShardProcessor::new(Arc::new(store), Arc::new(client), 2, "w1");
        let report = processor
            .process(&Shard::new("two_digit_com", None, ScanMode::Expiring))
            .await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.updated, 2);
        let domains: Vec<_> = written
            .lock()
            .unwrap()
            .iter()
            .map(|row| row[3].as_str().unwrap().to_string())
            .collect();
        assert_eq!(domains, ["a0.com", "a2.com"]);
    }

    #[tokio::test]
    async fn test_all_failed_never_flushes() {
        let mut store = MockStore::new();
        store
            .expect_run_one()
            .times(1)
            .returning(|_, _| candidate_rows(2));
        store.expect_run_batch().times(0);

        let mut client = MockRegistryClient::new();
        client.expect_protocol().return_const(Protocol::Whois);
        client
            .expect_lookup()
            .times(2)
            .returning(|domain, _| QueryOutcome::failure(domain, LookupErrorKind::QuotaExceeded, 10));

        let processor = ShardProcessor::new(Arc::new(store), Arc::new(client), 10, "w0");
        let report = processor
            .process(&Shard::new("two_digit_com", None, ScanMode::Expiring))
            .await;

        assert_eq!(report.failed, 2);
        assert_eq!(report.flushes, 0);
    }
}
