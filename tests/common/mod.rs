#![allow(dead_code)]

use async_trait::async_trait;
use bulkdns::application::services::ShardPlanner;
use bulkdns::domain::entities::{QueryOutcome, RegistryAnswer, ScanMode, Shard};
use bulkdns::domain::registry::{Protocol, RegistryClient};
use bulkdns::domain::repositories::{SqlValue, Store};
use bulkdns::error::LookupError;
use bulkdns::infrastructure::persistence::{
    SqliteStore, StoreRetryPolicy, create_domain_table, seed_domain_table,
};
use bulkdns::infrastructure::registry::{CommandOutput, CommandRunner};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// SQLite database file removed on drop.
pub struct TestDb {
    pub path: PathBuf,
    pub store: Arc<dyn Store>,
}

impl Drop for TestDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm", "-journal"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

pub fn create_test_db() -> TestDb {
    let path = std::env::temp_dir().join(format!("bulkdns-test-{}.sqlite3", rand::random::<u64>()));
    let store = SqliteStore::open(&path, 4, StoreRetryPolicy::new(2, Duration::from_millis(10)));

    TestDb {
        path,
        store: Arc::new(store),
    }
}

pub async fn create_test_table(store: &dyn Store, table: &str, tld: &str, names: Vec<String>) {
    create_domain_table(store, table).await.unwrap();
    seed_domain_table(store, table, tld, names).await.unwrap();
}

/// Seeds `three_letter_com` with ten shards of five rows, `a..` through
/// `j..`, and plans them.
pub async fn ten_shards(db: &TestDb) -> Vec<Shard> {
    let names = (b'a'..=b'j')
        .flat_map(|first| (0..5).map(move |i| format!("{}a{}", first as char, i)))
        .collect();
    create_test_table(db.store.as_ref(), "three_letter_com", "com", names).await;

    let shards = ShardPlanner::new(db.store.clone())
        .prepare_shards(&["three_letter_com".to_string()], ScanMode::Expiring)
        .await
        .unwrap();
    assert_eq!(shards.len(), 10);
    shards
}

/// `(domain, avail, expiry, updated)` of every row, ordered by domain.
pub async fn fetch_rows(store: &dyn Store, table: &str) -> Vec<(String, SqlValue, SqlValue, SqlValue)> {
    store
        .run_query(&format!(
            "SELECT domain, avail, expiry, updated FROM {table} ORDER BY domain"
        ))
        .await
        .into_iter()
        .map(|mut row| {
            let updated = row.pop().unwrap();
            let expiry = row.pop().unwrap();
            let avail = row.pop().unwrap();
            let domain = row.pop().unwrap().as_str().unwrap().to_string();
            (domain, avail, expiry, updated)
        })
        .collect()
}

pub async fn count_updated(store: &dyn Store, table: &str) -> i64 {
    store
        .run_query(&format!("SELECT count(*) FROM {table} WHERE updated IS NOT NULL"))
        .await[0][0]
        .as_i64()
        .unwrap()
}

/// WHOIS command that reports every domain as unregistered.
pub struct NoMatchWhois {
    pub calls: AtomicUsize,
}

impl NoMatchWhois {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CommandRunner for NoMatchWhois {
    async fn run(&self, _program: &str, args: &[String]) -> Result<CommandOutput, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CommandOutput {
            code: 0,
            stdout: format!("No match for domain \"{}\".\n", args[0].to_uppercase()),
            stderr: String::new(),
        })
    }
}

/// Registry client that answers "available" for the first `answer_first`
/// lookups, then notifies `stop`. With `hang` set, every later lookup never
/// returns; otherwise later lookups are slowed down so the stop is observed
/// before the current shard ends.
pub struct StoppingClient {
    pub lookups: AtomicUsize,
    pub answer_first: usize,
    pub hang: bool,
    pub stop: Arc<Notify>,
}

impl StoppingClient {
    pub fn new(answer_first: usize, hang: bool) -> Self {
        Self {
            lookups: AtomicUsize::new(0),
            answer_first,
            hang,
            stop: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl RegistryClient for StoppingClient {
    async fn lookup(&self, domain: &str, _retry_limit: u32) -> QueryOutcome {
        let n = self.lookups.fetch_add(1, Ordering::SeqCst) + 1;
        if n > self.answer_first {
            self.stop.notify_one();
            if self.hang {
                std::future::pending::<()>().await;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        QueryOutcome::success(domain, RegistryAnswer::Available, Utc::now().naive_utc(), 0)
    }

    fn protocol(&self) -> Protocol {
        Protocol::Whois
    }
}

/// Waits for `stop` to be notified.
pub async fn notified(stop: Arc<Notify>) {
    stop.notified().await;
}
