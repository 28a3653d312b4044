//! Scan execution strategies.
//!
//! Every strategy first asks the [`ShardPlanner`] for shards and then runs one
//! [`ShardProcessor`](crate::application::services::ShardProcessor) pass per
//! shard:
//!
//! - [`Strategy::Sequential`] - one shard at a time on the calling task
//! - [`Strategy::Thread`] - a [`WorkerPool`] of in-process Tokio tasks
//! - [`Strategy::Process`] - a [`WorkerPool`] of child processes
//!
//! Cancellation is a [`Shutdown`] flag. The sequential strategy stops between
//! shards, the task pool drains in-flight shards, the process pool kills its
//! children.

pub mod pool;
pub mod process;
pub mod sequential;
pub mod shutdown;
pub mod thread;

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use pool::{CancelPolicy, ShardWorker, WorkerFactory, WorkerPool};
pub use process::{ProcessWorkerFactory, WorkerCommand, serve_shards};
pub use shutdown::Shutdown;
pub use thread::TaskWorkerFactory;

use crate::application::services::{ShardPlanner, ShardProcessor, ShardReport};
use crate::domain::entities::ScanMode;
use crate::domain::registry::RegistryClient;
use crate::domain::repositories::Store;
use crate::error::ScanError;
use crate::infrastructure::persistence::table_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Sequential,
    Process,
    Thread,
}

impl FromStr for Strategy {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" | "single" => Ok(Self::Sequential),
            "process" => Ok(Self::Process),
            "thread" => Ok(Self::Thread),
            _ => Err(ScanError::UnknownStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => f.write_str("sequential"),
            Self::Process => f.write_str("process"),
            Self::Thread => f.write_str("thread"),
        }
    }
}

/// What to scan and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub tables: Vec<String>,
    pub mode: ScanMode,
    pub strategy: Strategy,
}

impl ScanRequest {
    /// One `<category>_<tld>` table per category.
    pub fn for_categories(
        categories: &[String],
        tld: &str,
        mode: ScanMode,
        strategy: Strategy,
    ) -> Self {
        Self {
            tables: categories.iter().map(|c| table_name(c, tld)).collect(),
            mode,
            strategy,
        }
    }
}

/// Everything a scan needs besides the request.
pub struct ScanContext {
    pub store: Arc<dyn Store>,
    pub client: Arc<dyn RegistryClient>,
    pub lookup_retry_limit: u32,
    /// Required by [`Strategy::Process`] only.
    pub worker_command: Option<WorkerCommand>,
    /// Overrides the strategy's default pool size.
    pub pool_size: Option<usize>,
}

/// Totals of a finished or cancelled scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub shards: usize,
    pub completed: usize,
    pub failed_shards: usize,
    pub processed: usize,
    pub failed: usize,
    pub updated: usize,
    pub cancelled: bool,
}

impl ScanSummary {
    pub fn new(shards: usize) -> Self {
        Self {
            shards,
            ..Self::default()
        }
    }

    pub fn record(&mut self, shard: &str, result: Result<ShardReport, ScanError>) {
        match result {
            Ok(report) => {
                self.completed += 1;
                self.processed += report.processed;
                self.failed += report.failed;
                self.updated += report.updated;
            }
            Err(e) => {
                self.failed_shards += 1;
                tracing::debug!(shard, error = %e, "shard not completed");
            }
        }
    }
}

/// Plans and runs a scan until every shard is done or `shutdown` resolves.
///
/// # Errors
///
/// Returns an error for invalid table names, or for the process strategy
/// without a worker command. Failures inside shards never surface here.
pub async fn run_scan<F>(
    ctx: &ScanContext,
    request: &ScanRequest,
    shutdown: F,
) -> Result<ScanSummary, ScanError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let shutdown = Shutdown::on(shutdown);
    let protocol = ctx.client.protocol();

    let shards = ShardPlanner::new(ctx.store.clone())
        .prepare_shards(&request.tables, request.mode)
        .await?;

    tracing::info!(
        strategy = %request.strategy,
        %protocol,
        mode = %request.mode,
        shards = shards.len(),
        "scan started"
    );

    let summary = match request.strategy {
        Strategy::Sequential => {
            let processor = ShardProcessor::new(
                ctx.store.clone(),
                ctx.client.clone(),
                ctx.lookup_retry_limit,
                "main",
            );
            sequential::run(&processor, shards, &shutdown).await
        }
        Strategy::Thread => {
            let factory = TaskWorkerFactory::new(
                ctx.store.clone(),
                ctx.client.clone(),
                ctx.lookup_retry_limit,
            );
            let size = ctx.pool_size.unwrap_or_else(|| thread::pool_size(protocol));
            WorkerPool::new(factory, size, CancelPolicy::Drain)
                .run(shards, shutdown)
                .await
        }
        Strategy::Process => {
            let command = ctx.worker_command.clone().ok_or_else(|| {
                ScanError::Worker("process strategy needs a worker command".to_string())
            })?;
            let size = ctx.pool_size.unwrap_or_else(thread::cpu_count);
            WorkerPool::new(ProcessWorkerFactory::new(command), size, CancelPolicy::Abort)
                .run(shards, shutdown)
                .await
        }
    };

    tracing::info!(
        shards = summary.shards,
        completed = summary.completed,
        failed_shards = summary.failed_shards,
        processed = summary.processed,
        failed = summary.failed,
        cancelled = summary.cancelled,
        "scan finished"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::registry::{MockRegistryClient, Protocol};
    use crate::domain::repositories::MockStore;

    #[test]
    fn test_strategy_parse() {
        assert_eq!("thread".parse::<Strategy>().unwrap(), Strategy::Thread);
        assert_eq!("single".parse::<Strategy>().unwrap(), Strategy::Sequential);
        assert!(matches!(
            "fork".parse::<Strategy>(),
            Err(ScanError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn test_request_tables() {
        let request = ScanRequest::for_categories(
            &["two_letter".to_string(), "three_digit".to_string()],
            "com",
            ScanMode::Expiring,
            Strategy::Sequential,
        );

        assert_eq!(request.tables, ["two_letter_com", "three_digit_com"]);
    }

    #[tokio::test]
    async fn test_process_strategy_requires_command() {
        let mut store = MockStore::new();
        store.expect_run_one().returning(|_, _| Vec::new());
        let mut client = MockRegistryClient::new();
        client.expect_protocol().return_const(Protocol::Rdap);

        let ctx = ScanContext {
            store: Arc::new(store),
            client: Arc::new(client),
            lookup_retry_limit: 3,
            worker_command: None,
            pool_size: None,
        };
        let request = ScanRequest {
            tables: vec!["two_letter_com".to_string()],
            mode: ScanMode::Expiring,
            strategy: Strategy::Process,
        };

        let result = run_scan(&ctx, &request, std::future::pending()).await;

        assert!(matches!(result, Err(ScanError::Worker(_))));
    }
}
