//! In-process workers: every shard runs as its own Tokio task.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use super::pool::{ShardWorker, WorkerFactory};
use crate::application::services::{ShardProcessor, ShardReport};
use crate::domain::entities::Shard;
use crate::domain::registry::{Protocol, RegistryClient};
use crate::domain::repositories::Store;
use crate::error::ScanError;

/// Pool size multiple per CPU for WHOIS, which spends most time waiting on
/// remote servers.
pub const WHOIS_TASKS_PER_CPU: usize = 12;

/// Pool size multiple per CPU for RDAP.
pub const RDAP_TASKS_PER_CPU: usize = 4;

pub fn cpu_count() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

pub fn pool_size(protocol: Protocol) -> usize {
    let per_cpu = match protocol {
        Protocol::Whois => WHOIS_TASKS_PER_CPU,
        Protocol::Rdap => RDAP_TASKS_PER_CPU,
    };
    per_cpu * cpu_count()
}

pub struct TaskWorkerFactory {
    store: Arc<dyn Store>,
    client: Arc<dyn RegistryClient>,
    lookup_retry_limit: u32,
}

impl TaskWorkerFactory {
    pub fn new(store: Arc<dyn Store>, client: Arc<dyn RegistryClient>, lookup_retry_limit: u32) -> Self {
        Self {
            store,
            client,
            lookup_retry_limit,
        }
    }
}

#[async_trait]
impl WorkerFactory for TaskWorkerFactory {
    type Worker = TaskWorker;

    async fn spawn(&self, id: usize) -> Result<TaskWorker, ScanError> {
        Ok(TaskWorker {
            processor: Arc::new(ShardProcessor::new(
                self.store.clone(),
                self.client.clone(),
                self.lookup_retry_limit,
                format!("task-{id}"),
            )),
            running: None,
        })
    }
}

pub struct TaskWorker {
    processor: Arc<ShardProcessor>,
    running: Option<JoinHandle<ShardReport>>,
}

#[async_trait]
impl ShardWorker for TaskWorker {
    /// A panic inside the shard surfaces as an error for that shard only.
    async fn process(&mut self, shard: &Shard) -> Result<ShardReport, ScanError> {
        let processor = self.processor.clone();
        let shard = shard.clone();

        let task = self
            .running
            .insert(tokio::spawn(async move { processor.process(&shard).await }));
        let joined = task.await;
        self.running = None;

        joined.map_err(|e| ScanError::Worker(format!("shard task failed: {e}")))
    }

    async fn kill(&mut self) {
        if let Some(task) = self.running.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for TaskWorker {
    fn drop(&mut self) {
        if let Some(task) = &self.running {
            task.abort();
        }
    }
}
