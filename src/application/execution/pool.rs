//! Generic pool that drains a shared shard queue with a fixed number of
//! workers.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;

use super::ScanSummary;
use super::shutdown::Shutdown;
use crate::application::services::ShardReport;
use crate::domain::entities::Shard;
use crate::error::ScanError;

/// Something that processes shards one at a time.
#[async_trait]
pub trait ShardWorker: Send {
    async fn process(&mut self, shard: &Shard) -> Result<ShardReport, ScanError>;

    /// Releases the worker once the queue is empty.
    async fn shutdown(&mut self) {}

    /// Stops the worker after its shard was abandoned mid-flight. Returns
    /// once nothing the worker started is still running.
    async fn kill(&mut self) {}
}

/// Creates workers on demand. A worker that fails a shard is dropped and
/// replaced before the next one.
#[async_trait]
pub trait WorkerFactory: Send + Sync + 'static {
    type Worker: ShardWorker + 'static;

    async fn spawn(&self, id: usize) -> Result<Self::Worker, ScanError>;
}

/// What happens to in-flight shards when the scan is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelPolicy {
    /// Abandon in-flight shards and kill their workers; unflushed updates
    /// are lost.
    Abort,
    /// Stop dispatching and let in-flight shards finish.
    Drain,
}

pub struct WorkerPool<F: WorkerFactory> {
    factory: Arc<F>,
    size: usize,
    policy: CancelPolicy,
}

type ShardResult = (String, Result<ShardReport, ScanError>);

impl<F: WorkerFactory> WorkerPool<F> {
    pub fn new(factory: F, size: usize, policy: CancelPolicy) -> Self {
        Self {
            factory: Arc::new(factory),
            size: size.max(1),
            policy,
        }
    }

    /// Processes `shards` until the queue is empty or `shutdown` fires.
    ///
    /// Returns only after every worker has stopped, killed ones included.
    pub async fn run(&self, shards: Vec<Shard>, mut shutdown: Shutdown) -> ScanSummary {
        let mut summary = ScanSummary::new(shards.len());
        let workers = self.size.min(shards.len());
        let queue = Arc::new(Mutex::new(VecDeque::from(shards)));
        let (tx, mut rx) = mpsc::unbounded_channel::<ShardResult>();

        let mut tasks = JoinSet::new();
        for id in 0..workers {
            tasks.spawn(worker_loop(
                self.factory.clone(),
                id,
                queue.clone(),
                tx.clone(),
                shutdown.clone(),
                self.policy,
            ));
        }
        drop(tx);

        tracing::info!(workers, policy = ?self.policy, "worker pool started");

        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok(())) => {}
                    Some(Err(e)) if e.is_cancelled() => {}
                    Some(Err(e)) => tracing::error!(error = %e, "worker task crashed"),
                },
                Some((key, result)) = rx.recv() => summary.record(&key, result),
                _ = shutdown.triggered(), if !summary.cancelled => {
                    summary.cancelled = true;
                    let dropped = {
                        let mut pending = queue.lock().await;
                        let n = pending.len();
                        pending.clear();
                        n
                    };
                    tracing::warn!(dropped, policy = ?self.policy, "scan cancelled");
                }
            }
        }

        while let Ok((key, result)) = rx.try_recv() {
            summary.record(&key, result);
        }

        summary
    }
}

async fn worker_loop<F: WorkerFactory>(
    factory: Arc<F>,
    id: usize,
    queue: Arc<Mutex<VecDeque<Shard>>>,
    results: mpsc::UnboundedSender<ShardResult>,
    shutdown: Shutdown,
    policy: CancelPolicy,
) {
    let mut worker: Option<F::Worker> = None;

    loop {
        if shutdown.is_triggered() {
            break;
        }
        let Some(shard) = queue.lock().await.pop_front() else {
            break;
        };

        if worker.is_none() {
            match factory.spawn(id).await {
                Ok(w) => worker = Some(w),
                Err(e) => {
                    tracing::error!(worker = id, error = %e, "failed to start worker");
                    let _ = results.send((shard.key(), Err(e)));
                    continue;
                }
            }
        }
        let Some(current) = worker.as_mut() else {
            continue;
        };

        let outcome = match policy {
            CancelPolicy::Drain => Some(current.process(&shard).await),
            CancelPolicy::Abort => {
                let mut stop = shutdown.clone();
                tokio::select! {
                    result = current.process(&shard) => Some(result),
                    _ = stop.triggered() => None,
                }
            }
        };
        let Some(result) = outcome else {
            tracing::warn!(worker = id, shard = %shard.key(), "shard abandoned, killing worker");
            current.kill().await;
            worker = None;
            break;
        };

        if let Err(e) = &result {
            tracing::error!(worker = id, shard = %shard.key(), error = %e, "shard failed");
            worker = None;
        }
        let _ = results.send((shard.key(), result));
    }

    if let Some(mut w) = worker {
        w.shutdown().await;
    }
    tracing::debug!(worker = id, "worker finished");
}
