//! Child process workers.
//!
//! The orchestrator re-executes its own binary with a hidden `worker`
//! subcommand. Shards travel to the child as one JSON line on stdin and the
//! child answers with one [`ShardReport`] JSON line on stdout. Logs go to
//! stderr, which the child inherits.
//!
//! Children run in their own process group, so a terminal interrupt reaches
//! only the orchestrator, which then kills them.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use super::pool::{ShardWorker, WorkerFactory};
use crate::application::services::{ShardProcessor, ShardReport};
use crate::domain::entities::Shard;
use crate::error::ScanError;

/// Shards a child handles before it is replaced by a fresh process.
pub const DEFAULT_RECYCLE_AFTER: usize = 50;

/// How to start a worker process.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub recycle_after: usize,
}

impl WorkerCommand {
    /// The running binary with `args`.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Io`] if the executable path cannot be resolved.
    pub fn current_exe(args: Vec<String>, recycle_after: usize) -> Result<Self, ScanError> {
        Ok(Self {
            program: std::env::current_exe()?,
            args,
            recycle_after: recycle_after.max(1),
        })
    }
}

pub struct ProcessWorkerFactory {
    command: WorkerCommand,
}

impl ProcessWorkerFactory {
    pub fn new(command: WorkerCommand) -> Self {
        Self { command }
    }
}

#[async_trait]
impl WorkerFactory for ProcessWorkerFactory {
    type Worker = ProcessWorker;

    async fn spawn(&self, id: usize) -> Result<ProcessWorker, ScanError> {
        ProcessWorker::start(self.command.clone(), id)
    }
}

/// Handle on one running child.
pub struct ProcessWorker {
    command: WorkerCommand,
    id: usize,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    handled: usize,
}

impl ProcessWorker {
    fn start(command: WorkerCommand, id: usize) -> Result<Self, ScanError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .arg("--worker-id")
            .arg(id.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ScanError::Worker("worker stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ScanError::Worker("worker stdout not captured".to_string()))?;

        tracing::debug!(worker = id, pid = child.id(), "worker process started");

        Ok(Self {
            command,
            id,
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
            handled: 0,
        })
    }

    async fn recycle(&mut self) -> Result<(), ScanError> {
        tracing::debug!(worker = self.id, handled = self.handled, "recycling worker process");
        self.shutdown().await;
        *self = Self::start(self.command.clone(), self.id)?;
        Ok(())
    }
}

#[async_trait]
impl ShardWorker for ProcessWorker {
    async fn process(&mut self, shard: &Shard) -> Result<ShardReport, ScanError> {
        if self.handled >= self.command.recycle_after {
            self.recycle().await?;
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ScanError::Worker("worker stdin closed".to_string()))?;
        let mut line = serde_json::to_string(shard).map_err(|e| ScanError::Worker(e.to_string()))?;
        line.push('\n');
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;

        let reply = self
            .stdout
            .next_line()
            .await?
            .ok_or_else(|| ScanError::Worker(format!("worker {} exited mid-shard", self.id)))?;
        let report: ShardReport = serde_json::from_str(&reply)
            .map_err(|e| ScanError::Worker(format!("bad worker reply: {e}")))?;

        self.handled += 1;
        Ok(report)
    }

    async fn shutdown(&mut self) {
        // EOF on stdin ends the worker loop
        drop(self.stdin.take());
        if let Err(e) = self.child.wait().await {
            tracing::warn!(worker = self.id, error = %e, "failed to reap worker process");
        }
    }

    async fn kill(&mut self) {
        drop(self.stdin.take());
        match self.child.kill().await {
            Ok(()) => tracing::debug!(worker = self.id, "worker process killed"),
            Err(e) => tracing::warn!(worker = self.id, error = %e, "failed to kill worker process"),
        }
    }
}

/// Worker side of the protocol: process every shard read from `reader` and
/// write one report line per shard to `writer`, until EOF.
///
/// Returns the number of shards processed.
pub async fn serve_shards<R, W>(
    reader: R,
    mut writer: W,
    processor: &ShardProcessor,
) -> Result<usize, ScanError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut served = 0;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let shard: Shard = serde_json::from_str(&line)
            .map_err(|e| ScanError::Worker(format!("bad shard message: {e}")))?;

        let report = processor.process(&shard).await;

        let mut reply =
            serde_json::to_string(&report).map_err(|e| ScanError::Worker(e.to_string()))?;
        reply.push('\n');
        writer.write_all(reply.as_bytes()).await?;
        writer.flush().await?;
        served += 1;
    }

    tracing::debug!(worker = processor.worker(), served, "input closed, worker exiting");
    Ok(served)
}
