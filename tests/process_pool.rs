#![cfg(unix)]

mod common;

use bulkdns::application::execution::{ProcessWorkerFactory, WorkerCommand};
use bulkdns::prelude::*;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fake `whois` that answers "no match" fifteen times, then marks `stopped`
/// next to itself and hangs. Records the pid of the worker that runs it.
const STUB_WHOIS: &str = r#"#!/bin/sh
state=$(dirname "$0")
echo "$PPID" > "$state/worker.pid"
n=$(cat "$state/count" 2>/dev/null || echo 0)
n=$((n + 1))
echo "$n" > "$state/count"
if [ "$n" -gt 15 ]; then
    touch "$state/stopped"
    exec sleep 5
fi
echo "No match for domain \"$1\"."
"#;

fn stub_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("bulkdns-stub-{}", rand::random::<u64>()));
    std::fs::create_dir_all(&dir).unwrap();

    let script = dir.join("whois");
    std::fs::write(&script, STUB_WHOIS).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    dir
}

/// Real `bulkdns worker` process pointed at the test database and stub.
fn worker_command(db: &Path, stub: &Path) -> WorkerCommand {
    let args = [
        "DB_TYPE=sqlite".to_string(),
        format!("SQLITE_PATH={}", db.display()),
        format!("WHOIS_COMMAND={}", stub.join("whois").display()),
        "LOOKUP_TIMEOUT_SECS=60".to_string(),
        "RUST_LOG=warn".to_string(),
        env!("CARGO_BIN_EXE_bulkdns").to_string(),
        "worker".to_string(),
        "--protocol".to_string(),
        "whois".to_string(),
        "--db-retry-limit".to_string(),
        "2".to_string(),
        "--db-retry-backoff".to_string(),
        "0".to_string(),
    ];

    WorkerCommand {
        program: PathBuf::from("env"),
        args: args.to_vec(),
        recycle_after: 50,
    }
}

fn is_running(pid: &str) -> bool {
    std::process::Command::new("kill")
        .args(["-0", pid])
        .stderr(std::process::Stdio::null())
        .status()
        .unwrap()
        .success()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_abort_kills_worker_process_and_keeps_flushed_shards() {
    let db = common::create_test_db();
    let shards = common::ten_shards(&db).await;
    let stub = stub_dir();

    let stopped = stub.join("stopped");
    let shutdown = Shutdown::on(async move {
        while !stopped.exists() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    });
    let factory = ProcessWorkerFactory::new(worker_command(&db.path, &stub));

    let summary = tokio::time::timeout(
        Duration::from_secs(60),
        WorkerPool::new(factory, 1, CancelPolicy::Abort).run(shards, shutdown),
    )
    .await
    .unwrap();

    let worker_pid = std::fs::read_to_string(stub.join("worker.pid")).unwrap();
    let worker_pid = worker_pid.trim();
    let running = is_running(worker_pid);
    let _ = std::fs::remove_dir_all(&stub);

    assert!(summary.cancelled);
    assert_eq!(summary.completed, 3);
    assert_eq!(summary.updated, 15);
    assert!(!running, "worker {worker_pid} outlived the pool");

    // The in-flight shard never flushed
    assert_eq!(common::count_updated(db.store.as_ref(), "three_letter_com").await, 15);
    let rows = common::fetch_rows(db.store.as_ref(), "three_letter_com").await;
    for (domain, avail, _, updated) in &rows {
        let first = domain.as_bytes()[0];
        if first <= b'c' {
            assert_eq!(avail.as_str(), Some("Y"), "{domain}");
        } else {
            assert!(updated.is_null(), "{domain} written after abort");
        }
    }
}
