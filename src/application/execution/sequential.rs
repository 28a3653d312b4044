//! One shard at a time on the caller's task.

use super::ScanSummary;
use super::shutdown::Shutdown;
use crate::application::services::ShardProcessor;
use crate::domain::entities::Shard;

/// Runs `shards` in order. Cancellation is honoured between shards only.
pub async fn run(processor: &ShardProcessor, shards: Vec<Shard>, shutdown: &Shutdown) -> ScanSummary {
    let mut summary = ScanSummary::new(shards.len());

    for shard in shards {
        if shutdown.is_triggered() {
            summary.cancelled = true;
            tracing::warn!(
                remaining = summary.shards - summary.completed,
                "scan cancelled"
            );
            break;
        }

        let report = processor.process(&shard).await;
        summary.record(&shard.key(), Ok(report));
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{QueryOutcome, RegistryAnswer, ScanMode};
    use crate::domain::registry::{MockRegistryClient, Protocol};
    use crate::domain::repositories::{MockStore, SqlValue};
    use chrono::Utc;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_stops_after_current_shard() {
        let lookups = Arc::new(AtomicUsize::new(0));
        let stop = Arc::new(Notify::new());

        let mut store = MockStore::new();
        store
            .expect_run_one()
            .returning(|_, _| vec![vec![SqlValue::text("a"), SqlValue::text("com")]]);
        store.expect_run_batch().returning(|_, _| Vec::new());

        let mut client = MockRegistryClient::new();
        client.expect_protocol().return_const(Protocol::Whois);
        let counter = lookups.clone();
        let fire = stop.clone();
        client.expect_lookup().returning(move |domain, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            fire.notify_one();
            QueryOutcome::success(domain, RegistryAnswer::Available, Utc::now().naive_utc(), 0)
        });

        let waiter = stop.clone();
        let mut shutdown = Shutdown::on(async move { waiter.notified().await });
        let processor = ShardProcessor::new(Arc::new(store), Arc::new(client), 10, "main");
        let shards = ["a", "b", "c"]
            .iter()
            .map(|p| Shard::new("two_letter_com", Some(p.to_string()), ScanMode::Expiring))
            .collect::<Vec<_>>();

        // First shard only; the flag is set by its lookup
        let first = run(&processor, shards[..1].to_vec(), &shutdown).await;
        shutdown.triggered().await;
        let rest = run(&processor, shards[1..].to_vec(), &shutdown).await;

        assert_eq!(first.completed, 1);
        assert!(!first.cancelled);
        assert_eq!(rest.completed, 0);
        assert!(rest.cancelled);
        assert_eq!(lookups.load(Ordering::SeqCst), 1);
    }
}
