//! Retry policy shared by both store backends.

use std::future::Future;
use std::time::Duration;

use crate::domain::repositories::Row;
use crate::error::StoreError;
use crate::utils::retry::{self, Attempt, RetryState};

/// How a store call reacts to transient backend errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreRetryPolicy {
    /// Maximum number of repeated attempts after the first one.
    pub limit: u32,
    /// Pause before each repeated attempt.
    pub backoff: Duration,
}

impl StoreRetryPolicy {
    pub fn new(limit: u32, backoff: Duration) -> Self {
        Self { limit, backoff }
    }
}

impl Default for StoreRetryPolicy {
    fn default() -> Self {
        Self {
            limit: 5,
            backoff: Duration::from_secs(15),
        }
    }
}

/// Runs one store call under `policy`.
///
/// Never fails: the rows of the first successful attempt are returned, and an
/// empty set is returned after a fatal error or once retries are exhausted.
pub(crate) async fn call_with_retry<F, Fut>(
    policy: StoreRetryPolicy,
    call_id: &str,
    mut op: F,
) -> Vec<Row>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<Row>, sqlx::Error>>,
{
    let report = retry::run(
        retry::fixed_schedule(policy.backoff, policy.limit),
        |attempt| {
            let call = op();
            async move {
                match call.await.map_err(StoreError::from) {
                    Ok(rows) => Attempt::Done(rows),
                    Err(e) if e.is_retryable() => {
                        tracing::warn!(call_id, attempt, error = %e, "database call failed, retrying");
                        Attempt::Retry(e)
                    }
                    Err(e) => Attempt::Fatal(e),
                }
            }
        },
    )
    .await;

    match (report.state, report.result) {
        (_, Ok(rows)) => {
            if report.retries > 0 {
                tracing::info!(call_id, retries = report.retries, "database call recovered");
            } else {
                tracing::debug!(call_id, "database call successful");
            }
            rows
        }
        (RetryState::FatalFailure, Err(e)) => {
            tracing::error!(call_id, error = %e, "database call failed, not retryable");
            Vec::new()
        }
        (_, Err(e)) => {
            tracing::error!(
                call_id,
                retries = report.retries,
                error = %e,
                "database call failed, no more retries"
            );
            Vec::new()
        }
    }
}
