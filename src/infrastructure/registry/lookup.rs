//! Retry loop shared by the protocol clients.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;

use crate::domain::entities::{QueryOutcome, RegistryAnswer};
use crate::domain::registry::Protocol;
use crate::error::LookupError;
use crate::utils::retry::{self, Attempt};

/// Upper bound of the random pause between two queries of the same domain.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(1);

/// Queries `domain` until a definitive answer arrives or `retry_limit`
/// repeated queries were spent. Every error kind is retried, decode errors
/// included.
pub(crate) async fn lookup_with_retry<F, Fut>(
    protocol: Protocol,
    domain: &str,
    retry_limit: u32,
    max_backoff: Duration,
    mut query: F,
) -> QueryOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<RegistryAnswer, LookupError>>,
{
    let report = retry::run(
        retry::jittered_schedule(max_backoff, retry_limit),
        |attempt| {
            let call = query();
            async move {
                match call.await {
                    Ok(answer) => Attempt::Done(answer),
                    Err(e) => {
                        tracing::debug!(%protocol, domain, attempt, error = %e, "lookup failed, retrying");
                        Attempt::Retry(e)
                    }
                }
            }
        },
    )
    .await;

    let retries = report.retries;

    match report.result {
        Ok(answer) => {
            tracing::debug!(%protocol, domain, retries, ?answer, "lookup successful");
            QueryOutcome::success(domain, answer, Utc::now().naive_utc(), retries)
        }
        Err(e) => {
            tracing::debug!(%protocol, domain, retries, error = %e, "lookup retries exhausted");
            QueryOutcome::failure(domain, e.kind, retries)
        }
    }
}
