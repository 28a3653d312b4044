//! Bounded retry expressed as a small state machine.
//!
//! ```text
//! Attempting        --ok-------------> Succeeded
//! Attempting        --retryable err--> RetryableFailure
//! Attempting        --fatal err------> FatalFailure
//! RetryableFailure  --delay left-----> (sleep) Attempting
//! RetryableFailure  --no delay left--> exhausted, report failure
//! ```
//!
//! The delay schedule is any iterator of durations, normally a
//! [`tokio_retry::strategy`] iterator cut with `.take(limit)`. A schedule of
//! `limit` delays yields at most `limit + 1` attempts and exactly `limit`
//! sleeps before the failure is reported.

use std::future::Future;
use std::time::Duration;

use tokio_retry::strategy::{FixedInterval, jitter};

/// Result of one attempt, as classified by the caller.
#[derive(Debug)]
pub enum Attempt<T, E> {
    Done(T),
    Retry(E),
    Fatal(E),
}

/// Terminal state of a retry run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Succeeded,
    /// Every scheduled delay was used and the last attempt still failed.
    RetryableFailure,
    FatalFailure,
}

#[derive(Debug)]
pub struct RetryReport<T, E> {
    pub result: Result<T, E>,
    pub state: RetryState,
    pub attempts: u32,
    pub retries: u32,
}

impl<T, E> RetryReport<T, E> {
    pub fn is_exhausted(&self) -> bool {
        self.state == RetryState::RetryableFailure
    }
}

enum Step<T, E> {
    Attempting,
    Succeeded(T),
    RetryableFailure(E),
    FatalFailure(E),
}

/// Drives `op` until it succeeds, fails fatally, or the schedule runs dry.
///
/// `op` receives the 1-based attempt number.
pub async fn run<T, E, S, F, Fut>(schedule: S, mut op: F) -> RetryReport<T, E>
where
    S: IntoIterator<Item = Duration>,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Attempt<T, E>>,
{
    let mut delays = schedule.into_iter();
    let mut attempts = 0;
    let mut retries = 0;
    let mut step = Step::Attempting;

    loop {
        step = match step {
            Step::Attempting => {
                attempts += 1;
                match op(attempts).await {
                    Attempt::Done(value) => Step::Succeeded(value),
                    Attempt::Retry(e) => Step::RetryableFailure(e),
                    Attempt::Fatal(e) => Step::FatalFailure(e),
                }
            }
            Step::RetryableFailure(e) => match delays.next() {
                Some(delay) => {
                    retries += 1;
                    tokio::time::sleep(delay).await;
                    Step::Attempting
                }
                None => {
                    return RetryReport {
                        result: Err(e),
                        state: RetryState::RetryableFailure,
                        attempts,
                        retries,
                    };
                }
            },
            Step::Succeeded(value) => {
                return RetryReport {
                    result: Ok(value),
                    state: RetryState::Succeeded,
                    attempts,
                    retries,
                };
            }
            Step::FatalFailure(e) => {
                return RetryReport {
                    result: Err(e),
                    state: RetryState::FatalFailure,
                    attempts,
                    retries,
                };
            }
        };
    }
}

/// Fixed backoff between store attempts.
pub fn fixed_schedule(backoff: Duration, limit: u32) -> impl Iterator<Item = Duration> + Send {
    FixedInterval::new(backoff).take(limit as usize)
}

/// Uniformly jittered pauses of at most `max` between registry attempts.
pub fn jittered_schedule(max: Duration, limit: u32) -> impl Iterator<Item = Duration> + Send {
    FixedInterval::new(max)
        .map(jitter as fn(Duration) -> Duration)
        .take(limit as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting_schedule(limit: u32, sleeps: Arc<AtomicU32>) -> impl Iterator<Item = Duration> {
        std::iter::repeat(Duration::ZERO)
            .take(limit as usize)
            .inspect(move |_| {
                sleeps.fetch_add(1, Ordering::SeqCst);
            })
    }

    #[tokio::test]
    async fn test_always_retryable_exhausts_schedule() {
        let sleeps = Arc::new(AtomicU32::new(0));
        let calls = AtomicU32::new(0);
        let calls_ref = &calls;

        let report: RetryReport<(), &str> =
            run(counting_schedule(4, sleeps.clone()), |_| async move {
                calls_ref.fetch_add(1, Ordering::SeqCst);
                Attempt::Retry("timeout")
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(sleeps.load(Ordering::SeqCst), 4);
        assert_eq!(report.attempts, 5);
        assert_eq!(report.retries, 4);
        assert!(report.is_exhausted());
        assert_eq!(report.result, Err("timeout"));
    }

    #[tokio::test]
    async fn test_fatal_stops_without_sleeping() {
        let sleeps = Arc::new(AtomicU32::new(0));

        let report: RetryReport<(), &str> =
            run(counting_schedule(4, sleeps.clone()), |_| async {
                Attempt::Fatal("syntax error")
            })
            .await;

        assert_eq!(report.attempts, 1);
        assert_eq!(report.retries, 0);
        assert_eq!(sleeps.load(Ordering::SeqCst), 0);
        assert_eq!(report.state, RetryState::FatalFailure);
    }

    #[tokio::test]
    async fn test_success_after_retries() {
        let schedule = std::iter::repeat(Duration::ZERO).take(10);
        let report: RetryReport<u32, &str> = run(schedule, |n| async move {
            if n < 3 {
                Attempt::Retry("busy")
            } else {
                Attempt::Done(n)
            }
        })
        .await;

        assert_eq!(report.result, Ok(3));
        assert_eq!(report.retries, 2);
        assert_eq!(report.state, RetryState::Succeeded);
    }

    #[tokio::test]
    async fn test_zero_limit_means_single_attempt() {
        let report: RetryReport<(), &str> =
            run(fixed_schedule(Duration::ZERO, 0), |_| async { Attempt::Retry("busy") }).await;

        assert_eq!(report.attempts, 1);
        assert!(report.is_exhausted());
    }

    #[test]
    fn test_jittered_schedule_is_sub_second() {
        let delays: Vec<Duration> = jittered_schedule(Duration::from_secs(1), 20).collect();
        assert_eq!(delays.len(), 20);
        assert!(delays.iter().all(|d| *d <= Duration::from_secs(1)));
    }
}
