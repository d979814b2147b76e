//! Bounded, cancellable polling.
//!
//! A probe is run until it reports `Ready`, the attempt budget runs out, the
//! overall deadline passes, or shutdown is signalled. Sleeps between probes
//! follow [`BackoffPolicy`].

use std::fmt;
use std::future::Future;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{sleep, timeout};

use crate::resilience::backoff::BackoffPolicy;

/// Result of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<T> {
    /// The awaited condition holds.
    Ready(T),
    /// Not yet; the string says why (logged).
    Pending(String),
}

/// Why polling stopped without a result.
#[derive(Debug, Error)]
pub enum PollError<E: fmt::Display> {
    #[error("gave up after {attempts} attempts (last: {last})")]
    Exhausted { attempts: u32, last: String },

    #[error("timed out after {0} seconds")]
    TimedOut(u64),

    #[error("cancelled by shutdown")]
    Cancelled,

    #[error("{0}")]
    Fatal(E),
}

/// Run `probe` until ready, following `policy`.
///
/// `probe` receives the 1-based attempt number. An `Err` from the probe stops
/// polling immediately; transient conditions should be reported as `Pending`.
pub async fn poll_with_backoff<T, E, F, Fut>(
    policy: &BackoffPolicy,
    shutdown: &mut broadcast::Receiver<()>,
    what: &str,
    mut probe: F,
) -> Result<T, PollError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Probe<T>, E>>,
    E: fmt::Display,
{
    let attempts = async {
        let mut last = String::from("not attempted");

        for attempt in 1..=policy.max_attempts {
            let delay = policy.delay_before(attempt);
            if !delay.is_zero() {
                tracing::debug!(what, attempt, delay_ms = delay.as_millis() as u64, "Waiting before probe");
            }

            tokio::select! {
                biased;
                _ = cancelled(shutdown) => return Err(PollError::Cancelled),
                _ = sleep(delay) => {}
            }

            match probe(attempt).await {
                Ok(Probe::Ready(value)) => return Ok(value),
                Ok(Probe::Pending(reason)) => {
                    tracing::info!(what, attempt, max_attempts = policy.max_attempts, reason = %reason, "Not ready yet");
                    last = reason;
                }
                Err(e) => return Err(PollError::Fatal(e)),
            }
        }

        Err(PollError::Exhausted {
            attempts: policy.max_attempts,
            last,
        })
    };

    match timeout(policy.timeout, attempts).await {
        Ok(result) => result,
        Err(_) => Err(PollError::TimedOut(policy.timeout.as_secs())),
    }
}

/// Resolves when shutdown is triggered. A dropped coordinator never cancels.
async fn cancelled(shutdown: &mut broadcast::Receiver<()>) {
    match shutdown.recv().await {
        Err(RecvError::Closed) => std::future::pending::<()>().await,
        Ok(()) | Err(RecvError::Lagged(_)) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use std::time::Duration;

    fn policy(max_attempts: u32) -> BackoffPolicy {
        BackoffPolicy {
            initial_delay: Duration::ZERO,
            max_attempts,
            base_ms: 1000,
            max_ms: 8000,
            timeout: Duration::from_secs(600),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_pending() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();

        let result: Result<u32, PollError<String>> =
            poll_with_backoff(&policy(5), &mut rx, "test", |attempt| async move {
                if attempt < 3 {
                    Ok(Probe::Pending(format!("attempt {}", attempt)))
                } else {
                    Ok(Probe::Ready(attempt))
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_reports_last_reason() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();

        let result: Result<(), PollError<String>> =
            poll_with_backoff(&policy(3), &mut rx, "test", |attempt| async move {
                Ok(Probe::Pending(format!("pending #{}", attempt)))
            })
            .await;

        match result {
            Err(PollError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last, "pending #3");
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_stops_immediately() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        let mut calls = 0;

        let result: Result<(), PollError<String>> =
            poll_with_backoff(&policy(5), &mut rx, "test", |_| {
                calls += 1;
                async { Err("rejected".to_string()) }
            })
            .await;

        assert!(matches!(result, Err(PollError::Fatal(ref e)) if e == "rejected"));
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overall_timeout() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        let mut p = policy(100);
        p.timeout = Duration::from_secs(10);

        let result: Result<(), PollError<String>> =
            poll_with_backoff(&p, &mut rx, "test", |_| async {
                Ok(Probe::Pending("indexing".to_string()))
            })
            .await;

        assert!(matches!(result, Err(PollError::TimedOut(10))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_by_shutdown() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        let mut p = policy(5);
        p.initial_delay = Duration::from_secs(120);

        shutdown.trigger();

        let result: Result<(), PollError<String>> =
            poll_with_backoff(&p, &mut rx, "test", |_| async { Ok(Probe::Ready(())) }).await;

        assert!(matches!(result, Err(PollError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_coordinator_does_not_cancel() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        drop(shutdown);

        let result: Result<u8, PollError<String>> =
            poll_with_backoff(&policy(2), &mut rx, "test", |_| async { Ok(Probe::Ready(7)) }).await;

        assert_eq!(result.unwrap(), 7);
    }
}
