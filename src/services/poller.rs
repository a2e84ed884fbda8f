//! Convergence poller.
//!
//! `await_condition` is the one waiting primitive of the harness: it re-runs a
//! side-effect-free probe at a fixed interval until the probe reports a value
//! or the deadline passes. Every other waiting step is built on it.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info};

use crate::domain::errors::{HarnessError, HarnessResult};
use crate::domain::models::PollingConfig;

/// Shortest sleep between attempts, so a zero interval still yields.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Outcome of one probe attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<T> {
    /// Condition holds; polling stops with this value.
    Ready(T),
    /// Condition does not hold yet; `observed` describes what was seen.
    Pending { observed: String },
}

impl<T> Probe<T> {
    /// Not ready yet, recording what was observed.
    pub fn pending(observed: impl Display) -> Self {
        Self::Pending {
            observed: observed.to_string(),
        }
    }
}

/// What a wait is waiting for, carried into the timeout error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
    /// Table being watched.
    pub table: String,
    /// Human-readable condition, e.g. `exactly 2 keys`.
    pub expected: String,
}

impl Expectation {
    /// Expectation on `table` described by `expected`.
    pub fn new(table: impl Into<String>, expected: impl Display) -> Self {
        Self {
            table: table.into(),
            expected: expected.to_string(),
        }
    }
}

/// Poll `probe` until it is ready or `polling.timeout()` has elapsed.
///
/// Errors returned by the probe (store access failures) end the wait
/// immediately and are not retried. A probe still running at the deadline is
/// abandoned, so no wait outlives its timeout.
pub async fn await_condition<T, F, Fut>(
    expectation: &Expectation,
    polling: &PollingConfig,
    mut probe: F,
) -> HarnessResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = HarnessResult<Probe<T>>>,
{
    let started = Instant::now();
    let deadline = started + polling.timeout();
    let interval = polling.interval().max(MIN_INTERVAL);
    let mut attempt: u32 = 0;
    let mut observed = String::from("nothing");

    loop {
        attempt += 1;
        let remaining = deadline.saturating_duration_since(Instant::now());

        match timeout(remaining, probe()).await {
            Ok(Ok(Probe::Ready(value))) => {
                info!(
                    table = %expectation.table,
                    expected = %expectation.expected,
                    attempt,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "converged"
                );
                return Ok(value);
            }
            Ok(Ok(Probe::Pending { observed: seen })) => {
                debug!(
                    table = %expectation.table,
                    expected = %expectation.expected,
                    observed = %seen,
                    attempt,
                    "not converged yet"
                );
                observed = seen;
            }
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                debug!(table = %expectation.table, attempt, "probe still running at deadline");
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(HarnessError::Timeout {
                table: expectation.table.clone(),
                expected: expectation.expected.clone(),
                observed,
                waited: now.duration_since(started),
            });
        }
        sleep(interval.min(deadline - now)).await;
    }
}

/// Wait out a settle period with no probing.
///
/// Used before asserting that something did *not* change.
pub async fn settle(duration: Duration) {
    debug!(settle_ms = duration.as_millis() as u64, "settling");
    sleep(duration).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::errors::StoreError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn polling(interval_ms: u64, timeout_ms: u64) -> PollingConfig {
        PollingConfig {
            interval_ms,
            timeout_ms,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_on_first_attempt() {
        let exp = Expectation::new("T", "anything");
        let value = await_condition(&exp, &polling(1000, 5000), || async {
            Ok(Probe::Ready(7))
        })
        .await
        .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_several_attempts() {
        let calls = AtomicU32::new(0);
        let exp = Expectation::new("T", "three calls");
        let started = Instant::now();

        let value = await_condition(&exp, &polling(1000, 20_000), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n >= 3 {
                    Ok(Probe::Ready(n))
                } else {
                    Ok(Probe::pending(format!("{n} calls")))
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 3);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_last_observation() {
        let exp = Expectation::new("ASIC_STATE:SAI_OBJECT_TYPE_VNET", "at least 1 keys");
        let err = await_condition::<(), _, _>(&exp, &polling(1000, 5000), || async {
            Ok(Probe::pending("0 keys"))
        })
        .await
        .unwrap_err();

        match err {
            HarnessError::Timeout {
                table,
                expected,
                observed,
                waited,
            } => {
                assert_eq!(table, "ASIC_STATE:SAI_OBJECT_TYPE_VNET");
                assert_eq!(expected, "at least 1 keys");
                assert_eq!(observed, "0 keys");
                assert_eq!(waited, Duration::from_secs(5));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let exp = Expectation::new("T", "x");
        let err = await_condition::<(), _, _>(&exp, &polling(1000, 5000), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::Connection("refused".to_string()).into()) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, HarnessError::Store(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_probe_is_cut_at_deadline() {
        let exp = Expectation::new("T", "x");
        let started = Instant::now();
        let err = await_condition::<(), _, _>(&exp, &polling(1000, 3000), || async {
            sleep(Duration::from_secs(3600)).await;
            Ok(Probe::pending("never"))
        })
        .await
        .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }
}
