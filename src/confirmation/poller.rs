//! Bounded fixed-interval polling.
//!
//! Every wait in the engine goes through `poll_for` / `poll_until`: probe,
//! stop on success, fail with `Timeout` once the elapsed time exceeds the
//! bound, sleep one interval, repeat. No backoff. A probe error aborts the
//! poll immediately, and the cancellation token is checked on every tick.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::PollingConfig;
use crate::error::{EngineError, EngineResult};

/// Interval and bound of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollPolicy {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const RECEIPT_TIMEOUT: Duration = Duration::from_secs(75);

    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Standard single-wait policy from config.
    pub fn standard(config: &PollingConfig) -> Self {
        Self::new(
            Duration::from_millis(config.interval_ms),
            Duration::from_millis(config.timeout_ms),
        )
    }

    /// Overall policy for the send + receive receipt flow.
    pub fn receipt(config: &PollingConfig) -> Self {
        Self::new(
            Duration::from_millis(config.interval_ms),
            Duration::from_millis(config.receipt_timeout_ms),
        )
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL, Self::DEFAULT_TIMEOUT)
    }
}

/// Poll until `probe` yields `Some`, returning that value.
///
/// `stage` and `subject` only label the `Timeout`/`Cancelled` errors.
pub async fn poll_for<T, F, Fut>(
    stage: &'static str,
    subject: &str,
    policy: PollPolicy,
    cancel: &CancellationToken,
    mut probe: F,
) -> EngineResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<Option<T>>>,
{
    let started = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled { stage });
        }

        attempts += 1;
        if let Some(value) = probe().await? {
            tracing::trace!(stage, subject, attempts, "Poll satisfied");
            return Ok(value);
        }

        let waited = started.elapsed();
        if waited > policy.timeout {
            tracing::debug!(stage, subject, attempts, waited_ms = waited.as_millis() as u64, "Poll timed out");
            return Err(EngineError::Timeout {
                stage,
                hash: subject.to_string(),
                waited,
            });
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(EngineError::Cancelled { stage }),
            _ = sleep(policy.interval) => {}
        }
    }
}

/// Poll until `condition` returns `true`.
pub async fn poll_until<F, Fut>(
    stage: &'static str,
    subject: &str,
    policy: PollPolicy,
    cancel: &CancellationToken,
    mut condition: F,
) -> EngineResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<bool>>,
{
    poll_for(stage, subject, policy, cancel, || {
        let check = condition();
        async move { Ok::<_, EngineError>(check.await?.then_some(())) }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::types::LedgerError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn policy(interval_ms: u64, timeout_ms: u64) -> PollPolicy {
        PollPolicy::new(
            Duration::from_millis(interval_ms),
            Duration::from_millis(timeout_ms),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_on_first_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let started = Instant::now();

        let value = poll_for("test", "x", policy(500, 30_000), &CancellationToken::new(), || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move { Ok((n == 3).then_some(n)) }
        })
        .await
        .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(started.elapsed(), Duration::from_millis(1_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_within_one_interval_of_bound() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let started = Instant::now();

        let err = poll_until("send-confirmation", "ab", policy(500, 2_000), &CancellationToken::new(), || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Ok(false) }
        })
        .await
        .unwrap_err();

        let elapsed = started.elapsed();
        assert!(matches!(err, EngineError::Timeout { stage: "send-confirmation", .. }));
        assert!(elapsed >= Duration::from_millis(2_000));
        assert!(elapsed <= Duration::from_millis(2_500));
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_error_aborts_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let err = poll_until("link", "ab", policy(500, 30_000), &CancellationToken::new(), || {
            c.fetch_add(1, Ordering::SeqCst);
            async {
                Err(EngineError::Network(LedgerError::Transport {
                    endpoint: "http://node".into(),
                    reason: "refused".into(),
                }))
            }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, EngineError::Network(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_is_honoured_between_ticks() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(1_200)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = poll_until("receive-confirmation", "ab", policy(500, 30_000), &cancel, || async { Ok(false) })
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Cancelled { stage: "receive-confirmation" }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_policies_from_config() {
        let config = PollingConfig::default();
        assert_eq!(PollPolicy::standard(&config), PollPolicy::default());
        assert_eq!(PollPolicy::receipt(&config).timeout, PollPolicy::RECEIPT_TIMEOUT);
    }
}
