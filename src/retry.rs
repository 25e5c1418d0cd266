//! Bounded retry with exponential backoff and additive jitter.
//!
//! Each attempt reports an [`AttemptOutcome`]; [`RetryPolicy::run`] drives the
//! attempts strictly in sequence and decides whether to wait and try again.

use crate::{Error, Result};
use rand::Rng;
use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Result of a single upstream attempt.
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    Success(T),
    /// Transient fault; another attempt is allowed if any remain.
    Retriable(String),
    /// Aborts the invocation immediately.
    Fatal(Error),
}

/// 429 and every 5xx are transient; other non-2xx statuses are not.
pub fn is_retriable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(1000), Duration::from_millis(1000))
    }
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one attempt.
    pub fn new(max_attempts: u32, base_delay: Duration, max_jitter: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_jitter,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait before `attempt` (zero-based).
    ///
    /// Attempt 0 starts immediately. Attempt `n >= 1` waits
    /// `base * 2^(n-1)` plus uniform jitter in `[0, max_jitter)`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_ms = self.base_delay.as_millis() as u64;
        let exponential = base_ms.saturating_mul(2u64.saturating_pow(attempt - 1));

        let jitter_range = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };

        Duration::from_millis(exponential.saturating_add(jitter))
    }

    /// Run `operation` until it succeeds, fails fatally, or attempts run out.
    ///
    /// The closure receives the zero-based attempt index.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = AttemptOutcome<T>>,
    {
        let mut last_error = String::from("no attempt completed");

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = self.delay_before(attempt);
                debug!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Backing off before retry"
                );
                tokio::time::sleep(delay).await;
            }

            match operation(attempt).await {
                AttemptOutcome::Success(value) => {
                    if attempt > 0 {
                        info!(
                            attempt = attempt + 1,
                            max_attempts = self.max_attempts,
                            "Upstream call succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                AttemptOutcome::Fatal(err) => {
                    error!(
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        "Upstream call failed fatally: {}",
                        err
                    );
                    return Err(err);
                }
                AttemptOutcome::Retriable(reason) => {
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        "Upstream call failed: {}",
                        reason
                    );
                    last_error = reason;
                }
            }
        }

        error!(
            attempts = self.max_attempts,
            "Upstream retries exhausted: {}", last_error
        );
        Err(Error::UpstreamUnavailable {
            attempts: self.max_attempts,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    #[test]
    fn test_status_classification() {
        assert!(is_retriable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retriable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retriable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retriable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retriable_status(StatusCode::FORBIDDEN));
        assert!(!is_retriable_status(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_no_delay_before_first_attempt() {
        assert_eq!(RetryPolicy::default().delay_before(0), Duration::ZERO);
    }

    #[test]
    fn test_delay_stays_within_jitter_window() {
        let policy = RetryPolicy::default();

        for attempt in 1..=4u32 {
            let floor = 1000u128 * 2u128.pow(attempt - 1);
            for _ in 0..200 {
                let delay = policy.delay_before(attempt).as_millis();
                assert!(
                    delay >= floor && delay < floor + 1000,
                    "attempt {} delay {}ms outside [{}, {})",
                    attempt,
                    delay,
                    floor,
                    floor + 1000
                );
            }
        }
    }

    #[test]
    fn test_zero_jitter_is_exact() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::ZERO);
        assert_eq!(policy.delay_before(3), Duration::from_millis(400));
    }

    #[test]
    fn test_max_attempts_clamped_to_one() {
        assert_eq!(
            RetryPolicy::new(0, Duration::ZERO, Duration::ZERO).max_attempts(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_last_attempt_with_increasing_delays() {
        let policy = RetryPolicy::default();
        let started = Arc::new(Mutex::new(Vec::new()));

        let recorder = started.clone();
        let result = policy
            .run(|attempt| {
                recorder.lock().unwrap().push(Instant::now());
                async move {
                    if attempt < 4 {
                        AttemptOutcome::Retriable(format!("status 503 on attempt {}", attempt))
                    } else {
                        AttemptOutcome::Success("image")
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, "image");

        let started = started.lock().unwrap();
        assert_eq!(started.len(), 5);

        let gaps: Vec<u128> = started
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).as_millis())
            .collect();

        for (idx, gap) in gaps.iter().enumerate() {
            let floor = 1000u128 * 2u128.pow(idx as u32);
            assert!(*gap >= floor && *gap < floor + 1000, "gap {} = {}ms", idx, gap);
        }
        assert!(gaps.windows(2).all(|pair| pair[1] > pair[0]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_reports_last_error() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);

        let err = policy
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { AttemptOutcome::<()>::Retriable(format!("status 500 #{}", attempt)) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        match err {
            Error::UpstreamUnavailable {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 5);
                assert_eq!(last_error, "status 500 #4");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_aborts_without_retry() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let before = Instant::now();

        let err = policy
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    AttemptOutcome::<()>::Fatal(Error::UpstreamRejected {
                        status: 400,
                        body: "bad request".to_string(),
                    })
                }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(before.elapsed(), Duration::ZERO);
        assert!(matches!(err, Error::UpstreamRejected { status: 400, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_after_retriable_stops_immediately() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);

        let err = policy
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        AttemptOutcome::<()>::Retriable("status 429".to_string())
                    } else {
                        AttemptOutcome::Fatal(Error::UpstreamRejected {
                            status: 404,
                            body: "no such model".to_string(),
                        })
                    }
                }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(matches!(err, Error::UpstreamRejected { status: 404, .. }));
    }
}
