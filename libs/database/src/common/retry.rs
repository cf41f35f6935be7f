use std::future::Future;
use std::hash::BuildHasher;
use std::time::Duration;
use tracing::{debug, warn};

/// Exponential backoff policy used for startup connects
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts after the first one
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: u32,
    /// Scale each sleep into the 50%..100% band of the computed delay
    pub jitter: bool,
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Un-jittered delay before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self
            .multiplier
            .checked_pow(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            multiplier: 2,
            jitter: true,
        }
    }
}

/// Run `operation` until it succeeds or the retry budget is spent.
///
/// The last error is returned unchanged once `max_retries` is exceeded.
pub async fn retry_with_backoff<F, Fut, T, E>(mut operation: F, config: RetryConfig) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(retries = attempt, "operation succeeded after retrying");
                }
                return Ok(value);
            }
            Err(e) if attempt >= config.max_retries => {
                warn!(attempts = attempt + 1, error = %e, "giving up");
                return Err(e);
            }
            Err(e) => {
                attempt += 1;
                let base = config.delay_for(attempt);
                let delay = if config.jitter { jittered(base) } else { base };

                debug!(
                    attempt,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "operation failed, backing off"
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// [`retry_with_backoff`] with [`RetryConfig::default`]
pub async fn retry<F, Fut, T, E>(operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    retry_with_backoff(operation, RetryConfig::default()).await
}

fn jittered(delay: Duration) -> Duration {
    let seed = std::collections::hash_map::RandomState::new().hash_one(std::time::SystemTime::now());
    let percent = 50 + (seed % 51) as u32;
    delay * percent / 100
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting_failures(
        fail_times: u32,
    ) -> (Arc<AtomicU32>, impl FnMut() -> std::future::Ready<Result<&'static str, String>>) {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();
        let op = move || {
            let n = seen.fetch_add(1, Ordering::SeqCst);
            std::future::ready(if n < fail_times {
                Err(format!("attempt {} refused", n + 1))
            } else {
                Ok("connected")
            })
        };
        (calls, op)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success_does_not_sleep() {
        let (calls, op) = counting_failures(0);
        let start = tokio::time::Instant::now();

        let result = retry(op).await;

        assert_eq!(result.unwrap(), "connected");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let (calls, op) = counting_failures(2);
        let config = RetryConfig::new()
            .with_initial_delay(Duration::from_millis(100))
            .without_jitter();
        let start = tokio::time::Instant::now();

        let result = retry_with_backoff(op, config).await;

        assert_eq!(result.unwrap(), "connected");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100ms + 200ms of backoff
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_last_error_when_budget_spent() {
        let (calls, op) = counting_failures(u32::MAX);
        let config = RetryConfig::new().with_max_retries(2).without_jitter();

        let err = retry_with_backoff(op, config).await.unwrap_err();

        assert_eq!(err, "attempt 3 refused");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let config = RetryConfig::new()
            .with_initial_delay(Duration::from_millis(500))
            .with_max_delay(Duration::from_secs(3));

        assert_eq!(config.delay_for(1), Duration::from_millis(500));
        assert_eq!(config.delay_for(2), Duration::from_secs(1));
        assert_eq!(config.delay_for(3), Duration::from_secs(2));
        assert_eq!(config.delay_for(4), Duration::from_secs(3));
        assert_eq!(config.delay_for(40), Duration::from_secs(3));
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let base = Duration::from_millis(1000);
        for _ in 0..20 {
            let d = jittered(base);
            assert!(d >= Duration::from_millis(500));
            assert!(d <= base);
        }
    }
}
