use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::StoreError;

/// Backoff for read and subscribe paths. Writes are never retried here.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

/// Upper bound on a single backoff sleep.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Runs `op`, retrying transient failures with exponential backoff
/// (base, 2×base, 4×base, ... capped at `MAX_BACKOFF`). Non-transient errors
/// return immediately.
pub async fn with_read_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(err) if err.is_transient() && attempt + 1 < policy.attempts => {
                let delay = policy
                    .base_delay
                    .saturating_mul(2u32.saturating_pow(attempt))
                    .min(MAX_BACKOFF);
                warn!(
                    "Store read attempt {} failed ({}), retrying after {}ms...",
                    attempt + 1,
                    err,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::default();

        let result = with_read_retry(&policy, move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(StoreError::Unavailable("connection reset".to_string()))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy {
            attempts: 2,
            base_delay: Duration::from_millis(10),
        };

        let result: Result<(), _> = with_read_retry(&policy, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Unavailable("timeout".to_string()))
        })
        .await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_large_attempt_counts_cap_the_backoff() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy {
            attempts: 40,
            base_delay: Duration::from_millis(1),
        };
        let started = tokio::time::Instant::now();

        let result: Result<(), _> = with_read_retry(&policy, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Unavailable("connection refused".to_string()))
        })
        .await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 40);
        assert!(started.elapsed() <= MAX_BACKOFF * 39);
    }

    #[tokio::test]
    async fn test_non_transient_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = with_read_retry(&RetryPolicy::default(), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::NotFound)
        })
        .await;

        assert!(matches!(result, Err(StoreError::NotFound)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
