use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Retry an async operation with exponential backoff per `config`, giving up
/// after `max_attempts` and returning the last error.
///
/// Used by the Worker's status-report outbox (§4.3's adopted redesign flag)
/// to reduce — not eliminate — the odds of a lost terminal report under a
/// transient network blip. It does not retry forever: once the Manager
/// rejects a report outright (e.g. job not found), retrying is pointless and
/// callers should pass an operation that returns a non-retryable error in
/// that case so this loop can stop early... but this helper has no way to
/// distinguish those from the `Result` alone, so it always retries up to
/// `max_attempts`; callers that need to distinguish terminal rejections
/// should check `TitanError::is_retryable` before calling this at all.
pub async fn retry_async<T, E, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    let mut backoff_ms = config.initial_backoff_ms;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= config.max_attempts {
                    return Err(err);
                }

                let sleep_ms = if config.jitter {
                    let jitter_range = backoff_ms / 2;
                    backoff_ms.saturating_sub(jitter_range)
                        + rand::thread_rng().gen_range(0..=jitter_range.max(1))
                } else {
                    backoff_ms
                };

                tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
                backoff_ms = ((backoff_ms as f64) * config.backoff_multiplier) as u64;
                backoff_ms = backoff_ms.min(config.max_backoff_ms);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry_on_first_try() {
        let config = RetryConfig {
            max_attempts: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            backoff_multiplier: 2.0,
            jitter: false,
        };
        let result: Result<u32, &str> = retry_async(&config, || async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            backoff_multiplier: 2.0,
            jitter: false,
        };
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry_async(&config, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("not yet")
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let config = RetryConfig {
            max_attempts: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            backoff_multiplier: 2.0,
            jitter: false,
        };
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry_async(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("always fails") }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
