//! Retry policy for transient Admin API failures.
//!
//! 429 responses and network-level errors are retried with exponential
//! backoff; everything else (404, other non-2xx, parse failures, validation)
//! is propagated immediately since retrying cannot change the outcome.

use std::future::Future;
use std::time::Duration;

use crate::error::ShopifyError;

fn is_retriable(err: &ShopifyError) -> bool {
    matches!(
        err,
        ShopifyError::RateLimited { .. } | ShopifyError::Http(_)
    )
}

/// Executes `operation`, sleeping `backoff_base_secs * 2^attempt` seconds
/// between attempts on retriable errors, up to `max_retries` additional
/// attempts after the first. The last error is returned when retries are
/// exhausted.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T, ShopifyError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ShopifyError>>,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }

                // Shift capped below u64 width so extreme configs cannot overflow.
                let delay_secs = backoff_base_secs.saturating_mul(1u64 << attempt.min(62));
                tracing::warn!(
                    attempt,
                    delay_secs,
                    error = %err,
                    "transient Shopify error, backing off before retry"
                );
                tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn returns_first_success_without_retrying() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(3, 0, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ShopifyError>(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_rate_limited_until_exhausted() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(2, 0, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ShopifyError::RateLimited {
                    store_id: "store-1".to_string(),
                    retry_after_secs: 1,
                })
            }
        })
        .await;
        assert!(matches!(result, Err(ShopifyError::RateLimited { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3, "1 initial + 2 retries");
    }

    #[tokio::test]
    async fn does_not_retry_not_found() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(3, 0, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ShopifyError::NotFound {
                    url: "https://x.example/orders.json".to_string(),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(ShopifyError::NotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_when_a_retry_succeeds() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(3, 0, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(ShopifyError::RateLimited {
                        store_id: "store-1".to_string(),
                        retry_after_secs: 1,
                    })
                } else {
                    Ok("ok")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
