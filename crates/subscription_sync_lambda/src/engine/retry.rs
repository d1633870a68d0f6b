use std::future::Future;

use tracing::warn;

use crate::runtime::config::RetryPolicy;
use crate::runtime::error::ApiError;

/// Retries throttled calls with quadratic backoff; anything else is final.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, item: &str, call: F) -> Result<T, ApiError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_throttled() && policy.can_retry(attempt) => {
                let delay = policy.delay_for(attempt);
                warn!(item = %item, attempt, delay = ?delay, "throttled, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff_unit: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn returns_value_after_throttled_attempts() {
        let calls = AtomicU32::new(0);

        let result = with_retry(policy(10), "g", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ApiError::throttled("Rate exceeded"))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);

        let result: Result<(), ApiError> = with_retry(policy(2), "g", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ApiError::throttled("Rate exceeded"))
        })
        .await;

        assert_eq!(result, Err(ApiError::throttled("Rate exceeded")));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<(), ApiError> = with_retry(policy(10), "g", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ApiError::other("denied"))
        })
        .await;

        assert_eq!(result, Err(ApiError::other("denied")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
