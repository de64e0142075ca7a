use std::future::Future;
use std::sync::Arc;

use gridscan_geo::{Cell, TypeFilter};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::core::retry_delay;
use crate::data::{CellHarvest, RetryPolicy};
use crate::effects::fetcher::CellFetcher;
use crate::effects::source::ListingSource;
use crate::error::{ErrorClass, RetryError, SourceError};
use crate::rate::{RateLimiter, ReleaseHint};

/// Bounded exponential-backoff retry around source operations.
///
/// Fatal errors end the loop at once. Rate-limit errors also put the shared
/// limiter into cooldown and wait at least the source's `Retry-After`.
#[derive(Debug, Clone)]
pub struct RetryCoordinator {
    policy: RetryPolicy,
    limiter: Arc<RateLimiter>,
    cancel: CancellationToken,
}

impl RetryCoordinator {
    pub fn new(policy: RetryPolicy, limiter: Arc<RateLimiter>) -> Self {
        Self {
            policy,
            limiter,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort backoff waits when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` until it succeeds, fails fatally, or runs out of
    /// attempts. The closure receives the 1-based attempt number.
    ///
    /// # Errors
    ///
    /// - [`RetryError::Fatal`] on the first non-retryable error
    /// - [`RetryError::Exhausted`] after `1 + max_retries` failed attempts,
    ///   carrying the last error
    /// - [`RetryError::Cancelled`] if cancellation fires during a backoff wait,
    ///   or the operation itself reports [`SourceError::Cancelled`]
    pub async fn with_retry<T, F, Fut>(&self, mut operation: F) -> Result<T, RetryError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let error = match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(SourceError::Cancelled) => return Err(RetryError::Cancelled { attempts: attempt }),
                Err(error) => error,
            };

            match error.class() {
                ErrorClass::Fatal => {
                    return Err(RetryError::Fatal {
                        attempts: attempt,
                        error,
                    });
                }
                ErrorClass::RateLimited => {
                    self.limiter.release(ReleaseHint::Cooldown(error.retry_after()));
                }
                ErrorClass::Transient => {}
            }

            if attempt >= max_attempts {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: error,
                });
            }

            let mut delay = retry_delay(attempt - 1, self.policy.base_delay);
            if let Some(hint) = error.retry_after() {
                delay = delay.max(hint);
            }
            warn!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying after error"
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return Err(RetryError::Cancelled { attempts: attempt });
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Fetch one cell with retries.
    pub async fn fetch_cell<S: ListingSource>(
        &self,
        fetcher: &CellFetcher<S>,
        cell: &Cell,
        filter: &TypeFilter,
    ) -> Result<CellHarvest, RetryError> {
        self.with_retry(|_| fetcher.fetch(cell, filter)).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;

    fn coordinator(max_retries: u32) -> RetryCoordinator {
        RetryCoordinator::new(
            RetryPolicy::default()
                .max_retries(max_retries)
                .base_delay(Duration::from_secs(2)),
            Arc::new(RateLimiter::unlimited()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_back_off_then_succeed() {
        let retry = coordinator(3);
        let start = Instant::now();

        let value = retry
            .with_retry(|attempt| async move {
                if attempt < 3 {
                    Err(SourceError::Server {
                        status: 503,
                        message: "busy".into(),
                    })
                } else {
                    Ok(attempt)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 3);
        // 2s + 4s of backoff
        assert!(start.elapsed() >= Duration::from_secs(6));
        assert!(start.elapsed() < Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_reports_last_error() {
        let retry = coordinator(3);
        let calls = AtomicU32::new(0);

        let err = retry
            .with_retry(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err::<(), _>(SourceError::Network(format!("reset #{attempt}"))) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(err.attempts(), 4);
        assert_eq!(err.last_error(), Some(&SourceError::Network("reset #4".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_is_not_retried() {
        let retry = coordinator(3);
        let calls = AtomicU32::new(0);

        let err = retry
            .with_retry(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(SourceError::Unauthorized { status: 401 }) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, RetryError::Fatal { attempts: 1, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_waits_for_retry_after() {
        let retry = coordinator(3);
        let start = Instant::now();

        let value = retry
            .with_retry(|attempt| async move {
                if attempt == 1 {
                    Err(SourceError::RateLimited {
                        status: 429,
                        retry_after: Some(Duration::from_secs(30)),
                    })
                } else {
                    Ok("ok")
                }
            })
            .await
            .unwrap();

        assert_eq!(value, "ok");
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_cools_down_shared_limiter() {
        let limiter = Arc::new(RateLimiter::new(Default::default()));
        let retry = RetryCoordinator::new(
            RetryPolicy::default().base_delay(Duration::from_secs(1)),
            Arc::clone(&limiter),
        );

        let cooling = retry
            .with_retry(|attempt| {
                let limiter = Arc::clone(&limiter);
                async move {
                    if attempt == 1 {
                        Err(SourceError::RateLimited {
                            status: 429,
                            retry_after: None,
                        })
                    } else {
                        Ok(limiter.is_cooling_down())
                    }
                }
            })
            .await
            .unwrap();

        // default cooldown is 60s, the retry came after 1s
        assert!(cooling);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff() {
        let token = CancellationToken::new();
        let retry = RetryCoordinator::new(
            RetryPolicy::default().base_delay(Duration::from_secs(60)),
            Arc::new(RateLimiter::unlimited()),
        )
        .with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });

        let start = Instant::now();
        let err = retry
            .with_retry(|_| async { Err::<(), _>(SourceError::Timeout) })
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert_eq!(err, RetryError::Cancelled { attempts: 1 });
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_operation_is_not_retried() {
        let retry = coordinator(3);
        let calls = AtomicU32::new(0);

        let err = retry
            .with_retry(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(SourceError::Cancelled) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err, RetryError::Cancelled { attempts: 1 });
        assert_eq!(err.last_error(), None);
    }
}
