use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::SearchError;

/// Exponential backoff for backend calls. Only errors that
/// [`SearchError::is_retryable`] accepts are retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 100,
            max_backoff_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: usize, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff_ms,
            max_backoff_ms,
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(0, 0, 0)
    }

    pub async fn retry<F, Fut, T>(&self, operation_name: &str, mut f: F) -> Result<T, SearchError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, SearchError>>,
    {
        let mut attempt = 0;
        let mut backoff = Duration::from_millis(self.initial_backoff_ms);
        let max_backoff = Duration::from_millis(self.max_backoff_ms);

        loop {
            match f().await {
                Ok(result) => {
                    if attempt > 0 {
                        info!(
                            operation = operation_name,
                            attempts = attempt + 1,
                            "Search succeeded after retries"
                        );
                    }
                    return Ok(result);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        warn!(
                            operation = operation_name,
                            attempts = attempt,
                            error = %e,
                            "Search failed after max retries"
                        );
                        return Err(e);
                    }

                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Search failed, retrying"
                    );

                    sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, max_backoff);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(3, 1, 2);
        let result = policy
            .retry("test", || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(SearchError::Unavailable("refused".into()))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(1, 1, 1);
        let result: Result<(), _> = policy
            .retry("test", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SearchError::Status {
                    status: 503,
                    body: String::new(),
                })
            })
            .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let result: Result<(), _> = RetryPolicy::default()
            .retry("test", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SearchError::Status {
                    status: 400,
                    body: "bad query".into(),
                })
            })
            .await;
        assert!(matches!(result, Err(SearchError::Status { status: 400, .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
