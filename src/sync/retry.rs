use crate::error::SyncError;
use crate::sync::Shutdown;
use std::time::Duration;
use tracing::{info, warn};

/// Bounded retry with exponential backoff around a single fallible RPC
/// operation. The backoff sleep races the shutdown signal, so a retry loop
/// never outlives a shutdown request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5, base_delay: Duration::from_secs(5), max_delay: Duration::from_secs(60) }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): base · 2^(attempt−1),
    /// capped at `max_delay`.
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << (attempt - 1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op` until it succeeds or the attempt budget is spent. Exhaustion
    /// surfaces as a typed [`SyncError::RetriesExhausted`] rather than
    /// looping forever.
    pub async fn execute<T, E, F, Fut>(
        &self,
        operation: &str,
        shutdown: &Shutdown,
        mut op: F,
    ) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!("{operation} succeeded after {attempt} retries");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        return Err(SyncError::RetriesExhausted {
                            operation: operation.to_string(),
                            attempts: attempt,
                        });
                    }

                    let delay = self.backoff(attempt);
                    warn!("{operation} attempt #{attempt} failed: {e}, retrying in {delay:?}");

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.cancelled() => return Err(SyncError::Cancelled),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::shutdown_channel;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn instant_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy { max_attempts, base_delay: Duration::ZERO, max_delay: Duration::ZERO }
    }

    #[tokio::test]
    async fn test_success_on_first_try() {
        let policy = instant_policy(3);
        let result: Result<u32, SyncError> =
            policy.execute("op", &Shutdown::never(), || async { Ok::<_, String>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_success_after_failures() {
        let policy = instant_policy(5);
        let attempts = AtomicU32::new(0);

        let result = policy
            .execute("op", &Shutdown::never(), || async {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("transient".to_string())
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_is_typed_and_bounded() {
        let policy = instant_policy(3);
        let attempts = AtomicU32::new(0);

        let result: Result<(), SyncError> = policy
            .execute("doomed op", &Shutdown::never(), || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("nope".to_string())
            })
            .await;

        assert!(
            matches!(result, Err(SyncError::RetriesExhausted { attempts: 3, ref operation }) if operation == "doomed op")
        );
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_backoff_sleep_is_interruptible() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(60),
        };
        let (handle, shutdown) = shutdown_channel();

        let task = tokio::spawn(async move {
            policy
                .execute("stuck op", &shutdown, || async { Err::<(), _>("down".to_string()) })
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.shutdown();

        let result = tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
        assert!(matches!(result, Err(SyncError::Cancelled)));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(30),
        };

        assert_eq!(policy.backoff(1), Duration::from_secs(5));
        assert_eq!(policy.backoff(2), Duration::from_secs(10));
        assert_eq!(policy.backoff(3), Duration::from_secs(20));
        assert_eq!(policy.backoff(4), Duration::from_secs(30));
        assert_eq!(policy.backoff(9), Duration::from_secs(30));
    }
}
