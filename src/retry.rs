//! Exponential backoff for connection establishment
//!
//! Connectivity failures against PostgreSQL are retried without bound: the
//! loop stalls at the connect step until the database is reachable again.
//! The policy applies only around establishing a connection, never mid-query.

use crate::config::BackoffConfig;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backoff schedule: `start * factor^attempt`, capped at `max`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub start: Duration,
    pub factor: f64,
    pub max: Duration,
}

impl RetryPolicy {
    pub fn new(start: Duration, factor: f64, max: Duration) -> Self {
        Self { start, factor, max }
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(
            Duration::from_millis(config.start_ms),
            config.factor,
            Duration::from_millis(config.max_ms),
        )
    }

    /// Delay before the given zero-based retry attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        let millis = self.start.as_millis() as f64 * self.factor.powi(attempt as i32);
        let capped = millis.min(self.max.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Run `op` until it succeeds, sleeping per the policy between attempts.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Display,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return value,
            Err(e) => {
                let delay = policy.delay(attempt);
                warn!(
                    "{} failed (attempt {}): {}; retrying in {:?}",
                    what,
                    attempt + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt = attempt.saturating_add(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(100), 2.0, Duration::from_millis(1000))
    }

    #[test]
    fn test_delay_grows_geometrically() {
        let p = policy();
        assert_eq!(p.delay(0), Duration::from_millis(100));
        assert_eq!(p.delay(1), Duration::from_millis(200));
        assert_eq!(p.delay(2), Duration::from_millis(400));
        assert_eq!(p.delay(3), Duration::from_millis(800));
    }

    #[test]
    fn test_delay_hits_ceiling() {
        let p = policy();
        assert_eq!(p.delay(4), Duration::from_millis(1000));
        assert_eq!(p.delay(20), Duration::from_millis(1000));
    }

    #[test]
    fn test_constant_factor() {
        let p = RetryPolicy::new(Duration::from_millis(50), 1.0, Duration::from_millis(1000));
        assert_eq!(p.delay(0), Duration::from_millis(50));
        assert_eq!(p.delay(7), Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_with_retry_until_success() {
        let p = RetryPolicy::new(Duration::from_millis(1), 1.0, Duration::from_millis(1));
        let mut attempts = 0;

        let value = with_retry(&p, "test op", || {
            attempts += 1;
            let outcome: Result<u32, String> = if attempts < 3 {
                Err("not yet".to_string())
            } else {
                Ok(42)
            };
            async move { outcome }
        })
        .await;

        assert_eq!(value, 42);
        assert_eq!(attempts, 3);
    }
}
