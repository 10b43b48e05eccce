//! Bounded retry around history lookups

use backoff::{future::retry, ExponentialBackoff};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::warn;

use super::{AcquisitionConfig, HistoryClient, WalletTransaction};

/// How often and how patiently a lookup is retried
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry; doubles afterwards
    pub base_delay: Duration,
}

impl From<&AcquisitionConfig> for RetryPolicy {
    fn from(config: &AcquisitionConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Delay before the last retry, saturating on overflow
    fn max_interval(&self) -> Duration {
        self.base_delay
            .checked_mul(2u32.saturating_pow(self.max_attempts))
            .unwrap_or(Duration::MAX)
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.base_delay,
            initial_interval: self.base_delay,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: self.max_interval(),
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Fetch a wallet's history, retrying transient failures
///
/// Gives up after `max_attempts` attempts or on the first non-retryable
/// error; either way the wallet is treated as having no history.
pub async fn fetch_with_retries(
    client: &dyn HistoryClient,
    address: &str,
    chain: &str,
    policy: &RetryPolicy,
) -> Vec<WalletTransaction> {
    let attempts = AtomicU32::new(0);
    let attempts = &attempts;
    let max_attempts = policy.max_attempts;

    let result = retry(policy.backoff(), move || async move {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
        match client.wallet_history(address, chain).await {
            Ok(transactions) => Ok(transactions),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                warn!(wallet = address, attempt, "Retryable history error: {}", e);
                Err(backoff::Error::transient(e))
            }
            Err(e) => Err(backoff::Error::permanent(e)),
        }
    })
    .await;

    match result {
        Ok(transactions) => transactions,
        Err(e) => {
            warn!(
                wallet = address,
                attempts = attempts.load(Ordering::SeqCst),
                "Giving up on wallet history: {}",
                e
            );
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use async_trait::async_trait;

    /// Fails `failures` times with `error`, then serves one transaction
    struct FlakyHistory {
        failures: u32,
        error: fn() -> Error,
        calls: AtomicU32,
    }

    impl FlakyHistory {
        fn new(failures: u32, error: fn() -> Error) -> Self {
            Self {
                failures,
                error,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HistoryClient for FlakyHistory {
        async fn wallet_history(&self, _address: &str, _chain: &str) -> Result<Vec<WalletTransaction>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err((self.error)());
            }
            Ok(vec![WalletTransaction {
                hash: "0xabc".to_string(),
                ..Default::default()
            }])
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let client = FlakyHistory::new(2, || Error::RateLimited("slow down".to_string()));
        let history = fetch_with_retries(&client, "0xwallet", "eth", &policy(5)).await;
        assert_eq!(history.len(), 1);
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_yield_empty_history() {
        let client = FlakyHistory::new(10, || Error::Api("502".to_string()));
        let history = fetch_with_retries(&client, "0xwallet", "eth", &policy(3)).await;
        assert!(history.is_empty());
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let client = FlakyHistory::new(1, || Error::ApiRejected {
            status: 401,
            body: "invalid key".to_string(),
        });
        let history = fetch_with_retries(&client, "0xwallet", "eth", &policy(5)).await;
        assert!(history.is_empty());
        assert_eq!(client.calls(), 1);
    }

    #[test]
    fn test_huge_base_delay_saturates() {
        let policy = RetryPolicy {
            max_attempts: 40,
            base_delay: Duration::from_millis(u64::MAX),
        };
        assert_eq!(policy.max_interval(), Duration::MAX);

        let backoff = policy.backoff();
        assert_eq!(backoff.max_interval, Duration::MAX);
        assert_eq!(backoff.initial_interval, Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_max_interval_doubles_per_attempt() {
        assert_eq!(policy(3).max_interval(), Duration::from_millis(8));
    }

    #[test]
    fn test_policy_from_config() {
        let config = AcquisitionConfig {
            max_attempts: 0,
            base_delay_ms: 250,
            ..Default::default()
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
    }
}
