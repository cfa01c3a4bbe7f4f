use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::refresh::metadata::UrlInput;

/// Caller-supplied source of fresh URLs. Failing signals the retry policy.
#[async_trait]
pub trait RefreshCallback: Send + Sync {
    async fn refresh(&self) -> anyhow::Result<UrlInput>;
}

#[async_trait]
impl<F, Fut> RefreshCallback for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<UrlInput>> + Send + 'static,
{
    async fn refresh(&self) -> anyhow::Result<UrlInput> {
        (self)().await
    }
}

/// Bounded exponential backoff: `base * 2^retry_count` while
/// `retry_count < max_retries`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay before the next retry, or `None` once the budget is spent
    pub fn delay_for(&self, retry_count: u32) -> Option<Duration> {
        if retry_count >= self.max_retries {
            return None;
        }
        let factor = 2u32.checked_pow(retry_count).unwrap_or(u32::MAX);
        Some(self.base_delay.saturating_mul(factor))
    }
}
