//! Retrying provider wrapper.
//!
//! Re-issues a request when the inner provider fails with a retryable error
//! (rate limit, timeout, network, 5xx). Delays grow exponentially with
//! jitter and honor the provider's `retry-after` hint. Only the opening of a
//! stream is retried; once deltas flow, failures surface to the caller
//! unchanged.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use std::sync::Arc;
use std::time::Duration;
use toolloop_core::error::ProviderError;
use toolloop_core::provider::*;
use toolloop_core::stream::DeltaStream;
use tracing::warn;

/// A provider that retries a wrapped provider with exponential backoff.
pub struct RetryProvider {
    inner: Arc<dyn Provider>,
    max_retries: usize,
    min_delay: Duration,
    max_delay: Duration,
}

impl RetryProvider {
    /// Wrap a provider. Defaults: 3 retries, 1s initial delay capped at 30s.
    pub fn new(inner: Arc<dyn Provider>) -> Self {
        Self {
            inner,
            max_retries: 3,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries as usize;
        self
    }

    pub fn with_delays(mut self, min: Duration, max: Duration) -> Self {
        self.min_delay = min;
        self.max_delay = max.max(min);
        self
    }

    /// 1s → 2s → 4s … capped, with jitter.
    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_factor(2.0)
            .with_jitter()
            .with_max_times(self.max_retries)
    }

    fn log_retry(&self, op: &str, error: &ProviderError, delay: Duration) {
        warn!(
            provider = %self.inner.name(),
            op,
            max_retries = self.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Retry: provider failed, backing off"
        );
    }
}

/// Stretch the backoff to at least the rate-limit hint. Returning `None`
/// stops retrying, so `None` passes through untouched.
fn adjust_for_rate_limit(error: &ProviderError, delay: Option<Duration>) -> Option<Duration> {
    match (error, delay) {
        (ProviderError::RateLimited { retry_after_secs }, Some(d)) => {
            Some(d.max(Duration::from_secs(*retry_after_secs)))
        }
        (_, delay) => delay,
    }
}

#[async_trait]
impl Provider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        (|| self.inner.complete(request.clone()))
            .retry(self.backoff())
            .when(ProviderError::is_retryable)
            .adjust(adjust_for_rate_limit)
            .notify(|e: &ProviderError, delay: Duration| self.log_retry("complete", e, delay))
            .await
    }

    async fn stream(&self, request: ProviderRequest) -> Result<DeltaStream, ProviderError> {
        (|| self.inner.stream(request.clone()))
            .retry(self.backoff())
            .when(ProviderError::is_retryable)
            .adjust(adjust_for_rate_limit)
            .notify(|e: &ProviderError, delay: Duration| self.log_retry("stream", e, delay))
            .await
    }

    fn supports_streaming(&self) -> bool {
        self.inner.supports_streaming()
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}
