//! Bounded fixed-delay retry.
//!
//! Used for index readiness polling after writes and for the persona search
//! empty-result retry. Provider calls are never retried through this module.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// How many extra attempts to make and how long to pause before each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub delay: Duration,
}

impl RetryConfig {
    pub fn constant(max_retries: usize, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::constant(0, Duration::ZERO)
    }
}

/// Counts retries against a [`RetryConfig`].
#[derive(Debug)]
pub struct RetryPolicy {
    config: RetryConfig,
    retries: usize,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config, retries: 0 }
    }

    /// Pause before the next attempt, or `None` once retries are used up.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.retries >= self.config.max_retries {
            return None;
        }
        self.retries += 1;
        Some(self.config.delay)
    }

    /// Retries granted so far.
    pub fn attempt(&self) -> usize {
        self.retries
    }
}

/// Run `operation` until it succeeds or the retries in `config` run out,
/// returning the last error in that case.
pub async fn with_retry<F, Fut, T, E>(mut operation: F, config: &RetryConfig) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut policy = RetryPolicy::new(*config);

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        let Some(delay) = policy.next_delay() else {
            debug!(retries = policy.attempt(), error = %err, "Retries exhausted");
            return Err(err);
        };
        warn!(
            retry = policy.attempt(),
            delay_ms = delay.as_millis(),
            error = %err,
            "Operation not ready, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}
