//! Retry policy with exponential backoff
//!
//! Wraps idempotent Google API calls. Create calls must never go through here:
//! the server assigns a fresh ID on every attempt, so a retried create
//! produces duplicates.

use super::config::RetryConfig;
use crate::api::errors::ApiError;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Jitter bounds applied to every computed delay (±25 %)
const JITTER_LOW: f64 = 0.75;
const JITTER_HIGH: f64 = 1.25;

/// Retry policy that implements exponential backoff with jitter
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    rng: Arc<Mutex<StdRng>>,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        let rng = match config.jitter_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            rng: Arc::new(Mutex::new(rng)),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute `operation` until it succeeds, fails with a non-retryable
    /// error, exhausts `max_retries`, or `cancel` fires.
    pub async fn execute<F, Fut, T>(
        &self,
        cancel: &CancellationToken,
        operation_name: &str,
        mut operation: F,
    ) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let max_attempts = self.config.max_retries + 1;
        let mut last_error: Option<ApiError> = None;
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(ApiError::Cancelled {
                    last: last_error.map(Box::new),
                });
            }

            debug!(
                "Executing {} (attempt {}/{})",
                operation_name,
                attempt + 1,
                max_attempts
            );

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(ApiError::Cancelled { last: last_error.map(Box::new) });
                }
                outcome = operation() => outcome,
            };

            let error = match outcome {
                Ok(value) => {
                    if attempt > 0 {
                        info!("{} succeeded after {} attempts", operation_name, attempt + 1);
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !error.is_retryable() {
                debug!("{} failed with non-retryable error: {}", operation_name, error);
                return Err(error);
            }

            if attempt + 1 >= max_attempts {
                warn!(
                    "{} failed permanently after {} attempts: {}",
                    operation_name, max_attempts, error
                );
                return Err(error);
            }

            let delay = self.delay_for(attempt);
            warn!(
                "{} failed on attempt {}/{} (retryable): {}; waiting {:?}",
                operation_name,
                attempt + 1,
                max_attempts,
                error,
                delay
            );
            last_error = Some(error);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(ApiError::Cancelled { last: last_error.map(Box::new) });
                }
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }

    /// Jittered delay before retry number `attempt + 1` (0-based attempt)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let factor = match self.rng.lock() {
            Ok(mut rng) => rng.gen_range(JITTER_LOW..=JITTER_HIGH),
            Err(poisoned) => poisoned.into_inner().gen_range(JITTER_LOW..=JITTER_HIGH),
        };
        Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or(self.config.max_backoff)
    }

    /// `min(initial_backoff * 2^attempt, max_backoff)` before jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.config
            .initial_backoff
            .checked_mul(multiplier)
            .unwrap_or(self.config.max_backoff)
            .min(self.config.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
