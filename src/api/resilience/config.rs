//! Retry configuration with builder pattern
//!
//! Defaults follow the Google API guidance for transient failures:
//! 5 retries, 1 s initial backoff doubling up to 30 s.

use std::time::Duration;

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt; total attempts are `max_retries + 1`
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Fixed seed for the jitter source. `None` seeds from entropy.
    pub jitter_seed: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            jitter_seed: None,
        }
    }
}

impl RetryConfig {
    /// Create a new builder for RetryConfig
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Single attempt, no waiting (for tests and one-shot tooling)
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            jitter_seed: Some(0),
        }
    }

    /// Apply `GFORMS_MAX_RETRIES`, `GFORMS_INITIAL_BACKOFF_MS` and
    /// `GFORMS_MAX_BACKOFF_MS` overrides on top of this config
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(env_u64)
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<u64>) -> Self {
        if let Some(retries) = lookup("GFORMS_MAX_RETRIES") {
            match u32::try_from(retries) {
                Ok(retries) => self.max_retries = retries,
                Err(_) => log::warn!("Ignoring GFORMS_MAX_RETRIES={}: exceeds {}", retries, u32::MAX),
            }
        }
        if let Some(ms) = lookup("GFORMS_INITIAL_BACKOFF_MS") {
            self.initial_backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = lookup("GFORMS_MAX_BACKOFF_MS") {
            self.max_backoff = Duration::from_millis(ms);
        }
        self
    }
}

fn env_u64(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring {}={:?}: not an unsigned integer", name, raw);
            None
        }
    }
}

/// Builder for RetryConfig
#[derive(Debug)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RetryConfig::default(),
        }
    }

    /// Set max retries after the first attempt
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn initial_backoff(mut self, backoff: Duration) -> Self {
        self.config.initial_backoff = backoff;
        self
    }

    pub fn max_backoff(mut self, backoff: Duration) -> Self {
        self.config.max_backoff = backoff;
        self
    }

    /// Make jitter deterministic
    pub fn jitter_seed(mut self, seed: u64) -> Self {
        self.config.jitter_seed = Some(seed);
        self
    }

    /// Build the final configuration
    pub fn build(self) -> RetryConfig {
        self.config
    }
}

impl Default for RetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
