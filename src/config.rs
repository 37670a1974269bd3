//! Engine configuration.
//!
//! `StreamConfig` carries the knobs for chunking, pacing, typing
//! indicators, and the default retry behavior derived for
//! [`StreamEngine::with_retry`](crate::StreamEngine::with_retry).
//! Invalid values fail fast at configuration time; nothing is clamped.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::{PolicyError, RetryPolicy};

// ============================================================================
// StreamConfig
// ============================================================================

/// Configuration for a [`StreamEngine`](crate::StreamEngine) instance.
///
/// Replaceable at runtime via `StreamEngine::reconfigure`; sessions already
/// in flight keep the configuration they were submitted with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Target chunk size in characters. Must be greater than zero.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Delay between consecutive chunks in milliseconds.
    #[serde(default = "default_chunk_delay_ms")]
    pub chunk_delay_ms: u64,
    /// Maximum number of retries (not counting the initial attempt) for
    /// operations wrapped by the engine's retry executor.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay before the first retry in milliseconds.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Per-attempt timeout for operations wrapped by the retry executor,
    /// in milliseconds.
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
    /// Whether sessions emit typing-indicator start/stop events.
    #[serde(default = "default_true")]
    pub emit_typing: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_delay_ms: default_chunk_delay_ms(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            operation_timeout_ms: default_operation_timeout_ms(),
            emit_typing: true,
        }
    }
}

impl StreamConfig {
    /// Validate the configuration.
    ///
    /// Returns an error instead of silently adjusting bad values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize);
        }
        self.retry_policy().validate()?;
        Ok(())
    }

    /// Inter-chunk pacing delay.
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }

    /// Per-attempt operation timeout for the retry executor.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// Derive the default retry policy for this configuration.
    ///
    /// The delay cap is raised to at least the base delay so a large
    /// `retry_base_delay_ms` cannot produce an inverted policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        let base = self.retry_base_delay_ms;
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay_ms: base,
            max_delay_ms: base.max(RetryPolicy::default().max_delay_ms),
            ..RetryPolicy::default()
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors from configuration validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("chunk_size must be greater than zero")]
    InvalidChunkSize,

    #[error("invalid retry policy: {0}")]
    Retry(#[from] PolicyError),
}

// ============================================================================
// Private Helpers (Serde Defaults)
// ============================================================================

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_delay_ms() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_operation_timeout_ms() -> u64 {
    30_000
}

/// Serde default for bool fields that should be `true` (serde's default is `false`).
fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = StreamConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_delay_ms, 300);
        assert!(config.emit_typing);
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let config = StreamConfig {
            chunk_size: 0,
            ..StreamConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidChunkSize)
        ));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: StreamConfig = serde_json::from_str(r#"{"chunk_size": 500}"#).unwrap();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.operation_timeout_ms, 30_000);
        assert!(config.emit_typing);
    }

    #[test]
    fn derived_policy_cap_covers_large_base_delay() {
        let config = StreamConfig {
            retry_base_delay_ms: 120_000,
            ..StreamConfig::default()
        };
        let policy = config.retry_policy();
        assert!(policy.max_delay_ms >= policy.base_delay_ms);
        assert!(config.validate().is_ok());
    }
}
