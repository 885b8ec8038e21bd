//! Executor configuration.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::{Builder, Runtime};

use crate::{Backoff, ExecutorError, ExponentialBackoff, LegacyBackoff, LinearBackoff};

/// Which backoff strategy to use between retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackoffConfig {
    /// `step_ms * attempt` milliseconds.
    Linear { step_ms: u64 },
    /// Doubling from `base_ms`, capped at `max_ms`.
    Exponential { base_ms: u64, max_ms: u64 },
    /// The flat ~200ms delay of the replaced service.
    Legacy,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::Linear {
            step_ms: LinearBackoff::DEFAULT_STEP.as_millis() as u64,
        }
    }
}

impl BackoffConfig {
    /// Build the configured strategy.
    pub fn strategy(&self) -> Arc<dyn Backoff> {
        match self {
            Self::Linear { step_ms } => {
                Arc::new(LinearBackoff::new(Duration::from_millis(*step_ms)))
            }
            Self::Exponential { base_ms, max_ms } => Arc::new(ExponentialBackoff::new(
                Duration::from_millis(*base_ms),
                Duration::from_millis(*max_ms),
            )),
            Self::Legacy => Arc::new(LegacyBackoff),
        }
    }
}

/// Settings for the shared worker pool and retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Number of pool worker threads.
    pub worker_threads: usize,
    /// Retries allowed after the first failed attempt.
    pub max_attempts: u32,
    pub backoff: BackoffConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            max_attempts: 3,
            backoff: BackoffConfig::default(),
        }
    }
}

impl ExecutorConfig {
    /// Check the configuration for values the pool cannot run with.
    pub fn validate(&self) -> Result<(), ExecutorError> {
        if self.worker_threads == 0 {
            return Err(ExecutorError::InvalidConfig(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        if let BackoffConfig::Exponential { base_ms, max_ms } = self.backoff {
            if base_ms > max_ms {
                return Err(ExecutorError::InvalidConfig(format!(
                    "exponential backoff base ({base_ms}ms) exceeds max ({max_ms}ms)"
                )));
            }
        }
        Ok(())
    }

    /// Build the shared worker pool.
    pub fn build_runtime(&self) -> Result<Runtime, ExecutorError> {
        self.validate()?;
        let runtime = Builder::new_multi_thread()
            .worker_threads(self.worker_threads)
            .thread_name("cadence-worker")
            .enable_all()
            .build()?;
        Ok(runtime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ExecutorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.backoff, BackoffConfig::Linear { step_ms: 100 });
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = ExecutorConfig {
            worker_threads: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ExecutorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_inverted_exponential_rejected() {
        let config = ExecutorConfig {
            backoff: BackoffConfig::Exponential {
                base_ms: 5000,
                max_ms: 100,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backoff_config_from_json() {
        let config: ExecutorConfig = serde_json::from_str(
            r#"{"max_attempts": 5, "backoff": {"type": "exponential", "base_ms": 50, "max_ms": 1000}}"#,
        )
        .unwrap();

        assert_eq!(config.worker_threads, 4);
        assert_eq!(config.max_attempts, 5);
        let strategy = config.backoff.strategy();
        assert_eq!(strategy.delay(1), Duration::from_millis(50));
        assert_eq!(strategy.delay(10), Duration::from_millis(1000));
    }

    #[test]
    fn test_legacy_backoff_config() {
        let config: BackoffConfig = serde_json::from_str(r#"{"type": "legacy"}"#).unwrap();
        assert_eq!(config, BackoffConfig::Legacy);
        assert_eq!(config.strategy().delay(1), Duration::from_millis(201));
    }

    #[test]
    fn test_build_runtime() {
        let config = ExecutorConfig {
            worker_threads: 1,
            ..Default::default()
        };
        let runtime = config.build_runtime().unwrap();
        assert_eq!(runtime.block_on(async { 2 + 2 }), 4);
    }
}
