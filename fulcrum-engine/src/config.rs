//! Typed engine configuration with a TOML loader.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use fulcrum_gateway::RetryPolicy;
use fulcrum_trader::SessionConfig;

/// Root configuration for one engine instance.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct EngineConfig {
    pub session: SessionConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("config at {} is invalid", path.display()))
    }
}

/// Backpressure retry tuning; a policy knob, not a subsystem.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_retry_attempts")]
    pub attempts: u32,
}

impl RetryConfig {
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            delay: Duration::from_millis(self.delay_ms),
            attempts: self.attempts,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_retry_delay_ms(),
            attempts: default_retry_attempts(),
        }
    }
}

/// Raw-depth recorder universe selection.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct RecorderConfig {
    /// Record every instrument whose product id appears here.
    #[serde(default)]
    pub products: Vec<String>,
}

fn default_retry_delay_ms() -> u64 {
    100
}

fn default_retry_attempts() -> u32 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_sections() {
        let config: EngineConfig = toml::from_str(
            r#"
            [session]
            broker_id = "9999"
            user_id = "u1"
            password = "pw"
            "#,
        )
        .unwrap();
        assert_eq!(config.session.broker_id, "9999");
        assert_eq!(config.retry.delay_ms, 100);
        assert_eq!(config.retry.attempts, 5);
        assert!(config.recorder.products.is_empty());
    }

    #[test]
    fn retry_config_builds_policy() {
        let retry = RetryConfig {
            delay_ms: 20,
            attempts: 3,
        };
        let policy = retry.policy();
        assert_eq!(policy.delay, Duration::from_millis(20));
        assert_eq!(policy.attempts, 3);
    }
}
