//! Configuration management for Lockstep
//!
//! This module handles loading, parsing, and validating harness
//! configuration from an optional YAML file. Every field has a default, so
//! running without a config file is fully supported; CLI flags override the
//! loaded values in the command handlers.

use crate::compare::ComparePolicy;
use crate::error::{LockstepError, Result};
use crate::orchestrator::OrchestratorOptions;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for Lockstep
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Orchestration behavior.
    #[serde(default)]
    pub harness: HarnessConfig,
    /// Reference server settings for `lockstep serve`.
    #[serde(default)]
    pub server: ServerConfig,
}

/// Orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Per-call timeout for every remote operation (seconds)
    #[serde(default = "default_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// Combined absolute/relative tolerance for float comparison
    #[serde(default = "default_float_tolerance")]
    pub float_tolerance: f64,

    /// Verify during preflight that referenced methods exist on every
    /// reachable server
    #[serde(default = "default_validate_methods")]
    pub validate_methods: bool,
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_float_tolerance() -> f64 {
    crate::compare::DEFAULT_FLOAT_TOLERANCE
}

fn default_validate_methods() -> bool {
    true
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: default_timeout_seconds(),
            float_tolerance: default_float_tolerance(),
            validate_methods: default_validate_methods(),
        }
    }
}

/// Reference server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port; 0 picks an ephemeral port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    50051
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Load configuration from an optional YAML file.
    ///
    /// `None` yields the built-in defaults. An explicit path that does not
    /// exist is an error rather than a silent fallback.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if
    /// validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            None => Config::default(),
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                serde_yaml::from_str(&contents)
                    .with_context(|| format!("failed to parse config file {}", path.display()))?
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate field ranges.
    ///
    /// # Errors
    ///
    /// Returns [`LockstepError::Config`] for a zero timeout or a negative
    /// tolerance.
    pub fn validate(&self) -> Result<()> {
        if self.harness.request_timeout_seconds == 0 {
            return Err(
                LockstepError::Config("request_timeout_seconds must be positive".into()).into(),
            );
        }
        if !self.harness.float_tolerance.is_finite() || self.harness.float_tolerance < 0.0 {
            return Err(LockstepError::Config(
                "float_tolerance must be a non-negative finite number".into(),
            )
            .into());
        }
        Ok(())
    }

    /// Derive orchestrator options from the harness section.
    pub fn orchestrator_options(&self) -> OrchestratorOptions {
        OrchestratorOptions {
            call_timeout: Duration::from_secs(self.harness.request_timeout_seconds),
            compare: ComparePolicy::with_tolerance(self.harness.float_tolerance),
            validate_methods: self.harness.validate_methods,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.harness.request_timeout_seconds, 30);
        assert_eq!(config.server.port, 50051);
        assert!(config.harness.validate_methods);
        config.validate().unwrap();
    }

    #[test]
    fn test_load_none_uses_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_load_partial_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "harness:\n  request_timeout_seconds: 5\nserver:\n  port: 9000\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.harness.request_timeout_seconds, 5);
        assert_eq!(config.server.port, 9000);
        // Unspecified fields keep their defaults.
        assert_eq!(
            config.harness.float_tolerance,
            crate::compare::DEFAULT_FLOAT_TOLERANCE
        );
    }

    #[test]
    fn test_load_missing_explicit_path_errors() {
        let err = Config::load(Some(Path::new("/no/such/config.yaml"))).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.harness.request_timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_tolerance() {
        let mut config = Config::default();
        config.harness.float_tolerance = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_orchestrator_options_reflect_config() {
        let mut config = Config::default();
        config.harness.request_timeout_seconds = 3;
        config.harness.float_tolerance = 0.5;
        let options = config.orchestrator_options();
        assert_eq!(options.call_timeout, Duration::from_secs(3));
        assert_eq!(options.compare.float_tolerance, 0.5);
    }
}
