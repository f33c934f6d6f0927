//! core::config
//!
//! Configuration schema and loading.
//!
//! # Location
//!
//! `<state-dir>/config.toml`. A missing file yields defaults; a present
//! file is parsed strictly (`deny_unknown_fields`) and validated after
//! parsing.
//!
//! # Example
//!
//! ```toml
//! [canary]
//! default_percent = 10
//!
//! [gates]
//! unit_timeout_secs = 600
//! integration_timeout_secs = 1800
//! smoke_timeout_secs = 900
//!
//! [environments.prod]
//! risk_tier = "high"
//! canary = true
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::EnvName;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Risk tier of an environment. High-tier environments surface a warning
/// on cutover and default to canary deploys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    #[default]
    Low,
    High,
}

/// Canary deploy defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CanaryConfig {
    /// Traffic percentage a canary deploy starts at (1-99).
    pub default_percent: u8,
}

impl Default for CanaryConfig {
    fn default() -> Self {
        Self { default_percent: 10 }
    }
}

/// Gate timeout budgets, in seconds. An unanswered gate past its budget
/// is treated as a timeout signal on the next poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatesConfig {
    pub unit_timeout_secs: u64,
    pub integration_timeout_secs: u64,
    pub smoke_timeout_secs: u64,
}

impl Default for GatesConfig {
    fn default() -> Self {
        Self {
            unit_timeout_secs: 600,
            integration_timeout_secs: 1800,
            smoke_timeout_secs: 900,
        }
    }
}

/// Per-environment overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentConfig {
    /// Risk tier shown in `env show` and carried in audit output.
    pub risk_tier: RiskTier,

    /// Whether promotions into this environment default to a canary stage.
    pub canary: Option<bool>,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub canary: CanaryConfig,
    pub gates: GatesConfig,
    pub environments: BTreeMap<String, EnvironmentConfig>,
}

impl Config {
    /// Load configuration from the state directory.
    ///
    /// A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// `ReadError`/`ParseError` for unreadable or malformed files,
    /// `InvalidValue` when validation fails.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=99).contains(&self.canary.default_percent) {
            return Err(ConfigError::InvalidValue(format!(
                "canary.default_percent must be 1-99, got {}",
                self.canary.default_percent
            )));
        }

        for (secs, key) in [
            (self.gates.unit_timeout_secs, "gates.unit_timeout_secs"),
            (
                self.gates.integration_timeout_secs,
                "gates.integration_timeout_secs",
            ),
            (self.gates.smoke_timeout_secs, "gates.smoke_timeout_secs"),
        ] {
            if secs == 0 {
                return Err(ConfigError::InvalidValue(format!(
                    "{key} must be greater than zero"
                )));
            }
        }

        for name in self.environments.keys() {
            EnvName::new(name).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid environment name in config: {e}"))
            })?;
        }

        Ok(())
    }

    /// Overrides for one environment, if configured.
    pub fn environment(&self, name: &EnvName) -> Option<&EnvironmentConfig> {
        self.environments.get(name.as_ref())
    }

    /// Whether a promotion into `name` defaults to a canary stage.
    pub fn canary_default(&self, name: &EnvName) -> bool {
        self.environment(name)
            .and_then(|e| e.canary)
            .unwrap_or(true)
    }

    /// The risk tier of `name` (Low unless configured otherwise).
    pub fn risk_tier(&self, name: &EnvName) -> RiskTier {
        self.environment(name).map(|e| e.risk_tier).unwrap_or_default()
    }
}
