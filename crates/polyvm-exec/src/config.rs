//! Execution host configuration.
//!
//! Loaded from TOML; every section falls back to its defaults when absent.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::codec::MAX_PARAM_LENGTH;
use crate::gas_metering::GasSchedule;

/// Execution host configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecConfig {
    /// Static host operation costs
    pub gas: GasSchedule,
    /// Resource limits
    pub limits: LimitsConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ExecConfig {
    /// Load configuration from file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        Self::from_toml_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let config: ExecConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn to_file(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .map_err(|e| anyhow::anyhow!("Failed to write config file '{}': {}", path.display(), e))?;
        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.limits.max_gas_limit == 0 {
            anyhow::bail!("max_gas_limit cannot be 0");
        }
        if self.limits.max_code_size == 0 {
            anyhow::bail!("max_code_size cannot be 0");
        }
        // A parameter buffer needs at least its version byte.
        if self.limits.max_param_length == 0 {
            anyhow::bail!("max_param_length cannot be 0");
        }
        if self.limits.max_param_length > MAX_PARAM_LENGTH {
            anyhow::bail!(
                "max_param_length cannot exceed {} bytes, got {}",
                MAX_PARAM_LENGTH,
                self.limits.max_param_length
            );
        }
        if self.logging.level.trim().is_empty() {
            anyhow::bail!("logging level cannot be empty");
        }
        Ok(())
    }
}

/// Resource limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest gas limit a session may request
    pub max_gas_limit: u64,
    /// Maximum contract code size in bytes
    pub max_code_size: usize,
    /// Maximum parameter buffer length in bytes
    pub max_param_length: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_gas_limit: 100_000_000,
            max_code_size: 128 * 1024,
            max_param_length: MAX_PARAM_LENGTH,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `polyvm_exec=debug`
    pub level: String,
    /// Emit JSON instead of pretty output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
