//! Configuration Loader
//!
//! Environment-aware configuration loading. Merges an optional YAML file
//! with `SHANNON_`-prefixed environment variables, validates the result,
//! and exposes it behind a shared manager.

use super::CoreConfig;
use crate::error::{CoreError, Result};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Loaded configuration plus the environment it was resolved for
pub struct ConfigManager {
    config: CoreConfig,
    environment: String,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection.
    ///
    /// Sources, later overriding earlier:
    /// 1. built-in defaults
    /// 2. `config/shannon.yaml` (or `SHANNON_CONFIG_PATH`), if present
    /// 3. environment variables prefixed `SHANNON__` (e.g.
    ///    `SHANNON__BINARY__PATH=/usr/local/bin/pocketd`)
    pub fn load() -> Result<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_with_env(&environment)
    }

    /// Load configuration for an explicit environment, useful in tests
    pub fn load_with_env(environment: &str) -> Result<Arc<ConfigManager>> {
        let config_path = Self::config_file_path();

        debug!(
            environment = %environment,
            config_file = %config_path.display(),
            "Loading orchestration core configuration"
        );

        let defaults = serde_yaml::to_string(&CoreConfig::default())
            .map_err(|e| CoreError::configuration(format!("default serialization: {e}")))?;

        let merged = config::Config::builder()
            .add_source(config::File::from_str(&defaults, config::FileFormat::Yaml))
            .add_source(config::File::from(config_path.clone()).required(false))
            .add_source(
                config::Environment::with_prefix("SHANNON")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| CoreError::configuration(e.to_string()))?;

        let config: CoreConfig = merged
            .try_deserialize()
            .map_err(|e| CoreError::configuration(e.to_string()))?;

        Self::validate(&config)?;

        debug!(
            binary = %config.binary.path.display(),
            data_root = %config.storage.data_root.display(),
            "✅ Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Get the resolved environment name
    pub fn environment(&self) -> &str {
        &self.environment
    }

    fn detect_environment() -> String {
        env::var("SHANNON_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn config_file_path() -> PathBuf {
        env::var("SHANNON_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/shannon.yaml"))
    }

    fn validate(config: &CoreConfig) -> Result<()> {
        if config.binary.path.as_os_str().is_empty() {
            return Err(CoreError::configuration("binary.path must not be empty"));
        }
        if config.storage.data_root.as_os_str().is_empty() {
            return Err(CoreError::configuration(
                "storage.data_root must not be empty",
            ));
        }
        if config.delays.max_retry_attempts == 0 {
            return Err(CoreError::configuration(
                "delays.max_retry_attempts must be at least 1",
            ));
        }
        if config.keyring.fallback_identity.trim().is_empty() {
            return Err(CoreError::configuration(
                "keyring.fallback_identity must not be empty",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_with_defaults_only() {
        let manager = ConfigManager::load_with_env("test").expect("load defaults");
        assert_eq!(manager.environment(), "test");
        assert_eq!(manager.config().delays.inter_tx_seconds, 30);
    }

    #[test]
    fn test_validation_rejects_zero_attempts() {
        let mut config = CoreConfig::default();
        config.delays.max_retry_attempts = 0;
        let err = ConfigManager::validate(&config).expect_err("must reject");
        assert!(err.to_string().contains("max_retry_attempts"));
    }
}
