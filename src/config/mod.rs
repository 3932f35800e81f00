//! # Core Configuration System
//!
//! Explicit, validated configuration for every ambient dependency the
//! orchestration core used to pick up from process-global state: the
//! external binary location, extra PATH entries, working directory, data
//! root, keyring defaults, timeouts, and delay policy.
//!
//! ## Architecture
//!
//! - **No ambient defaults**: every binary invocation receives `--home`,
//!   `--keyring-backend`, and chain parameters from this struct, never from
//!   the process environment.
//! - **Environment awareness**: supports development/test/production
//!   overrides through the loader.
//! - **Spec constants as defaults**: the 30s inter-transaction delay and
//!   30s retry backoff base are configuration values so tests can shrink
//!   them without patching the orchestrator.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use shannon_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let binary = &manager.config().binary.path;
//! let delay = manager.config().delays.inter_tx_seconds;
//! # Ok(())
//! # }
//! ```

pub mod loader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use loader::ConfigManager;

/// Root configuration structure for the orchestration core
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoreConfig {
    /// External binary location and process environment
    #[serde(default)]
    pub binary: BinaryConfig,

    /// Filesystem root for session trees and temp files
    #[serde(default)]
    pub storage: StorageConfig,

    /// Keyring defaults shared by all sessions
    #[serde(default)]
    pub keyring: KeyringConfig,

    /// Per-operation process timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Inter-transaction delay and retry backoff policy
    #[serde(default)]
    pub delays: DelayConfig,

    /// Transaction gas policy
    #[serde(default)]
    pub gas: GasConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            binary: BinaryConfig::default(),
            storage: StorageConfig::default(),
            keyring: KeyringConfig::default(),
            timeouts: TimeoutConfig::default(),
            delays: DelayConfig::default(),
            gas: GasConfig::default(),
        }
    }
}

/// External binary location and process environment.
///
/// Replaces the ambient PATH/cwd mutation the original service relied on
/// with explicit values passed to the process runner.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BinaryConfig {
    /// Path to the external binary (absolute, or resolved via extra_path_entries)
    pub path: PathBuf,

    /// Directories prepended to PATH for the child process only
    #[serde(default)]
    pub extra_path_entries: Vec<PathBuf>,

    /// Working directory for child processes
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl Default for BinaryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("pocketd"),
            extra_path_entries: Vec::new(),
            working_dir: None,
        }
    }
}

/// Filesystem layout configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory for session trees, inputs, outputs, and temp files
    pub data_root: PathBuf,

    /// Max age in hours before files under `<data_root>/tmp` are swept at startup.
    /// Sessions themselves are never deleted automatically.
    pub temp_max_age_hours: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            temp_max_age_hours: 24,
        }
    }
}

/// Keyring defaults shared by all sessions
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeyringConfig {
    /// Default keyring home directory
    pub home: PathBuf,

    /// Default keyring backend
    pub backend: String,

    /// Last-resort signing identity, re-verified per operation
    pub fallback_identity: String,
}

impl Default for KeyringConfig {
    fn default() -> Self {
        Self {
            home: PathBuf::from(".pocket"),
            backend: "test".to_string(),
            fallback_identity: "alice".to_string(),
        }
    }
}

/// Per-operation process timeouts
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutConfig {
    /// Default timeout for keyring and query operations
    pub default_seconds: u64,

    /// Timeout for network-dependent broadcast operations
    pub broadcast_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_seconds: 60,
            broadcast_seconds: 120,
        }
    }
}

impl TimeoutConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_seconds)
    }

    pub fn broadcast_timeout(&self) -> Duration {
        Duration::from_secs(self.broadcast_seconds)
    }
}

/// Inter-transaction delay and retry backoff policy.
///
/// The inter-transaction delay is a deliberate serialization point: the
/// destination chain enforces strict per-account sequence ordering, and
/// consecutive transactions from the same signer collide without it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DelayConfig {
    /// Seconds to wait between consecutive work units in a batch
    pub inter_tx_seconds: u64,

    /// Base seconds for linear retry backoff (wait = base * attempt)
    pub retry_backoff_base_seconds: u64,

    /// Maximum attempts for the one retryable failure class
    pub max_retry_attempts: u32,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            inter_tx_seconds: 30,
            retry_backoff_base_seconds: 30,
            max_retry_attempts: 3,
        }
    }
}

impl DelayConfig {
    pub fn inter_tx_delay(&self) -> Duration {
        Duration::from_secs(self.inter_tx_seconds)
    }

    pub fn retry_backoff_base(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_base_seconds)
    }
}

/// Transaction gas policy, validated before inclusion in any argv
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GasConfig {
    /// Gas estimation multiplier, must be in (0, 10]
    pub gas_adjustment: f64,

    /// Gas price as `<decimal><denom>`, denom must be allow-listed
    pub gas_prices: String,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            gas_adjustment: 1.5,
            gas_prices: "0.001upokt".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_spec_constants() {
        let config = CoreConfig::default();
        assert_eq!(config.delays.inter_tx_seconds, 30);
        assert_eq!(config.delays.retry_backoff_base_seconds, 30);
        assert_eq!(config.delays.max_retry_attempts, 3);
        assert_eq!(config.timeouts.default_seconds, 60);
        assert_eq!(config.timeouts.broadcast_seconds, 120);
        assert_eq!(config.keyring.fallback_identity, "alice");
    }

    #[test]
    fn test_duration_helpers() {
        let delays = DelayConfig::default();
        assert_eq!(delays.inter_tx_delay(), Duration::from_secs(30));
        assert_eq!(delays.retry_backoff_base(), Duration::from_secs(30));
    }
}
