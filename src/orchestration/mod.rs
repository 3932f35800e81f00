//! # Batch Orchestration Engine
//!
//! Drives a session's work units through the external binary, one unit at
//! a time. The engine wires the keyring manager, retry controller, and
//! process runner together and aggregates per-unit outcomes into a
//! session-level report.
//!
//! ## Core Components
//!
//! - [`EngineContext`]: shared wiring (config, runner, store, builder,
//!   keyring) handed to the flow services
//! - [`batch::BatchOrchestrator`]: the sequential unit loop with identity
//!   resolution, retry wrapping, and the mandatory inter-transaction delay
//! - [`migration::MigrationService`]: claim-accounts flow for Morse keys
//! - [`staking::StakeProvisioningService`]: wallet provisioning and
//!   supplier staking flow
//!
//! One logical worker processes a session sequentially; the 30-second
//! inter-transaction delay is a deliberate serialization point because the
//! destination chain enforces strict per-account sequence ordering.
//! Distinct sessions with distinct signers may run in parallel without
//! coordination.

pub mod batch;
pub mod migration;
pub mod staking;

use crate::command::{CommandBuilder, KeyringBackend, KeyringScope};
use crate::config::CoreConfig;
use crate::error::{CoreError, Result};
use crate::keyring::KeyringManager;
use crate::process::ProcessRunner;
use crate::session::SessionStore;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

pub use batch::{
    BatchOrchestrator, BatchReport, CancelFlag, SignerSource, SigningIdentitySpec, UnitOperation,
    UnitReport, UnitResult,
};
pub use migration::{
    AccountMapping, MigrationOutcome, MigrationOutput, MigrationRequest, MigrationService,
    UnsignedClaimOutcome,
};
pub use staking::{
    ProvisionOutcome, ProvisionRequest, ServiceEndpoint, StakeDescriptor, StakeProvisioningService,
    SupplierService, WalletMnemonicsFile, WalletRecord,
};

/// Shared wiring for the flow services.
///
/// Construction runs the startup sweep of aged temp files; session trees
/// are never part of that sweep.
#[derive(Clone)]
pub struct EngineContext {
    pub config: Arc<CoreConfig>,
    pub runner: Arc<dyn ProcessRunner>,
    pub store: SessionStore,
    pub builder: CommandBuilder,
    pub keyring: Arc<KeyringManager>,
}

impl EngineContext {
    pub fn new(config: Arc<CoreConfig>, runner: Arc<dyn ProcessRunner>) -> Result<Self> {
        let store = SessionStore::new(&config.storage.data_root);
        let builder = CommandBuilder::new(&config.binary, &config.timeouts);
        let tmp_dir = store.tmp_dir()?;
        let keyring = Arc::new(KeyringManager::new(
            runner.clone(),
            builder.clone(),
            config.keyring.fallback_identity.clone(),
            tmp_dir,
        ));

        let swept = store.sweep_stale_temp_files(std::time::Duration::from_secs(
            config.storage.temp_max_age_hours * 3600,
        ))?;
        info!(
            data_root = %config.storage.data_root.display(),
            swept_temp_files = swept,
            "🚀 Orchestration engine context initialized"
        );

        Ok(Self {
            config,
            runner,
            store,
            builder,
            keyring,
        })
    }

    /// The shared keyring scope from configuration
    pub fn default_scope(&self) -> Result<KeyringScope> {
        let backend = KeyringBackend::from_str(&self.config.keyring.backend)
            .map_err(|e| CoreError::configuration(e))?;
        Ok(KeyringScope::new(&self.config.keyring.home, backend))
    }
}
