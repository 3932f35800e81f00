//! Stake Provisioning Flow
//!
//! Provisions N supplier nodes on the destination chain: generates one
//! wallet per node in a per-unit keyring home, writes a stake descriptor
//! YAML per node, captures the generated mnemonics into the session's
//! `wallet_mnemonics.json` (the sole sanctioned at-rest location for
//! them), then stakes each node with the owner identity signing.
//!
//! Staking an already-prepared session is a separate entry point so a
//! batch with failed units can be re-invoked without regenerating wallets.

use super::batch::{
    BatchOrchestrator, BatchReport, SigningIdentitySpec, UnitOperation, UnitResult,
};
use super::migration::check_tx_response;
use super::EngineContext;
use crate::classify::classify_process_error;
use crate::command::{builder, KeyringScope, Network, TxParams};
use crate::error::{CoreError, Result};
use crate::session::{types::unit_name, ArtifactKind, SessionKind, SessionParams};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Validated request to provision and stake supplier nodes
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    /// Name of the owner identity in the shared keyring that signs every
    /// stake transaction
    pub owner_identity: String,

    /// Owner's destination-chain address, embedded in each stake descriptor
    pub owner_address: String,

    pub node_count: u32,
    pub network: Network,

    /// Stake amount as `<integer><denom>`, e.g. `60005000000upokt`
    pub stake_amount: String,

    /// Services each supplier advertises
    pub services: Vec<SupplierService>,
}

/// One service entry in a stake descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierService {
    pub service_id: String,
    pub endpoints: Vec<ServiceEndpoint>,
}

/// One endpoint a supplier exposes for a service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub publicly_exposed_url: String,
    pub rpc_type: String,
}

/// YAML stake descriptor consumed by the binary's stake-supplier operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakeDescriptor {
    pub owner_address: String,
    pub operator_address: String,
    pub stake_amount: String,
    pub services: Vec<SupplierService>,
}

/// A generated wallet record persisted to `wallet_mnemonics.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRecord {
    pub name: String,
    pub address: String,
    pub mnemonic: String,
}

/// Contents of `wallet_mnemonics.json`. Callers are responsible for
/// downloading and clearing this file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletMnemonicsFile {
    pub session_id: String,
    pub generated_at: DateTime<Utc>,
    pub wallets: Vec<WalletRecord>,
}

/// Outcome returned to the caller
#[derive(Debug)]
pub struct ProvisionOutcome {
    pub session_id: String,
    pub report: BatchReport,
    pub wallets: Vec<WalletRecord>,
    pub mnemonics_path: PathBuf,
}

/// Orchestrates supplier provisioning and staking
pub struct StakeProvisioningService {
    context: EngineContext,
    orchestrator: BatchOrchestrator,
}

impl StakeProvisioningService {
    pub fn new(context: EngineContext) -> Self {
        let orchestrator = BatchOrchestrator::new(context.clone());
        Self {
            context,
            orchestrator,
        }
    }

    pub fn orchestrator(&self) -> &BatchOrchestrator {
        &self.orchestrator
    }

    /// Provision wallets and stake files for N nodes, then stake them all.
    pub async fn provision(&self, request: ProvisionRequest) -> Result<ProvisionOutcome> {
        self.validate_request(&request)?;
        self.orchestrator.probe_binary().await?;

        let scope = self.context.default_scope()?;
        self.require_owner_identity(&request.owner_identity, &scope)
            .await?;

        let session = self.context.store.create_session(
            SessionKind::StakeProvisioning,
            SessionParams {
                network: request.network,
                owner_address: Some(request.owner_address.clone()),
                unit_count: request.node_count,
            },
        )?;

        let mut wallets = Vec::with_capacity(request.node_count as usize);
        for index in 0..request.node_count {
            let wallet_scope = KeyringScope::new(
                self.context.store.wallet_home(&session, index),
                scope.backend,
            );
            let wallet = self
                .context
                .keyring
                .generate_wallet(&unit_name(index), &wallet_scope)
                .await?;

            let descriptor = StakeDescriptor {
                owner_address: request.owner_address.clone(),
                operator_address: wallet.address.clone(),
                stake_amount: request.stake_amount.clone(),
                services: request.services.clone(),
            };
            self.context.store.record_artifact(
                &session,
                index,
                ArtifactKind::StakeConfig,
                serde_yaml::to_string(&descriptor)?.as_bytes(),
            )?;

            wallets.push(WalletRecord {
                name: wallet.name,
                address: wallet.address,
                mnemonic: wallet.mnemonic,
            });
        }

        let mnemonics = WalletMnemonicsFile {
            session_id: session.id.clone(),
            generated_at: Utc::now(),
            wallets: wallets.clone(),
        };
        let mnemonics_path = self.context.store.record_artifact(
            &session,
            0,
            ArtifactKind::WalletMnemonics,
            &serde_json::to_vec_pretty(&mnemonics)?,
        )?;

        info!(
            session_id = %session.id,
            nodes = request.node_count,
            "Wallets and stake files prepared"
        );

        let report = self
            .stake_session(&session.id, &request.owner_identity, request.network)
            .await?;

        Ok(ProvisionOutcome {
            session_id: session.id,
            report,
            wallets,
            mnemonics_path,
        })
    }

    /// Stake every prepared node of an existing session. Work units are
    /// derived from the stake files on disk, so a crashed or partially
    /// failed batch can be re-invoked with just the session id.
    pub async fn stake_session(
        &self,
        session_id: &str,
        owner_identity: &str,
        network: Network,
    ) -> Result<BatchReport> {
        let scope = self.context.default_scope()?;
        let identity = SigningIdentitySpec {
            override_identity: None,
            session_owner: Some(owner_identity.to_string()),
            fallback: self.context.keyring.fallback_identity().to_string(),
        };
        let operation = StakeSupplierOperation {
            context: self.context.clone(),
            scope: scope.clone(),
            tx: builder::tx_params(network, &self.context.config.gas)?,
        };
        self.orchestrator
            .run_batch(session_id, &identity, &scope, &operation)
            .await
    }

    fn validate_request(&self, request: &ProvisionRequest) -> Result<()> {
        builder::validate_identity_name(&request.owner_identity)?;
        builder::validate_destination_address(&request.owner_address)?;
        if request.node_count == 0 {
            return Err(CoreError::invalid_parameter(
                "node_count",
                "0",
                "must provision at least one node",
            ));
        }
        validate_stake_amount(&request.stake_amount)?;
        if request.services.is_empty() {
            return Err(CoreError::invalid_parameter(
                "services",
                "[]",
                "at least one service is required",
            ));
        }
        Ok(())
    }

    /// The owner identity must already exist in the shared keyring; it is
    /// the caller's credential, never created here.
    async fn require_owner_identity(&self, name: &str, scope: &KeyringScope) -> Result<()> {
        let identities = self.context.keyring.list_identities(scope).await?;
        if identities.iter().any(|k| k.name == name) {
            return Ok(());
        }
        Err(CoreError::AccountNotFound {
            message: format!("owner identity {name} not present in keyring"),
        })
    }
}

/// Amounts reach argv verbatim, so enforce `<integer><allow-listed denom>`
fn validate_stake_amount(amount: &str) -> Result<()> {
    let split = amount
        .find(|c: char| c.is_ascii_alphabetic())
        .ok_or_else(|| {
            CoreError::invalid_parameter("stake_amount", amount, "missing denomination")
        })?;
    let (digits, denom) = amount.split_at(split);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(CoreError::invalid_parameter(
            "stake_amount",
            amount,
            "amount must be a positive integer",
        ));
    }
    if !matches!(denom, "upokt" | "pokt") {
        return Err(CoreError::invalid_parameter(
            "stake_amount",
            amount,
            "denomination not allow-listed",
        ));
    }
    Ok(())
}

/// Per-unit operation broadcasting one stake-supplier transaction
struct StakeSupplierOperation {
    context: EngineContext,
    scope: KeyringScope,
    tx: TxParams,
}

#[async_trait]
impl UnitOperation for StakeSupplierOperation {
    async fn execute(
        &self,
        unit: &crate::session::WorkUnit,
        signer: &str,
    ) -> Result<UnitResult> {
        let invocation = self.context.builder.tx_stake_supplier(
            &unit.input_ref,
            signer,
            &self.scope,
            &self.tx,
        )?;
        let output = self
            .context
            .runner
            .run(&invocation)
            .await
            .map_err(classify_process_error)?;
        let tx_hash = check_tx_response(&output.stdout)?;
        Ok(UnitResult { tx_hash })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stake_amount_validation() {
        assert!(validate_stake_amount("60005000000upokt").is_ok());
        assert!(validate_stake_amount("1pokt").is_ok());
        assert!(validate_stake_amount("upokt").is_err());
        assert!(validate_stake_amount("10.5upokt").is_err());
        assert!(validate_stake_amount("100doge").is_err());
        assert!(validate_stake_amount("100").is_err());
    }

    #[test]
    fn test_stake_descriptor_yaml_shape() {
        let descriptor = StakeDescriptor {
            owner_address: "pokt1owner".to_string(),
            operator_address: "pokt1operator".to_string(),
            stake_amount: "60005000000upokt".to_string(),
            services: vec![SupplierService {
                service_id: "relay".to_string(),
                endpoints: vec![ServiceEndpoint {
                    publicly_exposed_url: "https://relay.example.com".to_string(),
                    rpc_type: "JSON_RPC".to_string(),
                }],
            }],
        };
        let yaml = serde_yaml::to_string(&descriptor).unwrap();
        assert!(yaml.contains("owner_address: pokt1owner"));
        assert!(yaml.contains("operator_address: pokt1operator"));
        assert!(yaml.contains("service_id: relay"));

        let parsed: StakeDescriptor = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.services.len(), 1);
        assert_eq!(parsed.services[0].endpoints[0].rpc_type, "JSON_RPC");
    }
}
