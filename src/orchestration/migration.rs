//! Migration Flow
//!
//! Claims a batch of legacy Morse accounts on the Shannon chain. The whole
//! key-set is one work unit: the external binary's claim-accounts
//! operation consumes an input file of cleaned hex keys and emits an
//! output file of per-account results in a single transaction.

use super::batch::{
    BatchOrchestrator, BatchReport, SigningIdentitySpec, UnitOperation, UnitResult,
};
use super::EngineContext;
use crate::classify::{classify_chain_error, classify_process_error};
use crate::command::builder::validate_destination_address;
use crate::command::{builder, KeyringScope, Network, TxParams};
use crate::error::{CoreError, Result};
use crate::keyring::{validate_hex_key, Credential};
use crate::session::{ArtifactKind, Session, SessionKind, SessionParams};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Validated request to migrate a set of source-chain accounts
#[derive(Debug, Clone)]
pub struct MigrationRequest {
    /// Raw hex private keys of the Morse accounts to claim
    pub source_keys: Vec<String>,

    /// Shannon address receiving the claimed balances
    pub destination_address: String,

    pub network: Network,

    /// Credential for the signing identity; `Credential::Fallback` signs
    /// with the configured last-resort identity
    pub signing_credential: Credential,
}

/// Per-account mapping from the CLI-produced output file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountMapping {
    pub morse_address: String,
    pub shannon_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// CLI-produced migration result file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationOutput {
    pub mappings: Vec<AccountMapping>,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub tx_code: Option<i64>,
}

/// Outcome returned to the caller
#[derive(Debug)]
pub struct MigrationOutcome {
    pub session_id: String,
    pub signer_address: String,
    pub report: BatchReport,
    pub output: Option<MigrationOutput>,
}

/// Unsigned-transaction outcome for client-side signing flows
#[derive(Debug)]
pub struct UnsignedClaimOutcome {
    pub session_id: String,
    pub unsigned_tx_path: PathBuf,
    pub unsigned_tx_json: String,
}

/// Broadcast response printed by the binary on stdout
#[derive(Debug, Clone, Deserialize)]
pub struct TxResponse {
    #[serde(default)]
    pub txhash: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub raw_log: Option<String>,
}

/// Parse the broadcast response and surface chain-level failures the
/// binary reports with a zero exit code but a non-zero tx code.
pub(super) fn check_tx_response(stdout: &str) -> Result<Option<String>> {
    let trimmed = stdout.trim();
    let response: TxResponse = match serde_json::from_str(trimmed) {
        Ok(response) => response,
        // Some operations print nothing useful on success.
        Err(_) => return Ok(None),
    };
    if response.code.unwrap_or(0) != 0 {
        let detail = response
            .raw_log
            .clone()
            .unwrap_or_else(|| trimmed.to_string());
        return Err(classify_chain_error(&detail).unwrap_or(CoreError::NonZeroExit {
            exit_code: 0,
            stdout: trimmed.to_string(),
            stderr: detail,
        }));
    }
    Ok(response.txhash)
}

/// Orchestrates claim-accounts migrations
pub struct MigrationService {
    context: EngineContext,
    orchestrator: BatchOrchestrator,
}

impl MigrationService {
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

    /// Migrate the requested accounts, broadcasting one claim transaction.
    pub async fn migrate(&self, request: MigrationRequest) -> Result<MigrationOutcome> {
        // Probe availability before touching the keyring or the session
        // tree; a missing binary must abort before any side effect.
        self.orchestrator.probe_binary().await?;

        let (session, scope) = self.prepare_session(&request)?;
        let (signer, signer_address) = self.establish_signer(&session, &request, &scope).await?;

        let identity = SigningIdentitySpec {
            override_identity: signer.clone(),
            session_owner: None,
            fallback: self.context.keyring.fallback_identity().to_string(),
        };

        let operation = ClaimAccountsOperation {
            context: self.context.clone(),
            session: session.clone(),
            destination_address: request.destination_address.clone(),
            scope: scope.clone(),
            tx: builder::tx_params(request.network, &self.context.config.gas)?,
        };

        let report = self
            .orchestrator
            .run_batch(&session.id, &identity, &scope, &operation)
            .await?;

        let output = self.read_output(&session);
        info!(
            session_id = %session.id,
            mappings = output.as_ref().map(|o| o.mappings.len()).unwrap_or(0),
            "Migration batch complete"
        );

        Ok(MigrationOutcome {
            session_id: session.id.clone(),
            signer_address,
            report,
            output,
        })
    }

    /// Produce an unsigned claim transaction for client-side signing.
    ///
    /// No broadcast happens, so no retry wrapping or inter-transaction
    /// delay applies; the artifact is recorded under the session's output
    /// tree.
    pub async fn generate_unsigned_claim(
        &self,
        request: MigrationRequest,
    ) -> Result<UnsignedClaimOutcome> {
        let (session, scope) = self.prepare_session(&request)?;
        let (signer, _) = self.establish_signer(&session, &request, &scope).await?;
        let signer_name = signer
            .unwrap_or_else(|| self.context.keyring.fallback_identity().to_string());

        let input = self
            .context
            .store
            .artifact_path(&session, 0, ArtifactKind::MigrationInput);
        let output = self
            .context
            .store
            .artifact_path(&session, 0, ArtifactKind::MigrationOutput);
        let invocation = self.context.builder.tx_claim_accounts(
            &input,
            &output,
            &request.destination_address,
            &signer_name,
            &scope,
            &builder::tx_params(request.network, &self.context.config.gas)?,
            true,
        )?;

        let process_output = self
            .context
            .runner
            .run(&invocation)
            .await
            .map_err(classify_process_error)?;

        let unsigned_tx_path = self.context.store.record_artifact(
            &session,
            0,
            ArtifactKind::UnsignedTx,
            process_output.stdout.as_bytes(),
        )?;

        Ok(UnsignedClaimOutcome {
            session_id: session.id,
            unsigned_tx_path,
            unsigned_tx_json: process_output.stdout,
        })
    }

    /// Validate the request, create the session, and record the cleaned
    /// key-set as the migration input artifact.
    fn prepare_session(&self, request: &MigrationRequest) -> Result<(Session, KeyringScope)> {
        validate_destination_address(&request.destination_address)?;
        if request.source_keys.is_empty() {
            return Err(CoreError::invalid_parameter(
                "source_keys",
                "[]",
                "at least one source key is required",
            ));
        }

        // Every key is validated before any process is spawned.
        let cleaned: Vec<String> = request
            .source_keys
            .iter()
            .map(|raw| validate_hex_key(raw))
            .collect::<Result<_>>()?;

        let session = self.context.store.create_session(
            SessionKind::Migration,
            SessionParams {
                network: request.network,
                owner_address: Some(request.destination_address.clone()),
                unit_count: cleaned.len() as u32,
            },
        )?;
        self.context.store.record_artifact(
            &session,
            0,
            ArtifactKind::MigrationInput,
            &serde_json::to_vec_pretty(&cleaned)?,
        )?;

        let scope = self.context.default_scope()?;
        Ok((session, scope))
    }

    /// Establish the signing identity per the credential, returning the
    /// batch-level override name (`None` when signing falls back) and the
    /// signer's address.
    async fn establish_signer(
        &self,
        session: &Session,
        request: &MigrationRequest,
        scope: &KeyringScope,
    ) -> Result<(Option<String>, String)> {
        match &request.signing_credential {
            Credential::Fallback => {
                let address = self.context.keyring.ensure_fallback(scope).await?;
                Ok((None, address))
            }
            credential => {
                let short_id: String = session.id.chars().take(8).collect();
                let name = format!("migration-{short_id}");
                let address = self
                    .context
                    .keyring
                    .ensure_identity(&name, credential, scope)
                    .await?;
                Ok((Some(name), address))
            }
        }
    }

    fn read_output(&self, session: &Session) -> Option<MigrationOutput> {
        let bytes = self
            .context
            .store
            .read_artifact(session, 0, ArtifactKind::MigrationOutput)
            .ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

/// Per-unit operation broadcasting the claim-accounts transaction
struct ClaimAccountsOperation {
    context: EngineContext,
    session: Session,
    destination_address: String,
    scope: KeyringScope,
    tx: TxParams,
}

#[async_trait]
impl UnitOperation for ClaimAccountsOperation {
    async fn execute(
        &self,
        unit: &crate::session::WorkUnit,
        signer: &str,
    ) -> Result<UnitResult> {
        let output_path =
            self.context
                .store
                .artifact_path(&self.session, unit.index, ArtifactKind::MigrationOutput);
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
        }

        let invocation = self.context.builder.tx_claim_accounts(
            &unit.input_ref,
            &output_path,
            &self.destination_address,
            signer,
            &self.scope,
            &self.tx,
            false,
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
