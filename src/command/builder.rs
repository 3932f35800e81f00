//! Command Builder
//!
//! Produces [`CommandInvocation`] values from typed parameters. All
//! externally supplied values (identity names, file paths, addresses) are
//! passed as discrete argv elements; numeric and enum parameters are
//! validated against allow-lists before inclusion.

use super::{CommandInvocation, KeyringScope, TxParams};
use crate::config::{BinaryConfig, GasConfig, TimeoutConfig};
use crate::error::{CoreError, Result};
use std::path::{Path, PathBuf};

/// Denominations accepted in a gas price string
const ALLOWED_DENOMS: &[&str] = &["upokt", "pokt"];

/// Builds argument vectors for the external binary from typed descriptors
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    binary: PathBuf,
    extra_path_entries: Vec<PathBuf>,
    working_dir: Option<PathBuf>,
    timeouts: TimeoutConfig,
}

impl CommandBuilder {
    pub fn new(binary: &BinaryConfig, timeouts: &TimeoutConfig) -> Self {
        Self {
            binary: binary.path.clone(),
            extra_path_entries: binary.extra_path_entries.clone(),
            working_dir: binary.working_dir.clone(),
            timeouts: timeouts.clone(),
        }
    }

    /// `version` - availability probe run before any batch starts
    pub fn version(&self) -> CommandInvocation {
        self.invocation(vec!["version".into()], None)
    }

    /// `keys list` for a keyring scope, JSON output
    pub fn keys_list(&self, scope: &KeyringScope) -> CommandInvocation {
        let mut args = vec!["keys".into(), "list".into()];
        push_scope(&mut args, scope);
        push_json_output(&mut args);
        self.invocation(args, None)
    }

    /// `keys delete` without interactive confirmation
    pub fn keys_delete(&self, name: &str, scope: &KeyringScope) -> Result<CommandInvocation> {
        validate_identity_name(name)?;
        let mut args = vec!["keys".into(), "delete".into(), name.to_string(), "--yes".into()];
        push_scope(&mut args, scope);
        Ok(self.invocation(args, None))
    }

    /// `keys import` from a temp file holding the unarmored hex key.
    ///
    /// The key itself never appears in argv; only the file path does. The
    /// caller owns the file's lifetime and removes it on every exit path.
    pub fn keys_import_file(
        &self,
        name: &str,
        key_file: &Path,
        scope: &KeyringScope,
    ) -> Result<CommandInvocation> {
        validate_identity_name(name)?;
        let mut args = vec![
            "keys".into(),
            "import".into(),
            name.to_string(),
            key_file.display().to_string(),
        ];
        push_scope(&mut args, scope);
        push_json_output(&mut args);
        Ok(self.invocation(args, None))
    }

    /// `keys add --recover` with the mnemonic supplied via stdin.
    ///
    /// The phrase is attached as the invocation's stdin payload and is
    /// absent from the argument vector.
    pub fn keys_add_recover(
        &self,
        name: &str,
        mnemonic: &str,
        scope: &KeyringScope,
    ) -> Result<CommandInvocation> {
        validate_identity_name(name)?;
        let mut args = vec!["keys".into(), "add".into(), name.to_string(), "--recover".into()];
        push_scope(&mut args, scope);
        push_json_output(&mut args);
        Ok(self.invocation(args, Some(format!("{mnemonic}\n"))))
    }

    /// `keys add` generating a fresh key, JSON output including the mnemonic
    pub fn keys_add(&self, name: &str, scope: &KeyringScope) -> Result<CommandInvocation> {
        validate_identity_name(name)?;
        let mut args = vec!["keys".into(), "add".into(), name.to_string()];
        push_scope(&mut args, scope);
        push_json_output(&mut args);
        Ok(self.invocation(args, None))
    }

    /// `keys show` for address extraction
    pub fn keys_show(&self, name: &str, scope: &KeyringScope) -> Result<CommandInvocation> {
        validate_identity_name(name)?;
        let mut args = vec!["keys".into(), "show".into(), name.to_string()];
        push_scope(&mut args, scope);
        push_json_output(&mut args);
        Ok(self.invocation(args, None))
    }

    /// `tx migration claim-accounts` - batch claim taking an input file of
    /// source-chain keys and emitting a per-account result file.
    #[allow(clippy::too_many_arguments)]
    pub fn tx_claim_accounts(
        &self,
        input_file: &Path,
        output_file: &Path,
        destination_address: &str,
        signer: &str,
        scope: &KeyringScope,
        tx: &TxParams,
        generate_only: bool,
    ) -> Result<CommandInvocation> {
        validate_identity_name(signer)?;
        validate_destination_address(destination_address)?;
        validate_gas(tx.gas_adjustment, &tx.gas_prices)?;

        let mut args = vec![
            "tx".into(),
            "migration".into(),
            "claim-accounts".into(),
            "--input-file".into(),
            input_file.display().to_string(),
            "--output-file".into(),
            output_file.display().to_string(),
            "--destination".into(),
            destination_address.to_string(),
            "--from".into(),
            signer.to_string(),
        ];
        push_scope(&mut args, scope);
        push_tx_flags(&mut args, tx);
        if generate_only {
            args.push("--generate-only".into());
        } else {
            args.push("--yes".into());
        }
        push_json_output(&mut args);

        let mut invocation = self.invocation(args, None);
        invocation.timeout = self.timeouts.broadcast_timeout();
        Ok(invocation)
    }

    /// `tx supplier stake-supplier` - single node stake from a YAML config
    pub fn tx_stake_supplier(
        &self,
        stake_config: &Path,
        signer: &str,
        scope: &KeyringScope,
        tx: &TxParams,
    ) -> Result<CommandInvocation> {
        validate_identity_name(signer)?;
        validate_gas(tx.gas_adjustment, &tx.gas_prices)?;

        let mut args = vec![
            "tx".into(),
            "supplier".into(),
            "stake-supplier".into(),
            "--config".into(),
            stake_config.display().to_string(),
            "--from".into(),
            signer.to_string(),
        ];
        push_scope(&mut args, scope);
        push_tx_flags(&mut args, tx);
        args.push("--yes".into());
        push_json_output(&mut args);

        let mut invocation = self.invocation(args, None);
        invocation.timeout = self.timeouts.broadcast_timeout();
        Ok(invocation)
    }

    fn invocation(&self, args: Vec<String>, stdin: Option<String>) -> CommandInvocation {
        CommandInvocation {
            program: self.binary.clone(),
            args,
            work_dir: self.working_dir.clone(),
            extra_path_entries: self.extra_path_entries.clone(),
            timeout: self.timeouts.default_timeout(),
            stdin,
        }
    }
}

fn push_scope(args: &mut Vec<String>, scope: &KeyringScope) {
    args.push("--home".into());
    args.push(scope.home.display().to_string());
    args.push("--keyring-backend".into());
    args.push(scope.backend.flag_value().into());
}

fn push_tx_flags(args: &mut Vec<String>, tx: &TxParams) {
    args.push("--network".into());
    args.push(tx.network.flag_value().into());
    args.push("--chain-id".into());
    args.push(tx.network.chain_id().into());
    args.push("--gas".into());
    args.push("auto".into());
    args.push("--gas-adjustment".into());
    args.push(tx.gas_adjustment.to_string());
    args.push("--gas-prices".into());
    args.push(tx.gas_prices.clone());
}

fn push_json_output(args: &mut Vec<String>) {
    args.push("--output".into());
    args.push("json".into());
}

/// Identity names reach argv verbatim, so restrict them to a conservative
/// charset even though they are discrete elements.
pub fn validate_identity_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 {
        return Err(CoreError::invalid_parameter(
            "identity_name",
            name,
            "must be 1-64 characters",
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(CoreError::invalid_parameter(
            "identity_name",
            name,
            "only alphanumerics, '-', '_', '.' allowed",
        ));
    }
    Ok(())
}

/// Destination addresses must carry the successor chain's bech32 prefix
pub fn validate_destination_address(address: &str) -> Result<()> {
    if !address.starts_with("pokt1") {
        return Err(CoreError::invalid_parameter(
            "destination_address",
            address,
            "must start with pokt1",
        ));
    }
    if address.len() < 38 || address.len() > 90 {
        return Err(CoreError::invalid_parameter(
            "destination_address",
            address,
            "implausible bech32 length",
        ));
    }
    if !address
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    {
        return Err(CoreError::invalid_parameter(
            "destination_address",
            address,
            "bech32 addresses are lowercase alphanumeric",
        ));
    }
    Ok(())
}

fn validate_gas(gas_adjustment: f64, gas_prices: &str) -> Result<()> {
    if !(gas_adjustment > 0.0 && gas_adjustment <= 10.0) {
        return Err(CoreError::invalid_parameter(
            "gas_adjustment",
            gas_adjustment.to_string(),
            "must be in (0, 10]",
        ));
    }
    let split = gas_prices
        .find(|c: char| c.is_ascii_alphabetic())
        .ok_or_else(|| {
            CoreError::invalid_parameter("gas_prices", gas_prices, "missing denomination")
        })?;
    let (amount, denom) = gas_prices.split_at(split);
    if amount.parse::<f64>().map(|a| a <= 0.0).unwrap_or(true) {
        return Err(CoreError::invalid_parameter(
            "gas_prices",
            gas_prices,
            "amount must be a positive decimal",
        ));
    }
    if !ALLOWED_DENOMS.contains(&denom) {
        return Err(CoreError::invalid_parameter(
            "gas_prices",
            gas_prices,
            "denomination not allow-listed",
        ));
    }
    Ok(())
}

/// Build [`TxParams`] from validated configuration
pub fn tx_params(network: super::Network, gas: &GasConfig) -> Result<TxParams> {
    validate_gas(gas.gas_adjustment, &gas.gas_prices)?;
    Ok(TxParams {
        network,
        gas_adjustment: gas.gas_adjustment,
        gas_prices: gas.gas_prices.clone(),
    })
}
