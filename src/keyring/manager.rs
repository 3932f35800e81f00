//! Keyring Manager
//!
//! `ensure_identity` establishes a named signing identity in the target
//! keyring scope and returns its destination-chain address. Collisions are
//! resolved by deleting the existing identity first; callers must not
//! assume identity persistence across calls with the same name.
//!
//! Secret channels: raw hex keys travel through a short-lived temp file
//! removed on every exit path (RAII guard), mnemonics through stdin.
//! Neither ever appears in argv, logs, or error messages.

use crate::command::{CommandBuilder, KeyringScope};
use crate::error::{CoreError, Result};
use crate::process::ProcessRunner;
use serde::Deserialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A signing credential resolved once at the boundary, never sniffed from
/// raw strings inside the core.
#[derive(Debug, Clone)]
pub enum Credential {
    /// Raw private key as hex, with or without a `0x` prefix
    RawHex(String),
    /// BIP-39 recovery phrase, 12 to 24 words
    Mnemonic(String),
    /// Pre-extracted wallet export
    WalletJson {
        private_key_hex: String,
        address: String,
    },
    /// No caller-supplied credential: use the configured fallback identity
    Fallback,
}

/// Parsed key metadata from the binary's JSON output
#[derive(Debug, Clone, Deserialize)]
pub struct KeyInfo {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub mnemonic: Option<String>,
}

/// A freshly generated wallet for provisioning flows
#[derive(Debug, Clone)]
pub struct GeneratedWallet {
    pub name: String,
    pub address: String,
    pub mnemonic: String,
}

/// Validate and normalize a raw hex key: strip an optional `0x` prefix,
/// require hex charset and a plausible length (64 or 128 chars).
pub fn validate_hex_key(raw: &str) -> Result<String> {
    let cleaned = raw
        .trim()
        .strip_prefix("0x")
        .or_else(|| raw.trim().strip_prefix("0X"))
        .unwrap_or(raw.trim())
        .to_lowercase();

    if !matches!(cleaned.len(), 64 | 128) {
        return Err(CoreError::invalid_credential(format!(
            "hex key must be 64 or 128 characters, got {}",
            cleaned.len()
        )));
    }
    if !cleaned.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CoreError::invalid_credential(
            "hex key contains non-hexadecimal characters",
        ));
    }
    Ok(cleaned)
}

/// Validate a mnemonic's word count is within [12, 24]
pub fn validate_mnemonic(phrase: &str) -> Result<()> {
    let words = phrase.split_whitespace().count();
    if !(12..=24).contains(&words) {
        return Err(CoreError::invalid_credential(format!(
            "mnemonic must have 12-24 words, got {words}"
        )));
    }
    Ok(())
}

/// Ensures signing identities exist in the external keyring
pub struct KeyringManager {
    runner: Arc<dyn ProcessRunner>,
    builder: CommandBuilder,
    fallback_identity: String,
    tmp_dir: PathBuf,
}

impl KeyringManager {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        builder: CommandBuilder,
        fallback_identity: impl Into<String>,
        tmp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            builder,
            fallback_identity: fallback_identity.into(),
            tmp_dir: tmp_dir.into(),
        }
    }

    pub fn fallback_identity(&self) -> &str {
        &self.fallback_identity
    }

    /// Establish `name` as a usable signing identity in `scope` and return
    /// its address.
    ///
    /// Credential validation happens before any process is spawned. The
    /// keyring is re-checked on every call; existence is never cached,
    /// since another session's cleanup may have mutated it in between.
    pub async fn ensure_identity(
        &self,
        name: &str,
        credential: &Credential,
        scope: &KeyringScope,
    ) -> Result<String> {
        match credential {
            Credential::RawHex(raw) => {
                let cleaned = validate_hex_key(raw)?;
                self.delete_if_present(name, scope).await?;
                self.import_hex(name, &cleaned, scope).await
            }
            Credential::WalletJson {
                private_key_hex, ..
            } => {
                let cleaned = validate_hex_key(private_key_hex)?;
                self.delete_if_present(name, scope).await?;
                self.import_hex(name, &cleaned, scope).await
            }
            Credential::Mnemonic(phrase) => {
                validate_mnemonic(phrase)?;
                self.delete_if_present(name, scope).await?;
                let invocation = self.builder.keys_add_recover(name, phrase, scope)?;
                let output = self.runner.run(&invocation).await?;
                let info = self.key_info_or_show(name, &output.stdout, scope).await?;
                info!(identity = %name, "🔑 Identity recovered from mnemonic");
                Ok(info.address)
            }
            Credential::Fallback => self.ensure_fallback(scope).await,
        }
    }

    /// Verify the fallback identity exists, creating it on demand.
    ///
    /// Creation is best-effort: a failure degrades to
    /// [`CoreError::FallbackUnavailable`] so the orchestrator can report
    /// the condition instead of silently proceeding.
    pub async fn ensure_fallback(&self, scope: &KeyringScope) -> Result<String> {
        let show = self.builder.keys_show(&self.fallback_identity, scope)?;
        match self.runner.run(&show).await {
            Ok(output) => {
                let info = parse_key_output(&output.stdout)?;
                Ok(info.address)
            }
            Err(_) => {
                debug!(
                    identity = %self.fallback_identity,
                    "Fallback identity missing, creating"
                );
                let add = self.builder.keys_add(&self.fallback_identity, scope)?;
                match self.runner.run(&add).await {
                    Ok(output) => {
                        let info = self
                            .key_info_or_show(&self.fallback_identity, &output.stdout, scope)
                            .await?;
                        info!(identity = %self.fallback_identity, "🔑 Fallback identity created");
                        Ok(info.address)
                    }
                    Err(err) => Err(CoreError::FallbackUnavailable {
                        message: err.to_string(),
                    }),
                }
            }
        }
    }

    /// Generate a fresh wallet for a provisioning unit, capturing the
    /// mnemonic the binary prints exactly once at creation.
    pub async fn generate_wallet(
        &self,
        name: &str,
        scope: &KeyringScope,
    ) -> Result<GeneratedWallet> {
        self.delete_if_present(name, scope).await?;
        let invocation = self.builder.keys_add(name, scope)?;
        let output = self.runner.run(&invocation).await?;
        let info = parse_key_output(&output.stdout)?;
        let mnemonic = info.mnemonic.ok_or_else(|| {
            CoreError::keyring_import("key generation output did not include a mnemonic")
        })?;
        Ok(GeneratedWallet {
            name: info.name,
            address: info.address,
            mnemonic,
        })
    }

    /// List identity names currently present in the scope
    pub async fn list_identities(&self, scope: &KeyringScope) -> Result<Vec<KeyInfo>> {
        let invocation = self.builder.keys_list(scope);
        let output = self.runner.run(&invocation).await?;
        if output.stdout.trim().is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<KeyInfo> = serde_json::from_str(output.stdout.trim())?;
        Ok(keys)
    }

    async fn delete_if_present(&self, name: &str, scope: &KeyringScope) -> Result<()> {
        let existing = self.list_identities(scope).await?;
        if !existing.iter().any(|k| k.name == name) {
            return Ok(());
        }
        let invocation = self.builder.keys_delete(name, scope)?;
        match self.runner.run(&invocation).await {
            Ok(_) => {
                debug!(identity = %name, "Deleted existing identity before re-import");
                Ok(())
            }
            Err(err) => {
                // A racing delete is fine; anything else blocks the import.
                warn!(identity = %name, error = %err, "Identity delete failed");
                Err(CoreError::keyring_import(format!(
                    "could not delete existing identity {name}: {err}"
                )))
            }
        }
    }

    async fn import_hex(&self, name: &str, cleaned_hex: &str, scope: &KeyringScope) -> Result<String> {
        std::fs::create_dir_all(&self.tmp_dir).map_err(|e| CoreError::io(&self.tmp_dir, e))?;

        // NamedTempFile unlinks on drop, covering success, failure, and
        // unwind paths alike.
        let mut key_file = tempfile::Builder::new()
            .prefix("key-import-")
            .suffix(".hex")
            .tempfile_in(&self.tmp_dir)
            .map_err(|e| CoreError::io(&self.tmp_dir, e))?;
        key_file
            .write_all(cleaned_hex.as_bytes())
            .map_err(|e| CoreError::io(key_file.path(), e))?;
        key_file
            .flush()
            .map_err(|e| CoreError::io(key_file.path(), e))?;

        let invocation = self
            .builder
            .keys_import_file(name, key_file.path(), scope)?;
        let run_result = self.runner.run(&invocation).await;
        drop(key_file);

        let output = run_result.map_err(|err| match err {
            CoreError::SpawnFailed { .. } | CoreError::Timeout { .. } => err,
            other => CoreError::keyring_import(other.to_string()),
        })?;

        let info = self.key_info_or_show(name, &output.stdout, scope).await?;
        info!(identity = %name, "🔑 Identity imported from hex key");
        Ok(info.address)
    }

    /// Parse key metadata from an operation's stdout, falling back to
    /// `keys show` when the operation printed nothing usable.
    async fn key_info_or_show(
        &self,
        name: &str,
        stdout: &str,
        scope: &KeyringScope,
    ) -> Result<KeyInfo> {
        if let Ok(info) = parse_key_output(stdout) {
            return Ok(info);
        }
        let show = self.builder.keys_show(name, scope)?;
        let output = self.runner.run(&show).await.map_err(|err| {
            CoreError::keyring_import(format!("identity {name} not visible after import: {err}"))
        })?;
        parse_key_output(&output.stdout)
    }
}

/// Parse the binary's structured key output: a single JSON object or a
/// one-element array.
pub fn parse_key_output(stdout: &str) -> Result<KeyInfo> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(CoreError::keyring_import("empty key output"));
    }
    if let Ok(info) = serde_json::from_str::<KeyInfo>(trimmed) {
        if !info.address.is_empty() {
            return Ok(info);
        }
    }
    if let Ok(mut list) = serde_json::from_str::<Vec<KeyInfo>>(trimmed) {
        if let Some(info) = list.pop() {
            if !info.address.is_empty() {
                return Ok(info);
            }
        }
    }
    Err(CoreError::keyring_import(
        "could not parse address from key output",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_validation_accepts_both_lengths() {
        let k64 = "a".repeat(64);
        let k128 = "B".repeat(128);
        assert_eq!(validate_hex_key(&k64).unwrap(), k64);
        assert_eq!(validate_hex_key(&k128).unwrap(), k128.to_lowercase());
        assert_eq!(validate_hex_key(&format!("0x{k64}")).unwrap(), k64);
    }

    #[test]
    fn test_hex_validation_rejects_bad_input() {
        assert!(validate_hex_key("abc").is_err());
        assert!(validate_hex_key(&"g".repeat(64)).is_err());
        assert!(validate_hex_key(&"a".repeat(63)).is_err());
        assert!(validate_hex_key(&"a".repeat(129)).is_err());
        assert!(validate_hex_key("").is_err());
    }

    #[test]
    fn test_mnemonic_word_count_bounds() {
        let words12 = vec!["word"; 12].join(" ");
        let words24 = vec!["word"; 24].join(" ");
        let words11 = vec!["word"; 11].join(" ");
        let words25 = vec!["word"; 25].join(" ");
        assert!(validate_mnemonic(&words12).is_ok());
        assert!(validate_mnemonic(&words24).is_ok());
        assert!(validate_mnemonic(&words11).is_err());
        assert!(validate_mnemonic(&words25).is_err());
    }

    #[test]
    fn test_parse_key_output_object_and_array() {
        let object = r#"{"name":"alice","address":"pokt1abc","type":"local"}"#;
        assert_eq!(parse_key_output(object).unwrap().address, "pokt1abc");

        let array = r#"[{"name":"alice","address":"pokt1abc"}]"#;
        assert_eq!(parse_key_output(array).unwrap().address, "pokt1abc");

        assert!(parse_key_output("").is_err());
        assert!(parse_key_output("gas estimate: 12345").is_err());
        assert!(parse_key_output(r#"{"name":"x","address":""}"#).is_err());
    }

    #[test]
    fn test_key_output_captures_mnemonic_when_present() {
        let with_mnemonic = r#"{"name":"node1","address":"pokt1node","mnemonic":"word word word"}"#;
        let info = parse_key_output(with_mnemonic).unwrap();
        assert_eq!(info.mnemonic.as_deref(), Some("word word word"));
    }
}
