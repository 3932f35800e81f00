//! # Core Error Types
//!
//! Structured error handling for the orchestration core using thiserror.
//!
//! The taxonomy separates binary-facing failures (spawn, timeout, non-zero
//! exit) from chain-level business errors surfaced through the external
//! binary's stderr (sequence mismatch, already claimed, insufficient funds).
//! Only `SequenceMismatch` is retryable; everything else is surfaced
//! immediately. Stderr pattern matching lives in [`crate::classify`], never
//! here.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the orchestration core.
///
/// Sensitive values (private keys, mnemonics) must never be embedded in any
/// variant. Constructors take messages that have already passed through the
/// classification layer, which strips payload content.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid credential format: {reason}")]
    InvalidCredentialFormat { reason: String },

    #[error("external binary unavailable: {binary}: {message}")]
    BinaryUnavailable { binary: String, message: String },

    #[error("failed to spawn {program}: {message}")]
    SpawnFailed { program: String, message: String },

    #[error("process exited with code {exit_code}: {stderr}")]
    NonZeroExit {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("operation {operation} timed out after {timeout_seconds}s")]
    Timeout {
        operation: String,
        timeout_seconds: u64,
    },

    #[error("keyring import failed: {message}")]
    KeyringImportFailed { message: String },

    #[error("fallback identity unavailable: {message}")]
    FallbackUnavailable { message: String },

    #[error("account sequence mismatch: {message}")]
    SequenceMismatch { message: String },

    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last_error: Box<CoreError>,
    },

    #[error("account already claimed{}", format_claim_detail(.morse_address, .shannon_address, .claim_height))]
    AlreadyClaimed {
        morse_address: Option<String>,
        shannon_address: Option<String>,
        claim_height: Option<u64>,
    },

    #[error("insufficient funds: {message}")]
    InsufficientFunds { message: String },

    #[error("account not found: {message}")]
    AccountNotFound { message: String },

    #[error("no claimable accounts in the provided key set")]
    NoClaimableAccounts,

    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("session {session_id} has no work units: {reason}")]
    EmptySession { session_id: String, reason: String },

    #[error("invalid parameter {field}={value}: {reason}")]
    InvalidParameter {
        field: String,
        value: String,
        reason: String,
    },

    #[error("invalid state transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {message}")]
    Serialization { message: String },
}

fn format_claim_detail(
    morse: &Option<String>,
    shannon: &Option<String>,
    height: &Option<u64>,
) -> String {
    match (morse, shannon, height) {
        (Some(m), Some(s), Some(h)) => format!(": morse {m} -> shannon {s} at height {h}"),
        (Some(m), _, _) => format!(": morse {m}"),
        _ => String::new(),
    }
}

impl CoreError {
    /// Create an invalid credential format error
    pub fn invalid_credential(reason: impl Into<String>) -> Self {
        Self::InvalidCredentialFormat {
            reason: reason.into(),
        }
    }

    /// Create a binary unavailable error
    pub fn binary_unavailable(binary: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BinaryUnavailable {
            binary: binary.into(),
            message: message.into(),
        }
    }

    /// Create a keyring import failure
    pub fn keyring_import(message: impl Into<String>) -> Self {
        Self::KeyringImportFailed {
            message: message.into(),
        }
    }

    /// Create a sequence mismatch error from classified stderr
    pub fn sequence_mismatch(message: impl Into<String>) -> Self {
        Self::SequenceMismatch {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout_seconds: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_seconds,
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an io error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error belongs to the one retryable class.
    ///
    /// Retryability is intentionally narrow: an account sequence mismatch is
    /// a transient nonce race on the destination chain. Generic CLI errors,
    /// malformed input, and missing-binary conditions never qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SequenceMismatch { .. })
    }

    /// Whether this error aborts a batch before any unit executes
    pub fn is_precondition_failure(&self) -> bool {
        matches!(
            self,
            Self::BinaryUnavailable { .. }
                | Self::SessionNotFound { .. }
                | Self::EmptySession { .. }
        )
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for CoreError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

/// Result type alias for orchestration core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_sequence_mismatch_is_retryable() {
        assert!(CoreError::sequence_mismatch("expected 5, got 4").is_retryable());
        assert!(!CoreError::invalid_credential("bad hex").is_retryable());
        assert!(!CoreError::binary_unavailable("pocketd", "not found").is_retryable());
        assert!(!CoreError::timeout("broadcast", 120).is_retryable());
        assert!(!CoreError::NoClaimableAccounts.is_retryable());
    }

    #[test]
    fn test_precondition_failures() {
        assert!(CoreError::binary_unavailable("pocketd", "missing").is_precondition_failure());
        assert!(CoreError::SessionNotFound {
            session_id: "abc".into()
        }
        .is_precondition_failure());
        assert!(!CoreError::sequence_mismatch("nonce").is_precondition_failure());
    }

    #[test]
    fn test_retries_exhausted_carries_last_error() {
        let err = CoreError::RetriesExhausted {
            attempts: 3,
            last_error: Box::new(CoreError::sequence_mismatch("expected 7, got 6")),
        };
        let display = err.to_string();
        assert!(display.contains("3 attempts"));
        assert!(display.contains("expected 7, got 6"));
    }

    #[test]
    fn test_already_claimed_display() {
        let err = CoreError::AlreadyClaimed {
            morse_address: Some("ABCD1234".into()),
            shannon_address: Some("pokt1xyz".into()),
            claim_height: Some(4242),
        };
        let display = err.to_string();
        assert!(display.contains("ABCD1234"));
        assert!(display.contains("pokt1xyz"));
        assert!(display.contains("4242"));

        let bare = CoreError::AlreadyClaimed {
            morse_address: None,
            shannon_address: None,
            claim_height: None,
        };
        assert_eq!(bare.to_string(), "account already claimed");
    }
}
