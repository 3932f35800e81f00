//! # Command Infrastructure
//!
//! Typed, injection-safe construction of external binary invocations.
//!
//! Every invocation is an ordered argument vector, never an interpolated
//! shell string. Secrets (private keys, mnemonics) are never placed in
//! argv: raw keys travel through short-lived temp files and mnemonics
//! through stdin, so neither appears in process listings.
//!
//! ## Components
//!
//! - [`CommandInvocation`]: ephemeral value handed to the process runner
//! - [`builder::CommandBuilder`]: produces invocations from typed parameters
//! - [`Network`] / [`KeyringBackend`] / [`KeyringScope`]: allow-listed
//!   enums and scoping values validated before argv inclusion

pub mod builder;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub use builder::CommandBuilder;

/// Destination chain network selector, validated against this allow-list
/// before any value reaches an argument vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    Local,
    Alpha,
    Beta,
    Main,
}

impl Network {
    /// Chain identifier passed as `--chain-id`
    pub fn chain_id(&self) -> &'static str {
        match self {
            Self::Local => "pocket-localnet",
            Self::Alpha => "pocket-alpha",
            Self::Beta => "pocket-beta",
            Self::Main => "pocket",
        }
    }

    /// Network selector passed as `--network`
    pub fn flag_value(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Alpha => "alpha",
            Self::Beta => "beta",
            Self::Main => "main",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.flag_value())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "alpha" => Ok(Self::Alpha),
            "beta" => Ok(Self::Beta),
            "main" => Ok(Self::Main),
            _ => Err(format!("Invalid network: {s}")),
        }
    }
}

/// External keyring backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyringBackend {
    Test,
    Memory,
    Os,
    File,
}

impl KeyringBackend {
    pub fn flag_value(&self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Memory => "memory",
            Self::Os => "os",
            Self::File => "file",
        }
    }
}

impl fmt::Display for KeyringBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.flag_value())
    }
}

impl FromStr for KeyringBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "test" => Ok(Self::Test),
            "memory" => Ok(Self::Memory),
            "os" => Ok(Self::Os),
            "file" => Ok(Self::File),
            _ => Err(format!("Invalid keyring backend: {s}")),
        }
    }
}

/// The `(home, backend)` pair scoping a keyring identity.
///
/// At most one identity with a given name exists per scope; the keyring
/// manager enforces this destructively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyringScope {
    pub home: PathBuf,
    pub backend: KeyringBackend,
}

impl KeyringScope {
    pub fn new(home: impl Into<PathBuf>, backend: KeyringBackend) -> Self {
        Self {
            home: home.into(),
            backend,
        }
    }
}

/// Transaction parameters applied to every broadcast invocation
#[derive(Debug, Clone)]
pub struct TxParams {
    pub network: Network,
    pub gas_adjustment: f64,
    pub gas_prices: String,
}

/// An ephemeral, fully-resolved invocation of the external binary.
///
/// `stdin` carries secret payloads (mnemonic recovery); it is written to
/// the child's stdin pipe and never logged or embedded in `args`.
#[derive(Debug, Clone)]
pub struct CommandInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub work_dir: Option<PathBuf>,
    pub extra_path_entries: Vec<PathBuf>,
    pub timeout: Duration,
    pub stdin: Option<String>,
}

impl CommandInvocation {
    /// Human-readable operation label for logging, derived from the leading
    /// subcommand words (never includes values).
    pub fn operation_label(&self) -> String {
        self.args
            .iter()
            .take_while(|a| !a.starts_with("--"))
            .take(3)
            .cloned()
            .collect::<Vec<_>>()
            .join(" ")
    }
}
