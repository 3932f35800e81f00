//! Session data model: descriptors, work units, and artifact kinds.

use crate::command::Network;
use crate::state_machine::UnitStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Kind of batch operation a session records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Migration,
    StakeProvisioning,
}

impl SessionKind {
    /// Directory name under the data root
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Migration => "migration",
            Self::StakeProvisioning => "stake",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Migration => write!(f, "migration"),
            Self::StakeProvisioning => write!(f, "stake_provisioning"),
        }
    }
}

impl FromStr for SessionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "migration" => Ok(Self::Migration),
            "stake_provisioning" | "stake" => Ok(Self::StakeProvisioning),
            _ => Err(format!("Invalid session kind: {s}")),
        }
    }
}

/// Parameters captured when a batch starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionParams {
    /// Destination chain network
    pub network: Network,

    /// Owner or destination address the batch operates for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_address: Option<String>,

    /// Number of work units requested at creation
    pub unit_count: u32,
}

/// A unit-of-work batch, persisted as `session_info.json` in its tree.
///
/// The descriptor is immutable after creation; per-unit artifacts accrue
/// in subdirectories as work completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub kind: SessionKind,
    pub params: SessionParams,
    pub created_at: DateTime<Utc>,

    /// Root directory of this session's tree
    #[serde(skip)]
    pub work_dir: PathBuf,
}

/// One item inside a session: one node to stake, or the whole key-set for
/// a single migration transaction.
///
/// Terminal status is assigned exactly once; retries happen inside the
/// unit's single logical attempt, never across unit boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkUnit {
    /// Position within the session, used for naming and delay scheduling
    pub index: u32,

    /// Stable name derived from the index
    pub name: String,

    /// Path to the input this unit operates on
    pub input_ref: PathBuf,

    /// Per-unit signing identity override, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_identity: Option<String>,

    pub status: UnitStatus,
    pub attempts: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl WorkUnit {
    pub fn new(index: u32, input_ref: PathBuf) -> Self {
        Self {
            index,
            name: unit_name(index),
            input_ref,
            signing_identity: None,
            status: UnitStatus::Pending,
            attempts: 0,
            last_error: None,
        }
    }
}

/// Stable unit name derived from the index, shared by wallets, stake files,
/// and keyring identity names so any component can recompute it.
pub fn unit_name(index: u32) -> String {
    format!("node{}", index + 1)
}

/// Parse a unit index back out of a stake file name (`stake_node3.yaml` -> 2)
pub fn unit_index_from_stake_file(file_name: &str) -> Option<u32> {
    file_name
        .strip_prefix("stake_node")?
        .strip_suffix(".yaml")?
        .parse::<u32>()
        .ok()
        .and_then(|n| n.checked_sub(1))
}

/// Kinds of per-session artifacts with deterministic paths.
///
/// The layout is a pure function of `(session, unit index, kind)` so any
/// component can recompute a path without a lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Per-node stake descriptor YAML
    StakeConfig,
    /// Generated credentials for provisioning flows; the sole sanctioned
    /// at-rest location for mnemonics
    WalletMnemonics,
    /// Array of cleaned source-chain hex keys
    MigrationInput,
    /// CLI-produced per-account claim results
    MigrationOutput,
    /// Unsigned transaction JSON for client-side signing
    UnsignedTx,
}
