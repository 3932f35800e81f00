#![allow(clippy::doc_markdown)] // Allow technical terms like YAML, JSON in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Shannon Migration Core
//!
//! Orchestration engine for migrating accounts from the legacy Morse chain
//! to the Shannon chain and for provisioning staked supplier nodes, built
//! around the external `pocketd` CLI binary.
//!
//! ## Overview
//!
//! The crate is the core behind an HTTP API (out of scope here): inbound
//! requests arrive already shape-checked, and this engine manages keyring
//! state, builds injection-safe command invocations, retries the one
//! transient failure class the destination chain produces, and tracks
//! multi-step batch operations as filesystem-backed sessions.
//!
//! ## Architecture
//!
//! Data flows leaf to root: a request creates or re-enters a **session**,
//! the **keyring manager** establishes the signing identity, and the
//! **batch orchestrator** drives one **process runner** invocation per
//! work unit, gated by the **retry controller**, with results persisted
//! through the **session store**.
//!
//! ## Module Organization
//!
//! - [`command`] - typed, injection-safe argument vector construction
//! - [`process`] - child process execution with timeouts
//! - [`keyring`] - signing identity lifecycle in the external keyring
//! - [`retry`] - bounded linear-backoff retry for sequence mismatches
//! - [`classify`] - stderr pattern matching onto the error taxonomy
//! - [`session`] - filesystem-backed session store and data model
//! - [`state_machine`] - per-unit lifecycle transitions
//! - [`orchestration`] - the batch loop and the two flow services
//! - [`config`] - explicit configuration replacing ambient process state
//! - [`error`] - structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use shannon_core::config::ConfigManager;
//! use shannon_core::orchestration::{EngineContext, MigrationRequest, MigrationService};
//! use shannon_core::process::PocketProcessRunner;
//! use shannon_core::command::Network;
//! use shannon_core::keyring::Credential;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let context = EngineContext::new(
//!     Arc::new(manager.config().clone()),
//!     Arc::new(PocketProcessRunner::new()),
//! )?;
//!
//! let service = MigrationService::new(context);
//! let outcome = service
//!     .migrate(MigrationRequest {
//!         source_keys: vec!["0x...".to_string()],
//!         destination_address: "pokt1...".to_string(),
//!         network: Network::Beta,
//!         signing_credential: Credential::Fallback,
//!     })
//!     .await?;
//! println!("claimed in session {}", outcome.session_id);
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod command;
pub mod config;
pub mod error;
pub mod keyring;
pub mod logging;
pub mod orchestration;
pub mod process;
pub mod retry;
pub mod session;
pub mod state_machine;

pub use command::{CommandBuilder, CommandInvocation, KeyringBackend, KeyringScope, Network};
pub use config::{ConfigManager, CoreConfig};
pub use error::{CoreError, Result};
pub use keyring::{Credential, KeyringManager};
pub use logging::init_structured_logging;
pub use orchestration::{
    BatchOrchestrator, BatchReport, EngineContext, MigrationRequest, MigrationService,
    ProvisionRequest, SigningIdentitySpec, StakeProvisioningService,
};
pub use process::{PocketProcessRunner, ProcessOutput, ProcessRunner};
pub use retry::RetryController;
pub use session::{Session, SessionKind, SessionStore};
pub use state_machine::{UnitState, UnitStatus};
