//! # Keyring Layer
//!
//! Manages signing identities in the external binary's keyring. The
//! keyring is external mutable state scoped by `(home, backend)`; this
//! layer enforces the one-identity-per-name invariant destructively and
//! re-verifies on every call instead of caching existence.

pub mod manager;

pub use manager::{
    validate_hex_key, validate_mnemonic, Credential, GeneratedWallet, KeyInfo, KeyringManager,
};
