//! # Process Execution Layer
//!
//! Executes [`crate::command::CommandInvocation`] values as child processes
//! with timeouts, capturing stdout and stderr in full for classification
//! upstream. A pure execution shim: nothing is persisted here.

pub mod runner;

pub use runner::{PocketProcessRunner, ProcessOutput, ProcessRunner};
