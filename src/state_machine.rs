//! # Work Unit State Machine
//!
//! Explicit transition table for the per-unit lifecycle:
//!
//! ```text
//! pending -> (attempting -> retry_wait)* -> { succeeded | failed }
//! ```
//!
//! Terminal states are final; a unit is never re-entered automatically. A
//! caller must re-invoke the batch to redo failed units.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Live state of a work unit while the orchestrator drives it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    /// Created, not yet started
    Pending,
    /// The external binary invocation is in flight
    Attempting,
    /// A retryable failure occurred; backing off before the next attempt
    RetryWait,
    /// Terminal success
    Succeeded,
    /// Terminal failure
    Failed,
}

impl UnitState {
    /// Terminal states allow no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Persisted status for this state. Transient attempt states report as
    /// pending, matching the descriptor's coarse lifecycle.
    pub fn status(&self) -> UnitStatus {
        match self {
            Self::Pending | Self::Attempting | Self::RetryWait => UnitStatus::Pending,
            Self::Succeeded => UnitStatus::Succeeded,
            Self::Failed => UnitStatus::Failed,
        }
    }
}

impl Default for UnitState {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Attempting => write!(f, "attempting"),
            Self::RetryWait => write!(f, "retry_wait"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Events that drive unit transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitEvent {
    Start,
    RetryableFailure,
    BackoffElapsed,
    Complete,
    Fail,
}

impl fmt::Display for UnitEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::RetryableFailure => write!(f, "retryable_failure"),
            Self::BackoffElapsed => write!(f, "backoff_elapsed"),
            Self::Complete => write!(f, "complete"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// Determine the target state for `(state, event)`, rejecting transitions
/// the lifecycle does not allow.
pub fn transition(state: UnitState, event: UnitEvent) -> Result<UnitState> {
    let target = match (state, event) {
        (UnitState::Pending, UnitEvent::Start) => UnitState::Attempting,

        (UnitState::Attempting, UnitEvent::RetryableFailure) => UnitState::RetryWait,
        (UnitState::RetryWait, UnitEvent::BackoffElapsed) => UnitState::Attempting,

        (UnitState::Attempting, UnitEvent::Complete) => UnitState::Succeeded,
        (UnitState::Attempting, UnitEvent::Fail) => UnitState::Failed,
        // Exhausting retries fails the unit from the wait state
        (UnitState::RetryWait, UnitEvent::Fail) => UnitState::Failed,

        (from, event) => {
            return Err(CoreError::InvalidTransition {
                from: from.to_string(),
                event: event.to_string(),
            })
        }
    };
    Ok(target)
}

/// Coarse persisted status of a work unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Pending,
    Succeeded,
    Failed,
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for UnitStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid unit status: {s}")),
        }
    }
}
