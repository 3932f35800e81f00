//! Batch Orchestrator
//!
//! Sequential execution of a session's work units. Each unit is signed by
//! an identity resolved through an explicit precedence table, wrapped in
//! the retry controller, and separated from the next unit by a mandatory
//! inter-transaction delay so consecutive transactions from the same
//! signer do not collide on the destination chain's account sequence.
//!
//! A unit failure never aborts the batch: processing continues and the
//! final report enumerates every unit with its status, attempt count, and
//! error detail. Only precondition failures (missing session, no work
//! units, unavailable binary) abort before any unit executes.

use super::EngineContext;
use crate::command::KeyringScope;
use crate::error::{CoreError, Result};
use crate::retry::RetryController;
use crate::session::{Session, SessionKind, WorkUnit};
use crate::state_machine::{transition, UnitEvent, UnitState, UnitStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// One transaction attempt against the external binary.
///
/// Implementations must be safe to re-invoke: the retry controller calls
/// `execute` once per attempt, and artifact overwrites are expected.
#[async_trait]
pub trait UnitOperation: Send + Sync {
    async fn execute(&self, unit: &WorkUnit, signer: &str) -> Result<UnitResult>;
}

/// Result of a successful unit operation
#[derive(Debug, Clone, Default)]
pub struct UnitResult {
    pub tx_hash: Option<String>,
}

/// Signing identity inputs for a batch, resolved per unit through the
/// precedence table `unit override > batch override > session owner >
/// fallback`.
#[derive(Debug, Clone)]
pub struct SigningIdentitySpec {
    /// Explicit override for the whole batch
    pub override_identity: Option<String>,

    /// Identity derived from the session's owner
    pub session_owner: Option<String>,

    /// Configured last-resort identity, verified lazily per use
    pub fallback: String,
}

/// Which precedence rule selected the signer, carried on the unit report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerSource {
    UnitOverride,
    BatchOverride,
    SessionOwner,
    Fallback,
}

/// Resolve the signing identity for one unit
pub fn resolve_signer(spec: &SigningIdentitySpec, unit: &WorkUnit) -> (String, SignerSource) {
    if let Some(name) = unit.signing_identity.as_ref() {
        return (name.clone(), SignerSource::UnitOverride);
    }
    if let Some(name) = spec.override_identity.as_ref() {
        return (name.clone(), SignerSource::BatchOverride);
    }
    if let Some(name) = spec.session_owner.as_ref() {
        return (name.clone(), SignerSource::SessionOwner);
    }
    (spec.fallback.clone(), SignerSource::Fallback)
}

/// Cancellation flag honored only at unit boundaries. The external binary
/// may already be broadcasting mid-invocation, so a running process is
/// never interrupted by cancellation; the per-process timeout remains the
/// sole mid-invocation cancellation primitive.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-unit entry in the batch report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitReport {
    pub index: u32,
    pub name: String,
    pub signer: String,
    pub signer_source: SignerSource,
    pub status: UnitStatus,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Session-level aggregation of a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub session_id: String,
    pub kind: SessionKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub units: Vec<UnitReport>,
    pub succeeded: usize,
    pub failed: usize,
    /// Set when a unit resolved to the fallback identity and the fallback
    /// could not be verified or created
    pub fallback_unavailable: bool,
    /// Set when cancellation stopped the batch at a unit boundary
    pub cancelled: bool,
}

/// Drives one session's work units sequentially
pub struct BatchOrchestrator {
    context: EngineContext,
    retry: RetryController,
    inter_tx_delay: Duration,
    cancel: CancelFlag,
}

impl BatchOrchestrator {
    pub fn new(context: EngineContext) -> Self {
        let retry = RetryController::from_config(&context.config.delays);
        let inter_tx_delay = context.config.delays.inter_tx_delay();
        Self {
            context,
            retry,
            inter_tx_delay,
            cancel: CancelFlag::new(),
        }
    }

    /// Handle callers can use to request cancellation at unit boundaries
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Probe the external binary before starting any batch
    pub async fn probe_binary(&self) -> Result<()> {
        let invocation = self.context.builder.version();
        self.context
            .runner
            .run(&invocation)
            .await
            .map_err(|err| CoreError::binary_unavailable(
                invocation.program.display().to_string(),
                err.to_string(),
            ))?;
        Ok(())
    }

    /// Run every work unit of `session_id` through `operation`.
    ///
    /// Returns `Err` only for precondition failures; unit-level failures
    /// are captured in the report so one bad unit cannot lose its
    /// siblings' results.
    pub async fn run_batch(
        &self,
        session_id: &str,
        identity: &SigningIdentitySpec,
        scope: &KeyringScope,
        operation: &dyn UnitOperation,
    ) -> Result<BatchReport> {
        self.probe_binary().await?;

        let session = self.context.store.get_session(session_id)?;
        let units = self.context.store.list_work_units(&session)?;
        if units.is_empty() {
            return Err(CoreError::EmptySession {
                session_id: session_id.to_string(),
                reason: match session.kind {
                    SessionKind::StakeProvisioning => "no stake files present".to_string(),
                    SessionKind::Migration => "no migration input recorded".to_string(),
                },
            });
        }

        // Writers within one session are serialized even if an embedder
        // runs batches concurrently against a shared store.
        let lock = self.context.store.session_lock(session_id);
        let _guard = lock.lock().await;

        let started_at = Utc::now();
        let total = units.len();
        info!(
            session_id = %session_id,
            kind = %session.kind,
            units = total,
            "▶️ Starting batch"
        );

        let mut report = BatchReport {
            session_id: session_id.to_string(),
            kind: session.kind,
            started_at,
            finished_at: started_at,
            units: Vec::with_capacity(total),
            succeeded: 0,
            failed: 0,
            fallback_unavailable: false,
            cancelled: false,
        };

        for (position, unit) in units.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(session_id = %session_id, unit = unit.index, "Batch cancelled at unit boundary");
                report.cancelled = true;
                report.units.push(pending_entry(unit, identity));
                continue;
            }

            let entry = self
                .run_unit(&session, unit, identity, scope, operation)
                .await;
            match entry.status {
                UnitStatus::Succeeded => report.succeeded += 1,
                UnitStatus::Failed => report.failed += 1,
                UnitStatus::Pending => {}
            }
            if entry.signer_source == SignerSource::Fallback
                && matches!(entry.error.as_deref(), Some(e) if e.contains("fallback identity unavailable"))
            {
                report.fallback_unavailable = true;
            }
            report.units.push(entry);

            let is_last = position + 1 == total;
            if !is_last && !self.cancel.is_cancelled() {
                info!(
                    session_id = %session_id,
                    wait_seconds = self.inter_tx_delay.as_secs(),
                    "⏳ Inter-transaction delay before next unit"
                );
                tokio::time::sleep(self.inter_tx_delay).await;
            }
        }

        report.finished_at = Utc::now();
        info!(
            session_id = %session_id,
            succeeded = report.succeeded,
            failed = report.failed,
            "Batch finished"
        );
        persist_report(&session, &report);
        Ok(report)
    }

    async fn run_unit(
        &self,
        session: &Session,
        unit: &WorkUnit,
        identity: &SigningIdentitySpec,
        scope: &KeyringScope,
        operation: &dyn UnitOperation,
    ) -> UnitReport {
        let (signer, signer_source) = resolve_signer(identity, unit);

        // The fallback is external mutable state: verify (and create on
        // demand) at the moment of use, never from a cached answer.
        if signer_source == SignerSource::Fallback {
            if let Err(err) = self.context.keyring.ensure_fallback(scope).await {
                error!(
                    session_id = %session.id,
                    unit = unit.index,
                    error = %err,
                    "Fallback signer unavailable, unit failed"
                );
                return UnitReport {
                    index: unit.index,
                    name: unit.name.clone(),
                    signer,
                    signer_source,
                    status: UnitStatus::Failed,
                    attempts: 0,
                    tx_hash: None,
                    error: Some(err.to_string()),
                };
            }
        }

        let label = format!("{}:{}", session.kind, unit.name);
        let state = Arc::new(Mutex::new(UnitState::Pending));
        if let Err(err) = advance(&state, UnitEvent::Start) {
            return failed_entry(unit, &signer, signer_source, 0, err);
        }

        let state_in_op = state.clone();
        let signer_in_op = signer.clone();
        let outcome = self
            .retry
            .execute(&label, move || {
                let state = state_in_op.clone();
                let signer = signer_in_op.clone();
                async move {
                    // Re-entering after a backoff wait resumes the attempt.
                    let waiting = { *state.lock() == UnitState::RetryWait };
                    if waiting {
                        advance(&state, UnitEvent::BackoffElapsed)?;
                    }
                    let result = operation.execute(unit, &signer).await;
                    if matches!(&result, Err(e) if e.is_retryable()) {
                        advance(&state, UnitEvent::RetryableFailure)?;
                    }
                    result
                }
            })
            .await;

        match outcome {
            Ok(retried) => {
                let _ = advance(&state, UnitEvent::Complete);
                info!(
                    session_id = %session.id,
                    unit = unit.index,
                    attempts = retried.attempts,
                    tx_hash = retried.value.tx_hash.as_deref(),
                    "✅ Unit succeeded"
                );
                UnitReport {
                    index: unit.index,
                    name: unit.name.clone(),
                    signer,
                    signer_source,
                    status: UnitStatus::Succeeded,
                    attempts: retried.attempts,
                    tx_hash: retried.value.tx_hash,
                    error: None,
                }
            }
            Err(failure) => {
                let _ = advance(&state, UnitEvent::Fail);
                error!(
                    session_id = %session.id,
                    unit = unit.index,
                    attempts = failure.attempts,
                    error = %failure.error,
                    "❌ Unit failed"
                );
                failed_entry(unit, &signer, signer_source, failure.attempts, failure.error)
            }
        }
    }
}

fn advance(state: &Arc<Mutex<UnitState>>, event: UnitEvent) -> Result<()> {
    let mut guard = state.lock();
    *guard = transition(*guard, event)?;
    Ok(())
}

fn pending_entry(unit: &WorkUnit, identity: &SigningIdentitySpec) -> UnitReport {
    let (signer, signer_source) = resolve_signer(identity, unit);
    UnitReport {
        index: unit.index,
        name: unit.name.clone(),
        signer,
        signer_source,
        status: UnitStatus::Pending,
        attempts: 0,
        tx_hash: None,
        error: None,
    }
}

fn failed_entry(
    unit: &WorkUnit,
    signer: &str,
    signer_source: SignerSource,
    attempts: u32,
    error: CoreError,
) -> UnitReport {
    UnitReport {
        index: unit.index,
        name: unit.name.clone(),
        signer: signer.to_string(),
        signer_source,
        status: UnitStatus::Failed,
        attempts,
        tx_hash: None,
        error: Some(error.to_string()),
    }
}

/// Reports are convenience artifacts; failing to write one never fails the
/// batch that produced it.
fn persist_report(session: &Session, report: &BatchReport) {
    let path = session.work_dir.join("batch_report.json");
    match serde_json::to_vec_pretty(report) {
        Ok(bytes) => {
            if let Err(err) = std::fs::write(&path, bytes) {
                warn!(path = %path.display(), error = %err, "Failed to persist batch report");
            }
        }
        Err(err) => warn!(error = %err, "Failed to serialize batch report"),
    }
}
