//! Session Store
//!
//! Owns the on-disk session tree. Directory creation is idempotent so a
//! crashed batch can be re-entered with the same session id without
//! destroying artifacts already produced. All JSON writes are whole-file
//! rewrites; readers never assume partial or append semantics.
//!
//! Layout, deterministic from `(session, unit index, artifact kind)`:
//!
//! ```text
//! <data_root>/<kind>/<session_id>/
//!   session_info.json
//!   wallets/<unit_name>/
//!   stake_files/stake_<unit_name>.yaml
//!   wallet_mnemonics.json
//! <data_root>/input/migration-input-<session_id>.json
//! <data_root>/output/migration-output-<session_id>.json
//! <data_root>/tmp/
//! ```

use super::types::{
    unit_index_from_stake_file, ArtifactKind, Session, SessionKind, SessionParams, WorkUnit,
};
use crate::error::{CoreError, Result};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

const SESSION_INFO_FILE: &str = "session_info.json";

/// Filesystem-backed store for batch sessions.
///
/// The store itself holds no session state in memory; the directory tree
/// is the single source of truth. The only in-memory structure is a
/// registry of per-session locks for callers that choose to run sessions
/// concurrently.
#[derive(Clone)]
pub struct SessionStore {
    data_root: PathBuf,
    session_locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl SessionStore {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            session_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Allocate a new session with a generated id
    pub fn create_session(&self, kind: SessionKind, params: SessionParams) -> Result<Session> {
        self.create_session_with_id(&Uuid::new_v4().to_string(), kind, params)
    }

    /// Create or re-enter a session with a known id.
    ///
    /// Idempotent by contract: if the descriptor already exists it is
    /// loaded and returned unchanged, and pre-existing artifacts are left
    /// untouched, so crash recovery can simply call this again.
    pub fn create_session_with_id(
        &self,
        id: &str,
        kind: SessionKind,
        params: SessionParams,
    ) -> Result<Session> {
        let work_dir = self.session_dir(kind, id);
        create_dir_all(&work_dir)?;

        let descriptor_path = work_dir.join(SESSION_INFO_FILE);
        if descriptor_path.exists() {
            debug!(session_id = %id, "Session already exists, re-entering");
            return self.load_descriptor(&descriptor_path, &work_dir);
        }

        let session = Session {
            id: id.to_string(),
            kind,
            params,
            created_at: Utc::now(),
            work_dir: work_dir.clone(),
        };
        write_json(&descriptor_path, &session)?;

        crate::logging::log_session_operation(
            "create_session",
            Some(id),
            Some(kind.dir_name()),
            "created",
            None,
        );
        Ok(session)
    }

    /// Look up a session by id across both kind directories
    pub fn get_session(&self, id: &str) -> Result<Session> {
        for kind in [SessionKind::Migration, SessionKind::StakeProvisioning] {
            let work_dir = self.session_dir(kind, id);
            let descriptor_path = work_dir.join(SESSION_INFO_FILE);
            if descriptor_path.exists() {
                return self.load_descriptor(&descriptor_path, &work_dir);
            }
        }
        Err(CoreError::SessionNotFound {
            session_id: id.to_string(),
        })
    }

    /// Derive the session's work units by scanning its artifact directories.
    ///
    /// An empty session yields an empty list, not an error. Units come back
    /// in index order with pending status; terminal status lives in the
    /// batch report, not on disk.
    pub fn list_work_units(&self, session: &Session) -> Result<Vec<WorkUnit>> {
        match session.kind {
            SessionKind::StakeProvisioning => {
                let stake_dir = session.work_dir.join("stake_files");
                if !stake_dir.exists() {
                    return Ok(Vec::new());
                }
                let mut units = Vec::new();
                for entry in read_dir(&stake_dir)? {
                    let path = entry.path();
                    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                        continue;
                    };
                    if let Some(index) = unit_index_from_stake_file(file_name) {
                        units.push(WorkUnit::new(index, path));
                    }
                }
                units.sort_by_key(|u| u.index);
                Ok(units)
            }
            SessionKind::Migration => {
                // The whole key-set is one unit, present once the input
                // file has been recorded.
                let input = self.artifact_path(session, 0, ArtifactKind::MigrationInput);
                if input.exists() {
                    Ok(vec![WorkUnit::new(0, input)])
                } else {
                    Ok(Vec::new())
                }
            }
        }
    }

    /// Write an artifact at its deterministic path, creating parents.
    ///
    /// Overwriting an existing artifact for the same coordinates is allowed
    /// and expected on retry.
    pub fn record_artifact(
        &self,
        session: &Session,
        unit_index: u32,
        kind: ArtifactKind,
        content: &[u8],
    ) -> Result<PathBuf> {
        let path = self.artifact_path(session, unit_index, kind);
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        fs::write(&path, content).map_err(|e| CoreError::io(&path, e))?;
        debug!(
            session_id = %session.id,
            unit_index = unit_index,
            path = %path.display(),
            "Artifact recorded"
        );
        Ok(path)
    }

    /// Read an artifact back from its deterministic path
    pub fn read_artifact(
        &self,
        session: &Session,
        unit_index: u32,
        kind: ArtifactKind,
    ) -> Result<Vec<u8>> {
        let path = self.artifact_path(session, unit_index, kind);
        fs::read(&path).map_err(|e| CoreError::io(&path, e))
    }

    /// Deterministic artifact path for `(session, unit index, kind)`
    pub fn artifact_path(&self, session: &Session, unit_index: u32, kind: ArtifactKind) -> PathBuf {
        let unit = super::types::unit_name(unit_index);
        match kind {
            ArtifactKind::StakeConfig => session
                .work_dir
                .join("stake_files")
                .join(format!("stake_{unit}.yaml")),
            ArtifactKind::WalletMnemonics => session.work_dir.join("wallet_mnemonics.json"),
            ArtifactKind::MigrationInput => self
                .data_root
                .join("input")
                .join(format!("migration-input-{}.json", session.id)),
            ArtifactKind::MigrationOutput => self
                .data_root
                .join("output")
                .join(format!("migration-output-{}.json", session.id)),
            ArtifactKind::UnsignedTx => self
                .data_root
                .join("output")
                .join(format!("unsigned-claim-{}.json", session.id)),
        }
    }

    /// Per-unit keyring home for the staking flow
    pub fn wallet_home(&self, session: &Session, unit_index: u32) -> PathBuf {
        session
            .work_dir
            .join("wallets")
            .join(super::types::unit_name(unit_index))
    }

    /// Directory for short-lived secret-bearing temp files
    pub fn tmp_dir(&self) -> Result<PathBuf> {
        let dir = self.data_root.join("tmp");
        create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Delete aged files under `<data_root>/tmp` only. Session trees are
    /// never touched. Returns the number of files removed.
    pub fn sweep_stale_temp_files(&self, max_age: Duration) -> Result<usize> {
        let dir = self.data_root.join("tmp");
        if !dir.exists() {
            return Ok(0);
        }
        let now = SystemTime::now();
        let mut removed = 0usize;
        for entry in read_dir(&dir)? {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let stale = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .map(|age| age >= max_age)
                .unwrap_or(false);
            if stale {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove stale temp file"),
                }
            }
        }
        if removed > 0 {
            info!(removed = removed, "🧹 Swept stale temp files");
        }
        Ok(removed)
    }

    /// Session-scoped lock for callers that run sessions concurrently.
    /// Writers within one session never run concurrently in the
    /// orchestrator's own design; this exists for embedders that
    /// parallelize across sessions and share the store.
    pub fn session_lock(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.session_locks
            .lock()
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn session_dir(&self, kind: SessionKind, id: &str) -> PathBuf {
        self.data_root.join(kind.dir_name()).join(id)
    }

    fn load_descriptor(&self, path: &Path, work_dir: &Path) -> Result<Session> {
        let bytes = fs::read(path).map_err(|e| CoreError::io(path, e))?;
        let mut session: Session = serde_json::from_slice(&bytes)?;
        session.work_dir = work_dir.to_path_buf();
        Ok(session)
    }
}

fn create_dir_all(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| CoreError::io(path, e))
}

fn read_dir(path: &Path) -> Result<Vec<fs::DirEntry>> {
    let entries = fs::read_dir(path).map_err(|e| CoreError::io(path, e))?;
    let mut collected = Vec::new();
    for entry in entries {
        collected.push(entry.map_err(|e| CoreError::io(path, e))?);
    }
    Ok(collected)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    fs::write(path, bytes).map_err(|e| CoreError::io(path, e))
}
