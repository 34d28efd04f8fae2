//! # Sync Job State Machine
//!
//! Tracks one reconciliation pass through its phases with validated
//! transitions.
//!
//! ## State Machine
//!
//! ```text
//! Idle → FetchingRemote → ScanningLocal → Persisting → Done
//!   ↓          ↓               ↓              ↓
//!   └──────────┴───────────────┴──────────────┴──→ Failed | Cancelled
//! ```
//!
//! The remote fetch keeps running in the background once `ScanningLocal` is
//! entered; `Persisting` begins when both sides have finished.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{SyncJob, SyncPhase};
//!
//! let mut job = SyncJob::new();
//! job.advance(SyncPhase::FetchingRemote)?;
//! job.advance(SyncPhase::ScanningLocal)?;
//! job.advance(SyncPhase::Persisting)?;
//! job.advance(SyncPhase::Done)?;
//! ```

use crate::error::CollectionFetchError;
use crate::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::{Duration, Instant};
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for a sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncJobId(Uuid);

impl SyncJobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for SyncJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SyncJobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Phases
// ============================================================================

/// Where a pass currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    FetchingRemote,
    ScanningLocal,
    Persisting,
    Done,
    Failed,
    Cancelled,
}

impl SyncPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncPhase::Done | SyncPhase::Failed | SyncPhase::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "idle",
            SyncPhase::FetchingRemote => "fetching_remote",
            SyncPhase::ScanningLocal => "scanning_local",
            SyncPhase::Persisting => "persisting",
            SyncPhase::Done => "done",
            SyncPhase::Failed => "failed",
            SyncPhase::Cancelled => "cancelled",
        }
    }

    /// Whether `self → to` is a legal step.
    pub fn can_transition_to(&self, to: SyncPhase) -> bool {
        match (self, to) {
            (from, _) if from.is_terminal() => false,
            (_, SyncPhase::Failed) | (_, SyncPhase::Cancelled) => true,
            (SyncPhase::Idle, SyncPhase::FetchingRemote) => true,
            (SyncPhase::FetchingRemote, SyncPhase::ScanningLocal) => true,
            (SyncPhase::ScanningLocal, SyncPhase::Persisting) => true,
            (SyncPhase::Persisting, SyncPhase::Done) => true,
            _ => false,
        }
    }
}

impl FromStr for SyncPhase {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(SyncPhase::Idle),
            "fetching_remote" => Ok(SyncPhase::FetchingRemote),
            "scanning_local" => Ok(SyncPhase::ScanningLocal),
            "persisting" => Ok(SyncPhase::Persisting),
            "done" => Ok(SyncPhase::Done),
            "failed" => Ok(SyncPhase::Failed),
            "cancelled" => Ok(SyncPhase::Cancelled),
            _ => Err(SyncError::InvalidPhase(s.to_string())),
        }
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Job
// ============================================================================

/// One reconciliation pass in flight
#[derive(Debug, Clone)]
pub struct SyncJob {
    pub id: SyncJobId,
    phase: SyncPhase,
    started_at: Instant,
    warnings: Vec<String>,
}

impl SyncJob {
    pub fn new() -> Self {
        Self {
            id: SyncJobId::new(),
            phase: SyncPhase::Idle,
            started_at: Instant::now(),
            warnings: Vec::new(),
        }
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Move to `to`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` for any step the state machine does
    /// not allow, including any step out of a terminal phase.
    pub fn advance(&mut self, to: SyncPhase) -> Result<()> {
        if !self.phase.can_transition_to(to) {
            return Err(SyncError::InvalidStateTransition {
                from: self.phase.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        self.phase = to;
        Ok(())
    }

    /// Build the final report. Only meaningful once the job reached `Done`.
    ///
    /// `remote_files` is `None` when the remote inventory was left untouched.
    pub fn report(
        &self,
        remote_files: Option<u64>,
        local_files: u64,
        collection_errors: Vec<CollectionFetchError>,
    ) -> SyncReport {
        SyncReport {
            job_id: self.id,
            phase: self.phase,
            remote_replaced: remote_files.is_some(),
            remote_files: remote_files.unwrap_or(0),
            local_files,
            collection_errors,
            warnings: self.warnings.clone(),
            duration: self.elapsed(),
        }
    }
}

impl Default for SyncJob {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a completed pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub job_id: SyncJobId,
    pub phase: SyncPhase,
    /// False when the remote was unreachable and its table kept as it was
    pub remote_replaced: bool,
    pub remote_files: u64,
    /// Local rows written
    pub local_files: u64,
    pub collection_errors: Vec<CollectionFetchError>,
    pub warnings: Vec<String>,
    pub duration: Duration,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_job_id_new() {
        let id1 = SyncJobId::new();
        let id2 = SyncJobId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_phase_is_terminal() {
        assert!(!SyncPhase::Idle.is_terminal());
        assert!(!SyncPhase::Persisting.is_terminal());
        assert!(SyncPhase::Done.is_terminal());
        assert!(SyncPhase::Failed.is_terminal());
        assert!(SyncPhase::Cancelled.is_terminal());
    }

    #[test]
    fn test_phase_from_str() {
        assert_eq!(
            SyncPhase::from_str("fetching_remote").unwrap(),
            SyncPhase::FetchingRemote
        );
        assert_eq!("DONE".parse::<SyncPhase>().unwrap(), SyncPhase::Done);
        assert!("invalid".parse::<SyncPhase>().is_err());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut job = SyncJob::new();
        job.advance(SyncPhase::FetchingRemote).unwrap();
        job.advance(SyncPhase::ScanningLocal).unwrap();
        job.advance(SyncPhase::Persisting).unwrap();
        job.advance(SyncPhase::Done).unwrap();

        assert_eq!(job.phase(), SyncPhase::Done);
    }

    #[test]
    fn test_skipping_a_phase_is_rejected() {
        let mut job = SyncJob::new();
        let result = job.advance(SyncPhase::Persisting);

        assert!(matches!(
            result,
            Err(SyncError::InvalidStateTransition { .. })
        ));
        assert_eq!(job.phase(), SyncPhase::Idle);
    }

    #[test]
    fn test_failure_reachable_from_any_active_phase() {
        for phase in [
            SyncPhase::Idle,
            SyncPhase::FetchingRemote,
            SyncPhase::ScanningLocal,
            SyncPhase::Persisting,
        ] {
            assert!(phase.can_transition_to(SyncPhase::Failed));
            assert!(phase.can_transition_to(SyncPhase::Cancelled));
        }
    }

    #[test]
    fn test_terminal_phases_are_final() {
        let mut job = SyncJob::new();
        job.advance(SyncPhase::Cancelled).unwrap();

        assert!(job.advance(SyncPhase::Failed).is_err());
        assert!(job.advance(SyncPhase::FetchingRemote).is_err());
    }

    #[test]
    fn test_report_carries_warnings() {
        let mut job = SyncJob::new();
        job.add_warning("remote unavailable");

        let report = job.report(None, 12, Vec::new());

        assert_eq!(report.local_files, 12);
        assert_eq!(report.warnings, vec!["remote unavailable".to_string()]);
        assert!(!report.remote_replaced);
    }
}
