//! Sync run models
//!
//! Statistics, reports and run state produced by the sync orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entity types synced from upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Committees
    Committees,
    /// Legislators (members)
    Legislators,
    /// Bills
    Bills,
}

impl EntityKind {
    /// Entity types in dependency order; bills reference the other two
    pub const ALL: [EntityKind; 3] = [
        EntityKind::Committees,
        EntityKind::Legislators,
        EntityKind::Bills,
    ];
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Committees => write!(f, "committees"),
            EntityKind::Legislators => write!(f, "legislators"),
            EntityKind::Bills => write!(f, "bills"),
        }
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "committees" | "committee" => Ok(EntityKind::Committees),
            "legislators" | "legislator" | "members" | "member" => Ok(EntityKind::Legislators),
            "bills" | "bill" => Ok(EntityKind::Bills),
            _ => Err(format!("Invalid entity kind: {}", s)),
        }
    }
}

/// Per-entity counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStats {
    /// Records pulled from upstream
    pub processed: u64,
    /// Records inserted
    pub created: u64,
    /// Records updated in place
    pub updated: u64,
    /// Records that failed normalization or upsert
    pub errors: u64,
}

/// Aggregate statistics for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Bill counters
    pub bills: EntityStats,
    /// Legislator counters
    pub legislators: EntityStats,
    /// Committee counters
    pub committees: EntityStats,
}

impl SyncStats {
    /// Counters for one entity type
    pub fn get(&self, kind: EntityKind) -> &EntityStats {
        match kind {
            EntityKind::Bills => &self.bills,
            EntityKind::Legislators => &self.legislators,
            EntityKind::Committees => &self.committees,
        }
    }

    /// Mutable counters for one entity type
    pub fn get_mut(&mut self, kind: EntityKind) -> &mut EntityStats {
        match kind {
            EntityKind::Bills => &mut self.bills,
            EntityKind::Legislators => &mut self.legislators,
            EntityKind::Committees => &mut self.committees,
        }
    }
}

/// A failure attributed to a record id or a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncErrorEntry {
    /// Record id, or a stream label such as `bills:118@40`
    pub id: String,
    /// Error message
    pub error: String,
}

impl SyncErrorEntry {
    /// Create a new error entry
    pub fn new(id: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self {
            id: id.into(),
            error: error.to_string(),
        }
    }
}

/// Result of one sync run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    /// True when the run was neither aborted nor stalled
    pub success: bool,
    /// The run-wide error budget was exceeded
    pub aborted: bool,
    /// At least one stream stopped on repeated failures at one offset
    pub stalled: bool,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
    /// Per-entity statistics
    pub stats: SyncStats,
    /// Item and stream failures
    pub errors: Vec<SyncErrorEntry>,
}

/// Outcome of asking the orchestrator to run
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// The run executed to completion or abort
    Completed(SyncReport),
    /// Another run was in progress; nothing was done
    AlreadyRunning,
}

impl SyncOutcome {
    /// The report, if a run executed
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Completed(report) => Some(report),
            SyncOutcome::AlreadyRunning => None,
        }
    }
}

/// Live run state of the orchestrator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncRunState {
    /// Start time of the current or latest run
    pub started_at: Option<DateTime<Utc>>,
    /// Start time of the latest fully successful run
    pub last_successful_sync_at: Option<DateTime<Utc>>,
    /// Whether a run is in progress
    pub is_running: bool,
    /// Error count of the latest run
    pub error_count: u64,
    /// Most recent run-level error
    pub last_error: Option<String>,
}

/// Result of a single upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No record existed; one was inserted
    Created,
    /// An existing record was updated
    Updated,
}
