//! Domain models for congress-sync
//!
//! This module contains the normalized legislative entities and the
//! records produced by a sync run.

pub mod bill;
pub mod committee;
pub mod enums;
pub mod legislator;
pub mod sync;

// Re-export commonly used types
pub use bill::Bill;
pub use committee::Committee;
pub use enums::{BillStatus, BillType, Chamber, CommitteeType, Party};
pub use legislator::Legislator;
pub use sync::{
    EntityKind, EntityStats, SyncErrorEntry, SyncOutcome, SyncReport, SyncRunState, SyncStats,
    UpsertOutcome,
};
