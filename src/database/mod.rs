//! Storage layer for congress-sync
//!
//! This module defines the storage trait the sync orchestrator writes
//! through and its SQLite implementation.

pub mod migrations;
pub mod sqlite;

pub use sqlite::SqliteDatabase;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DbError;
use crate::models::{Bill, Committee, Legislator, SyncReport};

/// Database trait for data persistence
///
/// Writes are split into find/create/update so the caller decides between
/// insert and update and can report which one happened.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Database: Send + Sync {
    // =========================================================================
    // Bill operations
    // =========================================================================

    /// Get a bill by id
    async fn find_bill(&self, id: &str) -> Result<Option<Bill>, DbError>;

    /// Insert a new bill and its committee referrals
    async fn create_bill(&self, bill: &Bill) -> Result<(), DbError>;

    /// Replace an existing bill and its committee referrals
    async fn update_bill(&self, bill: &Bill) -> Result<(), DbError>;

    /// Most recently updated bills, optionally restricted to one congress
    async fn list_bills(&self, congress: Option<u32>, limit: u32) -> Result<Vec<Bill>, DbError>;

    /// Number of stored bills
    async fn count_bills(&self) -> Result<u64, DbError>;

    // =========================================================================
    // Legislator operations
    // =========================================================================

    /// Get a legislator by id
    async fn find_legislator(&self, id: &str) -> Result<Option<Legislator>, DbError>;

    /// Insert a new legislator
    async fn create_legislator(&self, legislator: &Legislator) -> Result<(), DbError>;

    /// Replace an existing legislator
    async fn update_legislator(&self, legislator: &Legislator) -> Result<(), DbError>;

    /// Number of stored legislators
    async fn count_legislators(&self) -> Result<u64, DbError>;

    // =========================================================================
    // Committee operations
    // =========================================================================

    /// Get a committee by id
    async fn find_committee(&self, id: &str) -> Result<Option<Committee>, DbError>;

    /// Insert a new committee
    async fn create_committee(&self, committee: &Committee) -> Result<(), DbError>;

    /// Replace an existing committee
    async fn update_committee(&self, committee: &Committee) -> Result<(), DbError>;

    /// Number of stored committees
    async fn count_committees(&self) -> Result<u64, DbError>;

    // =========================================================================
    // Sync run operations
    // =========================================================================

    /// Persist the report of a finished run
    ///
    /// Returns the id of the inserted run
    async fn record_sync_run(&self, report: &SyncReport) -> Result<i64, DbError>;

    /// Start time of the latest successful run
    async fn last_successful_sync(&self) -> Result<Option<DateTime<Utc>>, DbError>;
}
