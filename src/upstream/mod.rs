//! Gateway to the congress.gov v3 API
//!
//! The [`CongressApi`] trait is the seam the sync orchestrator depends on.
//! [`CongressClient`] implements it on top of the rate-limited HTTP client and
//! the retry manager.

pub mod client;
pub mod types;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SyncError;
use crate::models::{BillType, Chamber};
use types::{
    RawAction, RawBill, RawBillDetail, RawCommittee, RawCommitteeRef, RawMember, RawMemberDetail,
    RejectedItem,
};

pub use client::CongressClient;

/// Offset/limit cursor for one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Items to skip
    pub offset: u32,
    /// Page size
    pub limit: u32,
}

impl PageRequest {
    /// The first page of a listing
    pub fn first(limit: u32) -> Self {
        Self { offset: 0, limit }
    }

    /// The page following this one
    pub fn next(&self) -> Self {
        Self {
            offset: self.offset.saturating_add(self.limit),
            limit: self.limit,
        }
    }
}

/// One validated page of a listing
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items that passed schema validation
    pub items: Vec<T>,
    /// Offset of the next page, present iff upstream links one
    pub next_offset: Option<u32>,
    /// Total items reported by upstream
    pub total_count: Option<u64>,
    /// Items dropped at the schema boundary
    pub rejected: Vec<RejectedItem>,
}

impl<T> Page<T> {
    /// A page with no successor
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_offset: None,
            total_count: None,
            rejected: Vec::new(),
        }
    }
}

/// Filter for bill listings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BillFilter {
    /// Restrict to one congress
    pub congress: Option<u32>,
    /// Restrict to one bill type (requires `congress`)
    pub bill_type: Option<BillType>,
    /// Only bills updated at or after this time
    pub from_date_time: Option<DateTime<Utc>>,
    /// Only bills updated before this time
    pub to_date_time: Option<DateTime<Utc>>,
}

/// Filter for member listings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemberFilter {
    /// Restrict to members of one congress
    pub congress: Option<u32>,
    /// Restrict to current (or former) members
    pub current_member: Option<bool>,
    /// Only members updated at or after this time
    pub from_date_time: Option<DateTime<Utc>>,
}

/// Filter for committee listings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitteeFilter {
    /// Restrict to one congress
    pub congress: Option<u32>,
    /// Restrict to one chamber
    pub chamber: Option<Chamber>,
}

/// Upstream API operations used by the sync pipeline
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CongressApi: Send + Sync {
    // ========================================================================
    // Paged listings
    // ========================================================================

    /// One page of bills
    async fn list_bills(
        &self,
        filter: &BillFilter,
        page: PageRequest,
    ) -> Result<Page<RawBill>, SyncError>;

    /// One page of members
    async fn list_members(
        &self,
        filter: &MemberFilter,
        page: PageRequest,
    ) -> Result<Page<RawMember>, SyncError>;

    /// One page of committees
    async fn list_committees(
        &self,
        filter: &CommitteeFilter,
        page: PageRequest,
    ) -> Result<Page<RawCommittee>, SyncError>;

    // ========================================================================
    // Detail fetches
    // ========================================================================

    /// Full bill record
    async fn get_bill(
        &self,
        congress: u32,
        bill_type: BillType,
        number: u32,
    ) -> Result<RawBillDetail, SyncError>;

    /// Committees a bill was referred to
    async fn get_bill_committees(
        &self,
        congress: u32,
        bill_type: BillType,
        number: u32,
    ) -> Result<Vec<RawCommitteeRef>, SyncError>;

    /// Action history of a bill
    async fn get_bill_actions(
        &self,
        congress: u32,
        bill_type: BillType,
        number: u32,
    ) -> Result<Vec<RawAction>, SyncError>;

    /// Full member record
    async fn get_member(&self, bioguide_id: &str) -> Result<RawMemberDetail, SyncError>;
}
