//! Bill model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{BillStatus, BillType, Chamber};

/// A normalized bill record, keyed by `{type}{number}-{congress}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    /// Deterministic id, e.g. `hr1234-118`
    pub id: String,

    /// Congress number
    pub congress: u32,

    /// Bill type
    pub bill_type: BillType,

    /// Bill number within its type and congress
    pub number: u32,

    /// Official title
    pub title: String,

    /// Originating chamber
    pub origin_chamber: Chamber,

    /// Inferred legislative status
    pub status: BillStatus,

    /// Introduction date
    pub introduced_date: Option<DateTime<Utc>>,

    /// Date of the latest action
    pub latest_action_date: Option<DateTime<Utc>>,

    /// Text of the latest action
    pub latest_action_text: Option<String>,

    /// Legislator id of the sponsor
    pub sponsor_id: Option<String>,

    /// Policy area name
    pub policy_area: Option<String>,

    /// Committee ids the bill was referred to
    pub committee_ids: Vec<String>,

    /// Upstream last-modified timestamp
    pub update_date: DateTime<Utc>,
}

impl Bill {
    /// Set the sponsor
    pub fn with_sponsor(mut self, sponsor_id: impl Into<String>) -> Self {
        self.sponsor_id = Some(sponsor_id.into());
        self
    }

    /// Set the committee referrals
    pub fn with_committees(mut self, committee_ids: Vec<String>) -> Self {
        self.committee_ids = committee_ids;
        self
    }
}
