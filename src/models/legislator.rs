//! Legislator model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{Chamber, Party};

/// A normalized member of Congress, keyed by upper-case bioguide id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Legislator {
    /// Bioguide id, e.g. `P000197`
    pub id: String,

    /// First name
    pub first_name: String,

    /// Middle name or initial
    pub middle_name: Option<String>,

    /// Last name
    pub last_name: String,

    /// Suffix (Jr., III, ...)
    pub suffix: Option<String>,

    /// Name as displayed upstream
    pub full_name: String,

    /// Party
    pub party: Party,

    /// Two-letter state code or state name
    pub state: String,

    /// District (House only)
    pub district: Option<u32>,

    /// Chamber of the most recent term
    pub chamber: Chamber,

    /// Whether the member is currently serving
    pub is_current: bool,

    /// Portrait URL
    pub image_url: Option<String>,

    /// Upstream last-modified timestamp
    pub update_date: DateTime<Utc>,
}
