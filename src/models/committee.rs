//! Committee model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{Chamber, CommitteeType};

/// A normalized committee, keyed by lower-case system code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Committee {
    /// System code, e.g. `hsag00`
    pub id: String,

    /// Committee name
    pub name: String,

    /// Chamber
    pub chamber: Chamber,

    /// Committee type
    pub committee_type: CommitteeType,

    /// Parent committee id for subcommittees
    pub parent_id: Option<String>,

    /// Committee website
    pub url: Option<String>,

    /// Upstream last-modified timestamp
    pub update_date: DateTime<Utc>,
}
