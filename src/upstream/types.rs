//! Wire types for the congress.gov v3 API
//!
//! Response bodies are parsed into `serde_json::Value` first, the entity
//! array is located, and each element is deserialized and validated on its
//! own. A malformed element is rejected with a reason instead of failing the
//! whole page.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::SyncError;

/// Structural checks applied after deserialization
pub trait Validate {
    /// Returns a reason when the record cannot be used
    fn validate(&self) -> Result<(), String>;
}

/// An element dropped at the schema boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedItem {
    /// Position within the page
    pub index: usize,
    /// Why the element was rejected
    pub reason: String,
}

/// Pagination envelope
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Pagination {
    /// Total items matching the query
    #[serde(default)]
    pub count: Option<u64>,
    /// Link to the next page; absent on the last page
    #[serde(default)]
    pub next: Option<String>,
}

/// A validated page body
#[derive(Debug, Clone, PartialEq)]
pub struct ListBody<T> {
    /// Elements that passed validation
    pub items: Vec<T>,
    /// Elements that did not
    pub rejected: Vec<RejectedItem>,
    /// Pagination envelope, if present
    pub pagination: Option<Pagination>,
}

/// Parse a list response, locating the entity array under `key` or `items`
pub fn parse_list<T>(body: &[u8], key: &str) -> Result<ListBody<T>, SyncError>
where
    T: DeserializeOwned + Validate,
{
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| SyncError::InvalidData(format!("Response is not JSON: {}", e)))?;

    let array = value
        .get(key)
        .or_else(|| value.get("items"))
        .and_then(Value::as_array)
        .ok_or_else(|| {
            SyncError::InvalidData(format!("Response has no '{}' array", key))
        })?;

    let mut items = Vec::with_capacity(array.len());
    let mut rejected = Vec::new();

    for (index, element) in array.iter().enumerate() {
        match T::deserialize(element) {
            Ok(item) => match item.validate() {
                Ok(()) => items.push(item),
                Err(reason) => rejected.push(RejectedItem { index, reason }),
            },
            Err(e) => rejected.push(RejectedItem {
                index,
                reason: e.to_string(),
            }),
        }
    }

    let pagination = match value.get("pagination") {
        Some(p) => Some(
            Pagination::deserialize(p)
                .map_err(|e| SyncError::InvalidData(format!("Invalid pagination: {}", e)))?,
        ),
        None => None,
    };

    Ok(ListBody {
        items,
        rejected,
        pagination,
    })
}

/// Parse a single-object response wrapped under `key`
pub fn parse_object<T>(body: &[u8], key: &str) -> Result<T, SyncError>
where
    T: DeserializeOwned + Validate,
{
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| SyncError::InvalidData(format!("Response is not JSON: {}", e)))?;
    let inner = value
        .get(key)
        .ok_or_else(|| SyncError::InvalidData(format!("Response has no '{}' object", key)))?;
    let item = T::deserialize(inner).map_err(|e| SyncError::InvalidData(e.to_string()))?;
    item.validate().map_err(SyncError::InvalidData)?;
    Ok(item)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(u64),
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}

fn optional_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        match Option::<StringOrNumber>::deserialize(deserializer)? {
            Some(StringOrNumber::Number(n)) => u32::try_from(n).ok(),
            Some(StringOrNumber::String(s)) => s.trim().parse().ok(),
            None => None,
        },
    )
}

fn require(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} is empty", field))
    } else {
        Ok(())
    }
}

// ============================================================================
// Bills
// ============================================================================

/// Latest action attached to a bill
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLatestAction {
    /// Action date
    #[serde(default)]
    pub action_date: Option<String>,
    /// Action text
    #[serde(default)]
    pub text: Option<String>,
}

/// Bill summary from `/bill` listings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBill {
    /// Congress number
    pub congress: u32,
    /// Bill number (string upstream, sometimes numeric)
    #[serde(deserialize_with = "string_or_number")]
    pub number: String,
    /// Bill type, e.g. `HR`
    #[serde(rename = "type")]
    pub bill_type: String,
    /// Title
    #[serde(default)]
    pub title: Option<String>,
    /// Originating chamber
    #[serde(default)]
    pub origin_chamber: Option<String>,
    /// Latest action
    #[serde(default)]
    pub latest_action: Option<RawLatestAction>,
    /// Last update
    #[serde(default)]
    pub update_date: Option<String>,
    /// Last update including text changes
    #[serde(default)]
    pub update_date_including_text: Option<String>,
}

impl Validate for RawBill {
    fn validate(&self) -> Result<(), String> {
        require("number", &self.number)?;
        require("type", &self.bill_type)
    }
}

/// Sponsor reference in a bill detail
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSponsor {
    /// Bioguide id
    pub bioguide_id: String,
    /// Display name
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Policy area of a bill
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawPolicyArea {
    /// Policy area name
    pub name: String,
}

/// Law enacted from a bill
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawLaw {
    /// Law number, e.g. `118-5`
    #[serde(deserialize_with = "string_or_number")]
    pub number: String,
    /// Law type, e.g. `Public Law`
    #[serde(rename = "type", default)]
    pub law_type: Option<String>,
}

/// Full bill record from `/bill/{congress}/{type}/{number}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBillDetail {
    /// Summary fields shared with listings
    #[serde(flatten)]
    pub summary: RawBill,
    /// Introduction date
    #[serde(default)]
    pub introduced_date: Option<String>,
    /// Sponsors (usually one)
    #[serde(default)]
    pub sponsors: Vec<RawSponsor>,
    /// Policy area
    #[serde(default)]
    pub policy_area: Option<RawPolicyArea>,
    /// Laws enacted from this bill
    #[serde(default)]
    pub laws: Vec<RawLaw>,
}

impl Validate for RawBillDetail {
    fn validate(&self) -> Result<(), String> {
        self.summary.validate()
    }
}

/// Committee reference in a bill's committee listing
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCommitteeRef {
    /// System code
    pub system_code: String,
    /// Committee name
    #[serde(default)]
    pub name: Option<String>,
    /// Chamber
    #[serde(default)]
    pub chamber: Option<String>,
}

impl Validate for RawCommitteeRef {
    fn validate(&self) -> Result<(), String> {
        require("systemCode", &self.system_code)
    }
}

/// Entry in a bill's action history
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAction {
    /// Action date
    #[serde(default)]
    pub action_date: Option<String>,
    /// Action text
    pub text: String,
    /// Action type, e.g. `IntroReferral`
    #[serde(rename = "type", default)]
    pub action_type: Option<String>,
}

impl Validate for RawAction {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

// ============================================================================
// Members
// ============================================================================

/// One term of service
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTerm {
    /// Chamber, e.g. `House of Representatives`
    #[serde(default)]
    pub chamber: Option<String>,
    /// First year of the term
    #[serde(default)]
    pub start_year: Option<i32>,
    /// Last year of the term; absent while serving
    #[serde(default)]
    pub end_year: Option<i32>,
}

/// Listing terms are wrapped in `{ "item": [...] }`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawTerms {
    /// Terms, oldest first
    #[serde(default)]
    pub item: Vec<RawTerm>,
}

/// Member portrait
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDepiction {
    /// Image URL
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Member summary from `/member` listings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMember {
    /// Bioguide id
    pub bioguide_id: String,
    /// Name, usually `Last, First Middle`
    #[serde(default)]
    pub name: Option<String>,
    /// Party name, e.g. `Democratic`
    #[serde(default)]
    pub party_name: Option<String>,
    /// State
    #[serde(default)]
    pub state: Option<String>,
    /// District (House only)
    #[serde(default, deserialize_with = "optional_u32")]
    pub district: Option<u32>,
    /// Terms of service
    #[serde(default)]
    pub terms: RawTerms,
    /// Portrait
    #[serde(default)]
    pub depiction: Option<RawDepiction>,
    /// Last update
    #[serde(default)]
    pub update_date: Option<String>,
}

impl Validate for RawMember {
    fn validate(&self) -> Result<(), String> {
        require("bioguideId", &self.bioguide_id)
    }
}

/// Party affiliation period in a member detail
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPartyHistory {
    /// Party name
    pub party_name: String,
    /// First year with this party
    #[serde(default)]
    pub start_year: Option<i32>,
}

/// Full member record from `/member/{bioguideId}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMemberDetail {
    /// Bioguide id
    pub bioguide_id: String,
    /// First name
    #[serde(default)]
    pub first_name: Option<String>,
    /// Middle name
    #[serde(default)]
    pub middle_name: Option<String>,
    /// Last name
    #[serde(default)]
    pub last_name: Option<String>,
    /// Suffix
    #[serde(default)]
    pub suffix_name: Option<String>,
    /// Name in `First Middle Last` order
    #[serde(default)]
    pub direct_order_name: Option<String>,
    /// Party history, oldest first
    #[serde(default)]
    pub party_history: Vec<RawPartyHistory>,
    /// State
    #[serde(default)]
    pub state: Option<String>,
    /// District (House only)
    #[serde(default, deserialize_with = "optional_u32")]
    pub district: Option<u32>,
    /// Terms of service
    #[serde(default)]
    pub terms: Vec<RawTerm>,
    /// Whether currently serving
    #[serde(default)]
    pub current_member: Option<bool>,
    /// Portrait
    #[serde(default)]
    pub depiction: Option<RawDepiction>,
    /// Last update
    #[serde(default)]
    pub update_date: Option<String>,
}

impl Validate for RawMemberDetail {
    fn validate(&self) -> Result<(), String> {
        require("bioguideId", &self.bioguide_id)
    }
}

// ============================================================================
// Committees
// ============================================================================

/// Parent committee reference
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawParentCommittee {
    /// Parent system code
    pub system_code: String,
}

/// Committee from `/committee` listings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCommittee {
    /// System code
    pub system_code: String,
    /// Name
    #[serde(default)]
    pub name: Option<String>,
    /// Chamber
    #[serde(default)]
    pub chamber: Option<String>,
    /// Committee type, e.g. `Standing`
    #[serde(default)]
    pub committee_type_code: Option<String>,
    /// Parent committee for subcommittees
    #[serde(default)]
    pub parent: Option<RawParentCommittee>,
    /// API URL of the committee
    #[serde(default)]
    pub url: Option<String>,
    /// Last update
    #[serde(default)]
    pub update_date: Option<String>,
}

impl Validate for RawCommittee {
    fn validate(&self) -> Result<(), String> {
        require("systemCode", &self.system_code)?;
        require("name", self.name.as_deref().unwrap_or(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test 1: valid elements are kept, malformed ones rejected with a reason
    #[test]
    fn test_parse_list_rejects_malformed_items() {
        let body = br#"{
            "bills": [
                {"congress": 118, "number": "1", "type": "HR", "title": "A"},
                {"congress": 118, "type": "S"},
                {"congress": 118, "number": "", "type": "S"},
                {"congress": 118, "number": 7, "type": "S", "title": "B"}
            ],
            "pagination": {"count": 4, "next": "https://api.congress.gov/v3/bill?offset=4"}
        }"#;

        let parsed: ListBody<RawBill> = parse_list(body, "bills").unwrap();

        assert_eq!(parsed.items.len(), 2);
        assert_eq!(parsed.items[1].number, "7");
        assert_eq!(parsed.rejected.len(), 2);
        assert_eq!(parsed.rejected[0].index, 1);
        assert!(parsed.rejected[0].reason.contains("number"));
        assert_eq!(parsed.rejected[1].reason, "number is empty");

        let pagination = parsed.pagination.unwrap();
        assert_eq!(pagination.count, Some(4));
        assert!(pagination.next.is_some());
    }

    // Test 2: falls back to a generic `items` array
    #[test]
    fn test_parse_list_items_fallback() {
        let body = br#"{"items": [{"systemCode": "hsag00", "name": "Agriculture"}]}"#;
        let parsed: ListBody<RawCommittee> = parse_list(body, "committees").unwrap();
        assert_eq!(parsed.items.len(), 1);
        assert!(parsed.pagination.is_none());
    }

    // Test 3: missing entity array is invalid data
    #[test]
    fn test_parse_list_missing_array() {
        let body = br#"{"request": {}}"#;
        let result: Result<ListBody<RawMember>, _> = parse_list(body, "members");
        assert!(matches!(result, Err(SyncError::InvalidData(_))));

        let result: Result<ListBody<RawMember>, _> = parse_list(b"not json", "members");
        assert!(matches!(result, Err(SyncError::InvalidData(_))));
    }

    // Test 4: member listing shape with nested terms and numeric district
    #[test]
    fn test_parse_member_listing() {
        let body = br#"{"members": [{
            "bioguideId": "P000197",
            "name": "Pelosi, Nancy",
            "partyName": "Democratic",
            "state": "California",
            "district": 11,
            "terms": {"item": [{"chamber": "House of Representatives", "startYear": 1987}]},
            "depiction": {"imageUrl": "https://example.test/p.jpg"},
            "updateDate": "2024-01-02T10:00:00Z"
        }]}"#;

        let parsed: ListBody<RawMember> = parse_list(body, "members").unwrap();
        let member = &parsed.items[0];
        assert_eq!(member.district, Some(11));
        assert_eq!(member.terms.item.len(), 1);
        assert_eq!(member.terms.item[0].end_year, None);
    }

    // Test 5: detail object is unwrapped from its key
    #[test]
    fn test_parse_object_bill_detail() {
        let body = br#"{"bill": {
            "congress": 118, "number": "5", "type": "S", "title": "T",
            "introducedDate": "2023-01-03",
            "sponsors": [{"bioguideId": "S000148", "fullName": "Sen. Schumer"}],
            "policyArea": {"name": "Health"},
            "laws": [{"number": "118-12", "type": "Public Law"}]
        }}"#;

        let detail: RawBillDetail = parse_object(body, "bill").unwrap();
        assert_eq!(detail.summary.number, "5");
        assert_eq!(detail.sponsors[0].bioguide_id, "S000148");
        assert_eq!(detail.laws.len(), 1);

        let missing: Result<RawBillDetail, _> = parse_object(b"{}", "bill");
        assert!(matches!(missing, Err(SyncError::InvalidData(_))));
    }
}
