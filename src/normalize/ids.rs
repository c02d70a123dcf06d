//! Deterministic record ids derived from natural keys

use chrono::{DateTime, Datelike, Utc};

use crate::error::ParseError;
use crate::models::BillType;

/// Natural key of a bill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BillKey {
    /// Bill type
    pub bill_type: BillType,
    /// Bill number
    pub number: u32,
    /// Congress number
    pub congress: u32,
}

/// Build a bill id such as `hr1234-118`
pub fn generate_bill_id(bill_type: BillType, number: u32, congress: u32) -> String {
    format!("{}{}-{}", bill_type.code(), number, congress)
}

/// Inverse of [`generate_bill_id`]
pub fn parse_bill_id(id: &str) -> Result<BillKey, ParseError> {
    let invalid = || ParseError::InvalidBillId(id.to_string());

    let (head, congress) = id.rsplit_once('-').ok_or_else(invalid)?;
    let congress: u32 = parse_digits(congress).ok_or_else(invalid)?;

    let split = head
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (type_code, number) = head.split_at(split);

    let bill_type: BillType = type_code.parse().map_err(|_| invalid())?;
    // Generated ids are always lower-case
    if bill_type.code() != type_code {
        return Err(invalid());
    }
    let number = parse_digits(number).ok_or_else(invalid)?;

    Ok(BillKey {
        bill_type,
        number,
        congress,
    })
}

fn parse_digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Committee id: the lower-cased system code
pub fn generate_committee_id(system_code: &str) -> String {
    system_code.trim().to_lowercase()
}

/// Legislator id: the upper-cased bioguide id
pub fn generate_legislator_id(bioguide_id: &str) -> String {
    bioguide_id.trim().to_uppercase()
}

/// Congress in session on `date`; a new congress starts every odd year
pub fn current_congress(date: DateTime<Utc>) -> u32 {
    let year = date.year().max(1789);
    ((year - 1789) / 2 + 1) as u32
}
