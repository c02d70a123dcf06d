//! Mapping tables from upstream values to internal enums
//!
//! Every mapper has a documented fallback and never fails, except
//! [`map_bill_type`]: the bill type is part of the record id, so an unknown
//! type is reported to the caller instead of being guessed.

use crate::models::{BillType, Chamber, CommitteeType, Party};

const PARTY_TABLE: &[(&str, Party)] = &[
    ("d", Party::Democrat),
    ("democrat", Party::Democrat),
    ("democratic", Party::Democrat),
    ("r", Party::Republican),
    ("republican", Party::Republican),
    ("i", Party::Independent),
    ("id", Party::Independent),
    ("independent", Party::Independent),
    ("independent democrat", Party::Independent),
    ("l", Party::Libertarian),
    ("libertarian", Party::Libertarian),
];

/// Map a party name or code; fallback `Party::Other`
pub fn map_party(value: Option<&str>) -> Party {
    let Some(value) = value else {
        return Party::Other;
    };
    let key = value.trim().to_lowercase();
    PARTY_TABLE
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, party)| *party)
        .unwrap_or(Party::Other)
}

/// Map a chamber name; fallback `Chamber::House`
pub fn map_chamber(value: Option<&str>) -> Chamber {
    let key = value.unwrap_or_default().trim().to_lowercase();
    if key.is_empty() {
        return Chamber::House;
    }
    if key == "s" || key.starts_with("senate") {
        Chamber::Senate
    } else if key.starts_with("joint") {
        Chamber::Joint
    } else {
        Chamber::House
    }
}

/// Map a committee type code; fallback `CommitteeType::Other`
pub fn map_committee_type(value: Option<&str>) -> CommitteeType {
    let key = value.unwrap_or_default().trim().to_lowercase();
    match key.as_str() {
        "standing" => CommitteeType::Standing,
        "select" => CommitteeType::Select,
        "special" => CommitteeType::Special,
        "joint" => CommitteeType::Joint,
        "subcommittee" => CommitteeType::Subcommittee,
        "commission or caucus" | "commission" | "caucus" => CommitteeType::Commission,
        _ => CommitteeType::Other,
    }
}

/// Map a bill type such as `HR`, `H.R.` or `S.J.Res.`
pub fn map_bill_type(value: &str) -> Option<BillType> {
    let key: String = value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    key.parse().ok()
}
