//! Record mappers from validated wire types to internal entities

use chrono::{DateTime, Utc};

use super::dates::{parse_optional_date, parse_required_date};
use super::enums::{map_bill_type, map_chamber, map_committee_type, map_party};
use super::ids::{generate_bill_id, generate_committee_id, generate_legislator_id};
use super::names::parse_name;
use super::status::{infer_bill_status, infer_status_from_actions};
use crate::error::NormalizeError;
use crate::models::{Bill, BillStatus, Chamber, Committee, CommitteeType, Legislator};
use crate::upstream::types::{
    RawAction, RawBill, RawBillDetail, RawCommittee, RawCommitteeRef, RawMember, RawMemberDetail,
    RawTerm,
};

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Map a bill listing entry
pub fn normalize_bill(raw: &RawBill, now: DateTime<Utc>) -> Result<Bill, NormalizeError> {
    if raw.bill_type.trim().is_empty() {
        return Err(NormalizeError::MissingField("type"));
    }
    let bill_type = map_bill_type(&raw.bill_type)
        .ok_or_else(|| NormalizeError::UnknownBillType(raw.bill_type.clone()))?;

    let number: u32 = raw
        .number
        .trim()
        .parse()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| NormalizeError::InvalidBillNumber(raw.number.clone()))?;

    if raw.congress == 0 {
        return Err(NormalizeError::MissingField("congress"));
    }

    let latest_action = raw.latest_action.as_ref();
    let latest_action_text = latest_action.and_then(|a| non_blank(a.text.as_deref()));

    let origin_chamber = match raw.origin_chamber.as_deref() {
        Some(chamber) => map_chamber(Some(chamber)),
        None => bill_type.origin_chamber(),
    };

    let update_date = raw
        .update_date_including_text
        .as_deref()
        .or(raw.update_date.as_deref());

    Ok(Bill {
        id: generate_bill_id(bill_type, number, raw.congress),
        congress: raw.congress,
        bill_type,
        number,
        title: non_blank(raw.title.as_deref())
            .unwrap_or_else(|| format!("{} {}", bill_type.code().to_uppercase(), number)),
        origin_chamber,
        status: infer_bill_status(latest_action_text.as_deref()),
        introduced_date: None,
        latest_action_date: latest_action.and_then(|a| parse_optional_date(a.action_date.as_deref())),
        latest_action_text,
        sponsor_id: None,
        policy_area: None,
        committee_ids: Vec::new(),
        update_date: parse_required_date(update_date, now),
    })
}

/// Map a bill detail together with its committee referrals and actions
///
/// Status comes from the whole action history when one is given, so an
/// early "Passed House" is not lost behind a later procedural action.
pub fn normalize_bill_detail(
    detail: &RawBillDetail,
    committees: &[RawCommitteeRef],
    actions: &[RawAction],
    now: DateTime<Utc>,
) -> Result<Bill, NormalizeError> {
    let mut bill = normalize_bill(&detail.summary, now)?;

    bill.introduced_date = parse_optional_date(detail.introduced_date.as_deref());
    bill.policy_area = detail
        .policy_area
        .as_ref()
        .and_then(|p| non_blank(Some(p.name.as_str())));

    if let Some(sponsor) = detail
        .sponsors
        .iter()
        .find(|s| !s.bioguide_id.trim().is_empty())
    {
        bill = bill.with_sponsor(generate_legislator_id(&sponsor.bioguide_id));
    }

    if !detail.laws.is_empty() {
        bill.status = BillStatus::Enacted;
    } else if !actions.is_empty() {
        bill.status = infer_status_from_actions(actions.iter().map(|a| a.text.as_str()));
    }

    let mut committee_ids: Vec<String> = Vec::with_capacity(committees.len());
    for committee in committees {
        let id = generate_committee_id(&committee.system_code);
        if !id.is_empty() && !committee_ids.contains(&id) {
            committee_ids.push(id);
        }
    }

    Ok(bill.with_committees(committee_ids))
}

fn latest_term(terms: &[RawTerm]) -> Option<&RawTerm> {
    terms.iter().max_by_key(|t| t.start_year.unwrap_or(i32::MIN))
}

fn chamber_of(term: Option<&RawTerm>) -> Chamber {
    map_chamber(term.and_then(|t| t.chamber.as_deref()))
}

/// Map a member listing entry
pub fn normalize_member(raw: &RawMember, now: DateTime<Utc>) -> Result<Legislator, NormalizeError> {
    let id = generate_legislator_id(&raw.bioguide_id);
    if id.is_empty() {
        return Err(NormalizeError::MissingField("bioguideId"));
    }

    let raw_name = raw.name.as_deref().unwrap_or_default();
    let name = parse_name(raw_name);
    let term = latest_term(&raw.terms.item);
    let full_name = match name.display() {
        display if display.is_empty() => raw_name.trim().to_string(),
        display => display,
    };

    Ok(Legislator {
        id,
        first_name: name.first,
        middle_name: name.middle,
        last_name: name.last,
        suffix: name.suffix,
        full_name,
        party: map_party(raw.party_name.as_deref()),
        state: raw.state.clone().unwrap_or_default(),
        district: raw.district,
        chamber: chamber_of(term),
        is_current: term.is_some_and(|t| t.end_year.is_none()),
        image_url: raw.depiction.as_ref().and_then(|d| d.image_url.clone()),
        update_date: parse_required_date(raw.update_date.as_deref(), now),
    })
}

/// Map a full member record
pub fn normalize_member_detail(
    raw: &RawMemberDetail,
    now: DateTime<Utc>,
) -> Result<Legislator, NormalizeError> {
    let id = generate_legislator_id(&raw.bioguide_id);
    if id.is_empty() {
        return Err(NormalizeError::MissingField("bioguideId"));
    }

    let parsed = parse_name(raw.direct_order_name.as_deref().unwrap_or_default());
    let first_name = non_blank(raw.first_name.as_deref()).unwrap_or(parsed.first);
    let last_name = non_blank(raw.last_name.as_deref()).unwrap_or(parsed.last);
    let middle_name = non_blank(raw.middle_name.as_deref()).or(parsed.middle);
    let suffix = non_blank(raw.suffix_name.as_deref()).or(parsed.suffix);

    let full_name = non_blank(raw.direct_order_name.as_deref()).unwrap_or_else(|| {
        [Some(first_name.as_str()), middle_name.as_deref(), Some(last_name.as_str())]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    });

    let party = raw
        .party_history
        .iter()
        .max_by_key(|p| p.start_year.unwrap_or(i32::MIN))
        .map(|p| map_party(Some(p.party_name.as_str())))
        .unwrap_or_else(|| map_party(None));
    let term = latest_term(&raw.terms);

    Ok(Legislator {
        id,
        first_name,
        middle_name,
        last_name,
        suffix,
        full_name,
        party,
        state: raw.state.clone().unwrap_or_default(),
        district: raw.district,
        chamber: chamber_of(term),
        is_current: raw
            .current_member
            .unwrap_or_else(|| term.is_some_and(|t| t.end_year.is_none())),
        image_url: raw.depiction.as_ref().and_then(|d| d.image_url.clone()),
        update_date: parse_required_date(raw.update_date.as_deref(), now),
    })
}

/// Map a committee listing entry
pub fn normalize_committee(
    raw: &RawCommittee,
    now: DateTime<Utc>,
) -> Result<Committee, NormalizeError> {
    let id = generate_committee_id(&raw.system_code);
    if id.is_empty() {
        return Err(NormalizeError::MissingField("systemCode"));
    }
    let name = non_blank(raw.name.as_deref()).ok_or(NormalizeError::MissingField("name"))?;

    let parent_id = raw
        .parent
        .as_ref()
        .map(|p| generate_committee_id(&p.system_code))
        .filter(|p| !p.is_empty() && *p != id);

    let mut committee_type = map_committee_type(raw.committee_type_code.as_deref());
    if parent_id.is_some() && committee_type == CommitteeType::Other {
        committee_type = CommitteeType::Subcommittee;
    }

    Ok(Committee {
        id,
        name,
        chamber: map_chamber(raw.chamber.as_deref()),
        committee_type,
        parent_id,
        url: raw.url.clone(),
        update_date: parse_required_date(raw.update_date.as_deref(), now),
    })
}
