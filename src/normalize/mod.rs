//! Normalizer: pure mapping from upstream records to internal entities
//!
//! Everything here is synchronous and side-effect free. Enum mappers fall
//! back to documented defaults; record mappers fail only when a record has no
//! usable identity.

pub mod dates;
pub mod enums;
pub mod ids;
pub mod names;
pub mod records;
pub mod status;

pub use dates::{parse_optional_date, parse_required_date, parse_required_date_or_now};
pub use enums::{map_bill_type, map_chamber, map_committee_type, map_party};
pub use ids::{
    current_congress, generate_bill_id, generate_committee_id, generate_legislator_id,
    parse_bill_id, BillKey,
};
pub use names::{parse_name, PersonName};
pub use records::{
    normalize_bill, normalize_bill_detail, normalize_committee, normalize_member,
    normalize_member_detail,
};
pub use status::{infer_bill_status, infer_status_from_actions, StatusRule, STATUS_RULES};
