//! Bill status inference from action text
//!
//! Rules are evaluated in order and the first match wins. Terminal states
//! come before intermediate ones, so "Passed Senate over veto" resolves to
//! `VetoOverridden` rather than `PassedSenate`.

use crate::models::BillStatus;

/// A status and the lower-case phrases that imply it
#[derive(Debug, Clone, Copy)]
pub struct StatusRule {
    /// Status assigned on match
    pub status: BillStatus,
    /// Any phrase matching selects this rule
    pub keywords: &'static [&'static str],
}

impl StatusRule {
    fn matches(&self, text: &str) -> bool {
        self.keywords.iter().any(|keyword| text.contains(keyword))
    }
}

/// Ordered inference rules
pub const STATUS_RULES: &[StatusRule] = &[
    StatusRule {
        status: BillStatus::VetoOverridden,
        keywords: &["veto overridden", "over veto", "overridden"],
    },
    StatusRule {
        status: BillStatus::Enacted,
        keywords: &["became public law", "became private law", "signed by president"],
    },
    StatusRule {
        status: BillStatus::Vetoed,
        keywords: &["vetoed", "pocket veto"],
    },
    StatusRule {
        status: BillStatus::ToPresident,
        keywords: &["presented to president", "to president"],
    },
    StatusRule {
        status: BillStatus::Failed,
        keywords: &["failed of passage", "failed passage", "motion to pass failed"],
    },
    StatusRule {
        status: BillStatus::PassedBoth,
        keywords: &[
            "resolving differences",
            "agreed to conference report",
            "cleared for white house",
        ],
    },
    StatusRule {
        status: BillStatus::PassedSenate,
        keywords: &["passed senate", "passed/agreed to in senate"],
    },
    StatusRule {
        status: BillStatus::PassedHouse,
        keywords: &["passed house", "passed/agreed to in house"],
    },
    StatusRule {
        status: BillStatus::InCommittee,
        keywords: &["referred to", "committee", "subcommittee"],
    },
    StatusRule {
        status: BillStatus::Introduced,
        keywords: &["introduced"],
    },
];

/// Infer status from the latest action text; fallback `Introduced`
pub fn infer_bill_status(action_text: Option<&str>) -> BillStatus {
    let Some(text) = action_text else {
        return BillStatus::Introduced;
    };
    let text = text.to_lowercase();
    STATUS_RULES
        .iter()
        .find(|rule| rule.matches(&text))
        .map(|rule| rule.status)
        .unwrap_or(BillStatus::Introduced)
}

/// Infer status from a full action history, newest first or oldest first
///
/// The most advanced status found wins, so a bill whose history contains both
/// "Passed House" and "Became Public Law" is `Enacted`.
pub fn infer_status_from_actions<'a, I>(actions: I) -> BillStatus
where
    I: IntoIterator<Item = &'a str>,
{
    actions
        .into_iter()
        .filter_map(|text| {
            let text = text.to_lowercase();
            STATUS_RULES
                .iter()
                .position(|rule| rule.matches(&text))
        })
        .min()
        .map(|index| STATUS_RULES[index].status)
        .unwrap_or(BillStatus::Introduced)
}
