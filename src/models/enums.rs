//! Enumerations shared by the legislative entity models
//!
//! Each enum renders to the short code stored in the database and parses it
//! back. Mapping from the free-form upstream values lives in `normalize::enums`.

use serde::{Deserialize, Serialize};

/// Party affiliation of a legislator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Party {
    /// Democratic party
    #[serde(rename = "D")]
    Democrat,
    /// Republican party
    #[serde(rename = "R")]
    Republican,
    /// Independent
    #[serde(rename = "I")]
    Independent,
    /// Libertarian party
    #[serde(rename = "L")]
    Libertarian,
    /// Any other or unknown affiliation
    #[default]
    #[serde(rename = "O")]
    Other,
}

impl Party {
    /// Single-letter party code
    pub fn code(&self) -> &'static str {
        match self {
            Party::Democrat => "D",
            Party::Republican => "R",
            Party::Independent => "I",
            Party::Libertarian => "L",
            Party::Other => "O",
        }
    }
}

impl std::fmt::Display for Party {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Party {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "D" => Ok(Party::Democrat),
            "R" => Ok(Party::Republican),
            "I" => Ok(Party::Independent),
            "L" => Ok(Party::Libertarian),
            "O" => Ok(Party::Other),
            _ => Err(format!("Invalid party code: {}", s)),
        }
    }
}

/// Legislative chamber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chamber {
    /// House of Representatives
    #[default]
    House,
    /// Senate
    Senate,
    /// Joint (both chambers)
    Joint,
}

impl std::fmt::Display for Chamber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Chamber::House => write!(f, "house"),
            Chamber::Senate => write!(f, "senate"),
            Chamber::Joint => write!(f, "joint"),
        }
    }
}

impl std::str::FromStr for Chamber {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "house" => Ok(Chamber::House),
            "senate" => Ok(Chamber::Senate),
            "joint" => Ok(Chamber::Joint),
            _ => Err(format!("Invalid chamber: {}", s)),
        }
    }
}

/// Bill type as used in congress.gov URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillType {
    /// House bill
    Hr,
    /// Senate bill
    S,
    /// House joint resolution
    Hjres,
    /// Senate joint resolution
    Sjres,
    /// House concurrent resolution
    Hconres,
    /// Senate concurrent resolution
    Sconres,
    /// House simple resolution
    Hres,
    /// Senate simple resolution
    Sres,
}

impl BillType {
    /// Every bill type, in the order congress.gov lists them
    pub const ALL: [BillType; 8] = [
        BillType::Hr,
        BillType::S,
        BillType::Hjres,
        BillType::Sjres,
        BillType::Hconres,
        BillType::Sconres,
        BillType::Hres,
        BillType::Sres,
    ];

    /// Lower-case code used in ids and URL paths
    pub fn code(&self) -> &'static str {
        match self {
            BillType::Hr => "hr",
            BillType::S => "s",
            BillType::Hjres => "hjres",
            BillType::Sjres => "sjres",
            BillType::Hconres => "hconres",
            BillType::Sconres => "sconres",
            BillType::Hres => "hres",
            BillType::Sres => "sres",
        }
    }

    /// Chamber the bill originates in
    pub fn origin_chamber(&self) -> Chamber {
        match self {
            BillType::Hr | BillType::Hjres | BillType::Hconres | BillType::Hres => Chamber::House,
            BillType::S | BillType::Sjres | BillType::Sconres | BillType::Sres => Chamber::Senate,
        }
    }
}

impl std::fmt::Display for BillType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for BillType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        BillType::ALL
            .into_iter()
            .find(|t| t.code() == lower)
            .ok_or_else(|| format!("Invalid bill type: {}", s))
    }
}

/// Legislative progress of a bill
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    /// Introduced, no further action
    #[default]
    Introduced,
    /// Referred to committee
    InCommittee,
    /// Passed the House
    PassedHouse,
    /// Passed the Senate
    PassedSenate,
    /// Passed both chambers
    PassedBoth,
    /// Presented to the President
    ToPresident,
    /// Became law
    Enacted,
    /// Vetoed by the President
    Vetoed,
    /// Veto overridden by Congress
    VetoOverridden,
    /// Failed a floor vote
    Failed,
}

impl BillStatus {
    /// Returns true if no further legislative action is expected
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BillStatus::Enacted | BillStatus::Vetoed | BillStatus::VetoOverridden
        )
    }
}

impl std::fmt::Display for BillStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BillStatus::Introduced => write!(f, "introduced"),
            BillStatus::InCommittee => write!(f, "in_committee"),
            BillStatus::PassedHouse => write!(f, "passed_house"),
            BillStatus::PassedSenate => write!(f, "passed_senate"),
            BillStatus::PassedBoth => write!(f, "passed_both"),
            BillStatus::ToPresident => write!(f, "to_president"),
            BillStatus::Enacted => write!(f, "enacted"),
            BillStatus::Vetoed => write!(f, "vetoed"),
            BillStatus::VetoOverridden => write!(f, "veto_overridden"),
            BillStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for BillStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "introduced" => Ok(BillStatus::Introduced),
            "in_committee" => Ok(BillStatus::InCommittee),
            "passed_house" => Ok(BillStatus::PassedHouse),
            "passed_senate" => Ok(BillStatus::PassedSenate),
            "passed_both" => Ok(BillStatus::PassedBoth),
            "to_president" => Ok(BillStatus::ToPresident),
            "enacted" => Ok(BillStatus::Enacted),
            "vetoed" => Ok(BillStatus::Vetoed),
            "veto_overridden" => Ok(BillStatus::VetoOverridden),
            "failed" => Ok(BillStatus::Failed),
            _ => Err(format!("Invalid bill status: {}", s)),
        }
    }
}

/// Kind of committee
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitteeType {
    /// Standing committee
    Standing,
    /// Select committee
    Select,
    /// Special committee
    Special,
    /// Joint committee
    Joint,
    /// Subcommittee of another committee
    Subcommittee,
    /// Commission or caucus
    Commission,
    /// Anything else
    #[default]
    Other,
}

impl std::fmt::Display for CommitteeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitteeType::Standing => write!(f, "standing"),
            CommitteeType::Select => write!(f, "select"),
            CommitteeType::Special => write!(f, "special"),
            CommitteeType::Joint => write!(f, "joint"),
            CommitteeType::Subcommittee => write!(f, "subcommittee"),
            CommitteeType::Commission => write!(f, "commission"),
            CommitteeType::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for CommitteeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standing" => Ok(CommitteeType::Standing),
            "select" => Ok(CommitteeType::Select),
            "special" => Ok(CommitteeType::Special),
            "joint" => Ok(CommitteeType::Joint),
            "subcommittee" => Ok(CommitteeType::Subcommittee),
            "commission" => Ok(CommitteeType::Commission),
            "other" => Ok(CommitteeType::Other),
            _ => Err(format!("Invalid committee type: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_party_display_and_parse() {
        assert_eq!(Party::Democrat.to_string(), "D");
        assert_eq!(Party::Other.to_string(), "O");
        assert_eq!("r".parse::<Party>().unwrap(), Party::Republican);
        assert!("X".parse::<Party>().is_err());
    }

    #[test]
    fn test_party_serializes_as_code() {
        let json = serde_json::to_string(&Party::Independent).unwrap();
        assert_eq!(json, "\"I\"");
    }

    #[test]
    fn test_bill_type_parse_all_codes() {
        for bill_type in BillType::ALL {
            assert_eq!(bill_type.code().parse::<BillType>().unwrap(), bill_type);
        }
        assert_eq!("HR".parse::<BillType>().unwrap(), BillType::Hr);
        assert!("hx".parse::<BillType>().is_err());
    }

    #[test]
    fn test_bill_type_origin_chamber() {
        assert_eq!(BillType::Hjres.origin_chamber(), Chamber::House);
        assert_eq!(BillType::Sres.origin_chamber(), Chamber::Senate);
    }

    #[test]
    fn test_bill_status_roundtrip_and_terminal() {
        let statuses = [
            BillStatus::Introduced,
            BillStatus::InCommittee,
            BillStatus::PassedHouse,
            BillStatus::PassedSenate,
            BillStatus::PassedBoth,
            BillStatus::ToPresident,
            BillStatus::Enacted,
            BillStatus::Vetoed,
            BillStatus::VetoOverridden,
            BillStatus::Failed,
        ];
        for status in statuses {
            assert_eq!(status.to_string().parse::<BillStatus>().unwrap(), status);
        }
        assert!(BillStatus::Enacted.is_terminal());
        assert!(!BillStatus::PassedHouse.is_terminal());
    }

    #[test]
    fn test_chamber_and_committee_type_parse() {
        assert_eq!("Senate".parse::<Chamber>().unwrap(), Chamber::Senate);
        assert_eq!(
            "subcommittee".parse::<CommitteeType>().unwrap(),
            CommitteeType::Subcommittee
        );
        assert!("moon".parse::<Chamber>().is_err());
    }
}
