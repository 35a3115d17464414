//! Issue document model with the enums shared by filters, facets and reports.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::keyword_enum;

/// Category value carried by issues whose rule is not mapped to a standard.
pub const UNKNOWN_STANDARD: &str = "unknown";

// -- Enums matching the stored keywords --

keyword_enum! {
    pub enum IssueType {
        CodeSmell => "CODE_SMELL",
        Bug => "BUG",
        Vulnerability => "VULNERABILITY",
        SecurityHotspot => "SECURITY_HOTSPOT",
    }
}

keyword_enum! {
    /// Declared from least to most severe, so the derived order is the severity order.
    pub enum Severity {
        Info => "INFO",
        Minor => "MINOR",
        Major => "MAJOR",
        Critical => "CRITICAL",
        Blocker => "BLOCKER",
    }
}

impl Severity {
    /// Rank used by vulnerability ratings: INFO=1 .. BLOCKER=5.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Info => 1,
            Self::Minor => 2,
            Self::Major => 3,
            Self::Critical => 4,
            Self::Blocker => 5,
        }
    }
}

keyword_enum! {
    pub enum Status {
        Open => "OPEN",
        Confirmed => "CONFIRMED",
        Reopened => "REOPENED",
        Resolved => "RESOLVED",
        Closed => "CLOSED",
        ToReview => "TO_REVIEW",
        InReview => "IN_REVIEW",
        Reviewed => "REVIEWED",
    }
}

impl Status {
    /// Position of the status in the workflow sort order.
    ///
    /// Terminal states come first, then the open lifecycle, then the hotspot review lifecycle.
    pub fn sort_rank(&self) -> u8 {
        match self {
            Self::Closed => 0,
            Self::Resolved => 1,
            Self::Open => 2,
            Self::Confirmed => 3,
            Self::Reopened => 4,
            Self::ToReview => 5,
            Self::InReview => 6,
            Self::Reviewed => 7,
        }
    }
}

keyword_enum! {
    pub enum Resolution {
        FalsePositive => "FALSE-POSITIVE",
        WontFix => "WONTFIX",
        Fixed => "FIXED",
        Removed => "REMOVED",
        Safe => "SAFE",
        Acknowledged => "ACKNOWLEDGED",
        Exception => "EXCEPTION",
    }
}

keyword_enum! {
    /// Simplified status exposed to users, derived upstream from status and resolution.
    pub enum IssueStatus {
        Open => "OPEN",
        Confirmed => "CONFIRMED",
        Fixed => "FIXED",
        Accepted => "ACCEPTED",
        FalsePositive => "FALSE_POSITIVE",
        InSandbox => "IN_SANDBOX",
    }
}

keyword_enum! {
    pub enum IssueScope {
        Main => "MAIN",
        Test => "TEST",
    }
}

keyword_enum! {
    pub enum SoftwareQuality {
        Maintainability => "MAINTAINABILITY",
        Reliability => "RELIABILITY",
        Security => "SECURITY",
    }
}

keyword_enum! {
    pub enum ImpactSeverity {
        Info => "INFO",
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
        Blocker => "BLOCKER",
    }
}

keyword_enum! {
    pub enum CleanCodeAttributeCategory {
        Adaptable => "ADAPTABLE",
        Consistent => "CONSISTENT",
        Intentional => "INTENTIONAL",
        Responsible => "RESPONSIBLE",
    }
}

/// Review state of a security hotspot as seen by the security reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotspotReview {
    ToReview,
    InReview,
    Reviewed,
}

// -- Core Issue --

/// Category codes of every compliance standard, each an independent set.
///
/// ASVS and PCI-DSS codes are dotted hierarchical requirement ids (`"2.4.1"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityCategories {
    #[serde(default)]
    pub cwe: BTreeSet<String>,
    #[serde(default)]
    pub owasp_top10: BTreeSet<String>,
    #[serde(default)]
    pub owasp_top10_2021: BTreeSet<String>,
    #[serde(default)]
    pub owasp_asvs_40: BTreeSet<String>,
    #[serde(default)]
    pub pci_dss_32: BTreeSet<String>,
    #[serde(default)]
    pub pci_dss_40: BTreeSet<String>,
    #[serde(default)]
    pub sans_top25: BTreeSet<String>,
    pub sonarsource_security: Option<String>,
    #[serde(default)]
    pub stig_asd_v5r3: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub key: String,
    pub project_uuid: String,
    pub branch_uuid: String,
    pub is_main_branch: bool,
    pub component_uuid: String,
    pub file_path: Option<String>,
    pub directory_path: Option<String>,
    pub line: Option<u32>,
    pub rule_uuid: String,
    pub issue_type: IssueType,
    pub severity: Severity,
    pub status: Status,
    pub resolution: Option<Resolution>,
    pub issue_status: Option<IssueStatus>,
    pub scope: IssueScope,
    pub assignee_uuid: Option<String>,
    pub author_login: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub language: Option<String>,
    /// Remediation cost, summed by the effort facet mode.
    pub effort: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub is_new_code_reference: bool,
    #[serde(default)]
    pub impacts: BTreeMap<SoftwareQuality, ImpactSeverity>,
    pub clean_code_attribute_category: Option<CleanCodeAttributeCategory>,
    #[serde(default)]
    pub code_variants: BTreeSet<String>,
    pub prioritized_rule: bool,
    pub from_sonar_qube_update: bool,
    pub linked_ticket_status: Option<String>,
    #[serde(default)]
    pub security: SecurityCategories,
}

impl Issue {
    pub fn is_hotspot(&self) -> bool {
        self.issue_type == IssueType::SecurityHotspot
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    /// Open or reopened vulnerability: the population counted by vulnerability ratings.
    pub fn is_unresolved_vulnerability(&self) -> bool {
        self.issue_type == IssueType::Vulnerability && !self.is_resolved()
    }

    /// Hotspot review state; `None` for non-hotspots and for hotspots closed without review.
    pub fn hotspot_review(&self) -> Option<HotspotReview> {
        if !self.is_hotspot() {
            return None;
        }
        match (self.status, self.resolution) {
            (Status::ToReview, None) => Some(HotspotReview::ToReview),
            (Status::InReview, None) => Some(HotspotReview::InReview),
            (Status::Reviewed, Some(Resolution::Fixed)) => Some(HotspotReview::Reviewed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_serialization() {
        let json = serde_json::to_string(&Resolution::FalsePositive).unwrap();
        assert_eq!(json, "\"FALSE-POSITIVE\"");
    }

    #[test]
    fn issue_type_deserialization() {
        let issue_type: IssueType = serde_json::from_str("\"SECURITY_HOTSPOT\"").unwrap();
        assert_eq!(issue_type, IssueType::SecurityHotspot);
    }

    #[test]
    fn severity_from_str_rejects_unknown() {
        let err = "SEVERE".parse::<Severity>().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("BLOCKER"));
    }

    #[test]
    fn severity_rank_follows_declared_order() {
        let ranks: Vec<u8> = Severity::ALL.iter().map(Severity::rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
        assert!(Severity::Blocker > Severity::Critical);
        assert!(Severity::Minor > Severity::Info);
    }

    #[test]
    fn status_sort_rank_is_not_alphabetic() {
        assert!(Status::Closed.sort_rank() < Status::Open.sort_rank());
        assert!(Status::Open.sort_rank() < Status::Reopened.sort_rank());
        assert!(Status::Resolved.sort_rank() < Status::Confirmed.sort_rank());
    }

    #[test]
    fn impacts_keys_serialize_as_keywords() {
        let mut impacts = BTreeMap::new();
        impacts.insert(SoftwareQuality::Security, ImpactSeverity::High);
        let json = serde_json::to_value(&impacts).unwrap();
        assert_eq!(json["SECURITY"], "HIGH");
    }
}
