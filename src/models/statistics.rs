//! Statistics nodes returned by security reports and bulk scans.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::issue::IssueType;

/// One node of a security-standard report tree (standard category, then CWE
/// or sub-requirement children).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityStandardCategoryStatistics {
    pub category: String,
    pub vulnerabilities: u64,
    /// Worst severity rank among counted vulnerabilities; absent when none.
    pub vulnerability_rating: Option<u8>,
    pub to_review_security_hotspots: u64,
    pub reviewed_security_hotspots: u64,
    pub security_review_rating: u8,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SecurityStandardCategoryStatistics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl SecurityStandardCategoryStatistics {
    /// Node with no matching issue.
    pub fn empty(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            vulnerabilities: 0,
            vulnerability_rating: None,
            to_review_security_hotspots: 0,
            reviewed_security_hotspots: 0,
            security_review_rating: security_review_rating(0, 0),
            children: Vec::new(),
            version: None,
        }
    }

    pub fn child(&self, category: &str) -> Option<&SecurityStandardCategoryStatistics> {
        self.children.iter().find(|c| c.category == category)
    }
}

/// Grade 1 (best) to 5 from the share of reviewed hotspots.
///
/// With no hotspot at all the ratio is 1. Grades: >= 80% is 1, >= 60% is 2,
/// >= 40% is 3, >= 20% is 4, below is 5.
pub fn security_review_rating(to_review: u64, reviewed: u64) -> u8 {
    let total = to_review + reviewed;
    let percent = if total == 0 {
        100.0
    } else {
        reviewed as f64 * 100.0 / total as f64
    };
    match percent {
        p if p >= 80.0 => 1,
        p if p >= 60.0 => 2,
        p if p >= 40.0 => 3,
        p if p >= 20.0 => 4,
        _ => 5,
    }
}

/// Unresolved issues of one branch assigned to a user since a cutoff.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectStatistics {
    pub branch_uuid: String,
    pub issue_count: u64,
    pub last_issue_date: DateTime<Utc>,
}

/// Unresolved issue counts by type on one non-main branch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchStatistics {
    pub branch_uuid: String,
    pub counts_by_type: BTreeMap<IssueType, u64>,
}

impl BranchStatistics {
    pub fn count(&self, issue_type: IssueType) -> u64 {
        self.counts_by_type.get(&issue_type).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_rating_half_reviewed_is_c() {
        assert_eq!(security_review_rating(1, 1), 3);
    }

    #[test]
    fn review_rating_nothing_reviewed_is_e() {
        assert_eq!(security_review_rating(1, 0), 5);
    }

    #[test]
    fn review_rating_all_reviewed_is_a() {
        assert_eq!(security_review_rating(0, 1), 1);
    }

    #[test]
    fn review_rating_without_hotspots_is_a() {
        assert_eq!(security_review_rating(0, 0), 1);
    }

    #[test]
    fn review_rating_boundaries() {
        // 4 reviewed out of 5 = 80%
        assert_eq!(security_review_rating(1, 4), 1);
        // 3 of 5 = 60%
        assert_eq!(security_review_rating(2, 3), 2);
        // 1 of 3 = 33%
        assert_eq!(security_review_rating(2, 1), 4);
        // 1 of 6 = 16%
        assert_eq!(security_review_rating(5, 1), 5);
    }

    #[test]
    fn empty_node_serializes_camel_case_without_children() {
        let json = serde_json::to_value(SecurityStandardCategoryStatistics::empty("a1")).unwrap();
        assert_eq!(json["category"], "a1");
        assert_eq!(json["securityReviewRating"], 1);
        assert!(json["vulnerabilityRating"].is_null());
        assert!(json.get("children").is_none());
    }
}
