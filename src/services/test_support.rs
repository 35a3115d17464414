//! Issue fixtures shared by the service unit tests.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, TimeZone, Utc};

use crate::models::issue::{
    Issue, IssueScope, IssueType, Resolution, SecurityCategories, Severity, Status,
};

/// Fields a test wants to pin; everything else gets a plain default.
#[derive(Default)]
pub struct IssueOverrides {
    pub key: Option<String>,
    pub project_uuid: Option<String>,
    pub branch_uuid: Option<String>,
    pub is_main_branch: Option<bool>,
    pub component_uuid: Option<String>,
    pub file_path: Option<String>,
    pub directory_path: Option<String>,
    pub line: Option<u32>,
    pub issue_type: Option<IssueType>,
    pub severity: Option<Severity>,
    pub status: Option<Status>,
    pub resolution: Option<Resolution>,
    pub assignee_uuid: Option<String>,
    pub author_login: Option<String>,
    pub tags: Option<Vec<String>>,
    pub effort: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub is_new_code_reference: Option<bool>,
    pub security: Option<SecurityCategories>,
}

pub fn make_issue(overrides: IssueOverrides) -> Issue {
    let created_at = overrides
        .created_at
        .unwrap_or_else(|| Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap());
    let project_uuid = overrides.project_uuid.unwrap_or_else(|| "project-1".to_string());
    Issue {
        key: overrides
            .key
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        branch_uuid: overrides.branch_uuid.unwrap_or_else(|| project_uuid.clone()),
        project_uuid,
        is_main_branch: overrides.is_main_branch.unwrap_or(true),
        component_uuid: overrides
            .component_uuid
            .unwrap_or_else(|| "component-1".to_string()),
        file_path: overrides.file_path,
        directory_path: overrides.directory_path,
        line: overrides.line,
        rule_uuid: "rule-1".to_string(),
        issue_type: overrides.issue_type.unwrap_or(IssueType::CodeSmell),
        severity: overrides.severity.unwrap_or(Severity::Major),
        status: overrides.status.unwrap_or(Status::Open),
        resolution: overrides.resolution,
        issue_status: None,
        scope: IssueScope::Main,
        assignee_uuid: overrides.assignee_uuid,
        author_login: overrides.author_login,
        tags: overrides
            .tags
            .map(|tags| tags.into_iter().collect())
            .unwrap_or_default(),
        language: Some("java".to_string()),
        effort: overrides.effort.unwrap_or(5),
        created_at,
        updated_at: created_at,
        closed_at: overrides.closed_at,
        is_new_code_reference: overrides.is_new_code_reference.unwrap_or(false),
        impacts: BTreeMap::new(),
        clean_code_attribute_category: None,
        code_variants: BTreeSet::new(),
        prioritized_rule: false,
        from_sonar_qube_update: false,
        linked_ticket_status: None,
        security: overrides.security.unwrap_or_default(),
    }
}
