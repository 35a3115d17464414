//! Snapshot loader: reads issue documents and portfolio membership from
//! PostgreSQL into an index [`Snapshot`].

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::index::Snapshot;
use crate::config::MAX_SCAN_PAGE_SIZE;
use crate::errors::IndexError;
use crate::models::issue::{Issue, SecurityCategories};
use crate::models::view::View;

/// Raw row of the `issues` table; keyword columns are still text.
#[derive(Debug, Clone, FromRow)]
pub struct IssueRow {
    pub kee: String,
    pub project_uuid: String,
    pub branch_uuid: String,
    pub is_main_branch: bool,
    pub component_uuid: String,
    pub file_path: Option<String>,
    pub directory_path: Option<String>,
    pub line: Option<i32>,
    pub rule_uuid: String,
    pub issue_type: String,
    pub severity: String,
    pub status: String,
    pub resolution: Option<String>,
    pub issue_status: Option<String>,
    pub scope: String,
    pub assignee_uuid: Option<String>,
    pub author_login: Option<String>,
    pub tags: Vec<String>,
    pub language: Option<String>,
    pub effort: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub is_new_code_reference: bool,
    pub impacts: serde_json::Value,
    pub clean_code_attribute_category: Option<String>,
    pub code_variants: Vec<String>,
    pub prioritized_rule: bool,
    pub from_sonar_qube_update: bool,
    pub linked_ticket_status: Option<String>,
    pub cwe: Vec<String>,
    pub owasp_top10: Vec<String>,
    pub owasp_top10_2021: Vec<String>,
    pub owasp_asvs_40: Vec<String>,
    pub pci_dss_32: Vec<String>,
    pub pci_dss_40: Vec<String>,
    pub sans_top25: Vec<String>,
    pub sonarsource_security: Option<String>,
    pub stig_asd_v5r3: Vec<String>,
}

fn keyword<T>(value: &str) -> Result<T, IndexError>
where
    T: FromStr<Err = IndexError>,
{
    value.parse()
}

fn optional_keyword<T>(value: Option<&str>) -> Result<Option<T>, IndexError>
where
    T: FromStr<Err = IndexError>,
{
    value.map(keyword).transpose()
}

fn set(values: Vec<String>) -> BTreeSet<String> {
    values.into_iter().collect()
}

impl TryFrom<IssueRow> for Issue {
    type Error = IndexError;

    fn try_from(row: IssueRow) -> Result<Self, Self::Error> {
        let impacts = if row.impacts.is_null() {
            BTreeMap::new()
        } else {
            serde_json::from_value(row.impacts).map_err(|e| {
                IndexError::Internal(format!("Invalid impacts on issue {}: {}", row.kee, e))
            })?
        };
        let line = row
            .line
            .map(|line| {
                u32::try_from(line).map_err(|_| {
                    IndexError::Internal(format!("Negative line {} on issue {}", line, row.kee))
                })
            })
            .transpose()?;
        let effort = u64::try_from(row.effort).map_err(|_| {
            IndexError::Internal(format!("Negative effort {} on issue {}", row.effort, row.kee))
        })?;

        Ok(Issue {
            issue_type: keyword(&row.issue_type)?,
            severity: keyword(&row.severity)?,
            status: keyword(&row.status)?,
            resolution: optional_keyword(row.resolution.as_deref())?,
            issue_status: optional_keyword(row.issue_status.as_deref())?,
            scope: keyword(&row.scope)?,
            clean_code_attribute_category: optional_keyword(
                row.clean_code_attribute_category.as_deref(),
            )?,
            key: row.kee,
            project_uuid: row.project_uuid,
            branch_uuid: row.branch_uuid,
            is_main_branch: row.is_main_branch,
            component_uuid: row.component_uuid,
            file_path: row.file_path,
            directory_path: row.directory_path,
            line,
            rule_uuid: row.rule_uuid,
            assignee_uuid: row.assignee_uuid,
            author_login: row.author_login,
            tags: set(row.tags),
            language: row.language,
            effort,
            created_at: row.created_at,
            updated_at: row.updated_at,
            closed_at: row.closed_at,
            is_new_code_reference: row.is_new_code_reference,
            impacts,
            code_variants: set(row.code_variants),
            prioritized_rule: row.prioritized_rule,
            from_sonar_qube_update: row.from_sonar_qube_update,
            linked_ticket_status: row.linked_ticket_status,
            security: SecurityCategories {
                cwe: set(row.cwe),
                owasp_top10: set(row.owasp_top10),
                owasp_top10_2021: set(row.owasp_top10_2021),
                owasp_asvs_40: set(row.owasp_asvs_40),
                pci_dss_32: set(row.pci_dss_32),
                pci_dss_40: set(row.pci_dss_40),
                sans_top25: set(row.sans_top25),
                sonarsource_security: row.sonarsource_security,
                stig_asd_v5r3: set(row.stig_asd_v5r3),
            },
        })
    }
}

/// Reads every issue in key order, one keyset page at a time.
pub async fn load_issues(pool: &PgPool, page_size: usize) -> Result<Vec<Issue>, IndexError> {
    let page_size = page_size.clamp(1, MAX_SCAN_PAGE_SIZE);
    let mut issues = Vec::new();
    let mut after = String::new();

    loop {
        let rows = sqlx::query_as::<_, IssueRow>(
            "SELECT * FROM issues WHERE kee > $1 ORDER BY kee LIMIT $2",
        )
        .bind(&after)
        .bind(page_size as i64)
        .fetch_all(pool)
        .await?;

        let fetched = rows.len();
        if let Some(last) = rows.last() {
            after = last.kee.clone();
        }
        for row in rows {
            issues.push(Issue::try_from(row).map_err(IndexError::logged)?);
        }
        tracing::debug!(fetched, total = issues.len(), "Loaded issue page");
        if fetched < page_size {
            break;
        }
    }
    Ok(issues)
}

/// Reads portfolio membership grouped by portfolio uuid.
pub async fn load_views(pool: &PgPool) -> Result<Vec<View>, IndexError> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT view_uuid, member_uuid FROM view_members ORDER BY view_uuid, member_uuid",
    )
    .fetch_all(pool)
    .await?;

    let mut grouped: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (view_uuid, member_uuid) in rows {
        grouped.entry(view_uuid).or_default().insert(member_uuid);
    }
    Ok(grouped
        .into_iter()
        .map(|(uuid, members)| View { uuid, members })
        .collect())
}

/// Loads issues and views into a fresh snapshot.
pub async fn load_snapshot(pool: &PgPool, page_size: usize) -> Result<Snapshot, IndexError> {
    let issues = load_issues(pool, page_size).await?;
    let views = load_views(pool).await?;
    tracing::info!(
        issues = issues.len(),
        views = views.len(),
        "Loaded index snapshot from database"
    );
    Ok(Snapshot::new(issues, views))
}
