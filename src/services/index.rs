//! In-memory issue index: immutable snapshots swapped atomically, and the
//! query operations run against them.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info};

use super::facets::{self, FacetBucket, Facets};
use super::filter::FilterSet;
use super::ordering;
use super::security_report::{self, OwaspTop10Version, PciDssVersion};
use super::security_standards::SecurityStandards;
use crate::config::MAX_SCAN_PAGE_SIZE;
use crate::errors::IndexError;
use crate::models::issue::{Issue, IssueType};
use crate::models::pagination::{PagedResult, Paging};
use crate::models::query::IssueQuery;
use crate::models::statistics::{
    BranchStatistics, ProjectStatistics, SecurityStandardCategoryStatistics,
};
use crate::models::view::View;

/// Point-in-time, immutable set of issues and portfolio definitions.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Sorted by issue key, keys unique.
    issues: Vec<Arc<Issue>>,
    views: BTreeMap<String, View>,
}

impl Snapshot {
    /// Builds a snapshot; a later issue with an existing key replaces the earlier one.
    pub fn new(issues: Vec<Issue>, views: Vec<View>) -> Self {
        let by_key: BTreeMap<String, Arc<Issue>> = issues
            .into_iter()
            .map(|issue| (issue.key.clone(), Arc::new(issue)))
            .collect();
        Self {
            issues: by_key.into_values().collect(),
            views: views.into_iter().map(|v| (v.uuid.clone(), v)).collect(),
        }
    }

    pub fn issues(&self) -> &[Arc<Issue>] {
        &self.issues
    }

    pub fn views(&self) -> &BTreeMap<String, View> {
        &self.views
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Arc<Issue>> {
        self.issues
            .binary_search_by(|issue| issue.key.as_str().cmp(key))
            .ok()
            .map(|pos| &self.issues[pos])
    }

    /// New snapshot with the batch applied; unchanged documents are shared.
    fn with_batch(&self, batch: IndexBatch) -> Self {
        let deleted: BTreeSet<String> = batch.deletes.into_iter().collect();
        let mut by_key: BTreeMap<String, Arc<Issue>> = self
            .issues
            .iter()
            .filter(|issue| !deleted.contains(&issue.key))
            .map(|issue| (issue.key.clone(), Arc::clone(issue)))
            .collect();
        for issue in batch.upserts {
            by_key.insert(issue.key.clone(), Arc::new(issue));
        }

        let mut views = self.views.clone();
        for uuid in &batch.deleted_views {
            views.remove(uuid);
        }
        for view in batch.views {
            views.insert(view.uuid.clone(), view);
        }

        Self {
            issues: by_key.into_values().collect(),
            views,
        }
    }
}

/// One logical write: document upserts and deletes plus the view side-table.
#[derive(Debug, Clone, Default)]
pub struct IndexBatch {
    pub upserts: Vec<Issue>,
    pub deletes: Vec<String>,
    pub views: Vec<View>,
    pub deleted_views: Vec<String>,
}

/// One page of sorted matches with the requested facets.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub page: PagedResult<Arc<Issue>>,
    pub facets: Facets,
}

impl SearchResult {
    pub fn total(&self) -> usize {
        self.page.total
    }

    pub fn issues(&self) -> &[Arc<Issue>] {
        &self.page.items
    }

    pub fn keys(&self) -> Vec<&str> {
        self.page.items.iter().map(|i| i.key.as_str()).collect()
    }

    pub fn facet(&self, name: &str) -> Option<&[FacetBucket]> {
        self.facets.get(name).map(Vec::as_slice)
    }
}

/// Scope of a security report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportScope {
    /// A project or branch uuid.
    Component(String),
    /// A portfolio uuid, expanded to its member uuids.
    Portfolio(String),
}

/// Security report to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityReport {
    OwaspTop10 {
        version: OwaspTop10Version,
        include_cwe: bool,
    },
    SansTop25 {
        include_cwe: bool,
    },
    SonarSourceSecurity {
        include_cwe: bool,
    },
    CweTop25,
    PciDss(PciDssVersion),
    OwaspAsvs {
        level: u8,
    },
    OwaspAsvsByLevel {
        level: u8,
    },
    StigAsdV5R3,
}

/// Page iterator over the sorted matches of a query.
pub struct Scroll {
    matched: Vec<Arc<Issue>>,
    position: usize,
    page_size: usize,
}

impl Iterator for Scroll {
    type Item = Vec<Arc<Issue>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.matched.len() {
            return None;
        }
        let end = (self.position + self.page_size).min(self.matched.len());
        let page = self.matched[self.position..end].to_vec();
        self.position = end;
        Some(page)
    }
}

/// Live index. Readers clone the current snapshot and never hold the lock
/// while querying; writers build a new snapshot and swap it in.
pub struct IssueIndex {
    current: RwLock<Arc<Snapshot>>,
    writer: Mutex<()>,
    default_tz: Tz,
    standards: Arc<SecurityStandards>,
    scan_page_size: usize,
}

impl IssueIndex {
    pub fn new(snapshot: Snapshot, default_tz: Tz) -> Self {
        info!(
            issues = snapshot.len(),
            views = snapshot.views().len(),
            timezone = %default_tz,
            "Creating issue index"
        );
        Self {
            current: RwLock::new(Arc::new(snapshot)),
            writer: Mutex::new(()),
            default_tz,
            standards: Arc::new(SecurityStandards::builtin()),
            scan_page_size: MAX_SCAN_PAGE_SIZE,
        }
    }

    pub fn with_standards(mut self, standards: SecurityStandards) -> Self {
        self.standards = Arc::new(standards);
        self
    }

    pub fn with_scan_page_size(mut self, page_size: usize) -> Self {
        self.scan_page_size = page_size.clamp(1, MAX_SCAN_PAGE_SIZE);
        self
    }

    pub fn default_timezone(&self) -> Tz {
        self.default_tz
    }

    pub fn standards(&self) -> &SecurityStandards {
        &self.standards
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    /// Swaps in a whole new snapshot.
    pub fn replace(&self, snapshot: Snapshot) {
        let _writer = self.writer.lock();
        info!(issues = snapshot.len(), "Replacing index snapshot");
        *self.current.write() = Arc::new(snapshot);
    }

    /// Applies a batch; readers see either none or all of it.
    pub fn apply(&self, batch: IndexBatch) {
        let _writer = self.writer.lock();
        let (upserts, deletes) = (batch.upserts.len(), batch.deletes.len());
        let next = self.snapshot().with_batch(batch);
        info!(upserts, deletes, issues = next.len(), "Applied index batch");
        *self.current.write() = Arc::new(next);
    }

    fn filter(&self, snapshot: &Snapshot, query: &IssueQuery) -> (FilterSet, Vec<Arc<Issue>>) {
        let filters = FilterSet::compile(query, snapshot.views(), &self.standards);
        let mut matched: Vec<Arc<Issue>> = snapshot
            .issues()
            .iter()
            .filter(|issue| filters.matches(issue))
            .cloned()
            .collect();
        let cmp = ordering::comparator(query);
        matched.sort_by(|a, b| cmp(a, b));
        (filters, matched)
    }

    /// Sorted page of matches plus the requested facets.
    pub fn search(&self, query: &IssueQuery) -> SearchResult {
        let snapshot = self.snapshot();
        let (filters, matched) = self.filter(&snapshot, query);

        let facets = facets::compute(snapshot.issues(), &matched, &filters, query, self.default_tz);

        let paging = query.paging();
        let items: Vec<Arc<Issue>> = matched
            .iter()
            .skip(paging.start())
            .take(paging.limit())
            .cloned()
            .collect();
        debug!(
            total = matched.len(),
            returned = items.len(),
            facets = facets.len(),
            "Searched issues"
        );
        SearchResult {
            page: PagedResult::new(items, matched.len(), &paging),
            facets,
        }
    }

    /// Every match, in pages of at most [`MAX_SCAN_PAGE_SIZE`] issues.
    pub fn scroll(&self, query: &IssueQuery, page_size: usize) -> Scroll {
        let snapshot = self.snapshot();
        let (_, matched) = self.filter(&snapshot, query);
        Scroll {
            matched,
            position: 0,
            page_size: page_size.clamp(1, MAX_SCAN_PAGE_SIZE),
        }
    }

    /// Distinct tags of matching issues containing `text`, ascending.
    pub fn search_tags(&self, query: &IssueQuery, text: Option<&str>, size: usize) -> Vec<String> {
        self.distinct_terms(query, text, size, |issue| {
            issue.tags.iter().map(String::as_str).collect()
        })
    }

    /// Distinct author logins of matching issues containing `text`, ascending.
    pub fn search_authors(&self, query: &IssueQuery, text: Option<&str>, size: usize) -> Vec<String> {
        self.distinct_terms(query, text, size, |issue| {
            issue.author_login.as_deref().into_iter().collect()
        })
    }

    fn distinct_terms<F>(&self, query: &IssueQuery, text: Option<&str>, size: usize, terms: F) -> Vec<String>
    where
        F: Fn(&Issue) -> Vec<&str>,
    {
        let snapshot = self.snapshot();
        let (_, matched) = self.filter(&snapshot, query);
        let needle = text.map(str::to_lowercase);
        let found: BTreeSet<&str> = matched
            .iter()
            .flat_map(|issue| terms(issue.as_ref()))
            .filter(|term| {
                needle
                    .as_deref()
                    .map_or(true, |n| term.to_lowercase().contains(n))
            })
            .collect();
        found.into_iter().take(size).map(str::to_string).collect()
    }

    /// Most used tags among matching issues, by count then name.
    pub fn count_tags(&self, query: &IssueQuery, max: usize) -> Vec<FacetBucket> {
        let snapshot = self.snapshot();
        let (_, matched) = self.filter(&snapshot, query);
        let mut counts: HashMap<&str, u64> = HashMap::new();
        for tag in matched.iter().flat_map(|issue| issue.tags.iter()) {
            *counts.entry(tag.as_str()).or_insert(0) += 1;
        }
        let mut ranked: Vec<(&str, u64)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
            .into_iter()
            .take(max)
            .map(|(tag, count)| FacetBucket::new(tag, count))
            .collect()
    }

    /// Unresolved non-hotspot issues assigned to `assignee_uuid`, created
    /// since each project's own bound, grouped by branch.
    pub fn search_project_statistics(
        &self,
        project_uuids: &[String],
        froms: &[DateTime<Utc>],
        assignee_uuid: &str,
    ) -> Result<Vec<ProjectStatistics>, IndexError> {
        if project_uuids.len() != froms.len() {
            return Err(IndexError::validation(format!(
                "Expected one date per project, got {} projects and {} dates",
                project_uuids.len(),
                froms.len()
            )));
        }

        let types = IssueType::ALL
            .iter()
            .copied()
            .filter(|t| *t != IssueType::SecurityHotspot);
        let mut by_branch: BTreeMap<String, ProjectStatistics> = BTreeMap::new();

        for (project_uuid, from) in project_uuids.iter().zip(froms) {
            let query = IssueQuery::builder()
                .project_uuids([project_uuid.as_str()])
                .assignee_uuids([assignee_uuid])
                .resolved(false)
                .types(types.clone())
                .build()?;

            // A bound in the future selects nothing rather than failing the scan.
            for page in self.scroll(&query, self.scan_page_size) {
                for issue in page.into_iter().filter(|issue| issue.created_at >= *from) {
                    let stats = by_branch
                        .entry(issue.branch_uuid.clone())
                        .or_insert_with(|| ProjectStatistics {
                            branch_uuid: issue.branch_uuid.clone(),
                            issue_count: 0,
                            last_issue_date: issue.created_at,
                        });
                    stats.issue_count += 1;
                    stats.last_issue_date = stats.last_issue_date.max(issue.created_at);
                }
            }
        }

        debug!(
            projects = project_uuids.len(),
            branches = by_branch.len(),
            "Computed project statistics"
        );
        Ok(by_branch.into_values().collect())
    }

    /// Unresolved issue counts by type on the given non-main branches.
    pub fn search_branch_statistics(
        &self,
        project_uuid: &str,
        branch_uuids: &[String],
    ) -> Vec<BranchStatistics> {
        if branch_uuids.is_empty() {
            return Vec::new();
        }
        let snapshot = self.snapshot();
        let wanted: BTreeSet<&str> = branch_uuids.iter().map(String::as_str).collect();
        let mut by_branch: BTreeMap<&str, BranchStatistics> = BTreeMap::new();

        for issue in snapshot.issues().iter().filter(|issue| {
            issue.project_uuid == project_uuid
                && !issue.is_main_branch
                && !issue.is_resolved()
                && wanted.contains(issue.branch_uuid.as_str())
        }) {
            let stats = by_branch
                .entry(issue.branch_uuid.as_str())
                .or_insert_with(|| BranchStatistics {
                    branch_uuid: issue.branch_uuid.clone(),
                    counts_by_type: BTreeMap::new(),
                });
            *stats.counts_by_type.entry(issue.issue_type).or_insert(0) += 1;
        }
        by_branch.into_values().collect()
    }

    /// Member uuids a report scope covers.
    fn scope_members(&self, snapshot: &Snapshot, scope: &ReportScope) -> Result<BTreeSet<String>, IndexError> {
        match scope {
            ReportScope::Component(uuid) => Ok([uuid.clone()].into()),
            ReportScope::Portfolio(uuid) => snapshot
                .views()
                .get(uuid)
                .map(|view| view.members.clone())
                .ok_or_else(|| IndexError::NotFound(format!("Portfolio '{}'", uuid))),
        }
    }

    /// Computes one security report over the scope.
    pub fn security_report(
        &self,
        scope: &ReportScope,
        report: SecurityReport,
    ) -> Result<Vec<SecurityStandardCategoryStatistics>, IndexError> {
        if let SecurityReport::OwaspAsvs { level } | SecurityReport::OwaspAsvsByLevel { level } = report {
            if !(1..=3).contains(&level) {
                return Err(IndexError::validation(format!(
                    "OWASP ASVS level must be 1, 2 or 3, got {}",
                    level
                )));
            }
        }

        let snapshot = self.snapshot();
        let members = self.scope_members(&snapshot, scope)?;
        let issues: Vec<&Issue> = snapshot
            .issues()
            .iter()
            .map(Arc::as_ref)
            .filter(|issue| members.contains(&issue.branch_uuid) || members.contains(&issue.project_uuid))
            .filter(|issue| security_report::in_population(issue))
            .collect();

        let standards = self.standards.as_ref();
        let nodes = match report {
            SecurityReport::OwaspTop10 {
                version,
                include_cwe,
            } => security_report::owasp_top10(&issues, version, include_cwe),
            SecurityReport::SansTop25 { include_cwe } => {
                security_report::sans_top25(&issues, standards, include_cwe)
            }
            SecurityReport::SonarSourceSecurity { include_cwe } => {
                security_report::sonarsource(&issues, standards, include_cwe)
            }
            SecurityReport::CweTop25 => security_report::cwe_top25(&issues, standards),
            SecurityReport::PciDss(version) => security_report::pci_dss(&issues, version),
            SecurityReport::OwaspAsvs { level } => {
                security_report::owasp_asvs(&issues, standards, level)
            }
            SecurityReport::OwaspAsvsByLevel { level } => {
                vec![security_report::owasp_asvs_by_level(&issues, standards, level)]
            }
            SecurityReport::StigAsdV5R3 => security_report::stig(&issues),
        };
        debug!(
            scope = ?scope,
            report = ?report,
            population = issues.len(),
            categories = nodes.len(),
            "Computed security report"
        );
        Ok(nodes)
    }
}

/// Paging helper for callers walking a search page by page.
pub fn next_page(paging: Paging, total: usize) -> Option<Paging> {
    let next = Paging::offset(paging.start().saturating_add(paging.limit()), paging.limit());
    (next.start() < total).then_some(next)
}
