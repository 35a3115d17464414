//! Immutable issue query and its validating builder.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Months, Utc};
use chrono_tz::Tz;
use regex::Regex;

use super::issue::{
    CleanCodeAttributeCategory, ImpactSeverity, IssueScope, IssueStatus, IssueType, Resolution,
    Severity, SoftwareQuality, Status,
};
use super::keyword_enum;
use super::pagination::Paging;
use crate::errors::IndexError;

keyword_enum! {
    pub enum SortField {
        Status => "STATUS",
        Severity => "SEVERITY",
        CreationDate => "CREATION_DATE",
        UpdateDate => "UPDATE_DATE",
        CloseDate => "CLOSE_DATE",
        FileLine => "FILE_LINE",
    }
}

keyword_enum! {
    /// Metric aggregated by facets: document count or summed effort.
    pub enum FacetMode {
        Count => "count",
        Effort => "effort",
    }
}

impl Default for FacetMode {
    fn default() -> Self {
        Self::Count
    }
}

/// Lower creation-date bound with its inclusiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodStart {
    pub date: DateTime<Utc>,
    pub inclusive: bool,
}

impl PeriodStart {
    pub fn new(date: DateTime<Utc>, inclusive: bool) -> Self {
        Self { date, inclusive }
    }

    pub fn inclusive(date: DateTime<Utc>) -> Self {
        Self::new(date, true)
    }

    pub fn admits(&self, instant: DateTime<Utc>) -> bool {
        if self.inclusive {
            instant >= self.date
        } else {
            instant > self.date
        }
    }
}

/// Default OWASP ASVS level: level 3 covers every requirement.
pub const DEFAULT_ASVS_LEVEL: u8 = 3;

/// Validated, immutable set of filter, sort, paging and facet criteria.
///
/// Only [`IssueQueryBuilder::build`] creates one. Collection criteria are
/// empty when unset, except `issue_keys` where `None` means "no filter" and
/// `Some(empty)` matches nothing.
#[derive(Debug, Clone)]
pub struct IssueQuery {
    pub(crate) issue_keys: Option<BTreeSet<String>>,
    pub(crate) project_uuids: BTreeSet<String>,
    pub(crate) component_uuids: BTreeSet<String>,
    pub(crate) branch_uuid: Option<String>,
    pub(crate) main_branch: Option<bool>,
    pub(crate) view_uuids: BTreeSet<String>,
    pub(crate) files: BTreeSet<String>,
    pub(crate) directories: BTreeSet<String>,
    pub(crate) on_component_only: bool,

    pub(crate) severities: BTreeSet<Severity>,
    pub(crate) statuses: BTreeSet<Status>,
    pub(crate) resolutions: BTreeSet<Resolution>,
    pub(crate) resolved: Option<bool>,
    pub(crate) issue_statuses: BTreeSet<IssueStatus>,
    pub(crate) rules: BTreeSet<String>,
    pub(crate) languages: BTreeSet<String>,
    pub(crate) tags: BTreeSet<String>,
    pub(crate) types: BTreeSet<IssueType>,
    pub(crate) scopes: BTreeSet<IssueScope>,
    pub(crate) assignee_uuids: BTreeSet<String>,
    pub(crate) assigned: Option<bool>,
    pub(crate) authors: BTreeSet<String>,

    pub(crate) created_after: Option<PeriodStart>,
    pub(crate) created_before: Option<DateTime<Utc>>,
    pub(crate) created_at: Option<DateTime<Utc>>,
    pub(crate) created_after_by_project_uuids: BTreeMap<String, PeriodStart>,
    pub(crate) new_code_on_reference: Option<bool>,
    pub(crate) new_code_on_reference_by_project_uuids: BTreeSet<String>,

    pub(crate) cwe: BTreeSet<String>,
    pub(crate) owasp_top10: BTreeSet<String>,
    pub(crate) owasp_top10_2021: BTreeSet<String>,
    pub(crate) owasp_asvs_40: BTreeSet<String>,
    pub(crate) owasp_asvs_level: Option<u8>,
    pub(crate) pci_dss_32: BTreeSet<String>,
    pub(crate) pci_dss_40: BTreeSet<String>,
    pub(crate) sans_top25: BTreeSet<String>,
    pub(crate) sonarsource_security: BTreeSet<String>,
    pub(crate) stig_asd_v5r3: BTreeSet<String>,

    pub(crate) code_variants: BTreeSet<String>,
    pub(crate) impact_software_qualities: BTreeSet<SoftwareQuality>,
    pub(crate) impact_severities: BTreeSet<ImpactSeverity>,
    pub(crate) clean_code_attribute_categories: BTreeSet<CleanCodeAttributeCategory>,
    pub(crate) prioritized_rule: Option<bool>,
    pub(crate) from_sonar_qube_update: Option<bool>,
    pub(crate) linked_ticket_statuses: BTreeSet<String>,
    pub(crate) compliance_category_rules: BTreeSet<String>,

    pub(crate) sort: Option<SortField>,
    pub(crate) asc: bool,
    pub(crate) facet_mode: FacetMode,
    pub(crate) facets: BTreeSet<String>,
    pub(crate) time_zone: Option<Tz>,
    pub(crate) paging: Paging,
}

impl IssueQuery {
    pub fn builder() -> IssueQueryBuilder {
        IssueQueryBuilder::default()
    }

    pub fn sort(&self) -> Option<SortField> {
        self.sort
    }

    pub fn asc(&self) -> bool {
        self.asc
    }

    pub fn facet_mode(&self) -> FacetMode {
        self.facet_mode
    }

    pub fn facets(&self) -> &BTreeSet<String> {
        &self.facets
    }

    pub fn paging(&self) -> Paging {
        self.paging
    }

    pub fn time_zone(&self) -> Option<Tz> {
        self.time_zone
    }

    pub fn created_after(&self) -> Option<PeriodStart> {
        self.created_after
    }

    pub fn created_before(&self) -> Option<DateTime<Utc>> {
        self.created_before
    }

    pub fn issue_keys(&self) -> Option<&BTreeSet<String>> {
        self.issue_keys.as_ref()
    }

    /// ASVS level applied to the ASVS filter and facet.
    pub fn owasp_asvs_level(&self) -> u8 {
        self.owasp_asvs_level.unwrap_or(DEFAULT_ASVS_LEVEL)
    }

    /// Same criteria with another window, used by page-at-a-time scans.
    pub fn with_paging(&self, paging: Paging) -> Self {
        let mut query = self.clone();
        query.paging = paging;
        query
    }
}

/// Accumulates criteria for an [`IssueQuery`].
#[derive(Debug, Clone)]
pub struct IssueQueryBuilder {
    query: IssueQuery,
    created_in_last: Option<String>,
}

impl Default for IssueQueryBuilder {
    fn default() -> Self {
        Self {
            query: IssueQuery {
                issue_keys: None,
                project_uuids: BTreeSet::new(),
                component_uuids: BTreeSet::new(),
                branch_uuid: None,
                main_branch: None,
                view_uuids: BTreeSet::new(),
                files: BTreeSet::new(),
                directories: BTreeSet::new(),
                on_component_only: false,
                severities: BTreeSet::new(),
                statuses: BTreeSet::new(),
                resolutions: BTreeSet::new(),
                resolved: None,
                issue_statuses: BTreeSet::new(),
                rules: BTreeSet::new(),
                languages: BTreeSet::new(),
                tags: BTreeSet::new(),
                types: BTreeSet::new(),
                scopes: BTreeSet::new(),
                assignee_uuids: BTreeSet::new(),
                assigned: None,
                authors: BTreeSet::new(),
                created_after: None,
                created_before: None,
                created_at: None,
                created_after_by_project_uuids: BTreeMap::new(),
                new_code_on_reference: None,
                new_code_on_reference_by_project_uuids: BTreeSet::new(),
                cwe: BTreeSet::new(),
                owasp_top10: BTreeSet::new(),
                owasp_top10_2021: BTreeSet::new(),
                owasp_asvs_40: BTreeSet::new(),
                owasp_asvs_level: None,
                pci_dss_32: BTreeSet::new(),
                pci_dss_40: BTreeSet::new(),
                sans_top25: BTreeSet::new(),
                sonarsource_security: BTreeSet::new(),
                stig_asd_v5r3: BTreeSet::new(),
                code_variants: BTreeSet::new(),
                impact_software_qualities: BTreeSet::new(),
                impact_severities: BTreeSet::new(),
                clean_code_attribute_categories: BTreeSet::new(),
                prioritized_rule: None,
                from_sonar_qube_update: None,
                linked_ticket_statuses: BTreeSet::new(),
                compliance_category_rules: BTreeSet::new(),
                sort: None,
                asc: true,
                facet_mode: FacetMode::Count,
                facets: BTreeSet::new(),
                time_zone: None,
                paging: Paging::default(),
            },
            created_in_last: None,
        }
    }
}

/// Generates chainable setters that collect string values into a set.
macro_rules! string_set_setters {
    ($($field:ident),+ $(,)?) => {
        $(
            pub fn $field<I, S>(mut self, values: I) -> Self
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                self.query.$field = values.into_iter().map(Into::into).collect();
                self
            }
        )+
    };
}

/// Generates chainable setters for keyword-valued sets.
macro_rules! keyword_set_setters {
    ($($field:ident: $ty:ty),+ $(,)?) => {
        $(
            pub fn $field<I>(mut self, values: I) -> Self
            where
                I: IntoIterator<Item = $ty>,
            {
                self.query.$field = values.into_iter().collect();
                self
            }
        )+
    };
}

/// Generates chainable setters for tri-state boolean filters.
macro_rules! flag_setters {
    ($($field:ident),+ $(,)?) => {
        $(
            pub fn $field(mut self, value: bool) -> Self {
                self.query.$field = Some(value);
                self
            }
        )+
    };
}

impl IssueQueryBuilder {
    string_set_setters! {
        project_uuids,
        component_uuids,
        view_uuids,
        files,
        directories,
        rules,
        languages,
        tags,
        assignee_uuids,
        authors,
        new_code_on_reference_by_project_uuids,
        cwe,
        owasp_top10,
        owasp_top10_2021,
        owasp_asvs_40,
        pci_dss_32,
        pci_dss_40,
        sans_top25,
        sonarsource_security,
        stig_asd_v5r3,
        code_variants,
        linked_ticket_statuses,
        compliance_category_rules,
        facets,
    }

    keyword_set_setters! {
        severities: Severity,
        statuses: Status,
        resolutions: Resolution,
        issue_statuses: IssueStatus,
        types: IssueType,
        scopes: IssueScope,
        impact_software_qualities: SoftwareQuality,
        impact_severities: ImpactSeverity,
        clean_code_attribute_categories: CleanCodeAttributeCategory,
    }

    flag_setters! {
        main_branch,
        resolved,
        assigned,
        new_code_on_reference,
        prioritized_rule,
        from_sonar_qube_update,
    }

    /// Restricts to these keys; an empty collection matches nothing.
    pub fn issue_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.issue_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn branch_uuid(mut self, branch_uuid: impl Into<String>) -> Self {
        self.query.branch_uuid = Some(branch_uuid.into());
        self
    }

    pub fn on_component_only(mut self, value: bool) -> Self {
        self.query.on_component_only = value;
        self
    }

    pub fn created_after(mut self, date: DateTime<Utc>, inclusive: bool) -> Self {
        self.query.created_after = Some(PeriodStart::new(date, inclusive));
        self
    }

    pub fn created_before(mut self, date: DateTime<Utc>) -> Self {
        self.query.created_before = Some(date);
        self
    }

    pub fn created_at(mut self, date: DateTime<Utc>) -> Self {
        self.query.created_at = Some(date);
        self
    }

    /// Relative lower bound such as `"1y2m3w4d"`, resolved at build time.
    pub fn created_in_last(mut self, period: impl Into<String>) -> Self {
        self.created_in_last = Some(period.into());
        self
    }

    pub fn created_after_by_project_uuids(mut self, bounds: BTreeMap<String, PeriodStart>) -> Self {
        self.query.created_after_by_project_uuids = bounds;
        self
    }

    pub fn owasp_asvs_level(mut self, level: u8) -> Self {
        self.query.owasp_asvs_level = Some(level);
        self
    }

    pub fn sort(mut self, sort: SortField) -> Self {
        self.query.sort = Some(sort);
        self
    }

    /// Parses a sort keyword, failing fast on unknown values.
    pub fn sort_str(self, sort: &str) -> Result<Self, IndexError> {
        let field = sort.parse::<SortField>()?;
        Ok(self.sort(field))
    }

    pub fn asc(mut self, asc: bool) -> Self {
        self.query.asc = asc;
        self
    }

    pub fn facet_mode(mut self, mode: FacetMode) -> Self {
        self.query.facet_mode = mode;
        self
    }

    pub fn time_zone(mut self, tz: Tz) -> Self {
        self.query.time_zone = Some(tz);
        self
    }

    pub fn paging(mut self, paging: Paging) -> Self {
        self.query.paging = paging;
        self
    }

    pub fn build(self) -> Result<IssueQuery, IndexError> {
        self.build_at(Utc::now())
    }

    /// Validates against a fixed clock.
    pub fn build_at(self, now: DateTime<Utc>) -> Result<IssueQuery, IndexError> {
        let mut query = self.query;

        if let Some(period) = self.created_in_last.as_deref() {
            if query.created_after.is_some() {
                return Err(IndexError::validation(
                    "Parameters createdAfter and createdInLast cannot be set simultaneously",
                ));
            }
            query.created_after = Some(PeriodStart::inclusive(period_start(period, now)?));
        }

        if let Some(after) = query.created_after {
            if after.date > now {
                return Err(IndexError::validation("Start bound cannot be in the future"));
            }
            if let Some(before) = query.created_before {
                if after.date >= before {
                    return Err(IndexError::validation(
                        "Start bound cannot be larger or equal to end bound",
                    ));
                }
            }
        }

        if let Some(level) = query.owasp_asvs_level {
            if !(1..=3).contains(&level) {
                return Err(IndexError::validation(format!(
                    "OWASP ASVS level must be 1, 2 or 3, got {}",
                    level
                )));
            }
        }

        Ok(query)
    }
}

/// Subtracts a `"<n>y<n>m<n>w<n>d"` period from `now`.
fn period_start(period: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, IndexError> {
    let re = Regex::new(r"^(?:(\d+)y)?(?:(\d+)m)?(?:(\d+)w)?(?:(\d+)d)?$")
        .map_err(|e| IndexError::Internal(e.to_string()))?;
    let invalid = || IndexError::validation(format!("Invalid period '{}'", period));

    let caps = re.captures(period.trim()).ok_or_else(invalid)?;
    if caps.iter().skip(1).all(|c| c.is_none()) {
        return Err(invalid());
    }
    let part = |i: usize| -> Result<u32, IndexError> {
        caps.get(i)
            .map(|m| m.as_str().parse::<u32>().map_err(|_| invalid()))
            .unwrap_or(Ok(0))
    };

    let (years, months, weeks, days) = (part(1)?, part(2)?, part(3)?, part(4)?);
    let total_months = years
        .checked_mul(12)
        .and_then(|m| m.checked_add(months))
        .ok_or_else(invalid)?;
    now.checked_sub_months(Months::new(total_months))
        .and_then(|d| d.checked_sub_signed(Duration::weeks(i64::from(weeks))))
        .and_then(|d| d.checked_sub_signed(Duration::days(i64::from(days))))
        .ok_or_else(invalid)
}
