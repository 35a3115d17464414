//! Facet aggregator: capped, ranked count or effort breakdowns by field.
//!
//! Facets are declared once in [`FACETS`]; adding a dimension means adding a
//! registry entry. Each facet is sticky: it is computed over the documents
//! matching every filter except the filters of its own dimension.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono_tz::Tz;
use rayon::prelude::*;
use serde::Serialize;

use super::filter::{Field, FilterSet};
use super::histogram;
use crate::models::issue::{Issue, IssueType};
use crate::models::query::{FacetMode, IssueQuery};

/// Facet names accepted in [`IssueQuery::facets`].
pub mod names {
    pub const PROJECTS: &str = "projects";
    pub const FILES: &str = "files";
    pub const DIRECTORIES: &str = "directories";
    pub const SEVERITIES: &str = "severities";
    pub const STATUSES: &str = "statuses";
    pub const RESOLUTIONS: &str = "resolutions";
    pub const ISSUE_STATUSES: &str = "issueStatuses";
    pub const RULES: &str = "rules";
    pub const LANGUAGES: &str = "languages";
    pub const TAGS: &str = "tags";
    pub const TYPES: &str = "types";
    pub const SCOPES: &str = "scopes";
    pub const ASSIGNEES: &str = "assignees";
    pub const AUTHORS: &str = "authors";
    pub const CWE: &str = "cwe";
    pub const OWASP_TOP10: &str = "owaspTop10";
    pub const OWASP_TOP10_2021: &str = "owaspTop10-2021";
    pub const OWASP_ASVS_40: &str = "owaspAsvs-4.0";
    pub const PCI_DSS_32: &str = "pciDss-3.2";
    pub const PCI_DSS_40: &str = "pciDss-4.0";
    pub const SANS_TOP25: &str = "sansTop25";
    pub const SONARSOURCE_SECURITY: &str = "sonarsourceSecurity";
    pub const STIG_ASD_V5R3: &str = "stig-ASD_V5R3";
    pub const CODE_VARIANTS: &str = "codeVariants";
    pub const IMPACT_SOFTWARE_QUALITIES: &str = "impactSoftwareQualities";
    pub const IMPACT_SEVERITIES: &str = "impactSeverities";
    pub const CLEAN_CODE_ATTRIBUTE_CATEGORIES: &str = "cleanCodeAttributeCategories";
    pub const LINKED_TICKET_STATUSES: &str = "linkedTicketStatuses";
    pub const CREATED_AT: &str = "createdAt";
    pub const EFFORT: &str = "effort";
}

/// Key of the single bucket of the effort facet.
pub const EFFORT_TOTAL: &str = "total";

const LARGE_CAP: usize = 100;
const SMALL_CAP: usize = 5;
const SECURITY_CAP: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetBucket {
    pub key: String,
    pub value: u64,
}

impl FacetBucket {
    pub fn new(key: impl Into<String>, value: u64) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Facet name to its ordered buckets.
pub type Facets = BTreeMap<String, Vec<FacetBucket>>;

/// Registry entry for one terms facet.
pub struct FacetDef {
    pub name: &'static str,
    pub field: Field,
    pub cap: usize,
    /// Documents eligible for this facet, on top of the query filters.
    population: fn(&Issue) -> bool,
    /// Values selected by the query on this dimension.
    selected: fn(&IssueQuery) -> Vec<String>,
    /// Emit a `""` bucket for documents without a value.
    missing_bucket: bool,
}

fn everyone(_: &Issue) -> bool {
    true
}

fn not_hotspot(issue: &Issue) -> bool {
    !issue.is_hotspot()
}

fn vulnerability(issue: &Issue) -> bool {
    issue.issue_type == IssueType::Vulnerability
}

fn strings<'a, I: IntoIterator<Item = &'a String>>(values: I) -> Vec<String> {
    values.into_iter().cloned().collect()
}

fn keywords<I: IntoIterator<Item = &'static str>>(values: I) -> Vec<String> {
    values.into_iter().map(str::to_string).collect()
}

macro_rules! facet {
    ($name:expr, $field:expr, $cap:expr, $population:expr, $selected:expr) => {
        facet!($name, $field, $cap, $population, $selected, false)
    };
    ($name:expr, $field:expr, $cap:expr, $population:expr, $selected:expr, $missing:expr) => {
        FacetDef {
            name: $name,
            field: $field,
            cap: $cap,
            population: $population,
            selected: $selected,
            missing_bucket: $missing,
        }
    };
}

pub const FACETS: &[FacetDef] = &[
    facet!(names::PROJECTS, Field::Project, LARGE_CAP, everyone, |q| strings(&q.project_uuids)),
    facet!(names::FILES, Field::File, LARGE_CAP, everyone, |q| strings(&q.files)),
    facet!(names::DIRECTORIES, Field::Directory, LARGE_CAP, everyone, |q| strings(&q.directories)),
    facet!(names::SEVERITIES, Field::Severity, SMALL_CAP, not_hotspot, |q| {
        keywords(q.severities.iter().map(|s| s.as_str()))
    }),
    facet!(names::STATUSES, Field::Status, SMALL_CAP, everyone, |q| {
        keywords(q.statuses.iter().map(|s| s.as_str()))
    }),
    facet!(
        names::RESOLUTIONS,
        Field::Resolution,
        SMALL_CAP,
        everyone,
        |q| keywords(q.resolutions.iter().map(|r| r.as_str())),
        true
    ),
    facet!(names::ISSUE_STATUSES, Field::IssueStatus, SMALL_CAP, everyone, |q| {
        keywords(q.issue_statuses.iter().map(|s| s.as_str()))
    }),
    facet!(names::RULES, Field::Rule, LARGE_CAP, everyone, |q| strings(&q.rules)),
    facet!(names::LANGUAGES, Field::Language, LARGE_CAP, everyone, |q| strings(&q.languages)),
    facet!(names::TAGS, Field::Tag, LARGE_CAP, everyone, |q| strings(&q.tags)),
    facet!(names::TYPES, Field::Type, IssueType::ALL.len(), everyone, |q| {
        keywords(q.types.iter().map(|t| t.as_str()))
    }),
    facet!(names::SCOPES, Field::Scope, 2, everyone, |q| {
        keywords(q.scopes.iter().map(|s| s.as_str()))
    }),
    facet!(
        names::ASSIGNEES,
        Field::Assignee,
        LARGE_CAP,
        everyone,
        |q| strings(&q.assignee_uuids),
        true
    ),
    facet!(names::AUTHORS, Field::Author, LARGE_CAP, everyone, |q| strings(&q.authors)),
    facet!(names::CWE, Field::Cwe, SECURITY_CAP, vulnerability, |q| strings(&q.cwe)),
    facet!(names::OWASP_TOP10, Field::OwaspTop10, SECURITY_CAP, vulnerability, |q| {
        strings(&q.owasp_top10)
    }),
    facet!(names::OWASP_TOP10_2021, Field::OwaspTop10_2021, SECURITY_CAP, vulnerability, |q| {
        strings(&q.owasp_top10_2021)
    }),
    facet!(names::OWASP_ASVS_40, Field::OwaspAsvs40, SECURITY_CAP, vulnerability, |q| {
        strings(&q.owasp_asvs_40)
    }),
    facet!(names::PCI_DSS_32, Field::PciDss32, SECURITY_CAP, vulnerability, |q| {
        strings(&q.pci_dss_32)
    }),
    facet!(names::PCI_DSS_40, Field::PciDss40, SECURITY_CAP, vulnerability, |q| {
        strings(&q.pci_dss_40)
    }),
    facet!(names::SANS_TOP25, Field::SansTop25, SECURITY_CAP, vulnerability, |q| {
        strings(&q.sans_top25)
    }),
    facet!(names::SONARSOURCE_SECURITY, Field::SonarsourceSecurity, SECURITY_CAP, vulnerability, |q| {
        strings(&q.sonarsource_security)
    }),
    facet!(names::STIG_ASD_V5R3, Field::StigAsdV5R3, SECURITY_CAP, vulnerability, |q| {
        strings(&q.stig_asd_v5r3)
    }),
    facet!(names::CODE_VARIANTS, Field::CodeVariant, LARGE_CAP, everyone, |q| {
        strings(&q.code_variants)
    }),
    facet!(names::IMPACT_SOFTWARE_QUALITIES, Field::ImpactSoftwareQuality, 3, everyone, |q| {
        keywords(q.impact_software_qualities.iter().map(|s| s.as_str()))
    }),
    facet!(names::IMPACT_SEVERITIES, Field::ImpactSeverity, 5, everyone, |q| {
        keywords(q.impact_severities.iter().map(|s| s.as_str()))
    }),
    facet!(names::CLEAN_CODE_ATTRIBUTE_CATEGORIES, Field::CleanCodeAttributeCategory, 4, everyone, |q| {
        keywords(q.clean_code_attribute_categories.iter().map(|c| c.as_str()))
    }),
    facet!(names::LINKED_TICKET_STATUSES, Field::LinkedTicketStatus, LARGE_CAP, everyone, |q| {
        strings(&q.linked_ticket_statuses)
    }),
];

pub fn facet_def(name: &str) -> Option<&'static FacetDef> {
    FACETS.iter().find(|def| def.name == name)
}

/// Metric one document contributes.
pub fn metric(issue: &Issue, mode: FacetMode) -> u64 {
    match mode {
        FacetMode::Count => 1,
        FacetMode::Effort => issue.effort,
    }
}

impl FacetDef {
    /// Buckets over `issues` that pass every filter but this facet's own.
    pub fn compute(
        &self,
        issues: &[Arc<Issue>],
        filters: &FilterSet,
        query: &IssueQuery,
    ) -> Vec<FacetBucket> {
        let mode = query.facet_mode();
        let mut metrics: HashMap<&str, u64> = HashMap::new();
        let mut missing = 0u64;

        for issue in issues
            .iter()
            .filter(|i| (self.population)(i.as_ref()) && filters.matches_except(i, self.name))
        {
            let value = metric(issue, mode);
            let terms = self.field.terms(issue);
            if terms.is_empty() {
                missing += value;
                continue;
            }
            for term in terms.iter() {
                *metrics.entry(term).or_insert(0) += value;
            }
        }

        let mut ranked: Vec<(&str, u64)> = metrics.iter().map(|(k, v)| (*k, *v)).collect();
        ranked.sort_by(|a, b| rank_cmp(*a, *b));

        let mut buckets: Vec<FacetBucket> = ranked
            .iter()
            .take(self.cap)
            .map(|(key, value)| FacetBucket::new(*key, *value))
            .collect();

        // Selected values stay visible even when ranked below the cap.
        for selected in (self.selected)(query) {
            if buckets.iter().any(|b| b.key == selected) {
                continue;
            }
            if let Some(value) = metrics.get(selected.as_str()) {
                buckets.push(FacetBucket::new(selected, *value));
            }
        }

        if self.missing_bucket && missing > 0 {
            buckets.push(FacetBucket::new("", missing));
        }
        buckets
    }
}

/// Metric descending, then key ascending.
fn rank_cmp(a: (&str, u64), b: (&str, u64)) -> Ordering {
    b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0))
}

/// Computes every requested facet. Unknown names are skipped.
///
/// `matched` is the fully filtered set, used by the non-sticky `createdAt`
/// histogram and the effort total.
pub fn compute(
    issues: &[Arc<Issue>],
    matched: &[Arc<Issue>],
    filters: &FilterSet,
    query: &IssueQuery,
    default_tz: Tz,
) -> Facets {
    let requested: Vec<&String> = query.facets().iter().collect();

    let mut facets: Facets = requested
        .par_iter()
        .filter_map(|name| match facet_def(name) {
            Some(def) => Some((def.name.to_string(), def.compute(issues, filters, query))),
            None => {
                if name.as_str() != names::CREATED_AT && name.as_str() != names::EFFORT {
                    tracing::debug!(facet = %name, "Ignoring unknown facet");
                }
                None
            }
        })
        .collect();

    if query.facets().contains(names::CREATED_AT) {
        let tz = query.time_zone().unwrap_or(default_tz);
        if let Some(buckets) = histogram::created_at(matched, query, tz) {
            facets.insert(names::CREATED_AT.to_string(), buckets);
        }
    }

    if query.facet_mode() == FacetMode::Effort {
        let total = matched.iter().map(|i| i.effort).sum();
        facets.insert(
            names::EFFORT.to_string(),
            vec![FacetBucket::new(EFFORT_TOTAL, total)],
        );
    }

    facets
}
