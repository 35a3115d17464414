//! Filter compiler: turns an [`IssueQuery`] into a conjunction of predicates
//! evaluated against issue documents.
//!
//! Every predicate carries the facet dimensions it constrains, so a facet can
//! be evaluated with all filters except those on its own dimension.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use super::facets::names;
use super::security_standards::SecurityStandards;
use crate::models::issue::{ImpactSeverity, Issue, IssueType, SoftwareQuality};
use crate::models::query::{IssueQuery, PeriodStart};
use crate::models::view::View;

/// Document field addressed by predicates and facets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Key,
    Project,
    Branch,
    Component,
    File,
    Directory,
    Rule,
    Type,
    Severity,
    Status,
    Resolution,
    IssueStatus,
    Scope,
    Assignee,
    Author,
    Tag,
    Language,
    Cwe,
    OwaspTop10,
    OwaspTop10_2021,
    OwaspAsvs40,
    PciDss32,
    PciDss40,
    SansTop25,
    SonarsourceSecurity,
    StigAsdV5R3,
    CodeVariant,
    ImpactSoftwareQuality,
    ImpactSeverity,
    CleanCodeAttributeCategory,
    LinkedTicketStatus,
}

/// Values a document holds for one field.
#[derive(Debug)]
pub enum Terms<'a> {
    One(Option<&'a str>),
    Set(&'a BTreeSet<String>),
    Many(Vec<&'a str>),
}

impl<'a> Terms<'a> {
    pub fn iter(&self) -> Box<dyn Iterator<Item = &'a str> + '_> {
        match self {
            Terms::One(value) => Box::new(value.iter().copied()),
            Terms::Set(values) => {
                let values: &'a BTreeSet<String> = values;
                Box::new(values.iter().map(String::as_str))
            }
            Terms::Many(values) => Box::new(values.iter().copied()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    fn any_in(&self, values: &BTreeSet<String>) -> bool {
        self.iter().any(|term| values.contains(term))
    }
}

impl Field {
    pub fn terms<'a>(&self, issue: &'a Issue) -> Terms<'a> {
        let sec = &issue.security;
        match self {
            Field::Key => Terms::One(Some(&issue.key)),
            Field::Project => Terms::One(Some(&issue.project_uuid)),
            Field::Branch => Terms::One(Some(&issue.branch_uuid)),
            Field::Component => Terms::One(Some(&issue.component_uuid)),
            Field::File => Terms::One(issue.file_path.as_deref()),
            Field::Directory => Terms::One(issue.directory_path.as_deref()),
            Field::Rule => Terms::One(Some(&issue.rule_uuid)),
            Field::Type => Terms::One(Some(issue.issue_type.as_str())),
            Field::Severity => Terms::One(Some(issue.severity.as_str())),
            Field::Status => Terms::One(Some(issue.status.as_str())),
            Field::Resolution => Terms::One(issue.resolution.map(|r| r.as_str())),
            Field::IssueStatus => Terms::One(issue.issue_status.map(|s| s.as_str())),
            Field::Scope => Terms::One(Some(issue.scope.as_str())),
            Field::Assignee => Terms::One(issue.assignee_uuid.as_deref()),
            Field::Author => Terms::One(issue.author_login.as_deref()),
            Field::Tag => Terms::Set(&issue.tags),
            Field::Language => Terms::One(issue.language.as_deref()),
            Field::Cwe => Terms::Set(&sec.cwe),
            Field::OwaspTop10 => Terms::Set(&sec.owasp_top10),
            Field::OwaspTop10_2021 => Terms::Set(&sec.owasp_top10_2021),
            Field::OwaspAsvs40 => Terms::Set(&sec.owasp_asvs_40),
            Field::PciDss32 => Terms::Set(&sec.pci_dss_32),
            Field::PciDss40 => Terms::Set(&sec.pci_dss_40),
            Field::SansTop25 => Terms::Set(&sec.sans_top25),
            Field::SonarsourceSecurity => Terms::One(sec.sonarsource_security.as_deref()),
            Field::StigAsdV5R3 => Terms::Set(&sec.stig_asd_v5r3),
            Field::CodeVariant => Terms::Set(&issue.code_variants),
            Field::ImpactSoftwareQuality => {
                Terms::Many(issue.impacts.keys().map(|q| q.as_str()).collect())
            }
            Field::ImpactSeverity => {
                Terms::Many(issue.impacts.values().map(|s| s.as_str()).collect())
            }
            Field::CleanCodeAttributeCategory => {
                Terms::One(issue.clean_code_attribute_category.map(|c| c.as_str()))
            }
            Field::LinkedTicketStatus => Terms::One(issue.linked_ticket_status.as_deref()),
        }
    }
}

/// Boolean document attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    MainBranch,
    NewCodeReference,
    PrioritizedRule,
    FromSonarQubeUpdate,
}

impl Flag {
    fn of(&self, issue: &Issue) -> bool {
        match self {
            Flag::MainBranch => issue.is_main_branch,
            Flag::NewCodeReference => issue.is_new_code_reference,
            Flag::PrioritizedRule => issue.prioritized_rule,
            Flag::FromSonarQubeUpdate => issue.from_sonar_qube_update,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Predicate {
    /// The field holds at least one of the values. An empty set matches nothing.
    AnyOf { field: Field, values: BTreeSet<String> },
    /// The field holds some value (`true`) or none (`false`).
    Exists { field: Field, exists: bool },
    /// Top-level values match themselves and every dotted descendant; dotted values match exactly.
    PrefixOrExact { field: Field, values: BTreeSet<String> },
    /// Directory equals one of the paths or lies below it.
    PathPrefix(BTreeSet<String>),
    /// Half-open creation window `[after, before)`.
    CreatedRange {
        after: Option<PeriodStart>,
        before: Option<DateTime<Utc>>,
    },
    CreatedAt(DateTime<Utc>),
    /// Per project (or branch) lower bound; issues of other scopes are excluded.
    CreatedAfterByScope(BTreeMap<String, PeriodStart>),
    /// New-code issues of the listed projects (or branches).
    NewCodeByScope(BTreeSet<String>),
    Flag { flag: Flag, value: bool },
    /// One impact carries both a selected quality and a selected severity.
    Impacts {
        qualities: BTreeSet<SoftwareQuality>,
        severities: BTreeSet<ImpactSeverity>,
    },
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn any_of<I, S>(field: Field, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Predicate::AnyOf {
            field,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    fn is_type(types: &[IssueType]) -> Self {
        Predicate::any_of(Field::Type, types.iter().map(|t| t.as_str()))
    }

    pub fn matches(&self, issue: &Issue) -> bool {
        match self {
            Predicate::AnyOf { field, values } => field.terms(issue).any_in(values),
            Predicate::Exists { field, exists } => field.terms(issue).is_empty() != *exists,
            Predicate::PrefixOrExact { field, values } => field.terms(issue).iter().any(|term| {
                values.iter().any(|value| {
                    term == value.as_str()
                        || (!value.contains('.')
                            && term.len() > value.len()
                            && term.starts_with(value.as_str())
                            && term.as_bytes()[value.len()] == b'.')
                })
            }),
            Predicate::PathPrefix(paths) => issue.directory_path.as_deref().is_some_and(|dir| {
                paths.iter().any(|path| {
                    let path = path.trim_end_matches('/');
                    dir == path
                        || path.is_empty()
                        || (dir.starts_with(path) && dir.as_bytes().get(path.len()) == Some(&b'/'))
                })
            }),
            Predicate::CreatedRange { after, before } => {
                after.map_or(true, |a| a.admits(issue.created_at))
                    && before.map_or(true, |b| issue.created_at < b)
            }
            Predicate::CreatedAt(date) => issue.created_at == *date,
            Predicate::CreatedAfterByScope(bounds) => [&issue.branch_uuid, &issue.project_uuid]
                .into_iter()
                .find_map(|uuid| bounds.get(uuid))
                .is_some_and(|start| start.admits(issue.created_at)),
            Predicate::NewCodeByScope(scopes) => {
                issue.is_new_code_reference
                    && (scopes.contains(&issue.project_uuid) || scopes.contains(&issue.branch_uuid))
            }
            Predicate::Flag { flag, value } => flag.of(issue) == *value,
            Predicate::Impacts {
                qualities,
                severities,
            } => issue
                .impacts
                .iter()
                .any(|(q, s)| qualities.contains(q) && severities.contains(s)),
            Predicate::All(parts) => parts.iter().all(|p| p.matches(issue)),
            Predicate::Any(parts) => parts.iter().any(|p| p.matches(issue)),
            Predicate::Not(inner) => !inner.matches(issue),
        }
    }
}

/// Predicate tagged with the facet dimensions it constrains.
#[derive(Debug, Clone)]
pub struct ScopedPredicate {
    pub name: &'static str,
    pub dimensions: &'static [&'static str],
    pub predicate: Predicate,
}

/// Compiled conjunction of predicates.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    predicates: Vec<ScopedPredicate>,
}

const SECURITY_TYPES: &[IssueType] = &[IssueType::Vulnerability, IssueType::SecurityHotspot];

impl FilterSet {
    /// Compile a query. Scope uuids are already resolved by the caller; views
    /// are only used to expand portfolio filters into member uuids.
    pub fn compile(
        query: &IssueQuery,
        views: &BTreeMap<String, View>,
        standards: &SecurityStandards,
    ) -> Self {
        let mut set = FilterSet::default();

        if let Some(keys) = &query.issue_keys {
            set.push("issueKeys", &[], Predicate::any_of(Field::Key, keys.iter().cloned()));
        }

        set.add_scope(query, views);
        set.add_terms(query);
        set.add_dates(query);
        set.add_security(query, standards);
        set.add_impacts(query);

        tracing::debug!(predicates = set.predicates.len(), "Compiled issue filters");
        set
    }

    fn push(&mut self, name: &'static str, dimensions: &'static [&'static str], predicate: Predicate) {
        self.predicates.push(ScopedPredicate {
            name,
            dimensions,
            predicate,
        });
    }

    fn push_any_of(
        &mut self,
        name: &'static str,
        dimension: &'static [&'static str],
        field: Field,
        values: &BTreeSet<String>,
    ) {
        if !values.is_empty() {
            self.push(name, dimension, Predicate::any_of(field, values.iter().cloned()));
        }
    }

    fn push_keywords<I>(&mut self, name: &'static str, dimension: &'static [&'static str], field: Field, values: I)
    where
        I: IntoIterator<Item = &'static str>,
    {
        let values: BTreeSet<String> = values.into_iter().map(str::to_string).collect();
        self.push_any_of(name, dimension, field, &values);
    }

    fn add_scope(&mut self, query: &IssueQuery, views: &BTreeMap<String, View>) {
        self.push_any_of("componentUuids", &[], Field::Component, &query.component_uuids);
        if query.on_component_only {
            return;
        }

        self.push_any_of("projectUuids", &[names::PROJECTS], Field::Project, &query.project_uuids);
        self.push_any_of("files", &[names::FILES], Field::File, &query.files);
        if !query.directories.is_empty() {
            self.push(
                "directories",
                &[names::DIRECTORIES],
                Predicate::PathPrefix(query.directories.clone()),
            );
        }

        if !query.view_uuids.is_empty() {
            // On an application branch the branch uuid is itself the view.
            let view_uuids: Vec<&String> = match &query.branch_uuid {
                Some(branch) => vec![branch],
                None => query.view_uuids.iter().collect(),
            };
            let members: BTreeSet<String> = view_uuids
                .into_iter()
                .filter_map(|uuid| views.get(uuid))
                .flat_map(|view| view.members.iter().cloned())
                .collect();
            self.push(
                "viewUuids",
                &[],
                Predicate::Any(vec![
                    Predicate::any_of(Field::Project, members.iter().cloned()),
                    Predicate::any_of(Field::Branch, members),
                ]),
            );
            return;
        }

        if let Some(branch) = &query.branch_uuid {
            self.push("branchUuid", &[], Predicate::any_of(Field::Branch, [branch.clone()]));
        }
        if let Some(main) = query.main_branch {
            self.push(
                "mainBranch",
                &[],
                Predicate::Flag {
                    flag: Flag::MainBranch,
                    value: main,
                },
            );
        }
    }

    fn add_terms(&mut self, query: &IssueQuery) {
        if !query.severities.is_empty() {
            self.push(
                "severities",
                &[names::SEVERITIES],
                Predicate::All(vec![
                    Predicate::any_of(Field::Severity, query.severities.iter().map(|s| s.as_str())),
                    Predicate::Not(Box::new(Predicate::is_type(&[IssueType::SecurityHotspot]))),
                ]),
            );
        }
        self.push_keywords("statuses", &[names::STATUSES], Field::Status, query.statuses.iter().map(|s| s.as_str()));
        self.push_keywords(
            "resolutions",
            &[names::RESOLUTIONS],
            Field::Resolution,
            query.resolutions.iter().map(|r| r.as_str()),
        );
        if let Some(resolved) = query.resolved {
            self.push(
                "resolved",
                &[],
                Predicate::Exists {
                    field: Field::Resolution,
                    exists: resolved,
                },
            );
        }
        self.push_keywords(
            "issueStatuses",
            &[names::ISSUE_STATUSES],
            Field::IssueStatus,
            query.issue_statuses.iter().map(|s| s.as_str()),
        );
        self.push_keywords("types", &[names::TYPES], Field::Type, query.types.iter().map(|t| t.as_str()));
        self.push_keywords("scopes", &[names::SCOPES], Field::Scope, query.scopes.iter().map(|s| s.as_str()));
        self.push_keywords(
            "cleanCodeAttributeCategories",
            &[names::CLEAN_CODE_ATTRIBUTE_CATEGORIES],
            Field::CleanCodeAttributeCategory,
            query.clean_code_attribute_categories.iter().map(|c| c.as_str()),
        );

        self.push_any_of("rules", &[names::RULES], Field::Rule, &query.rules);
        self.push_any_of("complianceCategoryRules", &[], Field::Rule, &query.compliance_category_rules);
        self.push_any_of("languages", &[names::LANGUAGES], Field::Language, &query.languages);
        self.push_any_of("tags", &[names::TAGS], Field::Tag, &query.tags);
        self.push_any_of("authors", &[names::AUTHORS], Field::Author, &query.authors);
        self.push_any_of("assigneeUuids", &[names::ASSIGNEES], Field::Assignee, &query.assignee_uuids);
        if let Some(assigned) = query.assigned {
            self.push(
                "assigned",
                &[names::ASSIGNEES],
                Predicate::Exists {
                    field: Field::Assignee,
                    exists: assigned,
                },
            );
        }
        self.push_any_of("codeVariants", &[names::CODE_VARIANTS], Field::CodeVariant, &query.code_variants);
        self.push_any_of(
            "linkedTicketStatuses",
            &[names::LINKED_TICKET_STATUSES],
            Field::LinkedTicketStatus,
            &query.linked_ticket_statuses,
        );

        if let Some(value) = query.prioritized_rule {
            self.push(
                "prioritizedRule",
                &[],
                Predicate::Flag {
                    flag: Flag::PrioritizedRule,
                    value,
                },
            );
        }
        if let Some(value) = query.from_sonar_qube_update {
            self.push(
                "fromSonarQubeUpdate",
                &[],
                Predicate::Flag {
                    flag: Flag::FromSonarQubeUpdate,
                    value,
                },
            );
        }
    }

    fn add_dates(&mut self, query: &IssueQuery) {
        if query.created_after.is_some() || query.created_before.is_some() {
            self.push(
                "createdRange",
                &[],
                Predicate::CreatedRange {
                    after: query.created_after,
                    before: query.created_before,
                },
            );
        }
        if let Some(date) = query.created_at {
            self.push("createdAt", &[], Predicate::CreatedAt(date));
        }
        if !query.created_after_by_project_uuids.is_empty() {
            self.push(
                "createdAfterByProjectUuids",
                &[],
                Predicate::CreatedAfterByScope(query.created_after_by_project_uuids.clone()),
            );
        }
        if let Some(value) = query.new_code_on_reference {
            self.push(
                "newCodeOnReference",
                &[],
                Predicate::Flag {
                    flag: Flag::NewCodeReference,
                    value,
                },
            );
        }
        if !query.new_code_on_reference_by_project_uuids.is_empty() {
            self.push(
                "newCodeOnReferenceByProjectUuids",
                &[],
                Predicate::NewCodeByScope(query.new_code_on_reference_by_project_uuids.clone()),
            );
        }
    }

    fn push_security<F>(
        &mut self,
        name: &'static str,
        dimensions: &'static [&'static str],
        values: &BTreeSet<String>,
        predicate: F,
    ) where
        F: FnOnce(BTreeSet<String>) -> Predicate,
    {
        if values.is_empty() {
            return;
        }
        self.push(
            name,
            dimensions,
            Predicate::All(vec![Predicate::is_type(SECURITY_TYPES), predicate(values.clone())]),
        );
    }

    fn add_security(&mut self, query: &IssueQuery, standards: &SecurityStandards) {
        let any_of = |field: Field| move |values: BTreeSet<String>| Predicate::AnyOf { field, values };
        let prefix_or_exact =
            |field: Field| move |values: BTreeSet<String>| Predicate::PrefixOrExact { field, values };

        self.push_security("cwe", &[names::CWE], &query.cwe, any_of(Field::Cwe));
        self.push_security("owaspTop10", &[names::OWASP_TOP10], &query.owasp_top10, any_of(Field::OwaspTop10));
        self.push_security(
            "owaspTop10-2021",
            &[names::OWASP_TOP10_2021],
            &query.owasp_top10_2021,
            any_of(Field::OwaspTop10_2021),
        );
        let level = query.owasp_asvs_level();
        self.push_security("owaspAsvs-4.0", &[names::OWASP_ASVS_40], &query.owasp_asvs_40, |values| {
            Predicate::AnyOf {
                field: Field::OwaspAsvs40,
                values: standards.expand_asvs(&values, level),
            }
        });
        self.push_security("pciDss-3.2", &[names::PCI_DSS_32], &query.pci_dss_32, prefix_or_exact(Field::PciDss32));
        self.push_security("pciDss-4.0", &[names::PCI_DSS_40], &query.pci_dss_40, prefix_or_exact(Field::PciDss40));
        self.push_security("sansTop25", &[names::SANS_TOP25], &query.sans_top25, any_of(Field::SansTop25));
        self.push_security(
            "sonarsourceSecurity",
            &[names::SONARSOURCE_SECURITY],
            &query.sonarsource_security,
            any_of(Field::SonarsourceSecurity),
        );
        self.push_security(
            "stig-ASD_V5R3",
            &[names::STIG_ASD_V5R3],
            &query.stig_asd_v5r3,
            any_of(Field::StigAsdV5R3),
        );
    }

    fn add_impacts(&mut self, query: &IssueQuery) {
        let qualities = &query.impact_software_qualities;
        let severities = &query.impact_severities;
        match (qualities.is_empty(), severities.is_empty()) {
            (true, true) => {}
            (false, true) => self.push(
                "impactSoftwareQualities",
                &[names::IMPACT_SOFTWARE_QUALITIES],
                Predicate::any_of(Field::ImpactSoftwareQuality, qualities.iter().map(|q| q.as_str())),
            ),
            (true, false) => self.push(
                "impactSeverities",
                &[names::IMPACT_SEVERITIES],
                Predicate::any_of(Field::ImpactSeverity, severities.iter().map(|s| s.as_str())),
            ),
            (false, false) => self.push(
                "impacts",
                &[names::IMPACT_SOFTWARE_QUALITIES, names::IMPACT_SEVERITIES],
                Predicate::Impacts {
                    qualities: qualities.clone(),
                    severities: severities.clone(),
                },
            ),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn predicates(&self) -> &[ScopedPredicate] {
        &self.predicates
    }

    pub fn matches(&self, issue: &Issue) -> bool {
        self.predicates.iter().all(|p| p.predicate.matches(issue))
    }

    /// Matches every predicate except those constraining `dimension`.
    pub fn matches_except(&self, issue: &Issue, dimension: &str) -> bool {
        self.predicates
            .iter()
            .filter(|p| !p.dimensions.contains(&dimension))
            .all(|p| p.predicate.matches(issue))
    }

    /// Whether any predicate constrains `dimension`.
    pub fn constrains(&self, dimension: &str) -> bool {
        self.predicates.iter().any(|p| p.dimensions.contains(&dimension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::issue::{IssueScope, Resolution, Severity, Status};
    use crate::services::test_support::{make_issue, IssueOverrides};
    use chrono::TimeZone;

    fn compile(query: IssueQuery) -> FilterSet {
        FilterSet::compile(&query, &BTreeMap::new(), &SecurityStandards::builtin())
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn empty_query_matches_everything() {
        let filters = compile(IssueQuery::builder().build().unwrap());
        assert!(filters.is_empty());
        assert!(filters.matches(&make_issue(IssueOverrides::default())));
    }

    #[test]
    fn empty_issue_keys_matches_nothing() {
        let filters = compile(IssueQuery::builder().issue_keys(Vec::<String>::new()).build().unwrap());
        assert!(!filters.matches(&make_issue(IssueOverrides::default())));
    }

    #[test]
    fn severities_filter_skips_hotspots() {
        let filters = compile(
            IssueQuery::builder()
                .severities([Severity::Major])
                .build()
                .unwrap(),
        );
        let bug = make_issue(IssueOverrides {
            severity: Some(Severity::Major),
            ..Default::default()
        });
        let hotspot = make_issue(IssueOverrides {
            severity: Some(Severity::Major),
            issue_type: Some(IssueType::SecurityHotspot),
            status: Some(Status::ToReview),
            ..Default::default()
        });
        assert!(filters.matches(&bug));
        assert!(!filters.matches(&hotspot));
    }

    #[test]
    fn directory_filter_matches_descendants_only() {
        let filters = compile(IssueQuery::builder().directories(["src/main"]).build().unwrap());
        let dir = |d: &str| {
            make_issue(IssueOverrides {
                directory_path: Some(d.to_string()),
                ..Default::default()
            })
        };
        assert!(filters.matches(&dir("src/main")));
        assert!(filters.matches(&dir("src/main/java")));
        assert!(!filters.matches(&dir("src/mainframe")));
        assert!(!filters.matches(&dir("src")));
    }

    #[test]
    fn creation_window_is_half_open() {
        let filters = compile(
            IssueQuery::builder()
                .created_after(at(1), true)
                .created_before(at(3))
                .build()
                .unwrap(),
        );
        let created = |d| {
            make_issue(IssueOverrides {
                created_at: Some(d),
                ..Default::default()
            })
        };
        assert!(filters.matches(&created(at(1))));
        assert!(filters.matches(&created(at(2))));
        assert!(!filters.matches(&created(at(3))));

        let exclusive = compile(IssueQuery::builder().created_after(at(1), false).build().unwrap());
        assert!(!exclusive.matches(&created(at(1))));
    }

    #[test]
    fn pci_top_level_matches_prefix() {
        let filters = compile(IssueQuery::builder().pci_dss_32(["3", "6.5.1"]).build().unwrap());
        let tagged = |tag: &str| {
            let mut issue = make_issue(IssueOverrides {
                issue_type: Some(IssueType::Vulnerability),
                ..Default::default()
            });
            issue.security.pci_dss_32.insert(tag.to_string());
            issue
        };
        assert!(filters.matches(&tagged("3")));
        assert!(filters.matches(&tagged("3.2.4")));
        assert!(!filters.matches(&tagged("33.1")));
        assert!(filters.matches(&tagged("6.5.1")));
        assert!(!filters.matches(&tagged("6.5.10")));
    }

    #[test]
    fn security_filters_only_match_security_types() {
        let filters = compile(IssueQuery::builder().cwe(["89"]).build().unwrap());
        let mut smell = make_issue(IssueOverrides::default());
        smell.security.cwe.insert("89".to_string());
        assert!(!filters.matches(&smell));
        smell.issue_type = IssueType::Vulnerability;
        assert!(filters.matches(&smell));
    }

    #[test]
    fn impacts_filter_pairs_quality_and_severity() {
        let filters = compile(
            IssueQuery::builder()
                .impact_software_qualities([SoftwareQuality::Security])
                .impact_severities([ImpactSeverity::High])
                .build()
                .unwrap(),
        );
        let mut issue = make_issue(IssueOverrides::default());
        issue.impacts.insert(SoftwareQuality::Security, ImpactSeverity::Low);
        issue.impacts.insert(SoftwareQuality::Reliability, ImpactSeverity::High);
        assert!(!filters.matches(&issue));
        issue.impacts.insert(SoftwareQuality::Security, ImpactSeverity::High);
        assert!(filters.matches(&issue));
    }

    #[test]
    fn unknown_view_matches_nothing() {
        let views: BTreeMap<String, View> =
            [("pf".to_string(), View::new("pf", ["p1"]))].into_iter().collect();
        let query = IssueQuery::builder().view_uuids(["missing"]).build().unwrap();
        let filters = FilterSet::compile(&query, &views, &SecurityStandards::builtin());
        assert!(!filters.matches(&make_issue(IssueOverrides {
            project_uuid: Some("p1".to_string()),
            ..Default::default()
        })));

        let query = IssueQuery::builder().view_uuids(["pf"]).build().unwrap();
        let filters = FilterSet::compile(&query, &views, &SecurityStandards::builtin());
        assert!(filters.matches(&make_issue(IssueOverrides {
            project_uuid: Some("p1".to_string()),
            ..Default::default()
        })));
    }

    #[test]
    fn application_branch_is_expanded_as_view() {
        let views: BTreeMap<String, View> =
            [("app-branch".to_string(), View::new("app-branch", ["b7"]))].into_iter().collect();
        let query = IssueQuery::builder()
            .view_uuids(["app"])
            .branch_uuid("app-branch")
            .build()
            .unwrap();
        let filters = FilterSet::compile(&query, &views, &SecurityStandards::builtin());
        assert!(filters.matches(&make_issue(IssueOverrides {
            branch_uuid: Some("b7".to_string()),
            ..Default::default()
        })));
    }

    #[test]
    fn on_component_only_ignores_project_scope() {
        let filters = compile(
            IssueQuery::builder()
                .component_uuids(["c1"])
                .project_uuids(["other"])
                .on_component_only(true)
                .build()
                .unwrap(),
        );
        let issue = make_issue(IssueOverrides {
            component_uuid: Some("c1".to_string()),
            ..Default::default()
        });
        assert!(filters.matches(&issue));
    }

    #[test]
    fn resolved_and_assigned_flags() {
        let filters = compile(
            IssueQuery::builder()
                .resolved(false)
                .assigned(true)
                .scopes([IssueScope::Main])
                .build()
                .unwrap(),
        );
        let mut issue = make_issue(IssueOverrides {
            assignee_uuid: Some("u1".to_string()),
            ..Default::default()
        });
        assert!(filters.matches(&issue));
        issue.resolution = Some(Resolution::Fixed);
        assert!(!filters.matches(&issue));
    }

    #[test]
    fn created_after_by_project_excludes_unlisted_projects() {
        let bounds: BTreeMap<String, PeriodStart> =
            [("p1".to_string(), PeriodStart::inclusive(at(2)))].into_iter().collect();
        let filters = compile(
            IssueQuery::builder()
                .created_after_by_project_uuids(bounds)
                .build()
                .unwrap(),
        );
        let issue = |project: &str, day| {
            make_issue(IssueOverrides {
                project_uuid: Some(project.to_string()),
                created_at: Some(at(day)),
                ..Default::default()
            })
        };
        assert!(filters.matches(&issue("p1", 2)));
        assert!(!filters.matches(&issue("p1", 1)));
        assert!(!filters.matches(&issue("p2", 5)));
    }

    #[test]
    fn matches_except_drops_own_dimension() {
        let filters = compile(
            IssueQuery::builder()
                .project_uuids(["p1"])
                .severities([Severity::Blocker])
                .build()
                .unwrap(),
        );
        let issue = make_issue(IssueOverrides {
            project_uuid: Some("p2".to_string()),
            severity: Some(Severity::Blocker),
            ..Default::default()
        });
        assert!(!filters.matches(&issue));
        assert!(filters.matches_except(&issue, names::PROJECTS));
        assert!(!filters.matches_except(&issue, names::SEVERITIES));
        assert!(filters.constrains(names::PROJECTS));
        assert!(!filters.constrains(names::TAGS));
    }

    #[test]
    fn portfolio_scope_survives_every_facet_dimension() {
        let views: BTreeMap<String, View> =
            [("pf".to_string(), View::new("pf", ["in-pf"]))].into_iter().collect();
        let query = IssueQuery::builder().view_uuids(["pf"]).build().unwrap();
        let filters = FilterSet::compile(&query, &views, &SecurityStandards::builtin());
        let outside = make_issue(IssueOverrides {
            project_uuid: Some("outside".to_string()),
            ..Default::default()
        });
        for dimension in [names::PROJECTS, names::FILES, names::DIRECTORIES, names::SEVERITIES] {
            assert!(!filters.matches_except(&outside, dimension), "{dimension}");
        }
        assert!(!filters.constrains(names::PROJECTS));
    }

    #[test]
    fn exact_creation_date() {
        let filters = compile(IssueQuery::builder().created_at(at(2)).build().unwrap());
        let created = |d| {
            make_issue(IssueOverrides {
                created_at: Some(d),
                ..Default::default()
            })
        };
        assert!(filters.matches(&created(at(2))));
        assert!(!filters.matches(&created(at(2) + chrono::Duration::milliseconds(1))));
        assert!(!filters.matches(&created(at(1))));
    }

    #[test]
    fn new_code_on_reference_flag_and_per_project_set() {
        let issue = |project: &str, new_code: bool| {
            make_issue(IssueOverrides {
                project_uuid: Some(project.to_string()),
                is_new_code_reference: Some(new_code),
                ..Default::default()
            })
        };

        let flag = compile(IssueQuery::builder().new_code_on_reference(true).build().unwrap());
        assert!(flag.matches(&issue("p1", true)));
        assert!(!flag.matches(&issue("p1", false)));

        let by_project = compile(
            IssueQuery::builder()
                .new_code_on_reference_by_project_uuids(["p1"])
                .build()
                .unwrap(),
        );
        assert!(by_project.matches(&issue("p1", true)));
        assert!(!by_project.matches(&issue("p1", false)));
        assert!(!by_project.matches(&issue("p2", true)));

        let mut on_branch = issue("p2", true);
        on_branch.branch_uuid = "p1".to_string();
        assert!(by_project.matches(&on_branch));
    }

    #[test]
    fn code_variants_and_linked_ticket_statuses() {
        let filters = compile(
            IssueQuery::builder()
                .code_variants(["linux"])
                .linked_ticket_statuses(["OPEN"])
                .build()
                .unwrap(),
        );
        let mut issue = make_issue(IssueOverrides::default());
        issue.code_variants.insert("windows".to_string());
        issue.linked_ticket_status = Some("OPEN".to_string());
        assert!(!filters.matches(&issue));

        issue.code_variants.insert("linux".to_string());
        assert!(filters.matches(&issue));

        issue.linked_ticket_status = None;
        assert!(!filters.matches(&issue));
        assert!(filters.constrains(names::CODE_VARIANTS));
        assert!(filters.constrains(names::LINKED_TICKET_STATUSES));
    }

    #[test]
    fn prioritized_rule_and_sonarqube_update_flags() {
        let filters = compile(
            IssueQuery::builder()
                .prioritized_rule(true)
                .from_sonar_qube_update(false)
                .build()
                .unwrap(),
        );
        let mut issue = make_issue(IssueOverrides::default());
        assert!(!filters.matches(&issue));
        issue.prioritized_rule = true;
        assert!(filters.matches(&issue));
        issue.from_sonar_qube_update = true;
        assert!(!filters.matches(&issue));
    }

    #[test]
    fn stig_filter_matches_security_issues_with_the_id() {
        let filters = compile(IssueQuery::builder().stig_asd_v5r3(["V-222607"]).build().unwrap());
        let mut issue = make_issue(IssueOverrides::default());
        issue.security.stig_asd_v5r3.insert("V-222607".to_string());
        assert!(!filters.matches(&issue));

        issue.issue_type = IssueType::Vulnerability;
        assert!(filters.matches(&issue));

        issue.security.stig_asd_v5r3 = ["V-222608".to_string()].into_iter().collect();
        assert!(!filters.matches(&issue));
    }

    #[test]
    fn asvs_category_expands_to_requirements_of_the_level() {
        let tagged = |requirement: &str| {
            let mut issue = make_issue(IssueOverrides {
                issue_type: Some(IssueType::Vulnerability),
                ..Default::default()
            });
            issue.security.owasp_asvs_40.insert(requirement.to_string());
            issue
        };

        let level1 = compile(
            IssueQuery::builder()
                .owasp_asvs_40(["2"])
                .owasp_asvs_level(1)
                .build()
                .unwrap(),
        );
        assert!(level1.matches(&tagged("2.1.1")));
        assert!(!level1.matches(&tagged("2.4.1")));
        assert!(!level1.matches(&tagged("3.1.1")));

        let level2 = compile(
            IssueQuery::builder()
                .owasp_asvs_40(["2"])
                .owasp_asvs_level(2)
                .build()
                .unwrap(),
        );
        assert!(level2.matches(&tagged("2.4.1")));

        let requirement = compile(
            IssueQuery::builder()
                .owasp_asvs_40(["2.4.1"])
                .owasp_asvs_level(1)
                .build()
                .unwrap(),
        );
        assert!(!requirement.matches(&tagged("2.4.1")));
    }
}
