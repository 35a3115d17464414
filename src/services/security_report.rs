//! Security standards rollup: per-category vulnerability and hotspot
//! statistics, with optional CWE or sub-requirement children.
//!
//! Every function receives the issues already restricted to the report
//! scope and to the security population (see [`in_population`]).

use std::collections::BTreeSet;

use rayon::prelude::*;

use super::security_standards::{category_cmp, SecurityStandards};
use crate::models::issue::{HotspotReview, Issue, UNKNOWN_STANDARD};
use crate::models::statistics::{security_review_rating, SecurityStandardCategoryStatistics};

type Node = SecurityStandardCategoryStatistics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwaspTop10Version {
    Y2017,
    Y2021,
}

impl OwaspTop10Version {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Y2017 => "2017",
            Self::Y2021 => "2021",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PciDssVersion {
    V3_2,
    V4_0,
}

impl PciDssVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V3_2 => "3.2",
            Self::V4_0 => "4.0",
        }
    }
}

/// Unresolved vulnerabilities and hotspots in a reportable review state.
pub fn in_population(issue: &Issue) -> bool {
    issue.is_unresolved_vulnerability() || issue.hotspot_review().is_some()
}

/// Folds the four metrics over `issues` into a leaf node.
fn tally<'a, I>(category: impl Into<String>, issues: I) -> Node
where
    I: IntoIterator<Item = &'a Issue>,
{
    let mut node = Node::empty(category);
    for issue in issues {
        if issue.is_unresolved_vulnerability() {
            node.vulnerabilities += 1;
            node.vulnerability_rating = node.vulnerability_rating.max(Some(issue.severity.rank()));
        }
        match issue.hotspot_review() {
            Some(HotspotReview::ToReview) => node.to_review_security_hotspots += 1,
            Some(HotspotReview::Reviewed) => node.reviewed_security_hotspots += 1,
            // In review: part of the population, in neither counter.
            Some(HotspotReview::InReview) | None => {}
        }
    }
    node.security_review_rating =
        security_review_rating(node.to_review_security_hotspots, node.reviewed_security_hotspots);
    node
}

fn members<'a, F>(issues: &[&'a Issue], member: F) -> Vec<&'a Issue>
where
    F: Fn(&Issue) -> bool,
{
    issues.iter().copied().filter(|&i| member(i)).collect()
}

fn sort_children(children: &mut [Node]) {
    children.sort_by(|a, b| category_cmp(&a.category, &b.category));
}

/// One child per CWE carried by `issues`, optionally limited to `allowed`,
/// plus an `"unknown"` child for hotspots without CWE.
fn cwe_children(issues: &[&Issue], allowed: Option<&[String]>, with_unknown: bool) -> Vec<Node> {
    let cwes: BTreeSet<&str> = issues
        .iter()
        .flat_map(|i| i.security.cwe.iter().map(String::as_str))
        .filter(|cwe| *cwe != UNKNOWN_STANDARD)
        .filter(|cwe| allowed.map_or(true, |list| list.iter().any(|a| a.as_str() == *cwe)))
        .collect();

    let mut children: Vec<Node> = cwes
        .into_iter()
        .map(|cwe| tally(cwe, members(issues, |i| i.security.cwe.contains(cwe))))
        .collect();

    if with_unknown {
        let unknown = members(issues, |i| {
            i.security.cwe.contains(UNKNOWN_STANDARD) || (i.is_hotspot() && i.security.cwe.is_empty())
        });
        if !unknown.is_empty() {
            children.push(tally(UNKNOWN_STANDARD, unknown));
        }
    }
    sort_children(&mut children);
    children
}

/// OWASP Top 10 categories `a1`..`a10`.
pub fn owasp_top10(issues: &[&Issue], version: OwaspTop10Version, include_cwe: bool) -> Vec<Node> {
    (1..=10u8)
        .into_par_iter()
        .map(|n| {
            let category = format!("a{}", n);
            let in_category = members(issues, |i| {
                let tags = match version {
                    OwaspTop10Version::Y2017 => &i.security.owasp_top10,
                    OwaspTop10Version::Y2021 => &i.security.owasp_top10_2021,
                };
                tags.contains(&category)
            });
            let mut node = tally(category.as_str(), in_category.iter().copied());
            if include_cwe {
                node.children = cwe_children(&in_category, None, true);
            }
            node.version = Some(version.as_str().to_string());
            node
        })
        .collect()
}

/// SANS Top 25 categories, children limited to each category's CWEs.
pub fn sans_top25(issues: &[&Issue], standards: &SecurityStandards, include_cwe: bool) -> Vec<Node> {
    standards
        .sans_top25
        .par_iter()
        .map(|entry| {
            let in_category = members(issues, |i| i.security.sans_top25.contains(&entry.category));
            let mut node = tally(entry.category.as_str(), in_category.iter().copied());
            if include_cwe {
                node.children = cwe_children(&in_category, Some(&entry.cwes), false);
            }
            node
        })
        .collect()
}

/// SonarSource security categories, children limited to each category's CWEs.
pub fn sonarsource(issues: &[&Issue], standards: &SecurityStandards, include_cwe: bool) -> Vec<Node> {
    standards
        .sonarsource_security
        .par_iter()
        .map(|entry| {
            let in_category = members(issues, |i| {
                i.security.sonarsource_security.as_deref() == Some(entry.category.as_str())
            });
            let mut node = tally(entry.category.as_str(), in_category.iter().copied());
            if include_cwe {
                node.children = cwe_children(&in_category, Some(&entry.cwes), false);
            }
            node
        })
        .collect()
}

/// One node per CWE Top 25 year, with every listed CWE as a child.
pub fn cwe_top25(issues: &[&Issue], standards: &SecurityStandards) -> Vec<Node> {
    standards
        .cwe_top25
        .par_iter()
        .map(|(year, cwes)| {
            let listed = |i: &Issue| cwes.iter().any(|cwe| i.security.cwe.contains(cwe));
            let mut node = tally(year.as_str(), issues.iter().copied().filter(|&i| listed(i)));
            let mut children: Vec<Node> = cwes
                .iter()
                .map(|cwe| tally(cwe.as_str(), members(issues, |i| i.security.cwe.contains(cwe))))
                .collect();
            sort_children(&mut children);
            node.children = children;
            node
        })
        .collect()
}

fn pci_tags(issue: &Issue, version: PciDssVersion) -> &BTreeSet<String> {
    match version {
        PciDssVersion::V3_2 => &issue.security.pci_dss_32,
        PciDssVersion::V4_0 => &issue.security.pci_dss_40,
    }
}

fn under(tag: &str, category: &str) -> bool {
    tag == category
        || tag
            .strip_prefix(category)
            .is_some_and(|rest| rest.starts_with('.'))
}

/// PCI-DSS requirements `1`..`12`; children are the dotted tags present.
pub fn pci_dss(issues: &[&Issue], version: PciDssVersion) -> Vec<Node> {
    (1..=12u8)
        .into_par_iter()
        .map(|n| {
            let category = n.to_string();
            let in_category = members(issues, |i| {
                pci_tags(i, version).iter().any(|tag| under(tag, &category))
            });
            let subs: BTreeSet<&str> = in_category
                .iter()
                .flat_map(|i| pci_tags(i, version).iter().map(String::as_str))
                .filter(|tag| tag.starts_with(&format!("{}.", category)))
                .collect();

            let mut node = tally(category.as_str(), in_category.iter().copied());
            let mut children: Vec<Node> = subs
                .into_iter()
                .map(|sub| {
                    tally(
                        sub,
                        members(&in_category, |i| pci_tags(i, version).contains(sub)),
                    )
                })
                .collect();
            sort_children(&mut children);
            node.children = children;
            node.version = Some(version.as_str().to_string());
            node
        })
        .collect()
}

/// OWASP ASVS 4.0 categories `1`..`14` at `level`; children are the
/// category requirements included at that level.
pub fn owasp_asvs(issues: &[&Issue], standards: &SecurityStandards, level: u8) -> Vec<Node> {
    (1..=14u8)
        .into_par_iter()
        .map(|n| {
            let category = n.to_string();
            let requirements = standards.asvs_requirements(&category, level);
            let in_category = members(issues, |i| {
                requirements.iter().any(|req| i.security.owasp_asvs_40.contains(req))
            });
            let mut node = tally(category.as_str(), in_category.iter().copied());
            node.children = requirements
                .iter()
                .map(|req| {
                    tally(
                        req.as_str(),
                        members(&in_category, |i| i.security.owasp_asvs_40.contains(req)),
                    )
                })
                .collect();
            node.version = Some("4.0".to_string());
            node
        })
        .collect()
}

/// Single `l<level>` node over every requirement included at `level`, with
/// one child per such requirement present in the scope.
pub fn owasp_asvs_by_level(issues: &[&Issue], standards: &SecurityStandards, level: u8) -> Node {
    let requirements = standards.asvs_requirements_at(level);
    let in_level = members(issues, |i| !i.security.owasp_asvs_40.is_disjoint(&requirements));
    let mut node = tally(format!("l{}", level), in_level.iter().copied());

    let present: BTreeSet<&str> = in_level
        .iter()
        .flat_map(|i| i.security.owasp_asvs_40.iter().map(String::as_str))
        .filter(|req| requirements.contains(*req))
        .collect();
    let mut children: Vec<Node> = present
        .into_iter()
        .map(|req| tally(req, members(&in_level, |i| i.security.owasp_asvs_40.contains(req))))
        .collect();
    sort_children(&mut children);
    node.children = children;
    node.version = Some("4.0".to_string());
    node
}

/// One node per STIG ASD V5R3 id present in the scope.
pub fn stig(issues: &[&Issue]) -> Vec<Node> {
    let ids: BTreeSet<&str> = issues
        .iter()
        .flat_map(|i| i.security.stig_asd_v5r3.iter().map(String::as_str))
        .filter(|id| *id != UNKNOWN_STANDARD)
        .collect();
    let mut nodes: Vec<Node> = ids
        .into_par_iter()
        .map(|id| tally(id, members(issues, |i| i.security.stig_asd_v5r3.contains(id))))
        .collect();
    sort_children(&mut nodes);
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::issue::{IssueType, Resolution, SecurityCategories, Severity, Status};
    use crate::services::test_support::{make_issue, IssueOverrides};

    fn vulnerability(severity: Severity, security: SecurityCategories) -> Issue {
        make_issue(IssueOverrides {
            issue_type: Some(IssueType::Vulnerability),
            severity: Some(severity),
            security: Some(security),
            ..Default::default()
        })
    }

    fn hotspot(status: Status, resolution: Option<Resolution>, security: SecurityCategories) -> Issue {
        make_issue(IssueOverrides {
            issue_type: Some(IssueType::SecurityHotspot),
            status: Some(status),
            resolution,
            security: Some(security),
            ..Default::default()
        })
    }

    fn owasp(category: &str, cwes: &[&str]) -> SecurityCategories {
        SecurityCategories {
            owasp_top10: [category.to_string()].into(),
            cwe: cwes.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    fn population(issues: &[Issue]) -> Vec<&Issue> {
        issues.iter().filter(|i| in_population(i)).collect()
    }

    #[test]
    fn owasp_rollup_counts_and_ratings() {
        let issues = vec![
            vulnerability(Severity::Minor, owasp("a1", &["89"])),
            vulnerability(Severity::Critical, owasp("a1", &["79"])),
            hotspot(Status::ToReview, None, owasp("a1", &[])),
            hotspot(Status::Reviewed, Some(Resolution::Fixed), owasp("a1", &["89"])),
            // Closed without review: outside the population.
            hotspot(Status::Closed, Some(Resolution::Removed), owasp("a1", &["89"])),
        ];
        let report = owasp_top10(&population(&issues), OwaspTop10Version::Y2017, true);
        assert_eq!(report.len(), 10);

        let a1 = &report[0];
        assert_eq!(a1.category, "a1");
        assert_eq!(a1.vulnerabilities, 2);
        assert_eq!(a1.vulnerability_rating, Some(4));
        assert_eq!(a1.to_review_security_hotspots, 1);
        assert_eq!(a1.reviewed_security_hotspots, 1);
        assert_eq!(a1.security_review_rating, 3);

        let children: Vec<&str> = a1.children.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(children, vec!["79", "89", "unknown"]);
        assert_eq!(a1.child("unknown").unwrap().to_review_security_hotspots, 1);

        let a2 = &report[1];
        assert_eq!(a2.vulnerabilities, 0);
        assert_eq!(a2.vulnerability_rating, None);
        assert_eq!(a2.security_review_rating, 1);
    }

    #[test]
    fn resolved_vulnerabilities_are_not_counted() {
        let mut fixed = vulnerability(Severity::Blocker, owasp("a3", &[]));
        fixed.resolution = Some(Resolution::Fixed);
        let issues = vec![fixed];
        let report = owasp_top10(&population(&issues), OwaspTop10Version::Y2017, false);
        assert_eq!(report[2].vulnerabilities, 0);
        assert!(report[2].children.is_empty());
    }

    #[test]
    fn in_review_hotspots_count_in_neither_counter() {
        let issues = vec![hotspot(Status::InReview, None, owasp("a5", &[]))];
        let scoped = population(&issues);
        assert_eq!(scoped.len(), 1);
        let a5 = &owasp_top10(&scoped, OwaspTop10Version::Y2017, false)[4];
        assert_eq!(a5.to_review_security_hotspots, 0);
        assert_eq!(a5.reviewed_security_hotspots, 0);
    }

    #[test]
    fn sans_children_are_limited_to_category_cwes() {
        let security = SecurityCategories {
            sans_top25: ["insecure-interaction".to_string()].into(),
            cwe: ["89".to_string(), "22".to_string()].into(),
            ..Default::default()
        };
        let issues = vec![vulnerability(Severity::Major, security)];
        let report = sans_top25(&population(&issues), &SecurityStandards::builtin(), true);
        let interaction = report
            .iter()
            .find(|n| n.category == "insecure-interaction")
            .unwrap();
        let children: Vec<&str> = interaction.children.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(children, vec!["89"]);
    }

    #[test]
    fn cwe_top25_zero_fills_listed_cwes() {
        let security = SecurityCategories {
            cwe: ["79".to_string()].into(),
            ..Default::default()
        };
        let issues = vec![vulnerability(Severity::Major, security)];
        let report = cwe_top25(&population(&issues), &SecurityStandards::builtin());
        let y2022 = report.iter().find(|n| n.category == "2022").unwrap();
        assert_eq!(y2022.vulnerabilities, 1);
        assert_eq!(y2022.children.len(), 25);
        assert_eq!(y2022.child("79").unwrap().vulnerabilities, 1);
        assert_eq!(y2022.child("787").unwrap().vulnerabilities, 0);
    }

    #[test]
    fn pci_children_are_dotted_tags() {
        let security = SecurityCategories {
            pci_dss_32: ["6.5.1".to_string(), "6.5.10".to_string()].into(),
            ..Default::default()
        };
        let issues = vec![vulnerability(Severity::Major, security)];
        let report = pci_dss(&population(&issues), PciDssVersion::V3_2);
        assert_eq!(report.len(), 12);
        let six = &report[5];
        assert_eq!(six.category, "6");
        assert_eq!(six.vulnerabilities, 1);
        let children: Vec<&str> = six.children.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(children, vec!["6.5.1", "6.5.10"]);
        assert!(report[0].children.is_empty());
    }

    #[test]
    fn asvs_by_category_and_level() {
        let security = SecurityCategories {
            owasp_asvs_40: ["2.4.1".to_string()].into(),
            ..Default::default()
        };
        let issues = vec![vulnerability(Severity::Major, security)];
        let scoped = population(&issues);
        let standards = SecurityStandards::builtin();

        let level1 = owasp_asvs(&scoped, &standards, 1);
        assert_eq!(level1.len(), 14);
        assert_eq!(level1[1].vulnerabilities, 0);

        let level2 = owasp_asvs(&scoped, &standards, 2);
        assert_eq!(level2[1].vulnerabilities, 1);
        assert_eq!(level2[1].child("2.4.1").unwrap().vulnerabilities, 1);

        assert_eq!(owasp_asvs_by_level(&scoped, &standards, 1).vulnerabilities, 0);
        let l3 = owasp_asvs_by_level(&scoped, &standards, 3);
        assert_eq!(l3.category, "l3");
        assert_eq!(l3.vulnerabilities, 1);
        assert_eq!(l3.children.len(), 1);
        assert_eq!(l3.child("2.4.1").unwrap().vulnerabilities, 1);
    }

    #[test]
    fn asvs_by_level_children_are_requirements_present_at_the_level() {
        let tagged = |reqs: &[&str]| SecurityCategories {
            owasp_asvs_40: reqs.iter().map(|r| r.to_string()).collect(),
            ..Default::default()
        };
        let issues = vec![
            vulnerability(Severity::Major, tagged(&["10.3.2", "2.4.1"])),
            vulnerability(Severity::Blocker, tagged(&["2.1.1", "10.3.2"])),
            vulnerability(Severity::Minor, tagged(&["9.1.1"])),
        ];
        let scoped = population(&issues);
        let standards = SecurityStandards::builtin();

        let l1 = owasp_asvs_by_level(&scoped, &standards, 1);
        assert_eq!(l1.vulnerabilities, 3);
        let categories: Vec<&str> = l1.children.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(categories, vec!["2.1.1", "9.1.1", "10.3.2"]);
        assert_eq!(l1.child("10.3.2").unwrap().vulnerabilities, 2);
        assert_eq!(l1.child("10.3.2").unwrap().vulnerability_rating, Some(5));
        assert!(l1.child("2.4.1").is_none());

        let l2 = owasp_asvs_by_level(&scoped, &standards, 2);
        assert_eq!(l2.children.len(), 4);
        assert_eq!(l2.children[1].category, "2.4.1");
    }

    #[test]
    fn stig_has_one_node_per_id() {
        let tagged = |ids: &[&str]| SecurityCategories {
            stig_asd_v5r3: ids.iter().map(|i| i.to_string()).collect(),
            ..Default::default()
        };
        let issues = vec![
            vulnerability(Severity::Major, tagged(&["V-222400", "V-222602"])),
            vulnerability(Severity::Blocker, tagged(&["V-222602"])),
        ];
        let report = stig(&population(&issues));
        assert_eq!(report.len(), 2);
        assert_eq!(report[1].category, "V-222602");
        assert_eq!(report[1].vulnerabilities, 2);
        assert_eq!(report[1].vulnerability_rating, Some(5));
    }
}
