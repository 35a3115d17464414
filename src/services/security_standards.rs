//! Catalog of compliance-standard mappings used by filters and reports.
//!
//! The built-in tables cover CWE Top 25 lists per year, SANS Top 25 and
//! SonarSource category to CWE mappings, and OWASP ASVS 4.0 requirement
//! levels. A JSON file can replace any of these tables.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::IndexError;
use crate::models::issue::UNKNOWN_STANDARD;

const CWE_TOP25_2019: &[&str] = &[
    "119", "79", "20", "200", "125", "89", "416", "190", "352", "22", "78", "787", "287", "476",
    "732", "434", "611", "94", "798", "400", "772", "426", "502", "269", "295",
];
const CWE_TOP25_2020: &[&str] = &[
    "79", "787", "20", "125", "119", "89", "200", "416", "352", "78", "190", "22", "476", "287",
    "434", "732", "94", "522", "611", "798", "502", "269", "400", "306", "862",
];
const CWE_TOP25_2021: &[&str] = &[
    "787", "79", "125", "20", "78", "89", "416", "22", "352", "434", "306", "190", "502", "287",
    "476", "798", "119", "862", "276", "200", "522", "732", "611", "918", "77",
];
const CWE_TOP25_2022: &[&str] = &[
    "787", "79", "89", "20", "125", "78", "416", "22", "352", "434", "476", "502", "190", "287",
    "798", "862", "77", "306", "119", "276", "918", "362", "400", "611", "94",
];

const SANS_TOP25: &[(&str, &[&str])] = &[
    ("insecure-interaction", &["89", "78", "79", "434", "352", "601"]),
    (
        "risky-resource",
        &["120", "22", "494", "829", "676", "131", "134", "190"],
    ),
    (
        "porous-defenses",
        &[
            "306", "862", "798", "311", "807", "250", "863", "732", "327", "307", "759",
        ],
    ),
];

const SONARSOURCE_SECURITY: &[(&str, &[&str])] = &[
    ("sql-injection", &["89", "564", "943"]),
    ("command-injection", &["77", "78", "88", "214"]),
    ("path-traversal-injection", &["22"]),
    ("ldap-injection", &["90"]),
    ("xpath-injection", &["643"]),
    ("rce", &["94", "95"]),
    ("dos", &["400", "624"]),
    ("ssrf", &["918"]),
    ("csrf", &["352"]),
    (
        "xss",
        &["79", "80", "81", "82", "83", "84", "85", "86", "87"],
    ),
    ("log-injection", &["117"]),
    ("http-response-splitting", &["113"]),
    ("open-redirect", &["601"]),
    ("xxe", &["611", "827"]),
    ("object-injection", &["134", "470", "502"]),
    (
        "weak-cryptography",
        &[
            "295", "297", "321", "322", "323", "324", "325", "326", "327", "328", "330", "780",
        ],
    ),
    (
        "auth",
        &[
            "798", "640", "620", "549", "522", "521", "263", "262", "261", "259", "308",
        ],
    ),
    ("insecure-conf", &["102", "215", "346", "614", "489", "942"]),
    ("file-manipulation", &["97", "73"]),
    ("encrypt-data", &["311", "315", "319"]),
    ("traceability", &["778"]),
    ("permission", &["266", "269", "284", "668", "732"]),
    ("others", &[]),
];

/// Requirement id and the lowest ASVS level it belongs to.
#[rustfmt::skip]
const OWASP_ASVS_40: &[(&str, u8)] = &[
    ("1.1.1", 2), ("1.1.2", 2), ("1.2.1", 2), ("1.4.1", 2), ("1.5.1", 2), ("1.6.1", 2),
    ("1.8.1", 2), ("1.14.6", 2),
    ("2.1.1", 1), ("2.1.2", 1), ("2.1.7", 1), ("2.2.1", 1), ("2.3.1", 1), ("2.4.1", 2),
    ("2.4.2", 2), ("2.5.1", 1), ("2.7.1", 1), ("2.8.1", 1), ("2.9.1", 2), ("2.10.4", 2),
    ("3.1.1", 1), ("3.2.1", 1), ("3.2.3", 1), ("3.3.1", 1), ("3.4.1", 1), ("3.4.2", 1),
    ("3.5.2", 2), ("3.7.1", 1),
    ("4.1.1", 1), ("4.1.3", 1), ("4.2.1", 1), ("4.2.2", 1), ("4.3.1", 1), ("4.3.3", 2),
    ("5.1.1", 1), ("5.1.5", 1), ("5.2.1", 1), ("5.2.5", 1), ("5.3.1", 1), ("5.3.4", 1),
    ("5.3.8", 1), ("5.5.1", 1), ("5.5.2", 1),
    ("6.1.1", 2), ("6.2.1", 1), ("6.2.2", 2), ("6.2.5", 2), ("6.2.7", 3), ("6.3.1", 2),
    ("6.4.1", 2),
    ("7.1.1", 1), ("7.1.2", 1), ("7.1.3", 2), ("7.3.1", 2), ("7.4.1", 1),
    ("8.1.1", 2), ("8.2.1", 1), ("8.2.2", 1), ("8.3.1", 1), ("8.3.4", 1),
    ("9.1.1", 1), ("9.1.2", 1), ("9.2.1", 2), ("9.2.2", 2),
    ("10.1.1", 3), ("10.2.1", 2), ("10.2.2", 2), ("10.3.2", 1), ("10.3.3", 1),
    ("11.1.1", 1), ("11.1.2", 1), ("11.1.4", 1), ("11.1.8", 2),
    ("12.1.1", 1), ("12.3.1", 1), ("12.3.2", 1), ("12.4.1", 1), ("12.5.2", 1), ("12.6.1", 1),
    ("13.1.1", 1), ("13.1.3", 1), ("13.2.1", 1), ("13.2.3", 1), ("13.3.1", 1), ("13.4.1", 2),
    ("14.1.1", 2), ("14.2.1", 1), ("14.3.2", 1), ("14.4.1", 1), ("14.4.3", 1), ("14.5.1", 1),
];

/// Category id with the CWE ids it aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCwes {
    pub category: String,
    pub cwes: Vec<String>,
}

/// Mapping tables behind the security filters and reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityStandards {
    /// Year (`"2019"`..) to its ranked CWE list.
    pub cwe_top25: BTreeMap<String, Vec<String>>,
    pub sans_top25: Vec<CategoryCwes>,
    pub sonarsource_security: Vec<CategoryCwes>,
    /// Requirement id to the lowest level including it.
    pub owasp_asvs_40: BTreeMap<String, u8>,
}

/// On-disk override; absent tables keep their built-in value.
#[derive(Debug, Default, Deserialize)]
struct CatalogOverride {
    cwe_top25: Option<BTreeMap<String, Vec<String>>>,
    sans_top25: Option<Vec<CategoryCwes>>,
    sonarsource_security: Option<Vec<CategoryCwes>>,
    owasp_asvs_40: Option<BTreeMap<String, u8>>,
}

fn owned_categories(table: &[(&str, &[&str])]) -> Vec<CategoryCwes> {
    table
        .iter()
        .map(|(category, cwes)| CategoryCwes {
            category: category.to_string(),
            cwes: cwes.iter().map(|c| c.to_string()).collect(),
        })
        .collect()
}

fn owned_list(list: &[&str]) -> Vec<String> {
    list.iter().map(|c| c.to_string()).collect()
}

impl Default for SecurityStandards {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SecurityStandards {
    pub fn builtin() -> Self {
        let cwe_top25 = [
            ("2019", CWE_TOP25_2019),
            ("2020", CWE_TOP25_2020),
            ("2021", CWE_TOP25_2021),
            ("2022", CWE_TOP25_2022),
        ]
        .into_iter()
        .map(|(year, list)| (year.to_string(), owned_list(list)))
        .collect();

        Self {
            cwe_top25,
            sans_top25: owned_categories(SANS_TOP25),
            sonarsource_security: owned_categories(SONARSOURCE_SECURITY),
            owasp_asvs_40: OWASP_ASVS_40
                .iter()
                .map(|(req, level)| (req.to_string(), *level))
                .collect(),
        }
    }

    /// Built-in catalog, with tables replaced by those present in the JSON file.
    pub fn load(path: Option<&Path>) -> Result<Self, IndexError> {
        let mut standards = Self::builtin();
        let Some(path) = path else {
            return Ok(standards);
        };

        let raw = std::fs::read_to_string(path).map_err(|e| {
            IndexError::Internal(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let overrides: CatalogOverride = serde_json::from_str(&raw).map_err(|e| {
            IndexError::Internal(format!("Invalid catalog {}: {}", path.display(), e))
        })?;

        if let Some(table) = overrides.cwe_top25 {
            standards.cwe_top25 = table;
        }
        if let Some(table) = overrides.sans_top25 {
            standards.sans_top25 = table;
        }
        if let Some(table) = overrides.sonarsource_security {
            standards.sonarsource_security = table;
        }
        if let Some(table) = overrides.owasp_asvs_40 {
            standards.owasp_asvs_40 = table;
        }
        tracing::info!(path = %path.display(), "Loaded security standards catalog");
        Ok(standards)
    }

    pub fn cwe_top25(&self, year: &str) -> Option<&[String]> {
        self.cwe_top25.get(year).map(Vec::as_slice)
    }

    /// Requirements of one ASVS category (`"2"`) included at `level`, naturally ordered.
    pub fn asvs_requirements(&self, category: &str, level: u8) -> Vec<String> {
        let prefix = format!("{}.", category);
        let mut reqs: Vec<String> = self
            .owasp_asvs_40
            .iter()
            .filter(|(req, req_level)| req.starts_with(&prefix) && **req_level <= level)
            .map(|(req, _)| req.clone())
            .collect();
        reqs.sort_by(|a, b| natural_cmp(a, b));
        reqs
    }

    /// Every requirement included at `level`.
    pub fn asvs_requirements_at(&self, level: u8) -> BTreeSet<String> {
        self.owasp_asvs_40
            .iter()
            .filter(|(_, req_level)| **req_level <= level)
            .map(|(req, _)| req.clone())
            .collect()
    }

    /// Expands ASVS filter values: a category to its requirements at the
    /// level, a requirement to itself when the level includes it.
    pub fn expand_asvs(&self, values: &BTreeSet<String>, level: u8) -> BTreeSet<String> {
        let mut expanded = BTreeSet::new();
        for value in values {
            if value.contains('.') {
                if self
                    .owasp_asvs_40
                    .get(value)
                    .is_some_and(|req_level| *req_level <= level)
                {
                    expanded.insert(value.clone());
                }
            } else {
                expanded.extend(self.asvs_requirements(value, level));
            }
        }
        expanded
    }
}

/// Orders ids with digit runs compared numerically (`"2" < "10"`, `"1.2" < "1.10"`).
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a;
    let mut right = b;
    loop {
        match (left.is_empty(), right.is_empty()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }
        let (lchunk, lrest) = split_chunk(left);
        let (rchunk, rrest) = split_chunk(right);
        let order = match (lchunk.parse::<u64>(), rchunk.parse::<u64>()) {
            (Ok(l), Ok(r)) => l.cmp(&r).then_with(|| lchunk.len().cmp(&rchunk.len())),
            _ => lchunk.cmp(rchunk),
        };
        if order != Ordering::Equal {
            return order;
        }
        left = lrest;
        right = rrest;
    }
}

fn split_chunk(s: &str) -> (&str, &str) {
    let digits = s.starts_with(|c: char| c.is_ascii_digit());
    let end = s
        .find(|c: char| c.is_ascii_digit() != digits)
        .unwrap_or(s.len());
    s.split_at(end)
}

/// Natural order with the `"unknown"` bucket last.
pub fn category_cmp(a: &str, b: &str) -> Ordering {
    match (a == UNKNOWN_STANDARD, b == UNKNOWN_STANDARD) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => natural_cmp(a, b),
    }
}
