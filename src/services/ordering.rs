//! Result orderer: deterministic comparators for each sort key.

use std::cmp::Ordering;

use crate::models::issue::Issue;
use crate::models::query::{IssueQuery, SortField};

/// `None` sorts before any value.
fn none_first<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    a.cmp(b)
}

fn by_key(a: &Issue, b: &Issue) -> Ordering {
    a.key.cmp(&b.key)
}

/// Compares two issues on one sort field, ascending, ending with the issue key.
pub fn compare(field: SortField, a: &Issue, b: &Issue) -> Ordering {
    match field {
        SortField::Status => a.status.sort_rank().cmp(&b.status.sort_rank()),
        SortField::Severity => a.severity.cmp(&b.severity),
        SortField::CreationDate => a.created_at.cmp(&b.created_at),
        SortField::UpdateDate => a.updated_at.cmp(&b.updated_at),
        SortField::CloseDate => none_first(&a.closed_at, &b.closed_at),
        SortField::FileLine => a
            .project_uuid
            .cmp(&b.project_uuid)
            .then_with(|| a.file_path.cmp(&b.file_path))
            .then_with(|| none_first(&a.line, &b.line))
            .then_with(|| b.severity.cmp(&a.severity)),
    }
    .then_with(|| by_key(a, b))
}

/// Creation date, project, file, line, key; all ascending.
pub fn default_order(a: &Issue, b: &Issue) -> Ordering {
    a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.project_uuid.cmp(&b.project_uuid))
        .then_with(|| a.file_path.cmp(&b.file_path))
        .then_with(|| none_first(&a.line, &b.line))
        .then_with(|| by_key(a, b))
}

/// Comparator for a query: its sort field in its direction, else the default order.
pub fn comparator(query: &IssueQuery) -> impl Fn(&Issue, &Issue) -> Ordering {
    let sort = query.sort();
    let asc = query.asc();
    move |a, b| {
        let order = match sort {
            Some(field) => compare(field, a, b),
            None => default_order(a, b),
        };
        if asc {
            order
        } else {
            order.reverse()
        }
    }
}
