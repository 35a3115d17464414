//! Date histogram of issue creation dates with adaptive granularity.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use super::facets::{metric, FacetBucket};
use crate::models::issue::Issue;
use crate::models::query::IssueQuery;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Day,
    Week,
    Month,
    Year,
}

impl Granularity {
    /// Picks the bucket size from the span between both bounds. Twenty
    /// months count as 600 fixed days.
    pub fn for_bounds(lower: DateTime<Utc>, upper: DateTime<Utc>) -> Self {
        let span = upper - lower;
        if span < Duration::days(20) {
            Granularity::Day
        } else if span < Duration::weeks(20) {
            Granularity::Week
        } else if span < Duration::days(600) {
            Granularity::Month
        } else {
            Granularity::Year
        }
    }

    /// First day of the period containing `date`.
    pub fn truncate(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => date,
            Granularity::Week => {
                date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
            }
            Granularity::Month => date.with_day(1).unwrap_or(date),
            Granularity::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
        }
    }

    fn next(&self, start: NaiveDate) -> Option<NaiveDate> {
        match self {
            Granularity::Day => start.succ_opt(),
            Granularity::Week => start.checked_add_signed(Duration::weeks(1)),
            Granularity::Month => start.checked_add_months(Months::new(1)),
            Granularity::Year => start.checked_add_months(Months::new(12)),
        }
    }
}

/// Instant at which `date` starts in `tz`.
///
/// Ambiguous midnights take the earliest instant; midnights skipped by a
/// DST jump take the first valid hour.
fn local_midnight(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::default());
    (0..3)
        .find_map(|hour| {
            tz.from_local_datetime(&(midnight + Duration::hours(hour)))
                .earliest()
        })
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

fn local_date(tz: Tz, instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// `createdAt` facet over the filtered issues, open-ended queries running
/// up to the current instant.
pub fn created_at(matched: &[Arc<Issue>], query: &IssueQuery, tz: Tz) -> Option<Vec<FacetBucket>> {
    created_at_until(matched, query, tz, Utc::now())
}

/// `createdAt` facet with `now` as the upper bound when the query has no
/// `createdBefore`.
///
/// The lower bound is `createdAfter`, else the earliest matching creation
/// date. Returns `None` when there is no lower bound at all.
pub fn created_at_until(
    matched: &[Arc<Issue>],
    query: &IssueQuery,
    tz: Tz,
    now: DateTime<Utc>,
) -> Option<Vec<FacetBucket>> {
    let lower = match query.created_after() {
        Some(start) if start.inclusive => start.date,
        Some(start) => start.date + Duration::milliseconds(1),
        None => matched.iter().map(|i| i.created_at).min()?,
    };
    let upper = query.created_before().unwrap_or(now);

    let granularity = Granularity::for_bounds(lower, upper);
    let mut metrics: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for issue in matched {
        let bucket = granularity.truncate(local_date(tz, issue.created_at));
        *metrics.entry(bucket).or_insert(0) += metric(issue, query.facet_mode());
    }

    let mut buckets = Vec::new();
    let mut start = granularity.truncate(local_date(tz, lower));
    while local_midnight(tz, start) < upper {
        buckets.push(FacetBucket::new(
            start.format("%Y-%m-%d").to_string(),
            metrics.get(&start).copied().unwrap_or(0),
        ));
        match granularity.next(start) {
            Some(next) => start = next,
            None => break,
        }
    }

    tracing::debug!(
        granularity = ?granularity,
        buckets = buckets.len(),
        timezone = %tz,
        "Computed creation histogram"
    );
    Some(buckets)
}
