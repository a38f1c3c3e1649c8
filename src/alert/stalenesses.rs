/// Sample age and staleness.
///
/// Sentinel-5P passes over a site roughly once a day, but clouds and QA
/// masking mean the most recent *usable* sample is often days old. The
/// selector still returns it; this module tells callers how old it is so
/// they can frame it as "last available data" or flag it as too old to act
/// on.
///
/// # Clock injection
/// All functions accept a `today: NaiveDate` parameter rather than reading
/// the clock.

use chrono::NaiveDate;

use crate::model::LatestSample;

/// Whole days between `observed_on` and `today`. Negative if the sample is
/// dated in the future (clock skew on either side).
pub fn age_days(observed_on: NaiveDate, today: NaiveDate) -> i64 {
    (today - observed_on).num_days()
}

/// Returns `Some(true)` if the sample is older than `max_age_days`.
///
/// Staleness is strictly greater than the threshold:
///   age > max_age_days  →  stale
///   age == max_age_days →  not stale
///
/// Returns `None` for `LatestSample::NoData`, which has no age.
pub fn is_stale_at(sample: &LatestSample, max_age_days: i64, today: NaiveDate) -> Option<bool> {
    sample
        .observed_on()
        .map(|day| age_days(day, today) > max_age_days)
}
