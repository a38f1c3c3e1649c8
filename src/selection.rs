/// Latest usable sample selection.
///
/// Walks the images over a point from newest to oldest and returns the first
/// one with a value at the point. Newer images with no data there (clouds,
/// orbit gaps, QA masking) are skipped, not returned.
///
/// # Clock injection
/// `select_latest_at` takes `today` explicitly; `select_latest` reads the UTC
/// clock and delegates.

use chrono::{NaiveDate, TimeDelta, Utc};

use crate::ingest::ObservationSource;
use crate::logging::{self, DataSource};
use crate::model::{GeoPoint, LatestSample, Observation, ObservationRef, SourceError};

/// The search window for a lookback: `(start, end_exclusive)` covering
/// `[today - lookback_days, today]`. A negative lookback is treated as zero.
///
/// Lookbacks that run off the calendar are a configuration error.
pub fn search_window(today: NaiveDate, lookback_days: i64) -> Result<(NaiveDate, NaiveDate), SourceError> {
    let out_of_range =
        || SourceError::Configuration(format!("lookback of {} days is out of range", lookback_days));
    let start = TimeDelta::try_days(lookback_days.max(0))
        .and_then(|span| today.checked_sub_signed(span))
        .ok_or_else(out_of_range)?;
    let end_exclusive = today.succ_opt().ok_or_else(out_of_range)?;
    Ok((start, end_exclusive))
}

/// True if `observation` was acquired inside `[start, end_exclusive)`.
pub fn in_window(observation: &ObservationRef, start: NaiveDate, end_exclusive: NaiveDate) -> bool {
    let day = observation.acquired_at.date_naive();
    day >= start && day < end_exclusive
}

/// Searches `[today - lookback_days, today]` (both ends inclusive) for the
/// most recent usable sample.
///
/// An empty window and a window where every image is missing at the point
/// both yield `LatestSample::NoData`. Source failures are returned as errors
/// and abort the search.
pub fn select_latest_at<S: ObservationSource>(
    source: &S,
    point: GeoPoint,
    lookback_days: i64,
    today: NaiveDate,
) -> Result<LatestSample, SourceError> {
    let (start, end_exclusive) = search_window(today, lookback_days)?;

    let mut candidates = source.list_observations(point, start, end_exclusive)?;
    // Newest first; sources are not trusted to sort or to respect the window.
    candidates.retain(|c| in_window(c, start, end_exclusive));
    candidates.sort_by(|a, b| b.acquired_at.cmp(&a.acquired_at));

    let mut skipped = 0usize;
    for candidate in &candidates {
        let observation = Observation {
            timestamp: candidate.acquired_at,
            value: source.read_value(candidate, point)?,
            location: point,
        };
        match LatestSample::from_observation(&observation, today) {
            Some(sample) => {
                logging::debug(
                    DataSource::EarthEngine,
                    None,
                    &format!(
                        "using {} ({:.1} ppb), skipped {} newer image(s) without data",
                        candidate.image_id,
                        sample.value().unwrap_or_default(),
                        skipped
                    ),
                );
                return Ok(sample);
            }
            None => skipped += 1,
        }
    }

    logging::info(
        DataSource::EarthEngine,
        None,
        &format!(
            "no usable sample at {} in the last {} days ({} image(s) checked)",
            point,
            lookback_days,
            candidates.len()
        ),
    );
    Ok(LatestSample::NoData)
}

/// `select_latest_at` against the current UTC date.
pub fn select_latest<S: ObservationSource>(
    source: &S,
    point: GeoPoint,
    lookback_days: i64,
) -> Result<LatestSample, SourceError> {
    select_latest_at(source, point, lookback_days, Utc::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dev_mode::{FixtureImage, FixtureSource};
    use chrono::{TimeZone, Utc};

    fn point() -> GeoPoint {
        GeoPoint::new(32.93, 3.30)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    fn image(day: u32, hour: u32, value: Option<f64>) -> FixtureImage {
        FixtureImage {
            image_id: format!("S5P/202405{:02}T{:02}", day, hour),
            acquired_at: Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap(),
            value_ppb: value,
        }
    }

    #[test]
    fn test_todays_usable_image_is_returned_as_today() {
        let source = FixtureSource::new(vec![image(9, 10, Some(1870.0)), image(10, 10, Some(1880.0))]);
        let sample = select_latest_at(&source, point(), 30, today()).unwrap();
        assert_eq!(sample.as_tuple(), (Some(1880.0), Some(today()), true));
    }

    #[test]
    fn test_skips_newer_images_without_data() {
        let source = FixtureSource::new(vec![
            image(10, 11, None),
            image(9, 11, None),
            image(7, 10, Some(1862.5)),
            image(5, 10, Some(1999.0)),
        ]);
        let sample = select_latest_at(&source, point(), 30, today()).unwrap();
        assert_eq!(
            sample.as_tuple(),
            (Some(1862.5), NaiveDate::from_ymd_opt(2024, 5, 7), false)
        );
    }

    #[test]
    fn test_all_missing_is_no_data() {
        let source = FixtureSource::new(vec![image(10, 9, None), image(8, 9, None), image(2, 9, None)]);
        let sample = select_latest_at(&source, point(), 30, today()).unwrap();
        assert_eq!(sample.as_tuple(), (None, None, false));
    }

    #[test]
    fn test_empty_window_is_no_data() {
        let source = FixtureSource::new(vec![]);
        let sample = select_latest_at(&source, point(), 30, today()).unwrap();
        assert_eq!(sample, LatestSample::NoData);
    }

    #[test]
    fn test_images_outside_window_are_ignored() {
        // April 1st is 39 days before today; the window is 30 days.
        let source = FixtureSource::new(vec![
            FixtureImage {
                image_id: "old".into(),
                acquired_at: Utc.with_ymd_and_hms(2024, 4, 1, 10, 0, 0).unwrap(),
                value_ppb: Some(1850.0),
            },
            FixtureImage {
                image_id: "future".into(),
                acquired_at: Utc.with_ymd_and_hms(2024, 5, 11, 10, 0, 0).unwrap(),
                value_ppb: Some(1850.0),
            },
        ]);
        let sample = select_latest_at(&source, point(), 30, today()).unwrap();
        assert_eq!(sample, LatestSample::NoData);
    }

    #[test]
    fn test_window_start_is_inclusive() {
        let source = FixtureSource::new(vec![image(1, 0, Some(1840.0))]);
        let sample = select_latest_at(&source, point(), 9, today()).unwrap();
        assert_eq!(sample.value(), Some(1840.0));
    }

    #[test]
    fn test_unsorted_source_is_sorted_newest_first() {
        let source = FixtureSource::new(vec![
            image(3, 10, Some(1801.0)),
            image(8, 10, Some(1808.0)),
            image(6, 10, Some(1806.0)),
        ]);
        let sample = select_latest_at(&source, point(), 30, today()).unwrap();
        assert_eq!(sample.value(), Some(1808.0));
    }

    #[test]
    fn test_huge_lookback_is_an_error_not_a_panic() {
        let source = FixtureSource::new(vec![image(10, 10, Some(1880.0))]);
        let result = select_latest_at(&source, point(), i64::MAX, today());
        assert!(matches!(result, Err(SourceError::Configuration(_))));
    }

    #[test]
    fn test_negative_lookback_searches_today_only() {
        let source = FixtureSource::new(vec![image(9, 10, Some(1870.0)), image(10, 10, Some(1880.0))]);
        assert_eq!(search_window(today(), -5).unwrap(), (today(), NaiveDate::from_ymd_opt(2024, 5, 11).unwrap()));
        let sample = select_latest_at(&source, point(), -5, today()).unwrap();
        assert_eq!(sample.value(), Some(1880.0));
    }

    #[test]
    fn test_source_failure_propagates() {
        let source = FixtureSource::failing(SourceError::Unauthorized("expired".into()));
        let result = select_latest_at(&source, point(), 30, today());
        assert!(matches!(result, Err(SourceError::Unauthorized(_))));
    }
}
