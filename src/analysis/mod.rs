/// One analysis run for one site.
///
/// Replaces the dashboard's mutable session state with an explicit
/// request → response pair: `AnalysisRequest` names the site and the
/// classification inputs, `analyze_at` selects the latest usable sample and
/// classifies it, and `AnalysisResponse` carries everything the report and
/// summary need. Nothing is kept between runs.
///
/// Failure scoping:
/// - Source failure (network, auth) fails the whole request.
/// - A missing or malformed history file, or a history too short or flat to
///   score against, only disables the z-score path. The reason is kept in
///   `zscore_unavailable` and the fixed-threshold assessment stands.
/// - No usable sample is a normal response with no assessment.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};

use crate::alert::stalenesses;
use crate::alert::thresholds::{self, MethaneThresholds};
use crate::alert::zscore::{self, ZScoreOutcome};
use crate::config::{AnalysisConfig, StrategyChoice};
use crate::history::{self, HistoricalSeries, HistoryError};
use crate::ingest::ObservationSource;
use crate::logging::{self, DataSource};
use crate::model::{LatestSample, RiskAssessment, SourceError};
use crate::selection;
use crate::sites::Site;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Where the z-score strategy gets its reference series.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryInput {
    None,
    File(PathBuf),
    Series(HistoricalSeries),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub site: Site,
    pub lookback_days: i64,
    pub strategy: StrategyChoice,
    pub thresholds: MethaneThresholds,
    pub max_age_days: i64,
    pub history: HistoryInput,
}

impl AnalysisRequest {
    pub fn new(site: Site, config: &AnalysisConfig) -> Self {
        Self {
            site,
            lookback_days: config.lookback_days,
            strategy: config.strategy,
            thresholds: config.thresholds(),
            max_age_days: config.max_age_days,
            history: HistoryInput::None,
        }
    }

    pub fn with_history(mut self, history: HistoryInput) -> Self {
        self.history = history;
        self
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Why no z-score backs the response.
#[derive(Debug, Clone, PartialEq)]
pub enum ZScoreUnavailable {
    /// The z-score strategy was requested without a history series.
    NoHistory,
    /// The history file could not be loaded.
    History { path: PathBuf, error: HistoryError },
    /// Fewer than two values, or zero spread.
    InsufficientHistory { samples: usize },
}

impl std::fmt::Display for ZScoreUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ZScoreUnavailable::NoHistory => write!(f, "no history series supplied"),
            ZScoreUnavailable::History { path, error } => write!(f, "{}: {}", path.display(), error),
            ZScoreUnavailable::InsufficientHistory { samples } => write!(
                f,
                "insufficient history ({} sample(s) or zero spread)",
                samples
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResponse {
    pub site: Site,
    pub today: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub lookback_days: i64,
    pub sample: LatestSample,
    pub strategy: StrategyChoice,
    /// Always present when a sample was found.
    pub fixed: Option<RiskAssessment>,
    /// Present when a sample was found and a history series was available.
    pub zscore: Option<ZScoreOutcome>,
    /// Why the z-score path produced no score, if it did not.
    pub zscore_unavailable: Option<ZScoreUnavailable>,
    /// Sample is older than the configured maximum age.
    pub stale: bool,
}

impl AnalysisResponse {
    pub fn has_data(&self) -> bool {
        !matches!(self.sample, LatestSample::NoData)
    }

    /// The assessment that drives the reported level.
    ///
    /// The z-score result is used when it was requested and actually
    /// scored; otherwise the fixed-threshold result stands.
    pub fn primary(&self) -> Option<&RiskAssessment> {
        if self.strategy == StrategyChoice::Zscore {
            if let Some(ZScoreOutcome::Scored(a)) = &self.zscore {
                return Some(a);
            }
        }
        self.fixed.as_ref()
    }

    /// Operator note when the reported level comes from fixed thresholds
    /// because the z-score path produced no score.
    pub fn fallback_note(&self) -> Option<String> {
        self.zscore_unavailable
            .as_ref()
            .map(|reason| format!("z-score unavailable: {}; fixed thresholds applied", reason))
    }

    /// One-line status for the operator.
    pub fn status_message(&self) -> String {
        match self.sample {
            LatestSample::NoData => format!(
                "No usable satellite pass over the last {} days",
                self.lookback_days
            ),
            LatestSample::Found { observed_on, is_today: true, .. } => {
                format!("Satellite pass today ({})", observed_on)
            }
            LatestSample::Found { observed_on, is_today: false, .. } => format!(
                "No valid satellite pass today (clouds or orbit); last available image: {} ({} day(s) old)",
                observed_on,
                stalenesses::age_days(observed_on, self.today)
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Runs one analysis with an explicit clock.
pub fn analyze_at<S: ObservationSource>(
    source: &S,
    request: &AnalysisRequest,
    today: NaiveDate,
    generated_at: DateTime<Utc>,
) -> Result<AnalysisResponse, SourceError> {
    let site_id = request.site.id.as_str();

    let sample = selection::select_latest_at(
        source,
        request.site.location(),
        request.lookback_days,
        today,
    )
    .inspect_err(|e| logging::log_ee_failure(site_id, "latest sample selection", e))?;

    let mut response = AnalysisResponse {
        site: request.site.clone(),
        today,
        generated_at,
        lookback_days: request.lookback_days,
        sample,
        strategy: request.strategy,
        fixed: None,
        zscore: None,
        zscore_unavailable: None,
        stale: false,
    };

    let Some(value_ppb) = sample.value() else {
        logging::info(DataSource::System, Some(site_id), &response.status_message());
        return Ok(response);
    };

    response.stale =
        stalenesses::is_stale_at(&sample, request.max_age_days, today).unwrap_or(false);
    if response.stale {
        logging::warn(DataSource::System, Some(site_id), &response.status_message());
    }

    response.fixed = Some(thresholds::classify_with(value_ppb, &request.thresholds));

    match load_history(&request.history) {
        Ok(Some(series)) => {
            let outcome = zscore::classify_zscore(value_ppb, &series);
            if let ZScoreOutcome::InsufficientHistory { samples, .. } = &outcome {
                let reason = ZScoreUnavailable::InsufficientHistory { samples: *samples };
                logging::warn(DataSource::History, Some(site_id), &reason.to_string());
                response.zscore_unavailable = Some(reason);
            }
            response.zscore = Some(outcome);
        }
        Ok(None) => {
            if request.strategy == StrategyChoice::Zscore {
                response.zscore_unavailable = Some(ZScoreUnavailable::NoHistory);
            }
        }
        Err(reason) => {
            logging::error(DataSource::History, Some(site_id), &reason.to_string());
            response.zscore_unavailable = Some(reason);
        }
    }

    if let Some(primary) = response.primary() {
        logging::info(
            DataSource::System,
            Some(site_id),
            &format!(
                "{:.1} ppb on {} -> {} ({}): {}",
                primary.value_ppb,
                response.sample.observed_on().map(|d| d.to_string()).unwrap_or_default(),
                primary.level,
                primary.strategy,
                primary.recommended_action
            ),
        );
    }

    Ok(response)
}

/// `analyze_at` against the current UTC clock.
pub fn analyze<S: ObservationSource>(
    source: &S,
    request: &AnalysisRequest,
) -> Result<AnalysisResponse, SourceError> {
    let now = Utc::now();
    analyze_at(source, request, now.date_naive(), now)
}

fn load_history(input: &HistoryInput) -> Result<Option<HistoricalSeries>, ZScoreUnavailable> {
    match input {
        HistoryInput::None => Ok(None),
        HistoryInput::Series(series) => Ok(Some(series.clone())),
        HistoryInput::File(path) => history::load_csv(path).map(Some).map_err(|error| {
            ZScoreUnavailable::History {
                path: path.clone(),
                error,
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dev_mode::{FixtureImage, FixtureSource};
    use crate::model::RiskLevel;
    use chrono::TimeZone;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 15, 0, 0).unwrap()
    }

    fn source_with(day: u32, value: Option<f64>) -> FixtureSource {
        FixtureSource::new(vec![FixtureImage {
            image_id: format!("img-{}", day),
            acquired_at: Utc.with_ymd_and_hms(2024, 5, day, 10, 0, 0).unwrap(),
            value_ppb: value,
        }])
    }

    fn request(strategy: StrategyChoice) -> AnalysisRequest {
        let config = AnalysisConfig { strategy, ..AnalysisConfig::default() };
        AnalysisRequest::new(Site::ad_hoc("Hassi R'mel", 32.93, 3.30), &config)
    }

    #[test]
    fn test_fixed_strategy_today() {
        let response = analyze_at(&source_with(10, Some(1860.0)), &request(StrategyChoice::Fixed), today(), now()).unwrap();
        let primary = response.primary().unwrap();
        assert_eq!(primary.level, RiskLevel::Elevated);
        assert_eq!(primary.recommended_action, "Urgent HSE inspection");
        assert!(response.sample.is_today());
        assert!(!response.stale);
        assert_eq!(response.status_message(), "Satellite pass today (2024-05-10)");
    }

    #[test]
    fn test_no_data_has_no_assessment() {
        let response = analyze_at(&source_with(9, None), &request(StrategyChoice::Fixed), today(), now()).unwrap();
        assert!(!response.has_data());
        assert!(response.primary().is_none());
        assert!(response.status_message().starts_with("No usable satellite pass"));
    }

    #[test]
    fn test_older_sample_is_framed_as_last_available() {
        let response = analyze_at(&source_with(1, Some(1800.0)), &request(StrategyChoice::Fixed), today(), now()).unwrap();
        assert!(response.stale, "9-day-old sample is past the 7-day default");
        assert!(response.status_message().contains("last available image: 2024-05-01 (9 day(s) old)"));
    }

    #[test]
    fn test_zscore_strategy_uses_history() {
        let history = HistoricalSeries::from_values(vec![1700.0, 1720.0, 1690.0, 1710.0, 1705.0]);
        let req = request(StrategyChoice::Zscore).with_history(HistoryInput::Series(history));
        let response = analyze_at(&source_with(10, Some(1900.0)), &req, today(), now()).unwrap();
        let primary = response.primary().unwrap();
        assert_eq!(primary.level, RiskLevel::Critical);
        assert_eq!(primary.recommended_action, "Immediate HSE alert + inspection");
        assert!(primary.z_score.unwrap() > 3.0);
        // Fixed assessment is still computed alongside.
        assert_eq!(response.fixed.as_ref().unwrap().level, RiskLevel::Critical);
    }

    #[test]
    fn test_broken_history_file_falls_back_to_fixed() {
        let path = std::env::temp_dir().join("ch4mon_missing_history_for_analysis.csv");
        let req = request(StrategyChoice::Zscore).with_history(HistoryInput::File(path));
        let response = analyze_at(&source_with(10, Some(1860.0)), &req, today(), now()).unwrap();
        assert!(matches!(
            response.zscore_unavailable,
            Some(ZScoreUnavailable::History { error: HistoryError::Io(_), .. })
        ));
        assert!(response.zscore.is_none());
        assert_eq!(response.primary().unwrap().level, RiskLevel::Elevated);
    }

    #[test]
    fn test_flat_history_falls_back_to_fixed() {
        let req = request(StrategyChoice::Zscore)
            .with_history(HistoryInput::Series(HistoricalSeries::from_values(vec![1800.0; 4])));
        let response = analyze_at(&source_with(10, Some(1910.0)), &req, today(), now()).unwrap();
        assert!(response.zscore.as_ref().unwrap().is_insufficient());
        assert_eq!(
            response.zscore_unavailable,
            Some(ZScoreUnavailable::InsufficientHistory { samples: 4 })
        );
        assert_eq!(
            response.fallback_note().unwrap(),
            "z-score unavailable: insufficient history (4 sample(s) or zero spread); fixed thresholds applied"
        );
        assert_eq!(response.primary().unwrap().level, RiskLevel::Critical);
    }

    #[test]
    fn test_zscore_without_history_is_noted() {
        let response = analyze_at(&source_with(10, Some(1860.0)), &request(StrategyChoice::Zscore), today(), now()).unwrap();
        assert_eq!(response.zscore_unavailable, Some(ZScoreUnavailable::NoHistory));
        assert_eq!(response.primary().unwrap().strategy, crate::model::Strategy::FixedThreshold);
    }

    #[test]
    fn test_source_failure_fails_request() {
        let source = FixtureSource::failing(SourceError::HttpError(503));
        let result = analyze_at(&source, &request(StrategyChoice::Fixed), today(), now());
        assert_eq!(result, Err(SourceError::HttpError(503)));
    }
}
