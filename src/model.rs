/// Core data types for the CH₄ site monitoring service.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no I/O: only types, their invariants, and the error enum for
/// the remote observation source.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Locations
// ---------------------------------------------------------------------------

/// A WGS84 point, in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// True when both coordinates are finite and inside WGS84 bounds.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// GeoJSON coordinate order: `[lon, lat]`.
    pub fn lon_lat(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

// ---------------------------------------------------------------------------
// Observation types
// ---------------------------------------------------------------------------

/// A single image in the remote collection, before its value has been read.
///
/// Listing is cheap; reading the value at a point is a separate (and much
/// more expensive) request, so the selector works from these handles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRef {
    /// Source-specific identifier, e.g. `COPERNICUS/S5P/OFFL/L3_CH4/20240501T...`.
    pub image_id: String,
    pub acquired_at: DateTime<Utc>,
}

/// A remote-sensing sample read at a point.
///
/// `value` is `None` when the raster has no data at the point, which for
/// Sentinel-5P is routine (cloud cover, orbit gaps, QA masking).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub value: Option<f64>,
    pub location: GeoPoint,
}

/// Result of searching a lookback window for the most recent usable sample.
///
/// Value and date are carried together, so a value without a date (or the
/// reverse) cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LatestSample {
    /// No observation in the window had a usable value (or there were none).
    NoData,
    Found {
        value_ppb: f64,
        observed_on: NaiveDate,
        is_today: bool,
    },
}

impl LatestSample {
    /// The sample for an observation read at the site, or `None` if the
    /// observation has no usable value.
    pub fn from_observation(observation: &Observation, today: NaiveDate) -> Option<Self> {
        let value_ppb = observation.value.filter(|v| v.is_finite())?;
        let observed_on = observation.timestamp.date_naive();
        Some(LatestSample::Found {
            value_ppb,
            observed_on,
            is_today: observed_on == today,
        })
    }

    /// Flattened `(value, observed_on, is_today)` view.
    ///
    /// `NoData` always maps to `(None, None, false)`.
    pub fn as_tuple(&self) -> (Option<f64>, Option<NaiveDate>, bool) {
        match *self {
            LatestSample::NoData => (None, None, false),
            LatestSample::Found { value_ppb, observed_on, is_today } => {
                (Some(value_ppb), Some(observed_on), is_today)
            }
        }
    }

    pub fn value(&self) -> Option<f64> {
        self.as_tuple().0
    }

    pub fn observed_on(&self) -> Option<NaiveDate> {
        self.as_tuple().1
    }

    pub fn is_today(&self) -> bool {
        self.as_tuple().2
    }
}

// ---------------------------------------------------------------------------
// Risk types
// ---------------------------------------------------------------------------

/// Risk labels, in ascending order of severity.
///
/// `Elevated` is produced by the fixed-threshold strategy and `Anomaly` by the
/// z-score strategy; they occupy the same middle band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Normal,
    Elevated,
    Anomaly,
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Normal => write!(f, "Normal"),
            RiskLevel::Elevated => write!(f, "Elevated"),
            RiskLevel::Anomaly => write!(f, "Anomaly"),
            RiskLevel::Critical => write!(f, "Critical"),
        }
    }
}

/// Which classification strategy produced an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    FixedThreshold,
    ZScore,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::FixedThreshold => write!(f, "fixed threshold"),
            Strategy::ZScore => write!(f, "z-score"),
        }
    }
}

/// Classified measurement. Recomputed on every analysis; carries no identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub value_ppb: f64,
    pub level: RiskLevel,
    pub recommended_action: String,
    pub strategy: Strategy,
    /// Only set by the z-score strategy, and only when history was sufficient.
    pub z_score: Option<f64>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise when querying the remote observation source.
///
/// "No data at the point" is *not* an error; it is `Ok(None)` from
/// `ObservationSource::read_value`.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceError {
    /// Non-2xx HTTP response.
    HttpError(u16),
    /// The request did not complete within the configured timeout.
    Timeout,
    /// Connection-level failure (DNS, TLS, reset).
    Network(String),
    /// Credentials missing, expired, or rejected (401/403).
    Unauthorized(String),
    /// The response body could not be deserialized.
    ParseError(String),
    /// The client was built with an unusable configuration.
    Configuration(String),
}

impl SourceError {
    /// Transient failures are worth one more attempt; everything else is not.
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Timeout | SourceError::Network(_) => true,
            SourceError::HttpError(code) => *code == 429 || (500..600).contains(code),
            _ => false,
        }
    }
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::HttpError(code) => write!(f, "HTTP error: {}", code),
            SourceError::Timeout => write!(f, "Request timeout"),
            SourceError::Network(msg) => write!(f, "Network error: {}", msg),
            SourceError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            SourceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            SourceError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_data_flattens_to_all_absent() {
        assert_eq!(LatestSample::NoData.as_tuple(), (None, None, false));
    }

    #[test]
    fn test_found_sample_carries_value_and_date_together() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let sample = LatestSample::Found { value_ppb: 1875.2, observed_on: day, is_today: false };
        assert_eq!(sample.as_tuple(), (Some(1875.2), Some(day), false));
    }

    #[test]
    fn test_missing_or_nan_observation_is_not_a_sample() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let mut obs = Observation {
            timestamp: day.and_hms_opt(10, 0, 0).unwrap().and_utc(),
            value: None,
            location: GeoPoint::new(32.93, 3.30),
        };
        assert_eq!(LatestSample::from_observation(&obs, day), None);
        obs.value = Some(f64::NAN);
        assert_eq!(LatestSample::from_observation(&obs, day), None);
        obs.value = Some(1850.0);
        assert_eq!(
            LatestSample::from_observation(&obs, day),
            Some(LatestSample::Found { value_ppb: 1850.0, observed_on: day, is_today: true })
        );
    }

    #[test]
    fn test_point_validity() {
        assert!(GeoPoint::new(32.93, 3.30).is_valid());
        assert!(!GeoPoint::new(91.0, 3.30).is_valid());
        assert!(!GeoPoint::new(32.93, f64::NAN).is_valid());
    }

    #[test]
    fn test_transient_errors() {
        assert!(SourceError::Timeout.is_transient());
        assert!(SourceError::HttpError(503).is_transient());
        assert!(SourceError::HttpError(429).is_transient());
        assert!(!SourceError::HttpError(404).is_transient());
        assert!(!SourceError::Unauthorized("expired".into()).is_transient());
        assert!(!SourceError::ParseError("bad json".into()).is_transient());
    }

    #[test]
    fn test_risk_levels_order_by_severity() {
        assert!(RiskLevel::Normal < RiskLevel::Elevated);
        assert!(RiskLevel::Anomaly < RiskLevel::Critical);
    }
}
