/// Development mode: replay recorded satellite passes without Earth Engine.
///
/// When credentials or network are unavailable, point the service at a JSON
/// fixture of previously fetched images for a site. Fixtures can be shifted
/// forward in time so that a recording from last year replays as if it were
/// current.
///
/// ```json
/// [
///   { "image_id": "COPERNICUS/S5P/OFFL/L3_CH4/20240501", "acquired_at": "2024-05-01T10:12:00Z", "value_ppb": 1871.4 },
///   { "image_id": "COPERNICUS/S5P/OFFL/L3_CH4/20240502", "acquired_at": "2024-05-02T09:55:00Z", "value_ppb": null }
/// ]
/// ```

use std::path::Path;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::ObservationSource;
use crate::logging::{self, DataSource};
use crate::model::{GeoPoint, ObservationRef, SourceError};

/// One recorded image and its value at the fixture's site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureImage {
    pub image_id: String,
    pub acquired_at: DateTime<Utc>,
    pub value_ppb: Option<f64>,
}

/// An `ObservationSource` backed by an in-memory list of recorded images.
///
/// The fixture describes a single site, so the point argument is ignored.
pub struct FixtureSource {
    images: Vec<FixtureImage>,
    failure: Option<SourceError>,
}

impl FixtureSource {
    pub fn new(images: Vec<FixtureImage>) -> Self {
        Self { images, failure: None }
    }

    /// A source whose every call fails with `error`.
    pub fn failing(error: SourceError) -> Self {
        Self {
            images: Vec::new(),
            failure: Some(error),
        }
    }

    /// Loads a JSON array of `FixtureImage`s.
    pub fn from_json_file(path: &Path) -> Result<Self, SourceError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SourceError::Configuration(format!("fixture {}: {}", path.display(), e)))?;
        let images: Vec<FixtureImage> = serde_json::from_str(&text)
            .map_err(|e| SourceError::ParseError(format!("fixture {}: {}", path.display(), e)))?;

        logging::info(
            DataSource::Fixture,
            None,
            &format!("loaded {} recorded image(s) from {}", images.len(), path.display()),
        );
        Ok(Self::new(images))
    }

    /// Shifts every image forward so the newest lands on `today`.
    ///
    /// Returns the applied offset in days (zero for an empty fixture).
    pub fn replay_as_of(&mut self, today: NaiveDate) -> i64 {
        let Some(newest) = self.images.iter().map(|i| i.acquired_at.date_naive()).max() else {
            return 0;
        };
        let days_offset = (today - newest).num_days();
        self.shift_days(days_offset);
        days_offset
    }

    pub fn shift_days(&mut self, days_offset: i64) {
        let delta = Duration::days(days_offset);
        for image in &mut self.images {
            image.acquired_at += delta;
        }
    }

    pub fn images(&self) -> &[FixtureImage] {
        &self.images
    }

    fn check(&self) -> Result<(), SourceError> {
        match &self.failure {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

impl ObservationSource for FixtureSource {
    fn list_observations(
        &self,
        _point: GeoPoint,
        start: NaiveDate,
        end_exclusive: NaiveDate,
    ) -> Result<Vec<ObservationRef>, SourceError> {
        self.check()?;
        Ok(self
            .images
            .iter()
            .filter(|i| {
                let day = i.acquired_at.date_naive();
                day >= start && day < end_exclusive
            })
            .map(|i| ObservationRef {
                image_id: i.image_id.clone(),
                acquired_at: i.acquired_at,
            })
            .collect())
    }

    fn read_value(
        &self,
        observation: &ObservationRef,
        _point: GeoPoint,
    ) -> Result<Option<f64>, SourceError> {
        self.check()?;
        Ok(self
            .images
            .iter()
            .find(|i| i.image_id == observation.image_id)
            .and_then(|i| i.value_ppb))
    }
}
