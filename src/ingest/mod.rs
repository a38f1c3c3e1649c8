/// Remote observation sources.
///
/// The selector only needs two things from a source: the list of images
/// over a point in a date range, and the value of one image at that point.
/// `ObservationSource` is that seam; `earth_engine` implements it against
/// the Earth Engine REST API and `dev_mode::FixtureSource` against a local
/// JSON file.
///
/// Submodules:
/// - `earth_engine`: Sentinel-5P CH₄ via Earth Engine REST.
/// - `retry`: explicit timeout handling and the single retry.

pub mod earth_engine;
pub mod retry;

use chrono::NaiveDate;

use crate::model::{GeoPoint, ObservationRef, SourceError};

pub trait ObservationSource {
    /// All images intersecting `point` acquired in `[start, end_exclusive)`.
    /// Order is not guaranteed; the selector sorts.
    fn list_observations(
        &self,
        point: GeoPoint,
        start: NaiveDate,
        end_exclusive: NaiveDate,
    ) -> Result<Vec<ObservationRef>, SourceError>;

    /// The image's value at `point`, in ppb.
    ///
    /// `Ok(None)` means the image has no usable data there; that is normal
    /// and not an error.
    fn read_value(
        &self,
        observation: &ObservationRef,
        point: GeoPoint,
    ) -> Result<Option<f64>, SourceError>;
}

impl<S: ObservationSource + ?Sized> ObservationSource for &S {
    fn list_observations(
        &self,
        point: GeoPoint,
        start: NaiveDate,
        end_exclusive: NaiveDate,
    ) -> Result<Vec<ObservationRef>, SourceError> {
        (**self).list_observations(point, start, end_exclusive)
    }

    fn read_value(
        &self,
        observation: &ObservationRef,
        point: GeoPoint,
    ) -> Result<Option<f64>, SourceError> {
        (**self).read_value(observation, point)
    }
}
