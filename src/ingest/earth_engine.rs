/// Google Earth Engine REST client for Sentinel-5P CH₄.
///
/// Uses two endpoints of the v1 REST API:
/// - `assets/{collection}:listImages` to enumerate images over a point in a
///   date range (cheap, metadata only).
/// - `value:compute` to reduce one image to a scalar at the point, with a
///   spatial averaging radius and a max-pixel cap.
///
/// API Documentation: https://developers.google.com/earth-engine/reference/rest
/// Dataset: https://developers.google.com/earth-engine/datasets/catalog/COPERNICUS_S5P_OFFL_L3_CH4
///
/// Authentication is an OAuth2 bearer token (e.g. from
/// `gcloud auth print-access-token`), supplied through `EE_ACCESS_TOKEN`.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use super::ObservationSource;
use super::retry::{self, RetryPolicy};
use crate::config::{EarthEngineConfig, Reducer};
use crate::logging::{self, DataSource};
use crate::model::{GeoPoint, ObservationRef, SourceError};

/// Public catalog assets live under this project.
const PUBLIC_ASSET_PROJECT: &str = "earthengine-public";

// ============================================================================
// API Response Structures
// ============================================================================

/// `listImages` response page.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListImagesResponse {
    #[serde(default)]
    pub images: Vec<EeImage>,
    pub next_page_token: Option<String>,
}

/// Image metadata as returned by `listImages`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EeImage {
    /// Full resource name: `projects/earthengine-public/assets/COPERNICUS/...`.
    pub name: String,
    /// Legacy asset id: `COPERNICUS/S5P/OFFL/L3_CH4/...`.
    pub id: Option<String>,
    pub start_time: Option<String>,
}

/// `value:compute` response.
#[derive(Debug, Deserialize)]
pub struct ComputeResponse {
    #[serde(default)]
    pub result: Value,
}

// ============================================================================
// Client
// ============================================================================

pub struct EarthEngineClient {
    http: reqwest::blocking::Client,
    config: EarthEngineConfig,
    access_token: String,
    retry: RetryPolicy,
}

impl EarthEngineClient {
    pub fn new(config: EarthEngineConfig, access_token: String) -> Result<Self, SourceError> {
        if access_token.trim().is_empty() {
            return Err(SourceError::Configuration("empty Earth Engine access token".to_string()));
        }
        if config.project.trim().is_empty() {
            return Err(SourceError::Configuration("Earth Engine project is not set".to_string()));
        }

        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(retry::from_reqwest)?;

        let retry = RetryPolicy {
            retries: config.retries,
            delay: Duration::from_secs(config.retry_delay_secs),
        };

        Ok(Self {
            http,
            config,
            access_token,
            retry,
        })
    }

    fn list_images_url(&self) -> String {
        build_list_images_url(&self.config.api_base, &self.config.collection)
    }

    fn compute_url(&self) -> String {
        build_compute_url(&self.config.api_base, &self.config.project)
    }

    fn list_page(
        &self,
        point: GeoPoint,
        start: NaiveDate,
        end_exclusive: NaiveDate,
        page_token: Option<&str>,
    ) -> Result<ListImagesResponse, SourceError> {
        let region = json!({ "type": "Point", "coordinates": point.lon_lat() }).to_string();
        let mut query: Vec<(&str, String)> = vec![
            ("startTime", rfc3339_midnight(start)),
            ("endTime", rfc3339_midnight(end_exclusive)),
            ("region", region),
            ("pageSize", self.config.page_size.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let response = self
            .http
            .get(self.list_images_url())
            .bearer_auth(&self.access_token)
            .header("x-goog-user-project", &self.config.project)
            .query(&query)
            .send()
            .map_err(retry::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(retry::from_status(status.as_u16(), &body));
        }

        response.json().map_err(retry::from_reqwest)
    }

    fn compute(&self, expression: &Value) -> Result<ComputeResponse, SourceError> {
        let response = self
            .http
            .post(self.compute_url())
            .bearer_auth(&self.access_token)
            .header("x-goog-user-project", &self.config.project)
            .json(&json!({ "expression": expression }))
            .send()
            .map_err(retry::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(retry::from_status(status.as_u16(), &body));
        }

        response.json().map_err(retry::from_reqwest)
    }
}

impl ObservationSource for EarthEngineClient {
    fn list_observations(
        &self,
        point: GeoPoint,
        start: NaiveDate,
        end_exclusive: NaiveDate,
    ) -> Result<Vec<ObservationRef>, SourceError> {
        let mut observations = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.retry.run("listImages", || {
                self.list_page(point, start, end_exclusive, page_token.as_deref())
            })?;

            for image in page.images {
                observations.push(parse_image(image)?);
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        logging::debug(
            DataSource::EarthEngine,
            None,
            &format!(
                "{} images over {} between {} and {}",
                observations.len(),
                point,
                start,
                end_exclusive
            ),
        );

        Ok(observations)
    }

    fn read_value(
        &self,
        observation: &ObservationRef,
        point: GeoPoint,
    ) -> Result<Option<f64>, SourceError> {
        let expression = reduce_region_expression(&self.config, &observation.image_id, point);
        let response = self.retry.run("value:compute", || self.compute(&expression))?;
        Ok(extract_band_value(&response.result, &self.config.band, self.config.unit_scale))
    }
}

// ============================================================================
// Request construction
// ============================================================================

pub fn build_list_images_url(api_base: &str, collection: &str) -> String {
    format!(
        "{}/v1/projects/{}/assets/{}:listImages",
        api_base.trim_end_matches('/'),
        PUBLIC_ASSET_PROJECT,
        collection
    )
}

pub fn build_compute_url(api_base: &str, project: &str) -> String {
    format!(
        "{}/v1/projects/{}/value:compute",
        api_base.trim_end_matches('/'),
        project
    )
}

fn rfc3339_midnight(day: NaiveDate) -> String {
    format!("{}T00:00:00Z", day.format("%Y-%m-%d"))
}

fn invoke(function_name: &str, arguments: Value) -> Value {
    json!({
        "functionInvocationValue": {
            "functionName": function_name,
            "arguments": arguments,
        }
    })
}

fn constant(value: Value) -> Value {
    json!({ "constantValue": value })
}

/// Expression graph for
/// `Image.load(id).select([band]).reduceRegion(reducer, Point(lon, lat), scale, maxPixels)`.
pub fn reduce_region_expression(config: &EarthEngineConfig, image_id: &str, point: GeoPoint) -> Value {
    let image = invoke(
        "Image.select",
        json!({
            "input": invoke("Image.load", json!({ "id": constant(json!(image_id)) })),
            "bandSelectors": constant(json!([config.band])),
        }),
    );
    let reducer_name = match config.reducer {
        Reducer::Mean => "Reducer.mean",
        Reducer::Max => "Reducer.max",
    };
    let geometry = invoke(
        "GeometryConstructors.Point",
        json!({ "coordinates": constant(json!(point.lon_lat())) }),
    );

    json!({
        "result": "0",
        "values": {
            "0": invoke(
                "Image.reduceRegion",
                json!({
                    "image": image,
                    "reducer": invoke(reducer_name, json!({})),
                    "geometry": geometry,
                    "scale": constant(json!(config.scale_m)),
                    "maxPixels": constant(json!(config.max_pixels)),
                }),
            ),
        }
    })
}

// ============================================================================
// Response parsing
// ============================================================================

fn parse_image(image: EeImage) -> Result<ObservationRef, SourceError> {
    let start_time = image
        .start_time
        .as_deref()
        .ok_or_else(|| SourceError::ParseError(format!("image {} has no startTime", image.name)))?;
    let acquired_at = DateTime::parse_from_rfc3339(start_time)
        .map_err(|e| SourceError::ParseError(format!("startTime '{}': {}", start_time, e)))?
        .with_timezone(&Utc);

    let image_id = image.id.unwrap_or_else(|| legacy_id(&image.name));

    Ok(ObservationRef { image_id, acquired_at })
}

/// `projects/earthengine-public/assets/A/B/C` -> `A/B/C`.
fn legacy_id(name: &str) -> String {
    match name.split_once("/assets/") {
        Some((_, id)) => id.to_string(),
        None => name.to_string(),
    }
}

/// Pulls the band out of a `reduceRegion` dictionary and converts it to ppb.
///
/// Missing, `null` and non-finite values all mean "no data at this point".
pub fn extract_band_value(result: &Value, band: &str, unit_scale: f64) -> Option<f64> {
    result
        .get(band)
        .and_then(Value::as_f64)
        .map(|raw| raw * unit_scale)
        .filter(|v| v.is_finite())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const BAND: &str = "CH4_column_volume_mixing_ratio_dry_air";

    #[test]
    fn test_list_images_url() {
        assert_eq!(
            build_list_images_url("https://earthengine.googleapis.com/", "COPERNICUS/S5P/OFFL/L3_CH4"),
            "https://earthengine.googleapis.com/v1/projects/earthengine-public/assets/COPERNICUS/S5P/OFFL/L3_CH4:listImages"
        );
    }

    #[test]
    fn test_compute_url_uses_billing_project() {
        assert_eq!(
            build_compute_url("https://earthengine.googleapis.com", "my-hse-project"),
            "https://earthengine.googleapis.com/v1/projects/my-hse-project/value:compute"
        );
    }

    #[test]
    fn test_expression_carries_point_scale_and_cap() {
        let config = EarthEngineConfig::default();
        let expr = reduce_region_expression(&config, "COPERNICUS/S5P/OFFL/L3_CH4/20240501", GeoPoint::new(32.93, 3.30));
        let call = &expr["values"]["0"]["functionInvocationValue"];
        assert_eq!(call["functionName"], "Image.reduceRegion");

        let args = &call["arguments"];
        assert_eq!(args["scale"]["constantValue"], json!(7000.0));
        assert_eq!(args["maxPixels"]["constantValue"], json!(1e9));
        assert_eq!(
            args["geometry"]["functionInvocationValue"]["arguments"]["coordinates"]["constantValue"],
            json!([3.30, 32.93]),
            "GeoJSON order is lon, lat"
        );
        assert_eq!(args["reducer"]["functionInvocationValue"]["functionName"], "Reducer.mean");
    }

    #[test]
    fn test_extract_band_value_ppb_passthrough() {
        let result = json!({ BAND: 1893.4 });
        assert_eq!(extract_band_value(&result, BAND, 1.0), Some(1893.4));
    }

    #[test]
    fn test_extract_band_value_from_mole_fraction() {
        let result = json!({ BAND: 1.8934e-6 });
        let v = extract_band_value(&result, BAND, 1e9).unwrap();
        assert!((v - 1893.4).abs() < 1e-6);
    }

    #[test]
    fn test_null_band_is_no_data() {
        assert_eq!(extract_band_value(&json!({ BAND: null }), BAND, 1.0), None);
        assert_eq!(extract_band_value(&json!({}), BAND, 1.0), None);
        assert_eq!(extract_band_value(&Value::Null, BAND, 1.0), None);
    }

    #[test]
    fn test_parse_list_images_page() {
        let body = r#"{
            "images": [
                {
                    "type": "IMAGE",
                    "name": "projects/earthengine-public/assets/COPERNICUS/S5P/OFFL/L3_CH4/20240502T101112_20240502T115242",
                    "startTime": "2024-05-02T10:11:12Z",
                    "endTime": "2024-05-02T11:52:42Z"
                },
                {
                    "type": "IMAGE",
                    "name": "projects/earthengine-public/assets/COPERNICUS/S5P/OFFL/L3_CH4/20240501T095000_20240501T113000",
                    "id": "COPERNICUS/S5P/OFFL/L3_CH4/20240501T095000_20240501T113000",
                    "startTime": "2024-05-01T09:50:00.000Z"
                }
            ],
            "nextPageToken": "abc"
        }"#;
        let page: ListImagesResponse = serde_json::from_str(body).expect("valid page");
        assert_eq!(page.next_page_token.as_deref(), Some("abc"));

        let refs: Vec<_> = page.images.into_iter().map(|i| parse_image(i).unwrap()).collect();
        assert_eq!(refs[0].image_id, "COPERNICUS/S5P/OFFL/L3_CH4/20240502T101112_20240502T115242");
        assert_eq!(refs[1].acquired_at.date_naive(), NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    }

    #[test]
    fn test_empty_page_has_no_images() {
        let page: ListImagesResponse = serde_json::from_str("{}").expect("empty page is valid");
        assert!(page.images.is_empty());
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn test_image_without_start_time_is_parse_error() {
        let image = EeImage { name: "projects/x/assets/y".into(), id: None, start_time: None };
        assert!(matches!(parse_image(image), Err(SourceError::ParseError(_))));
    }

    #[test]
    fn test_client_rejects_empty_token() {
        let result = EarthEngineClient::new(EarthEngineConfig::default(), "  ".to_string());
        assert!(matches!(result, Err(SourceError::Configuration(_))));
    }
}
