//! Service configuration.
//!
//! Loaded from a TOML file (default `ch4mon.toml`), then overridden from the
//! environment. Secrets never live in the TOML file: the Earth Engine access
//! token comes from `EE_ACCESS_TOKEN`, which may be set in a `.env` file.
//!
//! ```toml
//! [earth_engine]
//! project = "my-hse-project"
//! scale_m = 7000.0
//!
//! [analysis]
//! lookback_days = 60
//!
//! [[site]]
//! id = "hassi-rmel"
//! name = "Hassi R'mel"
//! latitude = 32.93
//! longitude = 3.30
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::alert::thresholds::{CRITICAL_PPB, ELEVATED_PPB, MethaneThresholds};
use crate::logging::LogLevel;
use crate::sites::Site;

pub const DEFAULT_CONFIG_PATH: &str = "./ch4mon.toml";

pub const ENV_ACCESS_TOKEN: &str = "EE_ACCESS_TOKEN";
pub const ENV_PROJECT: &str = "EE_PROJECT";
pub const ENV_LOG_LEVEL: &str = "CH4MON_LOG_LEVEL";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
    Invalid(String),
    MissingEnv(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Config file I/O error: {}", e),
            ConfigError::Parse(msg) => write!(f, "Config parse error: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
            ConfigError::MissingEnv(var) => write!(f, "Environment variable {} is not set", var),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Spatial reducer applied around the site point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    Mean,
    Max,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EarthEngineConfig {
    /// Cloud project billed for `value:compute`.
    pub project: String,
    pub api_base: String,
    pub collection: String,
    pub band: String,
    /// Multiplier from the band's native unit to ppb. The L3 CH₄ band is
    /// already ppb, so 1.0; use 1e9 for a raw mole fraction.
    pub unit_scale: f64,
    pub reducer: Reducer,
    /// Averaging radius around the point, in metres.
    pub scale_m: f64,
    pub max_pixels: f64,
    pub page_size: u32,
    pub timeout_secs: u64,
    pub retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for EarthEngineConfig {
    fn default() -> Self {
        Self {
            project: String::new(),
            api_base: "https://earthengine.googleapis.com".to_string(),
            collection: "COPERNICUS/S5P/OFFL/L3_CH4".to_string(),
            band: "CH4_column_volume_mixing_ratio_dry_air".to_string(),
            unit_scale: 1.0,
            reducer: Reducer::Mean,
            scale_m: 7000.0,
            max_pixels: 1e9,
            page_size: 100,
            timeout_secs: 30,
            retries: 1,
            retry_delay_secs: 2,
        }
    }
}

/// Which classifier drives the reported risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyChoice {
    Fixed,
    Zscore,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub lookback_days: i64,
    pub strategy: StrategyChoice,
    pub elevated_ppb: f64,
    pub critical_ppb: f64,
    /// Samples older than this are reported as stale.
    pub max_age_days: i64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            lookback_days: 60,
            strategy: StrategyChoice::Fixed,
            elevated_ppb: ELEVATED_PPB,
            critical_ppb: CRITICAL_PPB,
            max_age_days: 7,
        }
    }
}

impl AnalysisConfig {
    pub fn thresholds(&self) -> MethaneThresholds {
        MethaneThresholds {
            elevated_ppb: self.elevated_ppb,
            critical_ppb: self.critical_ppb,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            timestamps: false,
        }
    }
}

impl LoggingConfig {
    pub fn min_level(&self) -> LogLevel {
        self.level.parse().unwrap_or(LogLevel::Info)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub earth_engine: EarthEngineConfig,
    pub analysis: AnalysisConfig,
    pub logging: LoggingConfig,
    #[serde(rename = "site")]
    pub sites: Vec<Site>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl ServiceConfig {
    /// Loads `.env`, then the TOML file at `path` (defaults if it does not
    /// exist), then applies environment overrides and validates.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
            Self::from_toml_str(&text)?
        } else {
            Self::default()
        };

        config.apply_env_with(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Applies overrides from any key-value lookup.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(project) = lookup(ENV_PROJECT).filter(|p| !p.trim().is_empty()) {
            self.earth_engine.project = project;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ee = &self.earth_engine;
        if !(1000.0..=50_000.0).contains(&ee.scale_m) {
            return Err(ConfigError::Invalid(format!(
                "earth_engine.scale_m must be between 1000 and 50000 metres, got {}",
                ee.scale_m
            )));
        }
        if !(ee.max_pixels.is_finite() && ee.max_pixels >= 1.0) {
            return Err(ConfigError::Invalid("earth_engine.max_pixels must be >= 1".to_string()));
        }
        if !(ee.unit_scale.is_finite() && ee.unit_scale > 0.0) {
            return Err(ConfigError::Invalid("earth_engine.unit_scale must be positive".to_string()));
        }
        if ee.timeout_secs == 0 {
            return Err(ConfigError::Invalid("earth_engine.timeout_secs must be > 0".to_string()));
        }
        if ee.retries > 1 {
            return Err(ConfigError::Invalid(format!(
                "earth_engine.retries is at most 1, got {}",
                ee.retries
            )));
        }
        if ee.page_size == 0 {
            return Err(ConfigError::Invalid("earth_engine.page_size must be > 0".to_string()));
        }

        let analysis = &self.analysis;
        if !(1..=365).contains(&analysis.lookback_days) {
            return Err(ConfigError::Invalid(format!(
                "analysis.lookback_days must be between 1 and 365, got {}",
                analysis.lookback_days
            )));
        }
        if analysis.max_age_days < 0 {
            return Err(ConfigError::Invalid("analysis.max_age_days must be >= 0".to_string()));
        }
        analysis.thresholds().validate().map_err(ConfigError::Invalid)?;

        if self.logging.level.parse::<LogLevel>().is_err() {
            return Err(ConfigError::Invalid(format!("unknown log level '{}'", self.logging.level)));
        }

        let mut seen = std::collections::HashSet::new();
        for site in &self.sites {
            if !site.location().is_valid() {
                return Err(ConfigError::Invalid(format!("site '{}' has invalid coordinates", site.id)));
            }
            if !seen.insert(site.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate site id '{}'", site.id)));
            }
        }
        Ok(())
    }
}

/// Reads the Earth Engine bearer token from the environment (after `.env`).
pub fn access_token() -> Result<String, ConfigError> {
    dotenv::dotenv().ok();
    std::env::var(ENV_ACCESS_TOKEN)
        .ok()
        .filter(|t| !t.trim().is_empty())
        .ok_or(ConfigError::MissingEnv(ENV_ACCESS_TOKEN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.earth_engine.collection, "COPERNICUS/S5P/OFFL/L3_CH4");
        assert_eq!(config.earth_engine.unit_scale, 1.0);
        assert_eq!(config.earth_engine.retries, 1);
        assert_eq!(config.analysis.lookback_days, 60);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let text = r#"
            [earth_engine]
            project = "hse-monitoring"
            scale_m = 3500.0
            reducer = "max"

            [analysis]
            strategy = "zscore"

            [[site]]
            id = "hassi-rmel"
            name = "Hassi R'mel"
            latitude = 32.93
            longitude = 3.30
        "#;
        let config = ServiceConfig::from_toml_str(text).expect("valid toml");
        assert_eq!(config.earth_engine.project, "hse-monitoring");
        assert_eq!(config.earth_engine.scale_m, 3500.0);
        assert_eq!(config.earth_engine.reducer, Reducer::Max);
        assert_eq!(config.earth_engine.timeout_secs, 30);
        assert_eq!(config.analysis.strategy, StrategyChoice::Zscore);
        assert_eq!(config.analysis.lookback_days, 60);
        assert_eq!(config.sites.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_project_and_level() {
        let mut config = ServiceConfig::default();
        config.apply_env_with(|key| match key {
            ENV_PROJECT => Some("from-env".to_string()),
            ENV_LOG_LEVEL => Some("debug".to_string()),
            _ => None,
        });
        assert_eq!(config.earth_engine.project, "from-env");
        assert_eq!(config.logging.min_level(), LogLevel::Debug);
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let mut config = ServiceConfig::default();
        config.earth_engine.scale_m = 100.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ServiceConfig::default();
        config.earth_engine.retries = 3;
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.analysis.lookback_days = 0;
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.analysis.elevated_ppb = 1950.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_site_ids_are_rejected() {
        let text = r#"
            [[site]]
            id = "a"
            name = "A"
            latitude = 1.0
            longitude = 1.0

            [[site]]
            id = "a"
            name = "A again"
            latitude = 2.0
            longitude = 2.0
        "#;
        let config = ServiceConfig::from_toml_str(text).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        assert!(matches!(
            ServiceConfig::from_toml_str("[earth_engine\nproject ="),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("ch4mon_no_such_config.toml");
        let config = ServiceConfig::load(&path).expect("defaults are valid");
        assert_eq!(config.earth_engine.scale_m, 7000.0);
    }
}
