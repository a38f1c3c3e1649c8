//! CH₄ site monitoring service.
//!
//! Finds the most recent usable Sentinel-5P methane sample over an oil/gas
//! site, classifies it against fixed HSE thresholds or the site's own
//! history, and renders the result as an HSE report.

pub mod alert;
pub mod analysis;
pub mod config;
pub mod dev_mode;
pub mod history;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod report;
pub mod selection;
pub mod sites;
pub mod verify;
