//! Data Source Verification Module
//!
//! Checks every configured site against the live observation source to see
//! whether images are listed over it and whether any of them carry a usable
//! CH₄ value in the lookback window.
//!
//! Run this after adding a site or rotating credentials.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::ObservationSource;
use crate::logging;
use crate::model::{LatestSample, Observation};
use crate::selection;
use crate::sites::Site;

/// Images read per site before giving up on finding a usable value.
pub const MAX_READS_PER_SITE: usize = 5;

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub timestamp: String,
    pub lookback_days: i64,
    pub site_results: Vec<SiteVerification>,
    pub summary: VerificationSummary,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub total: usize,
    pub working: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteVerification {
    pub site_id: String,
    pub name: String,
    pub status: VerificationStatus,
    pub images_listed: usize,
    pub images_read: usize,
    pub usable_values: usize,
    pub latest_usable_date: Option<NaiveDate>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum VerificationStatus {
    /// Images listed and at least one usable value found.
    Success,
    /// Images listed but none of the sampled ones had data at the site.
    PartialSuccess,
    Failed,
}

// ============================================================================
// Site Verification
// ============================================================================

pub fn verify_site<S: ObservationSource>(
    source: &S,
    site: &Site,
    lookback_days: i64,
    today: NaiveDate,
) -> SiteVerification {
    let mut result = SiteVerification {
        site_id: site.id.clone(),
        name: site.name.clone(),
        status: VerificationStatus::Failed,
        images_listed: 0,
        images_read: 0,
        usable_values: 0,
        latest_usable_date: None,
        error_message: None,
    };

    let (start, end_exclusive) = match selection::search_window(today, lookback_days) {
        Ok(window) => window,
        Err(e) => {
            result.error_message = Some(e.to_string());
            return result;
        }
    };

    let mut images = match source.list_observations(site.location(), start, end_exclusive) {
        Ok(images) => images,
        Err(e) => {
            logging::log_ee_failure(&site.id, "listImages", &e);
            result.error_message = Some(format!("Listing failed: {}", e));
            return result;
        }
    };
    // Same window and usability rules as the selector, so a working site is
    // one `select_latest` would find a sample for.
    images.retain(|image| selection::in_window(image, start, end_exclusive));
    result.images_listed = images.len();
    images.sort_by(|a, b| b.acquired_at.cmp(&a.acquired_at));

    for image in images.iter().take(MAX_READS_PER_SITE) {
        result.images_read += 1;
        match source.read_value(image, site.location()) {
            Ok(value) => {
                let observation = Observation {
                    timestamp: image.acquired_at,
                    value,
                    location: site.location(),
                };
                if let Some(LatestSample::Found { observed_on, .. }) =
                    LatestSample::from_observation(&observation, today)
                {
                    result.usable_values += 1;
                    result.latest_usable_date.get_or_insert(observed_on);
                }
            }
            Err(e) => {
                logging::log_ee_failure(&site.id, "value:compute", &e);
                result.error_message = Some(format!("Read failed: {}", e));
                break;
            }
        }
    }

    result.status = status_for(&result);
    result
}

fn status_for(result: &SiteVerification) -> VerificationStatus {
    if result.usable_values > 0 {
        VerificationStatus::Success
    } else if result.images_listed > 0 && result.error_message.is_none() {
        VerificationStatus::PartialSuccess
    } else {
        VerificationStatus::Failed
    }
}

// ============================================================================
// Full Verification Runner
// ============================================================================

pub fn run_verification<S: ObservationSource>(
    source: &S,
    sites: &[Site],
    lookback_days: i64,
) -> VerificationReport {
    let today = Utc::now().date_naive();
    let mut report = VerificationReport {
        timestamp: Utc::now().to_rfc3339(),
        lookback_days,
        site_results: Vec::new(),
        summary: VerificationSummary {
            total: sites.len(),
            ..VerificationSummary::default()
        },
    };

    println!("🔍 Verifying sites...");
    for site in sites {
        print!("  {} ... ", site.id);
        let result = verify_site(source, site, lookback_days, today);

        match result.status {
            VerificationStatus::Success => {
                println!(
                    "✓ OK ({} images, latest usable {})",
                    result.images_listed,
                    result
                        .latest_usable_date
                        .map(|d| d.to_string())
                        .unwrap_or_default()
                );
                report.summary.working += 1;
            }
            VerificationStatus::PartialSuccess => {
                println!(
                    "⚠ Partial ({} images, none of the latest {} usable)",
                    result.images_listed, result.images_read
                );
                report.summary.working += 1;
            }
            VerificationStatus::Failed => {
                println!("✗ FAILED: {}", result.error_message.as_deref().unwrap_or("No images"));
                report.summary.failed += 1;
            }
        }

        report.site_results.push(result);
    }

    logging::log_verification_summary(
        report.summary.total,
        report.summary.working,
        report.summary.failed,
    );
    report
}

pub fn print_summary(report: &VerificationReport) {
    println!("\n═══════════════════════════════════════════════════════════");
    println!("📊 VERIFICATION SUMMARY");
    println!("═══════════════════════════════════════════════════════════");
    println!();
    println!(
        "Sites:    {}/{} working  ({} failed)",
        report.summary.working, report.summary.total, report.summary.failed
    );

    let success_rate = if report.summary.total > 0 {
        (report.summary.working as f64 / report.summary.total as f64) * 100.0
    } else {
        0.0
    };

    println!("Overall Success Rate: {:.1}%", success_rate);
    println!("═══════════════════════════════════════════════════════════");
}

pub fn render_markdown(report: &VerificationReport) -> String {
    let mut md = String::new();
    md.push_str("# Data Source Verification Report\n\n");
    md.push_str(&format!("**Generated:** {}\n\n", report.timestamp));
    md.push_str(&format!("**Window:** last {} days\n\n", report.lookback_days));

    md.push_str("## Summary\n\n");
    md.push_str(&format!(
        "- **Sites:** {}/{} working ({} failed)\n\n",
        report.summary.working, report.summary.total, report.summary.failed
    ));

    md.push_str("| Site | Name | Status | Images | Usable | Latest usable |\n");
    md.push_str("|------|------|--------|--------|--------|---------------|\n");

    for result in &report.site_results {
        let status_icon = match result.status {
            VerificationStatus::Success => "✅",
            VerificationStatus::PartialSuccess => "⚠️",
            VerificationStatus::Failed => "❌",
        };

        md.push_str(&format!(
            "| {} | {} | {} | {} | {}/{} | {} |\n",
            result.site_id,
            result.name,
            status_icon,
            result.images_listed,
            result.usable_values,
            result.images_read,
            result
                .latest_usable_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string())
        ));
    }
    md
}
