//! HSE report and operator summary.
//!
//! `ReportRecord` is the flat key-value record handed to any renderer; this
//! module ships a Markdown renderer. `answer` produces the short plain-text
//! summary given to an operator asking about the last analysis.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::alert::hazop;
use crate::analysis::AnalysisResponse;
use crate::model::RiskLevel;

#[derive(Debug)]
pub enum ReportError {
    /// The analysis found no usable sample, so there is nothing to report.
    NoAnalysis,
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::NoAnalysis => write!(f, "No CH4 value to report; run the analysis first"),
        }
    }
}

impl std::error::Error for ReportError {}

/// Flat record of one analysis, in report order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRecord {
    pub site: String,
    pub latitude: f64,
    pub longitude: f64,
    pub image_date: String,
    pub value_ppb: f64,
    pub level: RiskLevel,
    pub recommended_action: String,
    pub strategy: String,
    pub z_score: Option<f64>,
    pub status: String,
    /// Set when the z-score was unavailable and fixed thresholds were used.
    pub note: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl ReportRecord {
    pub fn from_response(response: &AnalysisResponse) -> Result<Self, ReportError> {
        let primary = response.primary().ok_or(ReportError::NoAnalysis)?;
        let image_date = response
            .sample
            .observed_on()
            .ok_or(ReportError::NoAnalysis)?;

        Ok(Self {
            site: response.site.name.clone(),
            latitude: response.site.latitude,
            longitude: response.site.longitude,
            image_date: image_date.to_string(),
            value_ppb: primary.value_ppb,
            level: primary.level,
            recommended_action: primary.recommended_action.clone(),
            strategy: primary.strategy.to_string(),
            z_score: primary.z_score,
            status: response.status_message(),
            note: response.fallback_note(),
            generated_at: response.generated_at,
        })
    }

    /// `(key, value)` pairs for key-value renderers.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("Site", self.site.clone()),
            ("Coordinates", format!("{}, {}", self.latitude, self.longitude)),
            ("Satellite image date", self.image_date.clone()),
            ("CH4 concentration", format!("{:.1} ppb", self.value_ppb)),
            ("HSE risk level", self.level.to_string()),
            ("Recommended action", self.recommended_action.clone()),
            ("Classification", self.strategy.clone()),
        ];
        if let Some(z) = self.z_score {
            fields.push(("z-score", format!("{:.2}", z)));
        }
        fields
    }

    /// Suggested file name: `HSE_CH4_Report_<site>_<date>.md`.
    pub fn file_name(&self) -> String {
        format!(
            "HSE_CH4_Report_{}_{}.md",
            crate::sites::slug(&self.site),
            self.image_date
        )
    }
}

/// Renders the HSE report as Markdown.
pub fn render_markdown(record: &ReportRecord) -> String {
    let mut md = String::new();
    md.push_str("# HSE Report: Methane (CH₄) Monitoring\n\n");
    md.push_str(&format!("**Site:** {}  \n", record.site));
    md.push_str(&format!("**Coordinates:** {}, {}  \n", record.latitude, record.longitude));
    md.push_str(&format!("**Satellite image date:** {}  \n", record.image_date));
    md.push_str(&format!("**Status:** {}\n\n", record.status));
    if let Some(note) = &record.note {
        md.push_str(&format!("**Note:** {}\n\n", note));
    }

    md.push_str("| Parameter | Value |\n");
    md.push_str("|-----------|-------|\n");
    for (key, value) in record.fields().iter().skip(3) {
        md.push_str(&format!("| {} | {} |\n", key, value));
    }

    md.push_str("\n## HSE analysis\n\n");
    md.push_str(
        "Sentinel-5P data gives the column-averaged CH₄ concentration above the \
         monitored site. It is used to assess the environmental and operational \
         risk of fugitive gas emissions.\n",
    );

    md.push_str("\n## HSE reference thresholds\n\n");
    md.push_str("- Normal: CH₄ < 1850 ppb\n");
    md.push_str("- Elevated: 1850 ≤ CH₄ < 1900 ppb\n");
    md.push_str("- Critical: CH₄ ≥ 1900 ppb\n");
    md.push_str("- Statistical: Anomaly if z > 2, Critical if z > 3\n");

    let entry = hazop::entry_for(record.level);
    md.push_str("\n## HAZOP\n\n");
    md.push_str("| Deviation | Cause | Consequence | Action |\n");
    md.push_str("|-----------|-------|-------------|--------|\n");
    md.push_str(&format!(
        "| {} | {} | {} | {} |\n",
        entry.deviation, entry.cause, entry.consequence, entry.action
    ));

    md.push_str(&format!(
        "\n**Conclusion:** the measured CH₄ level is classified **{}**. \
         Recommended HSE action: **{}**.\n",
        record.level, record.recommended_action
    ));
    md.push_str(&format!(
        "\n_Report generated automatically on {}_\n",
        record.generated_at.format("%Y-%m-%d %H:%M UTC")
    ));
    md
}

/// Plain-text answer about the last analysis, for operators' questions.
pub fn answer(response: Option<&AnalysisResponse>) -> String {
    let Some(response) = response else {
        return "No analysis has been run yet. Run the CH4 analysis for a site first.".to_string();
    };
    let Some(primary) = response.primary() else {
        return format!("Site {}: {}.", response.site.name, response.status_message());
    };
    let mut text = format!(
        "Site {}: CH4 = {:.1} ppb ({}). Risk level: {}. Recommended action: {}.",
        response.site.name,
        primary.value_ppb,
        response.status_message(),
        primary.level,
        primary.recommended_action
    );
    if let Some(note) = response.fallback_note() {
        text.push_str(&format!(" Note: {}.", note));
    }
    text
}
