//! Statistical anomaly classification against a site's own history.
//!
//! `z = (value - mean) / std_dev`, then:
//!
//! ```text
//!   z > 3     -> Critical
//!   z > 2     -> Anomaly
//!   otherwise -> Normal
//! ```
//!
//! Only upward departures are flagged; a reading far below the site mean is
//! Normal. With fewer than two samples or zero spread there is no z-score and
//! the outcome is `InsufficientHistory`.

use crate::history::HistoricalSeries;
use crate::model::{RiskAssessment, RiskLevel, Strategy};

pub const Z_CRITICAL: f64 = 3.0;
pub const Z_ANOMALY: f64 = 2.0;

pub const ACTION_CRITICAL: &str = "Immediate HSE alert + inspection";
pub const ACTION_ANOMALY: &str = "Targeted field inspection";
pub const ACTION_NORMAL: &str = "Continuous monitoring";
pub const ACTION_INSUFFICIENT: &str = "Continuous monitoring (insufficient history)";

#[derive(Debug, Clone, PartialEq)]
pub enum ZScoreOutcome {
    Scored(RiskAssessment),
    /// History too short or flat to score against. The attached assessment
    /// is Normal with no z-score.
    InsufficientHistory {
        assessment: RiskAssessment,
        samples: usize,
    },
}

impl ZScoreOutcome {
    pub fn assessment(&self) -> &RiskAssessment {
        match self {
            ZScoreOutcome::Scored(a) => a,
            ZScoreOutcome::InsufficientHistory { assessment, .. } => assessment,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(self, ZScoreOutcome::InsufficientHistory { .. })
    }

    pub fn z(&self) -> Option<f64> {
        self.assessment().z_score
    }
}

/// Maps a z-score to its label and action.
pub fn band(z: f64) -> (RiskLevel, &'static str) {
    if z > Z_CRITICAL {
        (RiskLevel::Critical, ACTION_CRITICAL)
    } else if z > Z_ANOMALY {
        (RiskLevel::Anomaly, ACTION_ANOMALY)
    } else {
        (RiskLevel::Normal, ACTION_NORMAL)
    }
}

pub fn classify_zscore(value_ppb: f64, history: &HistoricalSeries) -> ZScoreOutcome {
    let stats = history
        .stats()
        .filter(|s| s.std_dev.is_finite() && s.std_dev > 0.0);

    let Some(stats) = stats else {
        return ZScoreOutcome::InsufficientHistory {
            assessment: RiskAssessment {
                value_ppb,
                level: RiskLevel::Normal,
                recommended_action: ACTION_INSUFFICIENT.to_string(),
                strategy: Strategy::ZScore,
                z_score: None,
            },
            samples: history.len(),
        };
    };

    let z = (value_ppb - stats.mean) / stats.std_dev;
    let (level, action) = band(z);

    ZScoreOutcome::Scored(RiskAssessment {
        value_ppb,
        level,
        recommended_action: action.to_string(),
        strategy: Strategy::ZScore,
        z_score: Some(z),
    })
}
