//! Fixed-threshold CH₄ classification.
//!
//! Three contiguous bands over the real line, each inclusive on its lower
//! bound:
//!
//! ```text
//!   value <  elevated            -> Normal
//!   elevated <= value < critical -> Elevated
//!   critical <= value            -> Critical
//! ```

use serde::{Deserialize, Serialize};

use crate::model::{RiskAssessment, RiskLevel, Strategy};

/// Lower bound of the Elevated band, in ppb.
pub const ELEVATED_PPB: f64 = 1850.0;

/// Lower bound of the Critical band, in ppb.
pub const CRITICAL_PPB: f64 = 1900.0;

pub const ACTION_CRITICAL: &str = "Immediate shutdown + HSE alert";
pub const ACTION_ELEVATED: &str = "Urgent HSE inspection";
pub const ACTION_NORMAL: &str = "Continuous monitoring";

/// Band boundaries for a site, in ppb.
///
/// Must satisfy `elevated_ppb < critical_ppb`; see `validate`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MethaneThresholds {
    pub elevated_ppb: f64,
    pub critical_ppb: f64,
}

impl Default for MethaneThresholds {
    fn default() -> Self {
        Self {
            elevated_ppb: ELEVATED_PPB,
            critical_ppb: CRITICAL_PPB,
        }
    }
}

impl MethaneThresholds {
    pub fn validate(&self) -> Result<(), String> {
        if !self.elevated_ppb.is_finite() || !self.critical_ppb.is_finite() {
            return Err("thresholds must be finite".to_string());
        }
        if self.elevated_ppb >= self.critical_ppb {
            return Err(format!(
                "elevated threshold ({}) must be below critical threshold ({})",
                self.elevated_ppb, self.critical_ppb
            ));
        }
        Ok(())
    }

    /// Returns the band and recommended action for `value_ppb`.
    pub fn band(&self, value_ppb: f64) -> (RiskLevel, &'static str) {
        if value_ppb >= self.critical_ppb {
            (RiskLevel::Critical, ACTION_CRITICAL)
        } else if value_ppb >= self.elevated_ppb {
            (RiskLevel::Elevated, ACTION_ELEVATED)
        } else {
            (RiskLevel::Normal, ACTION_NORMAL)
        }
    }
}

/// Classifies a reading against the standard 1850 / 1900 ppb bands.
pub fn classify_fixed(value_ppb: f64) -> RiskAssessment {
    classify_with(value_ppb, &MethaneThresholds::default())
}

/// Classifies a reading against site-specific bands.
pub fn classify_with(value_ppb: f64, thresholds: &MethaneThresholds) -> RiskAssessment {
    let (level, action) = thresholds.band(value_ppb);
    RiskAssessment {
        value_ppb,
        level,
        recommended_action: action.to_string(),
        strategy: Strategy::FixedThreshold,
        z_score: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- Bands ---------------------------------------------------------------

    #[test]
    fn test_values_below_elevated_are_normal() {
        for value in [0.0, 1200.0, 1700.0, 1849.0, 1849.999] {
            let a = classify_fixed(value);
            assert_eq!(a.level, RiskLevel::Normal, "{} ppb should be Normal", value);
            assert_eq!(a.recommended_action, ACTION_NORMAL);
        }
    }

    #[test]
    fn test_values_in_middle_band_are_elevated() {
        for value in [1850.0, 1860.0, 1875.5, 1899.0, 1899.999] {
            assert_eq!(
                classify_fixed(value).level,
                RiskLevel::Elevated,
                "{} ppb should be Elevated",
                value
            );
        }
    }

    #[test]
    fn test_values_at_or_above_critical_are_critical() {
        for value in [1900.0, 1900.001, 2100.0, 5000.0] {
            assert_eq!(
                classify_fixed(value).level,
                RiskLevel::Critical,
                "{} ppb should be Critical",
                value
            );
        }
    }

    // --- Boundaries ----------------------------------------------------------

    #[test]
    fn test_lower_bounds_are_inclusive() {
        assert_eq!(classify_fixed(1850.0).level, RiskLevel::Elevated);
        assert_eq!(classify_fixed(1899.999).level, RiskLevel::Elevated);
        assert_eq!(classify_fixed(1900.0).level, RiskLevel::Critical);
    }

    #[test]
    fn test_1860_ppb_requires_urgent_inspection() {
        let a = classify_fixed(1860.0);
        assert_eq!(a.level, RiskLevel::Elevated);
        assert_eq!(a.recommended_action, "Urgent HSE inspection");
        assert_eq!(a.strategy, Strategy::FixedThreshold);
        assert!(a.z_score.is_none());
    }

    #[test]
    fn test_critical_action_text() {
        assert_eq!(
            classify_fixed(1950.0).recommended_action,
            "Immediate shutdown + HSE alert"
        );
    }

    // --- Custom thresholds ---------------------------------------------------

    #[test]
    fn test_site_specific_thresholds() {
        let t = MethaneThresholds { elevated_ppb: 1900.0, critical_ppb: 2000.0 };
        assert_eq!(classify_with(1950.0, &t).level, RiskLevel::Elevated);
        assert_eq!(classify_with(1899.0, &t).level, RiskLevel::Normal);
    }

    #[test]
    fn test_inverted_thresholds_are_rejected() {
        let t = MethaneThresholds { elevated_ppb: 1900.0, critical_ppb: 1850.0 };
        assert!(t.validate().is_err());
        assert!(MethaneThresholds::default().validate().is_ok());
    }
}
