//! Static HAZOP-style cause / consequence / safeguard table, keyed by risk
//! band. Rendered beneath the assessment in the HSE report.

use crate::model::RiskLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HazopEntry {
    pub level: RiskLevel,
    pub deviation: &'static str,
    pub cause: &'static str,
    pub consequence: &'static str,
    pub action: &'static str,
}

pub static HAZOP_TABLE: &[HazopEntry] = &[
    HazopEntry {
        level: RiskLevel::Normal,
        deviation: "CH₄ at background level",
        cause: "Normal operation, no detectable fugitive emission",
        consequence: "None",
        action: "Continuous monitoring",
    },
    HazopEntry {
        level: RiskLevel::Elevated,
        deviation: "CH₄ above site reference",
        cause: "Minor leak at flange, valve or compressor seal; venting",
        consequence: "Local flammable atmosphere risk, GHG emissions",
        action: "Urgent HSE inspection, LDAR survey of suspect equipment",
    },
    HazopEntry {
        level: RiskLevel::Anomaly,
        deviation: "CH₄ statistically abnormal for this site",
        cause: "New emission source, process upset, or flaring failure",
        consequence: "Emission trend change, potential escalation",
        action: "Targeted field inspection, cross-check process logs",
    },
    HazopEntry {
        level: RiskLevel::Critical,
        deviation: "CH₄ far above reference",
        cause: "Major leak, well integrity loss, or uncontrolled release",
        consequence: "Fire / explosion hazard, exposure of personnel",
        action: "Immediate shutdown, HSE alert, evacuate exposed area",
    },
];

/// The HAZOP row for a risk band.
pub fn entry_for(level: RiskLevel) -> &'static HazopEntry {
    // Every level has a row; the test below holds the table to that.
    HAZOP_TABLE
        .iter()
        .find(|e| e.level == level)
        .unwrap_or(&HAZOP_TABLE[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_level_has_exactly_one_row() {
        for level in [RiskLevel::Normal, RiskLevel::Elevated, RiskLevel::Anomaly, RiskLevel::Critical] {
            let rows = HAZOP_TABLE.iter().filter(|e| e.level == level).count();
            assert_eq!(rows, 1, "expected one HAZOP row for {}", level);
            assert_eq!(entry_for(level).level, level);
        }
    }

    #[test]
    fn test_critical_row_calls_for_shutdown() {
        assert!(entry_for(RiskLevel::Critical).action.contains("shutdown"));
    }
}
