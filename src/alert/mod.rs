/// Risk classification for CH₄ readings.
///
/// Submodules:
/// - `thresholds`: fixed 1850 / 1900 ppb bands.
/// - `zscore`: anomaly score against the site's historical series.
/// - `stalenesses`: age of the sample being classified.
/// - `hazop`: cause / consequence / action table per band.

pub mod hazop;
pub mod stalenesses;
pub mod thresholds;
pub mod zscore;
