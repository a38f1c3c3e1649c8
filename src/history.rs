/// Historical CH₄ series for a site.
///
/// The series is loaded wholesale from a CSV export (one row per date, one
/// numeric column whose header contains "ch4") and is only ever read: the
/// z-score strategy needs its mean and standard deviation, nothing else.

use std::path::Path;

use chrono::NaiveDate;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum HistoryError {
    Io(String),
    Csv(String),
    /// No header contains "ch4" (case-insensitive).
    MissingColumn { headers: Vec<String> },
    /// A non-empty cell in the CH₄ column is not a number.
    InvalidValue { row: usize, raw: String },
    /// The CH₄ column exists but holds no numeric values.
    Empty,
}

impl std::fmt::Display for HistoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryError::Io(e) => write!(f, "History file I/O error: {}", e),
            HistoryError::Csv(msg) => write!(f, "History file CSV error: {}", msg),
            HistoryError::MissingColumn { headers } => {
                write!(f, "No CH4 column in history file (headers: {})", headers.join(", "))
            }
            HistoryError::InvalidValue { row, raw } => {
                write!(f, "Invalid CH4 value '{}' at row {}", raw, row)
            }
            HistoryError::Empty => write!(f, "History file contains no CH4 values"),
        }
    }
}

impl std::error::Error for HistoryError {}

impl From<std::io::Error> for HistoryError {
    fn from(e: std::io::Error) -> Self {
        HistoryError::Io(e.to_string())
    }
}

impl From<csv::Error> for HistoryError {
    fn from(e: csv::Error) -> Self {
        HistoryError::Csv(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

/// Mean and sample standard deviation of a series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator).
    pub std_dev: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoricalSeries {
    /// Dates parallel to `values`, when the file carried a date column.
    pub dates: Vec<Option<NaiveDate>>,
    pub values: Vec<f64>,
}

impl HistoricalSeries {
    pub fn from_values(values: Vec<f64>) -> Self {
        Self {
            dates: vec![None; values.len()],
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }

    /// Sample standard deviation. `None` below two samples.
    pub fn std_dev(&self) -> Option<f64> {
        let n = self.values.len();
        if n < 2 {
            return None;
        }
        let mean = self.mean()?;
        let ss: f64 = self.values.iter().map(|v| (v - mean).powi(2)).sum();
        Some((ss / (n - 1) as f64).sqrt())
    }

    pub fn stats(&self) -> Option<SeriesStats> {
        Some(SeriesStats {
            count: self.values.len(),
            mean: self.mean()?,
            std_dev: self.std_dev()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Loads a history CSV from disk.
pub fn load_csv(path: &Path) -> Result<HistoricalSeries, HistoryError> {
    let file = std::fs::File::open(path)?;
    parse_csv(file)
}

/// Parses history CSV from any reader.
///
/// The value column is the first header containing "ch4"; an optional date
/// column is the first header containing "date" or "time". Empty, `NaN` and
/// `null` cells are skipped.
pub fn parse_csv<R: std::io::Read>(reader: R) -> Result<HistoricalSeries, HistoryError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    let lower: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();

    let value_idx = lower
        .iter()
        .position(|h| h.contains("ch4"))
        .ok_or_else(|| HistoryError::MissingColumn { headers: headers.clone() })?;
    let date_idx = lower
        .iter()
        .position(|h| h.contains("date") || h.contains("time"));

    let mut series = HistoricalSeries::default();

    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        // Header is row 1.
        let row = i + 2;

        let raw = record.get(value_idx).unwrap_or("");
        if is_missing(raw) {
            continue;
        }
        let value: f64 = raw.parse().map_err(|_| HistoryError::InvalidValue {
            row,
            raw: raw.to_string(),
        })?;
        if !value.is_finite() {
            continue;
        }

        let date = date_idx
            .and_then(|idx| record.get(idx))
            .and_then(parse_date);

        series.values.push(value);
        series.dates.push(date);
    }

    if series.is_empty() {
        return Err(HistoryError::Empty);
    }
    Ok(series)
}

fn is_missing(raw: &str) -> bool {
    raw.is_empty()
        || raw.eq_ignore_ascii_case("nan")
        || raw.eq_ignore_ascii_case("null")
        || raw.eq_ignore_ascii_case("na")
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    // Accept "2024-05-01" and "2024-05-01T00:00:00" / "2024-05-01 00:00:00".
    let day = raw.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}
