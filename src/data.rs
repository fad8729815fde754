//! Data loading and normalization
//!
//! Turns whatever the market-data collaborator handed over (CSV exports,
//! JSON chain snapshots, or bars built in memory) into an ordered,
//! validated [`BarSeries`]. Fetching from a provider is not done here.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::{OptionChainSnapshot, PriceBar, Symbol};

/// Approximate trading days per calendar week
pub const TRADING_DAYS_PER_WEEK: usize = 5;

// =============================================================================
// Bar Series
// =============================================================================

/// Validated daily bars with strictly increasing dates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarSeries {
    bars: Vec<PriceBar>,
}

impl BarSeries {
    /// Build a series, rejecting invalid bars and any date that does not
    /// strictly follow its predecessor
    pub fn new(bars: Vec<PriceBar>) -> EngineResult<Self> {
        for (index, bar) in bars.iter().enumerate() {
            bar.validate().map_err(|source| EngineError::InvalidBar {
                index,
                date: bar.date,
                source,
            })?;
        }

        for w in bars.windows(2) {
            if w[1].date == w[0].date {
                return Err(EngineError::DuplicateDate(w[1].date));
            }
            if w[1].date < w[0].date {
                return Err(EngineError::NonChronological {
                    previous: w[0].date,
                    current: w[1].date,
                });
            }
        }

        Ok(Self { bars })
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    /// Keep only the most recent `max_bars` bars
    pub fn window(&self, max_bars: usize) -> BarSeries {
        let start = self.bars.len().saturating_sub(max_bars);
        BarSeries {
            bars: self.bars[start..].to_vec(),
        }
    }

    /// Keep the trading days covered by `weeks` of history
    pub fn lookback_weeks(&self, weeks: usize) -> BarSeries {
        self.window(weeks * TRADING_DAYS_PER_WEEK)
    }
}

/// Sort raw provider bars by date, drop repeated dates (the later row wins),
/// then validate into a [`BarSeries`]
pub fn normalize_bars(raw: Vec<PriceBar>) -> EngineResult<BarSeries> {
    let mut raw = raw;
    raw.sort_by_key(|b| b.date);

    let mut bars: Vec<PriceBar> = Vec::with_capacity(raw.len());
    for bar in raw {
        match bars.last_mut() {
            Some(last) if last.date == bar.date => {
                warn!("Duplicate bar for {}; keeping the later row", bar.date);
                *last = bar;
            }
            _ => bars.push(bar),
        }
    }

    let series = BarSeries::new(bars)?;
    debug!(
        "Normalized {} bars ({:?} to {:?})",
        series.len(),
        series.first_date(),
        series.last_date()
    );
    Ok(series)
}

// =============================================================================
// CSV Data Loading
// =============================================================================

fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .or_else(|_| DateTime::parse_from_rfc3339(s).map(|dt| dt.date_naive()))
        .context(format!("Failed to parse date: {}", s))
}

fn parse_price(record: &csv::StringRecord, idx: usize, name: &str) -> Result<f64> {
    record
        .get(idx)
        .context(format!("Missing {} column", name))?
        .trim()
        .parse()
        .context(format!("Failed to parse {}", name))
}

/// Load daily bars from any CSV source with a `date,open,high,low,close[,...]` layout
pub fn load_csv_from_reader<R: Read>(reader: R) -> Result<Vec<PriceBar>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut bars = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.context(format!("Failed to read row {}", row_idx + 1))?;

        let date = parse_date(record.get(0).context("Missing date column")?)?;
        let open = parse_price(&record, 1, "open")?;
        let high = parse_price(&record, 2, "high")?;
        let low = parse_price(&record, 3, "low")?;
        let close = parse_price(&record, 4, "close")?;

        bars.push(PriceBar::new_unchecked(date, open, high, low, close));
    }

    Ok(bars)
}

/// Load daily bars from a CSV file
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<PriceBar>> {
    let file = File::open(path.as_ref())
        .context(format!("Failed to open CSV file {}", path.as_ref().display()))?;
    let bars = load_csv_from_reader(file)?;
    info!("Loaded {} bars from {}", bars.len(), path.as_ref().display());
    Ok(bars)
}

/// Load an option chain snapshot from JSON
pub fn load_option_chain(path: impl AsRef<Path>) -> Result<OptionChainSnapshot> {
    let contents = std::fs::read_to_string(path.as_ref()).context(format!(
        "Failed to read option chain {}",
        path.as_ref().display()
    ))?;
    let snapshot: OptionChainSnapshot =
        serde_json::from_str(&contents).context("Failed to parse option chain JSON")?;
    let invalid = snapshot
        .expirations
        .iter()
        .flat_map(|e| e.calls.iter())
        .filter(|q| !q.is_valid())
        .count();
    if invalid > 0 {
        warn!(
            "{} call quotes with a negative or non-finite strike or bid will be ignored",
            invalid
        );
    }
    info!(
        "Loaded {} expirations ({} call quotes) from {}",
        snapshot.expirations.len(),
        snapshot.total_quotes(),
        path.as_ref().display()
    );
    Ok(snapshot)
}

/// Conventional bar file location: `{data_dir}/{SYMBOL}_1d.csv`
pub fn bars_path(data_dir: impl AsRef<Path>, symbol: &Symbol) -> PathBuf {
    data_dir.as_ref().join(format!("{}_1d.csv", symbol.as_str()))
}

/// Conventional chain snapshot location: `{data_dir}/{SYMBOL}_options.json`
pub fn chain_path(data_dir: impl AsRef<Path>, symbol: &Symbol) -> PathBuf {
    data_dir
        .as_ref()
        .join(format!("{}_options.json", symbol.as_str()))
}

// =============================================================================
// Data Validation
// =============================================================================

/// Validate bar data for consistency without failing
pub fn validate_bars(bars: &[PriceBar]) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if bars.is_empty() {
        errors.push("No bars provided".to_string());
        return ValidationResult { errors, warnings };
    }

    for (i, bar) in bars.iter().enumerate() {
        if let Err(e) = bar.validate() {
            errors.push(format!("Bar {} ({}): {}", i, bar.date, e));
        }
        if i > 0 && bar.date <= bars[i - 1].date {
            warnings.push(format!("Bar {} ({}): not chronological", i, bar.date));
        }
    }

    ValidationResult { errors, warnings }
}

/// Result of data validation
#[derive(Debug)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bar(d: u32, close: f64) -> PriceBar {
        PriceBar::new_unchecked(date(2024, 3, d), close, close + 1.0, close - 1.0, close)
    }

    #[test]
    fn test_normalize_sorts_and_dedups() {
        let raw = vec![bar(6, 102.0), bar(4, 100.0), bar(5, 101.0), bar(5, 101.5)];
        let series = normalize_bars(raw).unwrap();

        let dates: Vec<NaiveDate> = series.bars().iter().map(|b| b.date).collect();
        assert_eq!(dates, vec![date(2024, 3, 4), date(2024, 3, 5), date(2024, 3, 6)]);
        // Later row for the 5th wins
        assert_eq!(series.bars()[1].close, 101.5);
    }

    #[test]
    fn test_series_rejects_out_of_order() {
        let err = BarSeries::new(vec![bar(5, 100.0), bar(4, 100.0)]).unwrap_err();
        assert!(matches!(err, EngineError::NonChronological { .. }));

        let err = BarSeries::new(vec![bar(5, 100.0), bar(5, 100.0)]).unwrap_err();
        assert_eq!(err, EngineError::DuplicateDate(date(2024, 3, 5)));
    }

    #[test]
    fn test_series_rejects_invalid_bar() {
        let bad = PriceBar::new_unchecked(date(2024, 3, 5), 100.0, 99.0, 101.0, 100.0);
        let err = normalize_bars(vec![bar(4, 100.0), bad]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidBar { index: 1, .. }));
    }

    #[test]
    fn test_window_keeps_most_recent() {
        let series = normalize_bars((1..=20).map(|d| bar(d, 100.0 + d as f64)).collect()).unwrap();

        let recent = series.window(5);
        assert_eq!(recent.len(), 5);
        assert_eq!(recent.first_date(), Some(date(2024, 3, 16)));
        assert_eq!(recent.last_close(), Some(120.0));

        // Asking for more than exists keeps everything
        assert_eq!(series.lookback_weeks(52).len(), 20);
        assert_eq!(series.lookback_weeks(2).len(), 10);
    }

    #[test]
    fn test_load_csv_from_reader() {
        let csv = "date,open,high,low,close,volume\n\
                   2024-03-04,100.0,105.0,99.0,104.0,1000\n\
                   2024-03-05 00:00:00,104.0,106.0,101.0,102.0,1200\n";
        let bars = load_csv_from_reader(csv.as_bytes()).unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, date(2024, 3, 4));
        assert_eq!(bars[1].date, date(2024, 3, 5));
        assert_eq!(bars[1].low, 101.0);
    }

    #[test]
    fn test_load_csv_reports_bad_price() {
        let csv = "date,open,high,low,close\n2024-03-04,abc,105.0,99.0,104.0\n";
        let err = load_csv_from_reader(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("open"));
    }

    #[test]
    fn test_validate_bars() {
        let bars = vec![bar(4, 100.0), bar(5, 101.0)];
        assert!(validate_bars(&bars).is_valid());

        let result = validate_bars(&[bar(5, 100.0), bar(4, 100.0)]);
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);

        assert!(!validate_bars(&[]).is_valid());
    }

    #[test]
    fn test_default_paths() {
        let symbol = Symbol::new("tsla");
        assert_eq!(bars_path("data", &symbol), PathBuf::from("data/TSLA_1d.csv"));
        assert_eq!(
            chain_path("data", &symbol),
            PathBuf::from("data/TSLA_options.json")
        );
    }
}
