//! Result export
//!
//! Weekly outcomes go to CSV (one flat row per week); the full report goes
//! to pretty-printed JSON.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::backtest::BacktestReport;
use crate::optimizer::OptimizationResult;
use crate::{ExitReason, Symbol, WeeklyOutcome};

/// CSV row for one week; the exit reason is flattened to kind + date
#[derive(Debug, Serialize)]
struct OutcomeRow<'a> {
    week: &'a str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    monday_price: f64,
    friday_price: f64,
    stop_level: f64,
    strike_cap: f64,
    sell_price: f64,
    return_pct: f64,
    exit_reason: String,
    stop_loss_date: Option<NaiveDate>,
    capital_after: f64,
}

impl<'a> From<&'a WeeklyOutcome> for OutcomeRow<'a> {
    fn from(o: &'a WeeklyOutcome) -> Self {
        let stop_loss_date = match o.exit_reason {
            ExitReason::StopLoss { date } => Some(date),
            ExitReason::HeldOrCapped => None,
        };
        OutcomeRow {
            week: &o.week,
            start_date: o.start_date,
            end_date: o.end_date,
            monday_price: o.monday_price,
            friday_price: o.friday_price,
            stop_level: o.stop_level,
            strike_cap: o.strike_cap,
            sell_price: o.sell_price,
            return_pct: o.return_pct(),
            exit_reason: o.exit_reason.to_string(),
            stop_loss_date,
            capital_after: o.capital_after,
        }
    }
}

/// Write weekly outcomes as CSV to any writer
pub fn write_outcomes<W: Write>(writer: W, outcomes: &[WeeklyOutcome]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for outcome in outcomes {
        wtr.serialize(OutcomeRow::from(outcome))
            .context("Failed to write outcome row")?;
    }
    wtr.flush().context("Failed to flush CSV writer")?;
    Ok(())
}

/// Write weekly outcomes to a CSV file
pub fn write_outcomes_csv(path: impl AsRef<Path>, outcomes: &[WeeklyOutcome]) -> Result<()> {
    let file = File::create(path.as_ref())
        .context(format!("Failed to create {}", path.as_ref().display()))?;
    write_outcomes(file, outcomes)?;
    info!("Wrote {} weeks to {}", outcomes.len(), path.as_ref().display());
    Ok(())
}

/// Write the full report as JSON
pub fn write_report_json(path: impl AsRef<Path>, report: &BacktestReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    fs::write(path.as_ref(), json)
        .context(format!("Failed to write {}", path.as_ref().display()))?;
    info!("Wrote report to {}", path.as_ref().display());
    Ok(())
}

/// Write sweep results as CSV, one row per combination
pub fn write_optimization_csv(path: impl AsRef<Path>, results: &[OptimizationResult]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path.as_ref())
        .context(format!("Failed to create {}", path.as_ref().display()))?;
    wtr.write_record([
        "atr_multiplier",
        "max_loss_fraction",
        "strike_pct",
        "weeks_simulated",
        "cumulative_return",
        "annualized_stock_return",
        "annualized_combined_return",
        "total_premium",
        "stop_loss_exits",
        "held_ratio",
    ])?;
    for r in results {
        wtr.write_record(&[
            r.params.atr_multiplier.to_string(),
            r.params.max_loss_fraction.to_string(),
            r.params.strike_pct.to_string(),
            r.weeks_simulated.to_string(),
            r.cumulative_return.to_string(),
            r.annualized_stock_return.to_string(),
            r.annualized_combined_return.to_string(),
            r.total_premium.to_string(),
            r.stop_loss_exits.to_string(),
            r.held_ratio.to_string(),
        ])?;
    }
    wtr.flush()?;
    info!("Wrote {} results to {}", results.len(), path.as_ref().display());
    Ok(())
}

/// `{results_dir}/{SYMBOL}_{kind}.{ext}`, creating the directory if needed
pub fn result_path(
    results_dir: impl AsRef<Path>,
    symbol: &Symbol,
    kind: &str,
    ext: &str,
) -> Result<PathBuf> {
    let dir = results_dir.as_ref();
    fs::create_dir_all(dir).context(format!("Failed to create {}", dir.display()))?;
    Ok(dir.join(format!("{}_{}.{}", symbol.as_str(), kind, ext)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(week: &str, exit_reason: ExitReason) -> WeeklyOutcome {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        WeeklyOutcome {
            week: week.to_string(),
            start_date: date,
            end_date: date + chrono::Duration::days(4),
            monday_price: 100.0,
            friday_price: 108.0,
            stop_level: 95.0,
            strike_cap: 102.0,
            sell_price: 102.0,
            return_fraction: 0.02,
            exit_reason,
            capital_after: 1.02,
        }
    }

    #[test]
    fn test_outcomes_csv_layout() {
        let stop_date = NaiveDate::from_ymd_opt(2024, 3, 13).unwrap();
        let outcomes = vec![
            outcome("2024-W10", ExitReason::HeldOrCapped),
            outcome("2024-W11", ExitReason::StopLoss { date: stop_date }),
        ];

        let mut buf = Vec::new();
        write_outcomes(&mut buf, &outcomes).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("week,start_date,end_date,"));
        assert!(lines[0].ends_with("stop_loss_date,capital_after"));
        assert!(lines[1].contains("held to Friday or capped"));
        assert!(lines[2].contains("Stop-loss hit on 2024-03-13,2024-03-13"));
    }

    #[test]
    fn test_result_path() {
        let dir = std::env::temp_dir().join("covered_call_export_test");
        let path = result_path(&dir, &Symbol::new("tsla"), "weeks", "csv").unwrap();
        assert!(dir.exists());
        assert_eq!(path, dir.join("TSLA_weeks.csv"));
    }
}
