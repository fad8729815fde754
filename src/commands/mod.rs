//! Subcommand implementations

pub mod backtest;
pub mod optimize;
pub mod stop_loss;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use covered_call_backtest::data::{self, BarSeries};
use covered_call_backtest::{Config, OptionChainSnapshot};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Load the config file (or defaults) and apply a symbol override
fn load_config(path: Option<&Path>, symbol: Option<String>) -> Result<Config> {
    let mut config = Config::load(path)?;
    if let Some(p) = path {
        info!("Loaded configuration from: {}", p.display());
    }
    if let Some(symbol) = symbol {
        info!("Overriding symbol to: {}", symbol);
        config.strategy.symbol = symbol.trim().to_uppercase();
    }
    Ok(config)
}

/// Load and normalize the bar series
fn load_series(config: &Config, bars_override: Option<PathBuf>) -> Result<BarSeries> {
    let path = bars_override.unwrap_or_else(|| config.bars_file());
    let raw = data::load_csv(&path)?;

    let report = data::validate_bars(&raw);
    for warning in &report.warnings {
        warn!("{}", warning);
    }

    data::normalize_bars(raw).context(format!("Invalid bar data in {}", path.display()))
}

/// Load the option chain if the file exists; a missing chain is not fatal
fn load_chain(config: &Config, chain_override: Option<PathBuf>) -> Result<Option<OptionChainSnapshot>> {
    let path = chain_override.unwrap_or_else(|| config.chain_file());
    if !path.exists() {
        warn!("No option chain at {}; premium will be reported as zero", path.display());
        return Ok(None);
    }
    Ok(Some(data::load_option_chain(&path)?))
}

fn parse_as_of(as_of: Option<String>) -> Result<NaiveDate> {
    match as_of {
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .context(format!("Invalid --as-of date: {}", s)),
        None => Ok(chrono::Local::now().date_naive()),
    }
}
