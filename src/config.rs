//! Configuration management
//!
//! Handles loading and parsing of JSON configuration files with environment
//! variable overrides for the symbol and data directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::data::{bars_path, chain_path};
use crate::error::{EngineError, EngineResult};
use crate::risk::StopLossPolicy;
use crate::strategy::CoveredCallStrategy;
use crate::Symbol;

pub const MAX_LOSS_RANGE: (f64, f64) = (0.05, 0.20);
pub const ATR_MULTIPLIER_RANGE: (f64, f64) = (1.0, 3.0);
pub const WEEKS_RANGE: (usize, usize) = (4, 52);
pub const STRIKE_PCT_RANGE: (f64, f64) = (0.0, 0.05);

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub backtest: BacktestConfig,
    /// Parameter lists for the optimize sweep (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<GridConfig>,
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        config.apply_env();
        Ok(config)
    }

    /// Load from file if given, otherwise start from defaults (env still applies)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let mut config = Config::default();
                config.apply_env();
                Ok(config)
            }
        }
    }

    fn apply_env(&mut self) {
        if let Ok(symbol) = std::env::var("COVERED_CALL_SYMBOL") {
            if !symbol.trim().is_empty() {
                self.strategy.symbol = symbol.trim().to_uppercase();
            }
        }
        if let Ok(data_dir) = std::env::var("COVERED_CALL_DATA_DIR") {
            if !data_dir.trim().is_empty() {
                self.backtest.data_dir = data_dir;
            }
        }
    }

    pub fn symbol(&self) -> Symbol {
        self.strategy.symbol()
    }

    /// Bar CSV: explicit `bars_file`, else `{data_dir}/{SYMBOL}_1d.csv`
    pub fn bars_file(&self) -> PathBuf {
        match &self.backtest.bars_file {
            Some(f) => PathBuf::from(f),
            None => bars_path(&self.backtest.data_dir, &self.symbol()),
        }
    }

    /// Chain JSON: explicit `chain_file`, else `{data_dir}/{SYMBOL}_options.json`
    pub fn chain_file(&self) -> PathBuf {
        match &self.backtest.chain_file {
            Some(f) => PathBuf::from(f),
            None => chain_path(&self.backtest.data_dir, &self.symbol()),
        }
    }
}

/// The five caller-facing strategy parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Hard stop as a fraction below the reference (0.05 - 0.20)
    #[serde(default = "default_max_loss_fraction")]
    pub max_loss_fraction: f64,
    /// ATR multiple for the volatility stop (1 - 3)
    #[serde(default = "default_atr_multiplier")]
    pub atr_multiplier: f64,
    /// Lookback window in weeks (4 - 52)
    #[serde(default = "default_weeks_of_history")]
    pub weeks_of_history: usize,
    /// Strike markup over Monday's open (0 - 0.05)
    #[serde(default = "default_strike_pct")]
    pub strike_pct: f64,
}

fn default_symbol() -> String {
    "TSLA".to_string()
}

fn default_max_loss_fraction() -> f64 {
    0.10
}

fn default_atr_multiplier() -> f64 {
    2.0
}

fn default_weeks_of_history() -> usize {
    12
}

fn default_strike_pct() -> f64 {
    0.02
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig {
            symbol: default_symbol(),
            max_loss_fraction: default_max_loss_fraction(),
            atr_multiplier: default_atr_multiplier(),
            weeks_of_history: default_weeks_of_history(),
            strike_pct: default_strike_pct(),
        }
    }
}

fn check_range(name: &str, value: f64, (lo, hi): (f64, f64)) -> EngineResult<()> {
    if !(lo..=hi).contains(&value) {
        return Err(EngineError::InvalidConfig(format!(
            "{} must be between {} and {}, got {}",
            name, lo, hi, value
        )));
    }
    Ok(())
}

impl StrategyConfig {
    pub fn symbol(&self) -> Symbol {
        Symbol::new(self.symbol.as_str())
    }

    pub fn with_max_loss_fraction(mut self, fraction: f64) -> Self {
        self.max_loss_fraction = fraction;
        self
    }

    pub fn with_atr_multiplier(mut self, multiplier: f64) -> Self {
        self.atr_multiplier = multiplier;
        self
    }

    pub fn with_weeks_of_history(mut self, weeks: usize) -> Self {
        self.weeks_of_history = weeks;
        self
    }

    pub fn with_strike_pct(mut self, pct: f64) -> Self {
        self.strike_pct = pct;
        self
    }

    /// Check every parameter against its allowed range
    pub fn validate(&self) -> EngineResult<()> {
        if self.symbol().is_empty() {
            return Err(EngineError::InvalidConfig("symbol must not be empty".to_string()));
        }
        check_range("max_loss_fraction", self.max_loss_fraction, MAX_LOSS_RANGE)?;
        check_range("atr_multiplier", self.atr_multiplier, ATR_MULTIPLIER_RANGE)?;
        check_range("strike_pct", self.strike_pct, STRIKE_PCT_RANGE)?;

        let (lo, hi) = WEEKS_RANGE;
        if !(lo..=hi).contains(&self.weeks_of_history) {
            return Err(EngineError::InvalidConfig(format!(
                "weeks_of_history must be between {} and {}, got {}",
                lo, hi, self.weeks_of_history
            )));
        }
        Ok(())
    }

    /// Stop-loss policy for a measured ATR
    pub fn stop_loss_policy(&self, atr: f64) -> StopLossPolicy {
        StopLossPolicy::default()
            .with_atr(atr)
            .with_atr_multiplier(self.atr_multiplier)
            .with_max_loss_fraction(self.max_loss_fraction)
    }

    pub fn strategy(&self, atr: f64) -> CoveredCallStrategy {
        CoveredCallStrategy::new(self.stop_loss_policy(atr), self.strike_pct)
    }
}

/// Backtest input/output locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_results_dir")]
    pub results_dir: String,
    /// Overrides `{data_dir}/{SYMBOL}_1d.csv`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bars_file: Option<String>,
    /// Overrides `{data_dir}/{SYMBOL}_options.json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_file: Option<String>,
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_results_dir() -> String {
    "results".to_string()
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            data_dir: default_data_dir(),
            results_dir: default_results_dir(),
            bars_file: None,
            chain_file: None,
        }
    }
}

/// Value lists for the optimize sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    pub atr_multiplier: Vec<f64>,
    pub max_loss_fraction: Vec<f64>,
    pub strike_pct: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.strategy, StrategyConfig::default());
        assert_eq!(config.strategy.symbol, "TSLA");
        assert_eq!(config.strategy.weeks_of_history, 12);
        assert_eq!(config.backtest.data_dir, "data");
        assert!(config.grid.is_none());
        assert!(config.strategy.validate().is_ok());
    }

    #[test]
    fn test_partial_strategy_section() {
        let json = r#"{
            "strategy": { "symbol": "aapl", "atr_multiplier": 1.5 },
            "backtest": { "data_dir": "fixtures" },
            "grid": {
                "atr_multiplier": [1.0, 2.0],
                "max_loss_fraction": [0.05],
                "strike_pct": [0.01, 0.02]
            }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.symbol().as_str(), "AAPL");
        assert_eq!(config.strategy.atr_multiplier, 1.5);
        assert_eq!(config.strategy.max_loss_fraction, 0.10);
        assert_eq!(config.bars_file(), PathBuf::from("fixtures/AAPL_1d.csv"));
        assert_eq!(config.chain_file(), PathBuf::from("fixtures/AAPL_options.json"));
        assert_eq!(config.grid.unwrap().strike_pct, vec![0.01, 0.02]);
    }

    #[test]
    fn test_explicit_files_override_convention() {
        let mut config = Config::default();
        config.backtest.bars_file = Some("custom/bars.csv".to_string());
        assert_eq!(config.bars_file(), PathBuf::from("custom/bars.csv"));
    }

    #[test]
    fn test_validate_ranges() {
        let base = StrategyConfig::default();

        assert!(base.clone().with_max_loss_fraction(0.05).validate().is_ok());
        assert!(base.clone().with_max_loss_fraction(0.25).validate().is_err());
        assert!(base.clone().with_atr_multiplier(0.5).validate().is_err());
        assert!(base.clone().with_atr_multiplier(3.0).validate().is_ok());
        assert!(base.clone().with_weeks_of_history(3).validate().is_err());
        assert!(base.clone().with_weeks_of_history(52).validate().is_ok());
        assert!(base.clone().with_strike_pct(0.06).validate().is_err());
        assert!(base.clone().with_strike_pct(f64::NAN).validate().is_err());

        let mut blank = base;
        blank.symbol = "  ".to_string();
        let err = blank.validate().unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn test_policy_from_config() {
        let config = StrategyConfig::default().with_atr_multiplier(3.0);
        let policy = config.stop_loss_policy(2.0);
        assert_eq!(policy.atr, 2.0);
        assert_eq!(policy.atr_multiplier, 3.0);
        assert_eq!(policy.max_loss_fraction, 0.10);
    }
}
