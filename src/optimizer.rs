//! Parameter sweep
//!
//! Runs the backtester across a grid of stop-loss and strike parameters on a
//! single bar/chain snapshot. Every run is independent, so the grid is
//! evaluated in parallel with rayon; capital compounding stays sequential
//! inside each run.

use chrono::NaiveDate;
use indicatif::ProgressBar;
use itertools::iproduct;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use crate::backtest::{BacktestReport, Backtester};
use crate::config::{GridConfig, StrategyConfig};
use crate::data::BarSeries;
use crate::error::EngineError;
use crate::OptionChainSnapshot;

/// Value lists swept by the optimizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterGrid {
    pub atr_multipliers: Vec<f64>,
    pub max_loss_fractions: Vec<f64>,
    pub strike_pcts: Vec<f64>,
}

impl ParameterGrid {
    pub fn quick() -> Self {
        ParameterGrid {
            atr_multipliers: vec![1.5, 2.0, 2.5],
            max_loss_fractions: vec![0.05, 0.10],
            strike_pcts: vec![0.01, 0.02, 0.03],
        }
    }

    pub fn full() -> Self {
        ParameterGrid {
            atr_multipliers: vec![1.0, 1.5, 2.0, 2.5, 3.0],
            max_loss_fractions: vec![0.05, 0.08, 0.10, 0.15, 0.20],
            strike_pcts: vec![0.0, 0.01, 0.02, 0.03, 0.04, 0.05],
        }
    }

    pub fn from_config(grid: &GridConfig) -> Self {
        ParameterGrid {
            atr_multipliers: grid.atr_multiplier.clone(),
            max_loss_fractions: grid.max_loss_fraction.clone(),
            strike_pcts: grid.strike_pct.clone(),
        }
    }

    /// Every combination applied on top of `base`, skipping out-of-range values
    pub fn combinations(&self, base: &StrategyConfig) -> Vec<StrategyConfig> {
        iproduct!(
            &self.atr_multipliers,
            &self.max_loss_fractions,
            &self.strike_pcts
        )
        .map(|(&multiplier, &max_loss, &strike_pct)| {
            base.clone()
                .with_atr_multiplier(multiplier)
                .with_max_loss_fraction(max_loss)
                .with_strike_pct(strike_pct)
        })
        .filter(|config| match config.validate() {
            Ok(()) => true,
            Err(e) => {
                debug!("Skipping combination: {}", e);
                false
            }
        })
        .collect()
    }

    /// Size of the raw cartesian product
    pub fn total_combinations(&self) -> usize {
        self.atr_multipliers.len() * self.max_loss_fractions.len() * self.strike_pcts.len()
    }

    /// Grid for a sweep mode; `Config` mode needs the config file's grid section
    pub fn for_mode(mode: GridMode, grid: Option<&GridConfig>) -> Result<Self, EngineError> {
        match mode {
            GridMode::Quick => Ok(ParameterGrid::quick()),
            GridMode::Full => Ok(ParameterGrid::full()),
            GridMode::Config => grid.map(ParameterGrid::from_config).ok_or_else(|| {
                EngineError::InvalidConfig(
                    "config mode requires a 'grid' section in the config file".to_string(),
                )
            }),
        }
    }
}

/// Which parameter grid to sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GridMode {
    #[default]
    Quick,
    Full,
    /// Value lists from the config file
    Config,
}

impl FromStr for GridMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quick" => Ok(GridMode::Quick),
            "full" => Ok(GridMode::Full),
            "config" => Ok(GridMode::Config),
            other => Err(EngineError::InvalidConfig(format!(
                "unknown optimization mode '{}' (expected quick, full or config)",
                other
            ))),
        }
    }
}

impl fmt::Display for GridMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GridMode::Quick => "quick",
            GridMode::Full => "full",
            GridMode::Config => "config",
        };
        write!(f, "{}", s)
    }
}

/// Metric used to rank sweep results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Annualized return including premium
    #[default]
    Combined,
    /// Annualized stock-only return
    Stock,
    Cumulative,
    HeldRatio,
}

impl FromStr for SortKey {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "combined" => Ok(SortKey::Combined),
            "stock" => Ok(SortKey::Stock),
            "cumulative" => Ok(SortKey::Cumulative),
            "held_ratio" | "held" => Ok(SortKey::HeldRatio),
            other => Err(EngineError::InvalidConfig(format!(
                "unknown sort key '{}' (expected combined, stock, cumulative or held_ratio)",
                other
            ))),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortKey::Combined => "combined",
            SortKey::Stock => "stock",
            SortKey::Cumulative => "cumulative",
            SortKey::HeldRatio => "held_ratio",
        };
        f.write_str(name)
    }
}

/// Optimization result for a single parameter combination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub params: StrategyConfig,
    pub weeks_simulated: usize,
    pub cumulative_return: f64,
    pub annualized_stock_return: f64,
    pub annualized_combined_return: f64,
    pub total_premium: f64,
    pub stop_loss_exits: usize,
    pub held_ratio: f64,
}

impl OptimizationResult {
    pub fn from_report(report: &BacktestReport) -> Self {
        OptimizationResult {
            params: report.params.clone(),
            weeks_simulated: report.aggregate.weeks_simulated,
            cumulative_return: report.aggregate.cumulative_return,
            annualized_stock_return: report.aggregate.annualized_stock_return,
            annualized_combined_return: report.aggregate.annualized_combined_return,
            total_premium: report.aggregate.total_premium,
            stop_loss_exits: report.exits.stop_loss_exits,
            held_ratio: report.exits.held_ratio,
        }
    }

    pub fn metric(&self, key: SortKey) -> f64 {
        match key {
            SortKey::Combined => self.annualized_combined_return,
            SortKey::Stock => self.annualized_stock_return,
            SortKey::Cumulative => self.cumulative_return,
            SortKey::HeldRatio => self.held_ratio,
        }
    }
}

/// Sweeps parameter combinations over one data snapshot
pub struct Optimizer<'a> {
    series: &'a BarSeries,
    chain: Option<&'a OptionChainSnapshot>,
    entry_price: Option<f64>,
    as_of: NaiveDate,
}

impl<'a> Optimizer<'a> {
    pub fn new(
        series: &'a BarSeries,
        chain: Option<&'a OptionChainSnapshot>,
        entry_price: Option<f64>,
        as_of: NaiveDate,
    ) -> Self {
        Optimizer {
            series,
            chain,
            entry_price,
            as_of,
        }
    }

    fn run_one(&self, config: &StrategyConfig) -> Option<OptimizationResult> {
        match Backtester::new(config.clone()).run_series(
            self.series,
            self.entry_price,
            self.chain,
            self.as_of,
        ) {
            Ok(report) => Some(OptimizationResult::from_report(&report)),
            Err(e) => {
                debug!(
                    "Run failed (multiplier {}, max loss {}, strike {}): {}",
                    config.atr_multiplier, config.max_loss_fraction, config.strike_pct, e
                );
                None
            }
        }
    }

    /// Run in parallel, ticking `progress` once per combination
    pub fn optimize(
        &self,
        configs: &[StrategyConfig],
        progress: Option<&ProgressBar>,
    ) -> Vec<OptimizationResult> {
        info!("Testing {} parameter combinations", configs.len());

        configs
            .par_iter()
            .filter_map(|config| {
                let result = self.run_one(config);
                if let Some(pb) = progress {
                    pb.inc(1);
                }
                result
            })
            .collect()
    }

    /// Run sequentially (for debugging)
    pub fn optimize_sequential(
        &self,
        configs: &[StrategyConfig],
        progress: Option<&ProgressBar>,
    ) -> Vec<OptimizationResult> {
        info!(
            "Testing {} parameter combinations sequentially",
            configs.len()
        );

        configs
            .iter()
            .filter_map(|config| {
                let result = self.run_one(config);
                if let Some(pb) = progress {
                    pb.inc(1);
                }
                result
            })
            .collect()
    }
}

/// Sort best first by the chosen metric
pub fn sort_results(results: &mut [OptimizationResult], sort_by: SortKey) {
    results.sort_by_key(|r| Reverse(OrderedFloat(r.metric(sort_by))));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::normalize_bars;
    use crate::PriceBar;
    use chrono::{Datelike, Duration};

    fn trending_series(count: usize) -> BarSeries {
        let mut bars = Vec::new();
        let mut date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        while bars.len() < count {
            if date.weekday().number_from_monday() <= 5 {
                let open = 100.0 + bars.len() as f64 * 0.5;
                let close = open + 0.4;
                bars.push(PriceBar::new_unchecked(date, open, close + 1.0, open - 1.0, close));
            }
            date += Duration::days(1);
        }
        normalize_bars(bars).unwrap()
    }

    fn result(combined: f64, held_ratio: f64) -> OptimizationResult {
        OptimizationResult {
            params: StrategyConfig::default(),
            weeks_simulated: 12,
            cumulative_return: combined / 2.0,
            annualized_stock_return: 0.0,
            annualized_combined_return: combined,
            total_premium: 0.0,
            stop_loss_exits: 0,
            held_ratio,
        }
    }

    #[test]
    fn test_grid_sizes() {
        let quick = ParameterGrid::quick();
        assert_eq!(quick.total_combinations(), 18);
        assert_eq!(quick.combinations(&StrategyConfig::default()).len(), 18);

        let full = ParameterGrid::full();
        assert_eq!(full.combinations(&StrategyConfig::default()).len(), 150);
    }

    #[test]
    fn test_out_of_range_values_dropped() {
        let grid = ParameterGrid {
            atr_multipliers: vec![0.5, 2.0, 4.0],
            max_loss_fractions: vec![0.10],
            strike_pcts: vec![0.02, 0.10],
        };
        let configs = grid.combinations(&StrategyConfig::default());
        assert_eq!(grid.total_combinations(), 6);
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].atr_multiplier, 2.0);
    }

    #[test]
    fn test_grid_mode_parse() {
        assert_eq!("full".parse::<GridMode>().unwrap(), GridMode::Full);
        assert_eq!(" Config ".parse::<GridMode>().unwrap(), GridMode::Config);
        assert_eq!(GridMode::default().to_string(), "quick");

        let err = "fulll".parse::<GridMode>().unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
        assert!(err.to_string().contains("fulll"));
    }

    #[test]
    fn test_grid_for_mode() {
        assert_eq!(
            ParameterGrid::for_mode(GridMode::Quick, None).unwrap(),
            ParameterGrid::quick()
        );
        assert!(ParameterGrid::for_mode(GridMode::Config, None).is_err());

        let section = GridConfig {
            atr_multiplier: vec![2.0],
            max_loss_fraction: vec![0.10],
            strike_pct: vec![0.01, 0.02],
        };
        let grid = ParameterGrid::for_mode(GridMode::Config, Some(&section)).unwrap();
        assert_eq!(grid.total_combinations(), 2);
    }

    #[test]
    fn test_sort_key_parse() {
        assert_eq!("combined".parse::<SortKey>().unwrap(), SortKey::Combined);
        assert_eq!("HELD_RATIO".parse::<SortKey>().unwrap(), SortKey::HeldRatio);
        assert!("sharpe".parse::<SortKey>().is_err());
        assert_eq!(SortKey::default().to_string(), "combined");
    }

    #[test]
    fn test_sort_results_best_first() {
        let mut results = vec![result(0.10, 0.5), result(0.30, 0.2), result(0.20, 0.9)];

        sort_results(&mut results, SortKey::Combined);
        let combined: Vec<f64> = results.iter().map(|r| r.annualized_combined_return).collect();
        assert_eq!(combined, vec![0.30, 0.20, 0.10]);

        sort_results(&mut results, SortKey::HeldRatio);
        assert_eq!(results[0].held_ratio, 0.9);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let series = trending_series(60);
        let as_of = NaiveDate::from_ymd_opt(2024, 3, 25).unwrap();
        let optimizer = Optimizer::new(&series, None, None, as_of);
        let configs = ParameterGrid::quick().combinations(&StrategyConfig::default());

        let mut parallel = optimizer.optimize(&configs, None);
        let mut sequential = optimizer.optimize_sequential(&configs, None);
        assert_eq!(parallel.len(), configs.len());

        sort_results(&mut parallel, SortKey::Cumulative);
        sort_results(&mut sequential, SortKey::Cumulative);
        let p: Vec<f64> = parallel.iter().map(|r| r.cumulative_return).collect();
        let s: Vec<f64> = sequential.iter().map(|r| r.cumulative_return).collect();
        assert_eq!(p, s);
    }

    #[test]
    fn test_short_history_yields_no_results() {
        let series = trending_series(10);
        let as_of = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let optimizer = Optimizer::new(&series, None, None, as_of);
        let configs = ParameterGrid::quick().combinations(&StrategyConfig::default());
        assert!(optimizer.optimize(&configs, None).is_empty());
    }
}
