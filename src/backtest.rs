//! Backtesting engine
//!
//! Pure pipeline over an already-fetched snapshot:
//! normalize -> lookback window -> ATR -> partition -> simulate -> aggregate.
//! The premium estimate runs alongside and only feeds the combined figures.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::aggregate::{aggregate, ExitSummary};
use crate::config::StrategyConfig;
use crate::data::{normalize_bars, BarSeries};
use crate::drawdown::{max_weekly_drawdown, weekly_drawdowns, WeeklyDrawdown};
use crate::error::{EngineError, EngineResult};
use crate::indicators::{atr_percent, average_true_range, ATR_PERIOD};
use crate::premium::{estimate_premium, PremiumEstimate};
use crate::strategy::simulate;
use crate::weekly::partition_weeks;
use crate::{AggregateResult, OptionChainSnapshot, PriceBar, WeeklyOutcome};

/// Premium figures, or the reason there are none
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PremiumOutcome {
    Estimated(PremiumEstimate),
    Unavailable { reason: String },
}

impl PremiumOutcome {
    pub fn estimate(&self) -> Option<&PremiumEstimate> {
        match self {
            PremiumOutcome::Estimated(e) => Some(e),
            PremiumOutcome::Unavailable { .. } => None,
        }
    }

    /// Projected premium income, 0 when no option was usable
    pub fn total_premium(&self) -> f64 {
        self.estimate().map(|e| e.total_premium).unwrap_or(0.0)
    }
}

/// Everything one run produces, ready for rendering or export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub symbol: String,
    pub as_of: NaiveDate,
    pub params: StrategyConfig,
    pub bars_used: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub entry_price: f64,
    pub atr: f64,
    /// Stop against the entry price (informational)
    pub baseline_stop: f64,
    pub baseline_drawdown_pct: f64,
    pub weekly_drawdowns: Vec<WeeklyDrawdown>,
    pub max_weekly_drawdown_pct: f64,
    pub premium: PremiumOutcome,
    pub outcomes: Vec<WeeklyOutcome>,
    pub aggregate: AggregateResult,
    pub exits: ExitSummary,
}

/// Baseline figures from the stop-loss calculator alone
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopLossSummary {
    pub entry_price: f64,
    pub atr: f64,
    /// ATR relative to the last close
    pub atr_pct: f64,
    pub stop_loss: f64,
    pub drawdown_pct: f64,
    pub atr_bound: bool,
}

/// Backtest engine
#[derive(Debug, Clone)]
pub struct Backtester {
    config: StrategyConfig,
}

impl Backtester {
    pub fn new(config: StrategyConfig) -> Self {
        Backtester { config }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Normalize raw provider bars, then run
    pub fn run(
        &self,
        raw_bars: Vec<PriceBar>,
        entry_price: Option<f64>,
        chain: Option<&OptionChainSnapshot>,
        as_of: NaiveDate,
    ) -> EngineResult<BacktestReport> {
        self.config.validate()?;
        let series = normalize_bars(raw_bars)?;
        self.run_series(&series, entry_price, chain, as_of)
    }

    /// Lookback window of `series` this run would use, checked for ATR length
    fn window(&self, series: &BarSeries) -> EngineResult<BarSeries> {
        let window = series.lookback_weeks(self.config.weeks_of_history);
        if window.len() < ATR_PERIOD {
            return Err(EngineError::InsufficientHistory {
                available: window.len(),
                required: ATR_PERIOD,
            });
        }
        Ok(window)
    }

    /// Entry price and ATR-based stop only, without simulating
    pub fn stop_loss_summary(
        &self,
        series: &BarSeries,
        entry_price: Option<f64>,
    ) -> EngineResult<StopLossSummary> {
        self.config.validate()?;
        let window = self.window(series)?;
        let atr = average_true_range(window.bars(), ATR_PERIOD)?;
        let entry_price = entry_price.or(window.last_close()).unwrap_or(0.0);
        let policy = self.config.stop_loss_policy(atr);

        Ok(StopLossSummary {
            entry_price,
            atr,
            atr_pct: atr_percent(window.bars(), ATR_PERIOD)?,
            stop_loss: policy.level(entry_price),
            drawdown_pct: policy.drawdown_pct(entry_price),
            atr_bound: policy.is_atr_bound(entry_price),
        })
    }

    /// Run on an already normalized series
    ///
    /// `entry_price` defaults to the last close of the lookback window.
    pub fn run_series(
        &self,
        series: &BarSeries,
        entry_price: Option<f64>,
        chain: Option<&OptionChainSnapshot>,
        as_of: NaiveDate,
    ) -> EngineResult<BacktestReport> {
        self.config.validate()?;
        let symbol = self.config.symbol();

        let window = self.window(series)?;
        let bars = window.bars();
        let entry_price = entry_price.or(window.last_close()).unwrap_or(0.0);

        let atr = average_true_range(bars, ATR_PERIOD)?;
        let policy = self.config.stop_loss_policy(atr);
        let baseline_stop = policy.level(entry_price);
        let baseline_drawdown_pct = policy.drawdown_pct(entry_price);
        debug!(
            "{}: ATR {:.4}, baseline stop {:.2} ({:.2}%)",
            symbol, atr, baseline_stop, baseline_drawdown_pct
        );

        let weeks = partition_weeks(bars);
        let drawdowns = weekly_drawdowns(&weeks);
        let max_weekly_drawdown_pct = max_weekly_drawdown(&drawdowns) * 100.0;

        let premium = match chain {
            Some(snapshot) => match estimate_premium(
                snapshot,
                as_of,
                entry_price,
                self.config.strike_pct,
                self.config.weeks_of_history,
            ) {
                Ok(estimate) => PremiumOutcome::Estimated(estimate),
                Err(e) => {
                    warn!("{}: {}; premium reported as zero", symbol, e);
                    PremiumOutcome::Unavailable {
                        reason: e.to_string(),
                    }
                }
            },
            None => PremiumOutcome::Unavailable {
                reason: "no option chain provided".to_string(),
            },
        };

        let strategy = self.config.strategy(atr);
        let outcomes = simulate(&weeks, &strategy);
        let aggregate = aggregate(&outcomes, entry_price, premium.total_premium());
        let exits = ExitSummary::from_outcomes(&outcomes);

        info!(
            "{}: {} weeks simulated, cumulative {:.2}%, annualized combined {:.2}%",
            symbol,
            aggregate.weeks_simulated,
            aggregate.cumulative_return * 100.0,
            aggregate.annualized_combined_return * 100.0
        );

        Ok(BacktestReport {
            symbol: symbol.to_string(),
            as_of,
            params: self.config.clone(),
            bars_used: window.len(),
            first_date: window.first_date(),
            last_date: window.last_date(),
            entry_price,
            atr,
            baseline_stop,
            baseline_drawdown_pct,
            weekly_drawdowns: drawdowns,
            max_weekly_drawdown_pct,
            premium,
            outcomes,
            aggregate,
            exits,
        })
    }
}
