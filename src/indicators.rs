//! Technical indicators powered by the `ta` crate
//!
//! Only what the weekly stop-loss needs: true range and a trailing
//! simple-moving-average ATR anchored at the end of the series. There is no
//! Wilder smoothing here; the ATR is a plain rolling mean.

use ta::indicators::SimpleMovingAverage;
use ta::Next;

use crate::error::{EngineError, EngineResult};
use crate::PriceBar;

/// Default ATR lookback, also the minimum number of bars the engine accepts
pub const ATR_PERIOD: usize = 14;

// =============================================================================
// Volatility Indicators
// =============================================================================

/// Calculate True Range for every bar after the first
///
/// The first bar has no previous close and therefore no true range, so the
/// output is one element shorter than the input.
pub fn true_range(bars: &[PriceBar]) -> Vec<f64> {
    bars.windows(2)
        .map(|w| {
            let prev_close = w[0].close;
            let bar = &w[1];
            let hl = bar.high - bar.low;
            let hc = (bar.high - prev_close).abs();
            let lc = (bar.low - prev_close).abs();
            hl.max(hc).max(lc)
        })
        .collect()
}

/// Average True Range evaluated once, at the end of the series
///
/// Mean of the most recent `period` true-range values. A series of exactly
/// `period` bars only has `period - 1` true ranges; the window then covers
/// all of them. The first bar's own high-low span never enters the average,
/// so at exactly `period` bars this differs from a rolling mean that scores
/// bar 0 as `high - low` and divides by `period`.
pub fn average_true_range(bars: &[PriceBar], period: usize) -> EngineResult<f64> {
    if period == 0 {
        return Err(EngineError::InvalidConfig(
            "ATR period must be at least 1".to_string(),
        ));
    }
    if bars.len() < period {
        return Err(EngineError::InsufficientHistory {
            available: bars.len(),
            required: period,
        });
    }

    let tr = true_range(bars);
    let mut indicator = SimpleMovingAverage::new(period)
        .map_err(|e| EngineError::InvalidConfig(format!("ATR period {}: {:?}", period, e)))?;

    // The running sum inside the SMA can drift a hair below zero on flat series
    let atr = tr
        .iter()
        .fold(0.0, |_, &value| indicator.next(value))
        .max(0.0);

    Ok(atr)
}

/// Calculate ATR as a percentage of the last close
pub fn atr_percent(bars: &[PriceBar], period: usize) -> EngineResult<f64> {
    let atr = average_true_range(bars, period)?;
    match bars.last() {
        Some(last) if last.close > 0.0 => Ok(atr / last.close * 100.0),
        _ => Ok(0.0),
    }
}
