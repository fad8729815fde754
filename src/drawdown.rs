//! Intra-week peak-to-trough drawdown
//!
//! Drawdowns are fractions `<= 0`. A week's value is its deepest close
//! relative to the running maximum close seen so far in that week.

use serde::{Deserialize, Serialize};

use crate::weekly::WeekGroup;
use crate::PriceBar;

/// Deepest drawdown of one week's closes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyDrawdown {
    pub week: String,
    pub drawdown: f64,
}

impl WeeklyDrawdown {
    pub fn drawdown_pct(&self) -> f64 {
        self.drawdown * 100.0
    }
}

/// Minimum of `(close - running_max) / running_max` across the bars
pub fn week_drawdown(bars: &[PriceBar]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;

    for bar in bars {
        if bar.close > peak {
            peak = bar.close;
        }
        if peak > 0.0 {
            let dd = (bar.close - peak) / peak;
            max_dd = max_dd.min(dd);
        }
    }

    max_dd
}

/// Drawdown for every week, single-bar weeks included
pub fn weekly_drawdowns(weeks: &[WeekGroup]) -> Vec<WeeklyDrawdown> {
    weeks
        .iter()
        .map(|w| WeeklyDrawdown {
            week: w.label(),
            drawdown: week_drawdown(w.bars()),
        })
        .collect()
}

/// Most negative single-week drawdown in the window (0 when there are no weeks)
pub fn max_weekly_drawdown(drawdowns: &[WeeklyDrawdown]) -> f64 {
    drawdowns
        .iter()
        .map(|d| d.drawdown)
        .fold(0.0, f64::min)
}
