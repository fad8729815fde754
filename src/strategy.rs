//! Weekly covered call strategy
//!
//! Defines the WeeklyStrategy trait and the covered call with dynamic stop-loss.
//! Each week is decided on its own bars; only the capital multiplier threads
//! from one week to the next.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::risk::StopLossPolicy;
use crate::weekly::WeekGroup;
use crate::{ExitReason, WeeklyOutcome};

/// Exit decision for a single week, before compounding
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeekDecision {
    pub stop_level: f64,
    pub strike_cap: f64,
    pub sell_price: f64,
    pub exit_reason: ExitReason,
    pub return_fraction: f64,
}

/// Weekly buy-on-Monday, exit-by-Friday strategy
pub trait WeeklyStrategy: Send + Sync {
    /// Stop price for a position opened at `monday_open`
    fn stop_level(&self, monday_open: f64) -> f64;

    /// Highest price the position can be sold for this week
    fn strike_cap(&self, monday_open: f64) -> f64;

    /// Decide how the week ends
    ///
    /// The first close at or below the stop exits at the stop price itself.
    /// Otherwise the position is sold at the lower of Friday's close and the cap.
    fn evaluate_week(&self, week: &WeekGroup) -> WeekDecision {
        let monday_open = week.monday_open();
        let stop_level = self.stop_level(monday_open);
        let strike_cap = self.strike_cap(monday_open);

        let triggered = week.bars().iter().find(|bar| bar.close <= stop_level);

        let (sell_price, exit_reason) = match triggered {
            Some(bar) => (stop_level, ExitReason::StopLoss { date: bar.date }),
            None => (week.friday_close().min(strike_cap), ExitReason::HeldOrCapped),
        };

        let return_fraction = if monday_open > 0.0 {
            (sell_price - monday_open) / monday_open
        } else {
            0.0
        };

        WeekDecision {
            stop_level,
            strike_cap,
            sell_price,
            exit_reason,
            return_fraction,
        }
    }
}

/// Covered call with an ATR/percentage stop and a percentage strike cap
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoveredCallStrategy {
    pub policy: StopLossPolicy,
    /// Cap markup over Monday's open (0.02 = 2%)
    pub strike_pct: f64,
}

impl CoveredCallStrategy {
    pub fn new(policy: StopLossPolicy, strike_pct: f64) -> Self {
        Self { policy, strike_pct }
    }
}

impl WeeklyStrategy for CoveredCallStrategy {
    fn stop_level(&self, monday_open: f64) -> f64 {
        self.policy.level(monday_open)
    }

    fn strike_cap(&self, monday_open: f64) -> f64 {
        monday_open * (1.0 + self.strike_pct)
    }
}

/// Run the strategy over every tradable week, compounding capital from 1.0
pub fn simulate<S: WeeklyStrategy + ?Sized>(weeks: &[WeekGroup], strategy: &S) -> Vec<WeeklyOutcome> {
    let skipped = weeks.iter().filter(|w| !w.is_tradable()).count();
    if skipped > 0 {
        debug!("Skipping {} week(s) with fewer than 2 bars", skipped);
    }

    weeks
        .iter()
        .filter(|w| w.is_tradable())
        .scan(1.0_f64, |capital, week| {
            let decision = strategy.evaluate_week(week);
            *capital *= 1.0 + decision.return_fraction;

            Some(WeeklyOutcome {
                week: week.label(),
                start_date: week.start_date(),
                end_date: week.end_date(),
                monday_price: week.monday_open(),
                friday_price: week.friday_close(),
                stop_level: decision.stop_level,
                strike_cap: decision.strike_cap,
                sell_price: decision.sell_price,
                return_fraction: decision.return_fraction,
                exit_reason: decision.exit_reason,
                capital_after: *capital,
            })
        })
        .collect()
}
