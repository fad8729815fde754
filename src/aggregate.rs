//! Return aggregation
//!
//! Rolls the weekly outcome sequence into cumulative and annualized figures,
//! with and without the projected premium income.

use serde::{Deserialize, Serialize};

use crate::{AggregateResult, WeeklyOutcome};

pub const WEEKS_PER_YEAR: f64 = 52.0;

/// Capital multiplier after compounding every week's return from 1.0
pub fn final_capital(outcomes: &[WeeklyOutcome]) -> f64 {
    outcomes
        .iter()
        .fold(1.0, |capital, o| capital * (1.0 + o.return_fraction))
}

/// `growth^(1/years) - 1`, or 0 when either side is not positive
fn annualize(growth: f64, years: f64) -> f64 {
    if growth > 0.0 && years > 0.0 && growth.is_finite() {
        growth.powf(1.0 / years) - 1.0
    } else {
        0.0
    }
}

/// Build the aggregate figures for a run
pub fn aggregate(outcomes: &[WeeklyOutcome], entry_price: f64, total_premium: f64) -> AggregateResult {
    let weeks_simulated = outcomes.len();
    let capital = final_capital(outcomes);

    let years = if weeks_simulated == 0 {
        1.0
    } else {
        weeks_simulated as f64 / WEEKS_PER_YEAR
    };

    let final_capital_value = capital * entry_price;
    let combined_capital_value = final_capital_value + total_premium;

    let (annualized_stock_return, annualized_combined_return) =
        if weeks_simulated == 0 || entry_price <= 0.0 {
            (0.0, 0.0)
        } else {
            (
                annualize(capital, years),
                annualize(combined_capital_value / entry_price, years),
            )
        };

    AggregateResult {
        weeks_simulated,
        years,
        cumulative_return: capital - 1.0,
        final_capital: capital,
        final_capital_value,
        total_premium,
        combined_capital_value,
        annualized_stock_return,
        annualized_combined_return,
    }
}

/// Stop-loss vs held exit counts, derived from the outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExitSummary {
    pub stop_loss_exits: usize,
    pub held_exits: usize,
    /// held / total, 0 with no weeks
    pub held_ratio: f64,
}

impl ExitSummary {
    pub fn from_outcomes(outcomes: &[WeeklyOutcome]) -> Self {
        let stop_loss_exits = outcomes
            .iter()
            .filter(|o| o.exit_reason.is_stop_loss())
            .count();
        let held_exits = outcomes.len() - stop_loss_exits;
        let held_ratio = if outcomes.is_empty() {
            0.0
        } else {
            held_exits as f64 / outcomes.len() as f64
        };

        Self {
            stop_loss_exits,
            held_exits,
            held_ratio,
        }
    }

    pub fn total(&self) -> usize {
        self.stop_loss_exits + self.held_exits
    }
}
