//! Stop-loss policy
//!
//! The stop for a covered call position is the higher of two floors:
//!
//! ```text
//! atr_floor  = reference - atr_multiplier * ATR
//! hard_floor = reference * (1 - max_loss_fraction)
//! stop       = max(atr_floor, hard_floor)
//! ```
//!
//! The policy is stateless. Each week re-derives its stop from that week's
//! Monday open; stops are never carried over or ratcheted.

use serde::{Deserialize, Serialize};

/// Compute the stop price for a long stock position
pub fn stop_loss(reference: f64, atr: f64, atr_multiplier: f64, max_loss_fraction: f64) -> f64 {
    let atr_floor = reference - atr_multiplier * atr;
    let hard_floor = reference * (1.0 - max_loss_fraction);
    atr_floor.max(hard_floor)
}

/// Configuration for StopLossPolicy using builder pattern
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopLossPolicy {
    pub atr: f64,
    pub atr_multiplier: f64,
    pub max_loss_fraction: f64,
}

impl Default for StopLossPolicy {
    fn default() -> Self {
        Self {
            atr: 0.0,
            atr_multiplier: 2.0,
            max_loss_fraction: 0.10,
        }
    }
}

impl StopLossPolicy {
    pub fn new(atr: f64, atr_multiplier: f64, max_loss_fraction: f64) -> Self {
        Self {
            atr,
            atr_multiplier,
            max_loss_fraction,
        }
    }

    /// Set the ATR the policy measures volatility with
    pub fn with_atr(mut self, atr: f64) -> Self {
        self.atr = atr;
        self
    }

    /// Set the ATR multiple (e.g., 2.0 = two ATRs below the reference)
    pub fn with_atr_multiplier(mut self, multiplier: f64) -> Self {
        self.atr_multiplier = multiplier;
        self
    }

    /// Set the hard loss cap as a fraction (e.g., 0.10 = 10%)
    pub fn with_max_loss_fraction(mut self, fraction: f64) -> Self {
        self.max_loss_fraction = fraction;
        self
    }

    /// Stop price for the given reference price
    pub fn level(&self, reference: f64) -> f64 {
        stop_loss(reference, self.atr, self.atr_multiplier, self.max_loss_fraction)
    }

    /// Distance from reference to stop as a (non-positive) percentage
    pub fn drawdown_pct(&self, reference: f64) -> f64 {
        if reference <= 0.0 {
            return 0.0;
        }
        (self.level(reference) - reference) / reference * 100.0
    }

    /// Whether the ATR floor (rather than the hard percentage floor) sets the stop
    pub fn is_atr_bound(&self, reference: f64) -> bool {
        let atr_floor = reference - self.atr_multiplier * self.atr;
        let hard_floor = reference * (1.0 - self.max_loss_fraction);
        atr_floor >= hard_floor
    }
}
