//! Covered call premium estimation
//!
//! Picks one representative call from an option chain snapshot and projects
//! the income from writing it every week of the lookback window. The strike
//! chosen here is only used to price the premium. The weekly simulation caps
//! upside with its own percentage-based strike.

use chrono::NaiveDate;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};
use crate::{OptionChainSnapshot, OptionQuote};

/// Expirations closer than this many calendar days are ignored
pub const MIN_DAYS_TO_EXPIRATION: i64 = 5;

/// Weeks per year used for annualizing
pub const WEEKS_PER_YEAR: f64 = 52.0;

/// How the strike was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrikeSelection {
    /// Smallest strike at or above the target
    OutOfTheMoney,
    /// Every strike sits below the target; the highest one was used instead
    Fallback,
}

/// Projected premium income for the selected call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PremiumEstimate {
    pub expiration: NaiveDate,
    pub target_strike: f64,
    pub strike: f64,
    pub bid: f64,
    pub selection: StrikeSelection,
    pub weeks: usize,
    /// bid * weeks
    pub total_premium: f64,
    /// (total_premium / entry_price) * (52 / weeks) * 100
    pub annualized_yield_pct: f64,
}

impl PremiumEstimate {
    pub fn is_fallback(&self) -> bool {
        self.selection == StrikeSelection::Fallback
    }
}

/// Choose the call to write against `target_strike`
///
/// Prefers the smallest strike that is still `>= target_strike`. When the
/// target is above every strike, falls back to the highest strike. Quotes
/// with a negative or non-finite strike or bid are skipped.
pub fn select_call(calls: &[OptionQuote], target_strike: f64) -> Option<(OptionQuote, StrikeSelection)> {
    let valid: Vec<&OptionQuote> = calls
        .iter()
        .filter(|q| match q.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!("Skipping call quote: {}", e);
                false
            }
        })
        .collect();

    let otm = valid
        .iter()
        .filter(|q| q.strike >= target_strike)
        .min_by_key(|q| OrderedFloat(q.strike));

    if let Some(quote) = otm {
        return Some((**quote, StrikeSelection::OutOfTheMoney));
    }

    valid
        .iter()
        .max_by_key(|q| OrderedFloat(q.strike))
        .map(|q| (**q, StrikeSelection::Fallback))
}

/// Estimate weekly covered call income from the nearest eligible expiration
pub fn estimate_premium(
    snapshot: &OptionChainSnapshot,
    as_of: NaiveDate,
    entry_price: f64,
    strike_pct: f64,
    weeks: usize,
) -> EngineResult<PremiumEstimate> {
    let expiry = snapshot
        .eligible_expirations(as_of, MIN_DAYS_TO_EXPIRATION)
        .into_iter()
        .next()
        .ok_or(EngineError::NoEligibleExpiration {
            as_of,
            min_days: MIN_DAYS_TO_EXPIRATION,
        })?;

    let target_strike = entry_price * (1.0 + strike_pct);
    let (quote, selection) =
        select_call(&expiry.calls, target_strike).ok_or(EngineError::NoEligibleExpiration {
            as_of,
            min_days: MIN_DAYS_TO_EXPIRATION,
        })?;

    if selection == StrikeSelection::Fallback {
        warn!(
            "No call at or above target strike {:.2} for {}; using highest strike {:.2}",
            target_strike, expiry.expiration, quote.strike
        );
    }

    let total_premium = quote.bid * weeks as f64;
    let annualized_yield_pct = if entry_price > 0.0 && weeks > 0 {
        (total_premium / entry_price) * (WEEKS_PER_YEAR / weeks as f64) * 100.0
    } else {
        0.0
    };

    debug!(
        "Selected {} call {:.2} bid {:.2} ({:?})",
        expiry.expiration, quote.strike, quote.bid, selection
    );

    Ok(PremiumEstimate {
        expiration: expiry.expiration,
        target_strike,
        strike: quote.strike,
        bid: quote.bid,
        selection,
        weeks,
        total_premium,
        annualized_yield_pct,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OptionExpiry;
    use approx::assert_relative_eq;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn calls(strikes_bids: &[(f64, f64)]) -> Vec<OptionQuote> {
        strikes_bids
            .iter()
            .map(|&(strike, bid)| OptionQuote { strike, bid })
            .collect()
    }

    fn snapshot() -> OptionChainSnapshot {
        OptionChainSnapshot::new(vec![
            OptionExpiry {
                expiration: date(3, 22),
                calls: calls(&[(100.0, 3.0), (105.0, 1.5), (110.0, 0.6)]),
            },
            // Too close
            OptionExpiry {
                expiration: date(3, 8),
                calls: calls(&[(100.0, 9.0), (105.0, 9.0)]),
            },
            OptionExpiry {
                expiration: date(3, 15),
                calls: calls(&[(110.0, 0.8), (95.0, 5.5), (102.5, 2.0), (105.0, 1.2)]),
            },
        ])
    }

    #[test]
    fn test_select_closest_strike_above_target() {
        let chain = calls(&[(110.0, 0.8), (95.0, 5.5), (102.5, 2.0), (105.0, 1.2)]);
        let (quote, selection) = select_call(&chain, 102.0).unwrap();
        assert_eq!(quote.strike, 102.5);
        assert_eq!(selection, StrikeSelection::OutOfTheMoney);
    }

    #[test]
    fn test_select_exact_strike_counts_as_match() {
        let chain = calls(&[(100.0, 3.0), (105.0, 1.5)]);
        let (quote, selection) = select_call(&chain, 105.0).unwrap();
        assert_eq!(quote.strike, 105.0);
        assert_eq!(selection, StrikeSelection::OutOfTheMoney);
    }

    #[test]
    fn test_select_falls_back_to_highest_strike() {
        let chain = calls(&[(90.0, 6.0), (97.5, 2.5), (95.0, 4.0)]);
        let (quote, selection) = select_call(&chain, 102.0).unwrap();
        assert_eq!(quote.strike, 97.5);
        assert_eq!(selection, StrikeSelection::Fallback);
    }

    #[test]
    fn test_select_skips_invalid_quotes() {
        // A NaN strike would otherwise rank highest in the fallback
        let chain = calls(&[(95.0, 1.0), (f64::NAN, -3.0)]);
        let (quote, selection) = select_call(&chain, 102.0).unwrap();
        assert_eq!(quote.strike, 95.0);
        assert_eq!(quote.bid, 1.0);
        assert_eq!(selection, StrikeSelection::Fallback);

        assert!(select_call(&calls(&[(105.0, -2.0)]), 102.0).is_none());
    }

    #[test]
    fn test_negative_bid_never_becomes_premium() {
        let snapshot = OptionChainSnapshot::new(vec![
            OptionExpiry {
                expiration: date(3, 15),
                calls: calls(&[(105.0, -2.0)]),
            },
            OptionExpiry {
                expiration: date(3, 22),
                calls: calls(&[(95.0, 1.0), (f64::NAN, -3.0)]),
            },
        ]);
        let estimate = estimate_premium(&snapshot, date(3, 4), 100.0, 0.02, 12).unwrap();
        assert_eq!(estimate.expiration, date(3, 22));
        assert_eq!(estimate.strike, 95.0);
        assert!(estimate.is_fallback());
        assert_relative_eq!(estimate.total_premium, 12.0, epsilon = 1e-9);
        assert!(estimate.annualized_yield_pct > 0.0);

        let only_bad = OptionChainSnapshot::new(vec![OptionExpiry {
            expiration: date(3, 15),
            calls: calls(&[(105.0, -2.0)]),
        }]);
        assert!(estimate_premium(&only_bad, date(3, 4), 100.0, 0.02, 12).is_err());
    }

    #[test]
    fn test_select_empty_chain() {
        assert!(select_call(&[], 100.0).is_none());
    }

    #[test]
    fn test_estimate_uses_nearest_eligible_expiration() {
        // As of 2024-03-04: 03-08 is 4 days out and skipped; 03-15 is nearest eligible
        let estimate = estimate_premium(&snapshot(), date(3, 4), 100.0, 0.02, 12).unwrap();

        assert_eq!(estimate.expiration, date(3, 15));
        assert_relative_eq!(estimate.target_strike, 102.0, epsilon = 1e-9);
        assert_eq!(estimate.strike, 102.5);
        assert_eq!(estimate.bid, 2.0);
        assert!(!estimate.is_fallback());
        assert_relative_eq!(estimate.total_premium, 24.0, epsilon = 1e-9);
        // (24 / 100) * (52 / 12) * 100 = 104
        assert_relative_eq!(estimate.annualized_yield_pct, 104.0, epsilon = 1e-9);
    }

    #[test]
    fn test_expiration_exactly_five_days_out_is_eligible() {
        let estimate = estimate_premium(&snapshot(), date(3, 3), 100.0, 0.0, 4).unwrap();
        assert_eq!(estimate.expiration, date(3, 8));
    }

    #[test]
    fn test_fallback_is_tagged_not_fatal() {
        let estimate = estimate_premium(&snapshot(), date(3, 4), 120.0, 0.05, 4).unwrap();
        assert_eq!(estimate.strike, 110.0);
        assert!(estimate.is_fallback());
    }

    #[test]
    fn test_no_eligible_expiration() {
        let err = estimate_premium(&snapshot(), date(3, 20), 100.0, 0.02, 12).unwrap_err();
        assert_eq!(
            err,
            EngineError::NoEligibleExpiration {
                as_of: date(3, 20),
                min_days: 5
            }
        );

        let empty = OptionChainSnapshot::default();
        assert!(estimate_premium(&empty, date(3, 4), 100.0, 0.02, 12).is_err());
    }

    #[test]
    fn test_yield_guards_zero_entry_price() {
        let estimate = estimate_premium(&snapshot(), date(3, 4), 0.0, 0.02, 12).unwrap();
        assert_eq!(estimate.annualized_yield_pct, 0.0);
        // Target strike 0: every strike qualifies, smallest wins
        assert_eq!(estimate.strike, 95.0);
    }
}
