//! Core data types used across the backtester

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Validation errors for a single daily bar
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarValidationError {
    #[error("prices must be positive and finite: open={open}, high={high}, low={low}, close={close}")]
    NonPositivePrice {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },

    #[error("high ({high}) must be >= low ({low})")]
    HighLessThanLow { high: f64, low: f64 },

    #[error("open ({open}) must be between low ({low}) and high ({high})")]
    OpenOutOfRange { open: f64, low: f64, high: f64 },

    #[error("close ({close}) must be between low ({low}) and high ({high})")]
    CloseOutOfRange { close: f64, low: f64, high: f64 },
}

/// Daily OHLC bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl PriceBar {
    /// Create a new bar with validation
    pub fn new(
        date: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    ) -> Result<Self, BarValidationError> {
        let bar = Self::new_unchecked(date, open, high, low, close);
        bar.validate()?;
        Ok(bar)
    }

    /// Create a bar without validation (for trusted sources or when validation is done separately)
    pub fn new_unchecked(date: NaiveDate, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
        }
    }

    /// Validate the bar against the OHLC ordering invariants
    pub fn validate(&self) -> Result<(), BarValidationError> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(BarValidationError::NonPositivePrice {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }

        if self.high < self.low {
            return Err(BarValidationError::HighLessThanLow {
                high: self.high,
                low: self.low,
            });
        }

        if self.open < self.low || self.open > self.high {
            return Err(BarValidationError::OpenOutOfRange {
                open: self.open,
                low: self.low,
                high: self.high,
            });
        }

        if self.close < self.low || self.close > self.high {
            return Err(BarValidationError::CloseOutOfRange {
                close: self.close,
                low: self.low,
                high: self.high,
            });
        }

        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Ticker symbol, used only for labeling output
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Trims and upper-cases the raw ticker
    pub fn new(s: impl AsRef<str>) -> Self {
        Symbol(s.as_ref().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validation errors for a single call quote
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuoteValidationError {
    #[error("strike must be non-negative and finite: {0}")]
    InvalidStrike(f64),

    #[error("bid must be non-negative and finite: {0}")]
    InvalidBid(f64),
}

/// A single call quote from the chain snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionQuote {
    pub strike: f64,
    pub bid: f64,
}

impl OptionQuote {
    pub fn validate(&self) -> Result<(), QuoteValidationError> {
        if !self.strike.is_finite() || self.strike < 0.0 {
            return Err(QuoteValidationError::InvalidStrike(self.strike));
        }
        if !self.bid.is_finite() || self.bid < 0.0 {
            return Err(QuoteValidationError::InvalidBid(self.bid));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// All call quotes for one expiration date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionExpiry {
    pub expiration: NaiveDate,
    #[serde(default)]
    pub calls: Vec<OptionQuote>,
}

impl OptionExpiry {
    /// Calendar days between `as_of` and the expiration (negative once expired)
    pub fn days_out(&self, as_of: NaiveDate) -> i64 {
        (self.expiration - as_of).num_days()
    }
}

/// Option chain snapshot for one underlying, taken once per run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionChainSnapshot {
    #[serde(default)]
    pub expirations: Vec<OptionExpiry>,
}

impl OptionChainSnapshot {
    pub fn new(expirations: Vec<OptionExpiry>) -> Self {
        Self { expirations }
    }

    /// Expirations at least `min_days` calendar days out that quote at least one
    /// valid call, sorted nearest first
    pub fn eligible_expirations(&self, as_of: NaiveDate, min_days: i64) -> Vec<&OptionExpiry> {
        let mut eligible: Vec<&OptionExpiry> = self
            .expirations
            .iter()
            .filter(|e| {
                e.days_out(as_of) >= min_days && e.calls.iter().any(OptionQuote::is_valid)
            })
            .collect();
        eligible.sort_by_key(|e| e.expiration);
        eligible
    }

    /// Total number of call quotes in the snapshot
    pub fn total_quotes(&self) -> usize {
        self.expirations.iter().map(|e| e.calls.len()).sum()
    }
}

/// Why a week's position was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExitReason {
    /// A close at or below the stop level; filled at the stop price
    StopLoss { date: NaiveDate },
    /// Sold at the lower of Friday's close and the strike cap
    HeldOrCapped,
}

impl ExitReason {
    pub fn is_stop_loss(&self) -> bool {
        matches!(self, ExitReason::StopLoss { .. })
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::StopLoss { date } => write!(f, "Stop-loss hit on {}", date),
            ExitReason::HeldOrCapped => write!(f, "held to Friday or capped"),
        }
    }
}

/// Result of one simulated week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyOutcome {
    pub week: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub monday_price: f64,
    pub friday_price: f64,
    pub stop_level: f64,
    pub strike_cap: f64,
    pub sell_price: f64,
    pub return_fraction: f64,
    pub exit_reason: ExitReason,
    /// Capital multiplier after compounding this week (starts from 1.0)
    pub capital_after: f64,
}

impl WeeklyOutcome {
    pub fn return_pct(&self) -> f64 {
        self.return_fraction * 100.0
    }
}

/// Aggregate return figures for a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub weeks_simulated: usize,
    pub years: f64,
    /// capital - 1
    pub cumulative_return: f64,
    /// Final capital multiplier
    pub final_capital: f64,
    /// final_capital * entry_price
    pub final_capital_value: f64,
    pub total_premium: f64,
    /// final_capital_value + total_premium
    pub combined_capital_value: f64,
    pub annualized_stock_return: f64,
    pub annualized_combined_return: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_valid_bar() {
        let bar = PriceBar::new(day(4), 100.0, 105.0, 95.0, 102.0);
        assert!(bar.is_ok());
    }

    #[test]
    fn test_bar_rejects_non_positive_prices() {
        let err = PriceBar::new(day(4), 0.0, 105.0, 95.0, 102.0).unwrap_err();
        assert!(matches!(err, BarValidationError::NonPositivePrice { .. }));

        let err = PriceBar::new(day(4), 100.0, f64::NAN, 95.0, 102.0).unwrap_err();
        assert!(matches!(err, BarValidationError::NonPositivePrice { .. }));
    }

    #[test]
    fn test_bar_rejects_inverted_range() {
        let err = PriceBar::new(day(4), 100.0, 95.0, 105.0, 100.0).unwrap_err();
        assert!(matches!(err, BarValidationError::HighLessThanLow { .. }));
    }

    #[test]
    fn test_bar_rejects_close_outside_range() {
        let err = PriceBar::new(day(4), 100.0, 105.0, 95.0, 106.0).unwrap_err();
        assert_eq!(
            err,
            BarValidationError::CloseOutOfRange {
                close: 106.0,
                low: 95.0,
                high: 105.0
            }
        );
    }

    #[test]
    fn test_symbol_normalization() {
        assert_eq!(Symbol::new(" tsla ").as_str(), "TSLA");
        assert!(Symbol::new("   ").is_empty());
    }

    #[test]
    fn test_eligible_expirations_sorted_and_filtered() {
        let quote = OptionQuote { strike: 100.0, bid: 1.0 };
        let snapshot = OptionChainSnapshot::new(vec![
            OptionExpiry { expiration: day(29), calls: vec![quote] },
            OptionExpiry { expiration: day(8), calls: vec![quote] },
            OptionExpiry { expiration: day(15), calls: vec![quote] },
            OptionExpiry { expiration: day(22), calls: vec![] },
        ]);

        let eligible = snapshot.eligible_expirations(day(4), 5);
        let dates: Vec<NaiveDate> = eligible.iter().map(|e| e.expiration).collect();
        // day(8) is only 4 days out, day(22) has no calls
        assert_eq!(dates, vec![day(15), day(29)]);
        assert_eq!(snapshot.total_quotes(), 3);
    }

    #[test]
    fn test_quote_validation() {
        assert!(OptionQuote { strike: 105.0, bid: 0.0 }.is_valid());
        assert_eq!(
            OptionQuote { strike: 105.0, bid: -2.0 }.validate(),
            Err(QuoteValidationError::InvalidBid(-2.0))
        );
        assert!(matches!(
            OptionQuote { strike: f64::NAN, bid: 1.0 }.validate(),
            Err(QuoteValidationError::InvalidStrike(_))
        ));
        assert!(!OptionQuote { strike: f64::INFINITY, bid: 1.0 }.is_valid());
    }

    #[test]
    fn test_expiration_with_only_invalid_quotes_not_eligible() {
        let snapshot = OptionChainSnapshot::new(vec![
            OptionExpiry {
                expiration: day(15),
                calls: vec![OptionQuote { strike: 105.0, bid: -2.0 }],
            },
            OptionExpiry {
                expiration: day(22),
                calls: vec![OptionQuote { strike: 105.0, bid: 1.0 }],
            },
        ]);
        let eligible = snapshot.eligible_expirations(day(4), 5);
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].expiration, day(22));
    }

    #[test]
    fn test_exit_reason_display() {
        let reason = ExitReason::StopLoss { date: day(6) };
        assert_eq!(reason.to_string(), "Stop-loss hit on 2024-03-06");
        assert!(reason.is_stop_loss());
        assert_eq!(ExitReason::HeldOrCapped.to_string(), "held to Friday or capped");
    }

    #[test]
    fn test_outcome_serde() {
        let outcome = WeeklyOutcome {
            week: "2024-W10".to_string(),
            start_date: day(4),
            end_date: day(8),
            monday_price: 100.0,
            friday_price: 108.0,
            stop_level: 90.0,
            strike_cap: 102.0,
            sell_price: 102.0,
            return_fraction: 0.02,
            exit_reason: ExitReason::HeldOrCapped,
            capital_after: 1.02,
        };
        let json = serde_json::to_string(&outcome).unwrap();
        let parsed: WeeklyOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(outcome, parsed);
    }
}
