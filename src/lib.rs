//! Covered Call Backtest
//!
//! Evaluates a weekly covered call strategy with a dynamic ATR stop-loss
//! against a historical price series and an option chain snapshot, producing
//! per-week outcomes and aggregate return figures.

pub mod aggregate;
pub mod backtest;
pub mod config;
pub mod data;
pub mod drawdown;
pub mod error;
pub mod export;
pub mod indicators;
pub mod optimizer;
pub mod premium;
pub mod risk;
pub mod strategy;
pub mod types;
pub mod weekly;

pub use config::Config;
pub use error::{EngineError, EngineResult};
pub use strategy::{CoveredCallStrategy, WeeklyStrategy};
pub use types::*;
