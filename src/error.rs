//! Engine error types
//!
//! Every failure the calculation core can report is an explicit variant here;
//! nothing is thrown across component boundaries.

use chrono::NaiveDate;
use thiserror::Error;

use crate::types::BarValidationError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(
        "not enough historical data ({available} bars retrieved, {required} required); \
         try increasing weeks of history or using a different symbol"
    )]
    InsufficientHistory { available: usize, required: usize },

    #[error("no option expiration at least {min_days} days out as of {as_of}")]
    NoEligibleExpiration { as_of: NaiveDate, min_days: i64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("bar {index} ({date}) is invalid: {source}")]
    InvalidBar {
        index: usize,
        date: NaiveDate,
        #[source]
        source: BarValidationError,
    },

    #[error("duplicate bar date {0}")]
    DuplicateDate(NaiveDate),

    #[error("bars out of order: {previous} is not before {current}")]
    NonChronological {
        previous: NaiveDate,
        current: NaiveDate,
    },
}

impl EngineError {
    /// Bars missing to reach the ATR minimum, if that is the failure
    pub fn shortfall(&self) -> Option<usize> {
        match self {
            EngineError::InsufficientHistory {
                available,
                required,
            } => Some(required.saturating_sub(*available)),
            _ => None,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
