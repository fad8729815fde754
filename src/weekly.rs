//! Weekly partitioning of a bar series
//!
//! Bars are grouped by ISO calendar week. The key carries the ISO year so
//! that week 1 of two different years never merge.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::PriceBar;

/// ISO year + week key for organizing bars
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IsoWeekKey {
    pub year: i32,
    pub week: u32,
}

impl IsoWeekKey {
    pub fn new(year: i32, week: u32) -> Self {
        Self { year, week }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }
}

impl fmt::Display for IsoWeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

/// Contiguous bars sharing one ISO week, in date order
#[derive(Debug, Clone, PartialEq)]
pub struct WeekGroup {
    pub key: IsoWeekKey,
    bars: Vec<PriceBar>,
}

impl WeekGroup {
    /// Returns `None` for an empty bar list; a week always holds at least one bar
    pub fn new(key: IsoWeekKey, bars: Vec<PriceBar>) -> Option<Self> {
        if bars.is_empty() {
            None
        } else {
            Some(Self { key, bars })
        }
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    /// Number of bars in the week, never zero
    pub fn trading_days(&self) -> usize {
        self.bars.len()
    }

    pub fn label(&self) -> String {
        self.key.to_string()
    }

    /// Open of the first bar of the week
    pub fn monday_open(&self) -> f64 {
        self.bars[0].open
    }

    /// Close of the last bar of the week
    pub fn friday_close(&self) -> f64 {
        self.bars[self.bars.len() - 1].close
    }

    pub fn start_date(&self) -> NaiveDate {
        self.bars[0].date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.bars[self.bars.len() - 1].date
    }

    /// A week needs an open/close pair on different days to be traded
    pub fn is_tradable(&self) -> bool {
        self.bars.len() >= 2
    }
}

/// Group bars into ISO weeks, ordered by date
pub fn partition_weeks(bars: &[PriceBar]) -> Vec<WeekGroup> {
    let mut groups: BTreeMap<IsoWeekKey, Vec<PriceBar>> = BTreeMap::new();

    for bar in bars {
        groups
            .entry(IsoWeekKey::from_date(bar.date))
            .or_default()
            .push(*bar);
    }

    groups
        .into_iter()
        .filter_map(|(key, bars)| WeekGroup::new(key, bars))
        .collect()
}
