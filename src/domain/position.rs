//! Position tracking: the open long position and completed trades.

use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub entry_date: NaiveDate,
    pub entry_price: f64,
}

impl OpenPosition {
    pub fn new(entry_date: NaiveDate, entry_price: f64) -> Self {
        Self {
            entry_date,
            entry_price,
        }
    }

    /// (price / entry_price - 1) * 100
    pub fn return_pct(&self, price: f64) -> f64 {
        (price / self.entry_price - 1.0) * 100.0
    }

    pub fn close(self, exit_date: NaiveDate, exit_price: f64) -> Trade {
        Trade {
            return_pct: self.return_pct(exit_price),
            entry_date: self.entry_date,
            entry_price: self.entry_price,
            exit_date,
            exit_price,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub exit_date: NaiveDate,
    pub exit_price: f64,
    pub return_pct: f64,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.return_pct > 0.0
    }

    /// Equity multiplier this trade applies: 1 + return_pct / 100.
    pub fn growth_factor(&self) -> f64 {
        1.0 + self.return_pct / 100.0
    }
}
