//! Historical frame: a date index plus named numeric columns of equal length.
//!
//! The frame is read-only once built. `open`, `high`, `low`, `close` and
//! `volume` are always present; loaders may attach further columns which
//! rules can reference by name.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::domain::error::RuletraderError;
use crate::domain::ohlcv::{OHLCV_COLUMNS, OhlcvBar};

#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalFrame {
    index: Vec<NaiveDate>,
    columns: BTreeMap<String, Vec<f64>>,
}

/// Column names of a frame, used to check rules before any data is evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameSchema {
    columns: BTreeSet<String>,
}

impl FrameSchema {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Schema with just the OHLCV columns.
    pub fn ohlcv() -> Self {
        Self::new(OHLCV_COLUMNS)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }
}

impl HistoricalFrame {
    pub fn new(
        index: Vec<NaiveDate>,
        columns: BTreeMap<String, Vec<f64>>,
    ) -> Result<Self, RuletraderError> {
        for required in OHLCV_COLUMNS {
            if !columns.contains_key(required) {
                return Err(RuletraderError::FrameInvalid {
                    reason: format!("missing required column '{}'", required),
                });
            }
        }

        for (name, values) in &columns {
            if values.len() != index.len() {
                return Err(RuletraderError::FrameInvalid {
                    reason: format!(
                        "column '{}' has {} values but the index has {} dates",
                        name,
                        values.len(),
                        index.len()
                    ),
                });
            }
        }

        if let Some(pair) = index.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(RuletraderError::FrameInvalid {
                reason: format!(
                    "dates must be strictly increasing: {} is followed by {}",
                    pair[0], pair[1]
                ),
            });
        }

        Ok(Self { index, columns })
    }

    pub fn from_bars(bars: &[OhlcvBar]) -> Result<Self, RuletraderError> {
        let index = bars.iter().map(|b| b.date).collect();
        let columns = OHLCV_COLUMNS
            .iter()
            .map(|&name| {
                let values: Vec<f64> = bars.iter().map(|b| b.field(name).unwrap_or(f64::NAN)).collect();
                (name.to_string(), values)
            })
            .collect();
        Self::new(index, columns)
    }

    /// Attach an extra column, replacing any column of the same name.
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<Self, RuletraderError> {
        let name = name.into();
        if values.len() != self.index.len() {
            return Err(RuletraderError::FrameInvalid {
                reason: format!(
                    "column '{}' has {} values but the index has {} dates",
                    name,
                    values.len(),
                    self.index.len()
                ),
            });
        }
        self.columns.insert(name, values);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn schema(&self) -> FrameSchema {
        FrameSchema::new(self.column_names())
    }

    /// Rows whose date falls inside the inclusive range.
    pub fn slice_dates(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        let from = start.map_or(0, |d| self.index.partition_point(|&x| x < d));
        let to = end.map_or(self.index.len(), |d| self.index.partition_point(|&x| x <= d));
        let to = to.max(from);

        Self {
            index: self.index[from..to].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|(name, values)| (name.clone(), values[from..to].to_vec()))
                .collect(),
        }
    }
}
