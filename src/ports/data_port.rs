//! Data access port trait.

use crate::domain::error::RuletraderError;
use crate::domain::frame::HistoricalFrame;
use chrono::NaiveDate;

pub trait DataPort {
    /// Historical frame for `symbol`, limited to the inclusive date range
    /// when bounds are given.
    fn fetch_frame(
        &self,
        symbol: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<HistoricalFrame, RuletraderError>;

    fn list_symbols(&self) -> Result<Vec<String>, RuletraderError>;
}
