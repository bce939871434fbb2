#![allow(dead_code)]

use chrono::NaiveDate;
use ruletrader::domain::error::RuletraderError;
use ruletrader::domain::frame::HistoricalFrame;
pub use ruletrader::domain::ohlcv::OhlcvBar;
use ruletrader::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, HistoricalFrame>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_frame(mut self, symbol: &str, frame: HistoricalFrame) -> Self {
        self.data.insert(symbol.to_string(), frame);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_frame(
        &self,
        symbol: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<HistoricalFrame, RuletraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(RuletraderError::Data {
                reason: reason.clone(),
            });
        }
        self.data
            .get(symbol)
            .map(|f| f.slice_dates(start_date, end_date))
            .ok_or_else(|| RuletraderError::Data {
                reason: format!("no data for {}", symbol),
            })
    }

    fn list_symbols(&self) -> Result<Vec<String>, RuletraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Consecutive calendar days starting 2024-01-01.
pub fn dates(n: usize) -> Vec<NaiveDate> {
    let start = date("2024-01-01");
    (0..n)
        .map(|i| start + chrono::Duration::days(i as i64))
        .collect()
}

pub fn make_bar(day: NaiveDate, close: f64) -> OhlcvBar {
    OhlcvBar {
        date: day,
        open: close,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 1_000_000.0,
    }
}

pub fn make_bars(closes: &[f64]) -> Vec<OhlcvBar> {
    dates(closes.len())
        .into_iter()
        .zip(closes)
        .map(|(d, &c)| make_bar(d, c))
        .collect()
}

pub fn make_frame(closes: &[f64]) -> HistoricalFrame {
    HistoricalFrame::from_bars(&make_bars(closes)).unwrap()
}

/// Write a `<SYMBOL>.csv` file into `dir` for the given closes.
pub fn write_symbol_csv(dir: &std::path::Path, symbol: &str, closes: &[f64]) {
    let mut out = String::from("date,open,high,low,close,volume\n");
    for bar in make_bars(closes) {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            bar.date, bar.open, bar.high, bar.low, bar.close, bar.volume
        ));
    }
    std::fs::write(dir.join(format!("{}.csv", symbol)), out).unwrap();
}
