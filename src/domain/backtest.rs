//! Backtest engine and event loop.
//!
//! A single long-only position moves between `FLAT` and `LONG`, one bar at a
//! time:
//! - `FLAT` + entry signal: open at the bar's execution price
//! - `LONG` (opened on an earlier bar) + exit signal: close, compound equity
//! - a position still open after the last bar is closed at the last price
//!
//! An entry on the final bar is ignored since no later bar exists to exit on.
//! Entries on a bar whose price is not a positive finite number are skipped,
//! and exits on a non-finite price wait for the next exit signal.

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::error::RuletraderError;
use crate::domain::frame::HistoricalFrame;
use crate::domain::metrics::Metrics;
use crate::domain::position::{OpenPosition, Trade};
use crate::domain::signals::SignalTable;

pub const DEFAULT_PRICE_FIELD: &str = "close";
pub const DEFAULT_INITIAL_CAPITAL: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub price_field: String,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            price_field: DEFAULT_PRICE_FIELD.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: Metrics,
}

impl BacktestResult {
    pub fn final_equity(&self) -> Option<f64> {
        self.equity_curve.last().map(|p| p.equity)
    }
}

fn is_tradable(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Run the bar-by-bar simulation of `signals` over `frame`.
///
/// The signal table must cover exactly the frame's dates and the execution
/// price column must exist; both are checked before the first bar.
pub fn run_backtest(
    frame: &HistoricalFrame,
    signals: &SignalTable,
    config: &BacktestConfig,
) -> Result<BacktestResult, RuletraderError> {
    if !(config.initial_capital.is_finite() && config.initial_capital > 0.0) {
        return Err(RuletraderError::ConfigInvalid {
            section: "backtest".into(),
            key: "initial_capital".into(),
            reason: format!("must be a positive number, got {}", config.initial_capital),
        });
    }
    let prices = frame
        .column(&config.price_field)
        .ok_or_else(|| RuletraderError::FrameInvalid {
            reason: format!("price field '{}' is not a frame column", config.price_field),
        })?;
    signals.validate_against(frame)?;

    let dates = frame.index();
    let entry = signals.entry();
    let exit = signals.exit();
    let n = dates.len();

    let mut position: Option<OpenPosition> = None;
    let mut equity = config.initial_capital;
    let mut trades: Vec<Trade> = Vec::new();
    let mut equity_curve: Vec<EquityPoint> = Vec::with_capacity(n);
    let mut last_price: Option<f64> = None;

    for i in 0..n {
        let date = dates[i];
        let price = prices[i];
        if price.is_finite() {
            last_price = Some(price);
        }

        position = match position.take() {
            None => {
                if entry[i] && i + 1 < n && is_tradable(price) {
                    tracing::debug!(%date, price, "open long");
                    Some(OpenPosition::new(date, price))
                } else {
                    None
                }
            }
            Some(open) if exit[i] && price.is_finite() => {
                let trade = open.close(date, price);
                equity *= trade.growth_factor();
                tracing::debug!(%date, price, return_pct = trade.return_pct, "close long");
                trades.push(trade);
                None
            }
            Some(open) => Some(open),
        };

        equity_curve.push(EquityPoint { date, equity });
    }

    if let (Some(open), Some(price), Some(last)) = (position, last_price, equity_curve.last_mut()) {
        let trade = open.close(last.date, price);
        equity *= trade.growth_factor();
        last.equity = equity;
        tracing::debug!(date = %last.date, price, return_pct = trade.return_pct, "forced close at end of data");
        trades.push(trade);
    }

    let metrics = Metrics::compute(&trades, &equity_curve, config.initial_capital);
    tracing::info!(
        bars = n,
        trades = metrics.num_trades,
        total_return_pct = metrics.total_return_pct,
        max_drawdown_pct = metrics.max_drawdown_pct,
        "backtest complete"
    );

    Ok(BacktestResult {
        trades,
        equity_curve,
        metrics,
    })
}
