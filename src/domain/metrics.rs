//! Performance metrics computed from a finished simulation.

use serde::Serialize;

use super::backtest::EquityPoint;
use super::position::Trade;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub total_return_pct: f64,
    /// Largest peak-to-trough decline, as a non-positive percentage.
    pub max_drawdown_pct: f64,
    pub num_trades: usize,
    pub win_rate_pct: f64,
    pub avg_trade_return_pct: f64,
}

impl Metrics {
    pub fn compute(trades: &[Trade], equity_curve: &[EquityPoint], initial_capital: f64) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_capital);

        let total_return_pct = if initial_capital > 0.0 {
            (final_equity - initial_capital) / initial_capital * 100.0
        } else {
            0.0
        };

        let num_trades = trades.len();
        let (win_rate_pct, avg_trade_return_pct) = if num_trades > 0 {
            let wins = trades.iter().filter(|t| t.is_win()).count();
            let sum: f64 = trades.iter().map(|t| t.return_pct).sum();
            (
                wins as f64 / num_trades as f64 * 100.0,
                sum / num_trades as f64,
            )
        } else {
            (0.0, 0.0)
        };

        Metrics {
            total_return_pct,
            max_drawdown_pct: compute_max_drawdown_pct(equity_curve),
            num_trades,
            win_rate_pct,
            avg_trade_return_pct,
        }
    }
}

/// min over t of (equity[t] - running_peak[t]) / running_peak[t] * 100
fn compute_max_drawdown_pct(equity_curve: &[EquityPoint]) -> f64 {
    let Some(first) = equity_curve.first() else {
        return 0.0;
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;

    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
        } else if peak > 0.0 {
            let dd = (point.equity - peak) / peak * 100.0;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }

    max_dd
}
