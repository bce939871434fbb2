//! RSI (Relative Strength Index) indicator implementation.
//!
//! Average gain and loss are simple rolling means of the last n price
//! changes:
//! - gain = max(change, 0), loss = max(-change, 0)
//! - RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//!
//! If avg_loss == 0: RSI = 100, or 50 when avg_gain is also 0 (flat window).
//!
//! Warmup: first n values are NaN (need n price changes for the first average).

use crate::domain::indicator::sma::calculate_sma;

pub fn calculate_rsi(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.is_empty() {
        return vec![f64::NAN; values.len()];
    }

    let mut gains = Vec::with_capacity(values.len());
    let mut losses = Vec::with_capacity(values.len());
    gains.push(f64::NAN);
    losses.push(f64::NAN);

    for pair in values.windows(2) {
        let change = pair[1] - pair[0];
        if change.is_nan() {
            gains.push(f64::NAN);
            losses.push(f64::NAN);
        } else {
            gains.push(if change > 0.0 { change } else { 0.0 });
            losses.push(if change < 0.0 { -change } else { 0.0 });
        }
    }

    let avg_gains = calculate_sma(&gains, period);
    let avg_losses = calculate_sma(&losses, period);

    avg_gains
        .iter()
        .zip(avg_losses.iter())
        .map(|(&avg_gain, &avg_loss)| rsi_from_averages(avg_gain, avg_loss))
        .collect()
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_gain.is_nan() || avg_loss.is_nan() {
        f64::NAN
    } else if avg_loss == 0.0 {
        if avg_gain == 0.0 { 50.0 } else { 100.0 }
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}
