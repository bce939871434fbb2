//! Simple Moving Average indicator.
//!
//! O(n) sliding window. SMA(n) = (P[i-n+1] + ... + P[i]) / n
//! Warmup: first (n-1) values are NaN. A NaN inside the window makes that
//! position NaN as well.

pub fn calculate_sma(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 {
        return vec![f64::NAN; values.len()];
    }

    let mut out = Vec::with_capacity(values.len());
    let mut window_sum = 0.0;
    let mut nan_count = 0usize;

    for (i, &value) in values.iter().enumerate() {
        if value.is_nan() {
            nan_count += 1;
        } else {
            window_sum += value;
        }

        if i >= period {
            let dropped = values[i - period];
            if dropped.is_nan() {
                nan_count -= 1;
            } else {
                window_sum -= dropped;
            }
        }

        if i + 1 < period || nan_count > 0 {
            out.push(f64::NAN);
        } else {
            out.push(window_sum / period as f64);
        }
    }

    out
}
