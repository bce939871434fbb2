//! Technical indicator implementations.
//!
//! Indicators are pure functions over a value series. Positions without a
//! full window are `NaN`, and any comparison against them evaluates to false.
//! - `IndicatorKind`: the closed set of indicators the rule language can call
//! - `IndicatorKey`: indicator identity + parameters (serves as cache key)

pub mod rsi;
pub mod sma;

use std::fmt;

pub use rsi::calculate_rsi;
pub use sma::calculate_sma;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorKind {
    Sma,
    Rsi,
}

impl IndicatorKind {
    /// Resolve an indicator name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sma" => Some(IndicatorKind::Sma),
            "rsi" => Some(IndicatorKind::Rsi),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IndicatorKind::Sma => "sma",
            IndicatorKind::Rsi => "rsi",
        }
    }

    pub fn compute(self, values: &[f64], period: usize) -> Vec<f64> {
        match self {
            IndicatorKind::Sma => calculate_sma(values, period),
            IndicatorKind::Rsi => calculate_rsi(values, period),
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One computed indicator series: kind, source series, period.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndicatorKey {
    pub kind: IndicatorKind,
    pub series: String,
    pub period: usize,
}

impl fmt::Display for IndicatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {})", self.kind, self.series, self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_name_ignores_case() {
        assert_eq!(IndicatorKind::from_name("sma"), Some(IndicatorKind::Sma));
        assert_eq!(IndicatorKind::from_name("RSI"), Some(IndicatorKind::Rsi));
        assert_eq!(IndicatorKind::from_name("Sma"), Some(IndicatorKind::Sma));
        assert_eq!(IndicatorKind::from_name("ema"), None);
    }

    #[test]
    fn kind_compute_dispatches() {
        let values = [1.0, 2.0, 3.0];
        let sma = IndicatorKind::Sma.compute(&values, 2);
        assert!(sma[0].is_nan());
        assert!((sma[2] - 2.5).abs() < f64::EPSILON);
        assert_eq!(IndicatorKind::Rsi.compute(&values, 2).len(), 3);
    }

    #[test]
    fn key_display_and_hash() {
        use std::collections::HashMap;

        let key = IndicatorKey {
            kind: IndicatorKind::Sma,
            series: "close".into(),
            period: 20,
        };
        assert_eq!(key.to_string(), "sma(close, 20)");

        let mut map = HashMap::new();
        map.insert(key.clone(), 1);
        let same = IndicatorKey {
            kind: IndicatorKind::Sma,
            series: "close".into(),
            period: 20,
        };
        assert_eq!(map.get(&same), Some(&1));
    }
}
