//! Rule compiler.
//!
//! Lowers a [`RuleSet`] into a [`SignalEvaluator`]: a tree of column reads,
//! constants and indicator computations checked once against the frame's
//! columns. Evaluating it over a [`HistoricalFrame`] yields a
//! [`SignalTable`] aligned to the frame's index.
//!
//! # Evaluation Semantics
//!
//! - Comparisons are element-wise; NaN on either side is `false`
//! - `crosses above`: `left[t] > right[t] && left[t-1] <= right[t-1]`, `false` at bar 0
//! - `crosses below`: `left[t] < right[t] && left[t-1] >= right[t-1]`, `false` at bar 0
//! - `yesterday's high` is the `high` column shifted by one bar (NaN at bar 0)
//! - Entry roots are combined with AND, exit roots with OR; an empty list never fires

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use crate::domain::ast::{CompareOp, CrossDirection, Expr, IndicatorCall, Operand, RuleSet, SeriesRef};
use crate::domain::error::RuletraderError;
use crate::domain::frame::{FrameSchema, HistoricalFrame};
use crate::domain::indicator::{IndicatorKey, IndicatorKind};
use crate::domain::signals::SignalTable;

/// Where a series' values come from.
#[derive(Debug, Clone, PartialEq)]
enum SeriesSource {
    Column(String),
    /// Column shifted forward one bar.
    Previous(String),
}

impl SeriesSource {
    fn lower(series: &SeriesRef) -> Self {
        match series {
            SeriesRef::Column(name) => SeriesSource::Column(name.clone()),
            SeriesRef::YesterdayHigh => SeriesSource::Previous(series.source_column().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Source {
    Series(SeriesSource),
    Constant(f64),
    Indicator { key: IndicatorKey, input: SeriesSource },
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Compare {
        left: Source,
        op: CompareOp,
        right: Source,
    },
    Cross {
        direction: CrossDirection,
        left: Source,
        right: Source,
    },
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
}

/// Compiled entry/exit rules, reusable across frames with a compatible schema.
#[derive(Debug, Clone)]
pub struct SignalEvaluator {
    entry: Vec<Node>,
    exit: Vec<Node>,
    /// Column name -> first clause that reads it.
    required: BTreeMap<String, String>,
}

struct Lowering<'a> {
    schema: &'a FrameSchema,
    required: BTreeMap<String, String>,
}

impl Lowering<'_> {
    fn require(&mut self, column: &str, clause: &Expr) -> Result<(), RuletraderError> {
        if !self.schema.contains(column) {
            return Err(RuletraderError::MissingColumn {
                column: column.to_string(),
                clause: clause.to_string(),
            });
        }
        self.required
            .entry(column.to_string())
            .or_insert_with(|| clause.to_string());
        Ok(())
    }

    fn series(&mut self, series: &SeriesRef, clause: &Expr) -> Result<SeriesSource, RuletraderError> {
        self.require(series.source_column(), clause)?;
        Ok(SeriesSource::lower(series))
    }

    fn indicator(&mut self, call: &IndicatorCall, clause: &Expr) -> Result<Source, RuletraderError> {
        let kind = IndicatorKind::from_name(&call.name).ok_or_else(|| {
            RuletraderError::UnknownIndicator {
                name: call.name.clone(),
                clause: clause.to_string(),
            }
        })?;
        let period = usize::try_from(call.period)
            .ok()
            .filter(|&p| p > 0)
            .ok_or_else(|| RuletraderError::InvalidPeriod {
                name: kind.name().to_string(),
                period: call.period,
                clause: clause.to_string(),
            })?;
        let input = self.series(&call.series, clause)?;
        Ok(Source::Indicator {
            key: IndicatorKey {
                kind,
                series: call.series.name().to_string(),
                period,
            },
            input,
        })
    }

    fn operand(&mut self, operand: &Operand, clause: &Expr) -> Result<Source, RuletraderError> {
        match operand {
            Operand::Series { value } => Ok(Source::Series(self.series(value, clause)?)),
            Operand::Number { value } => Ok(Source::Constant(*value)),
            Operand::Indicator(call) => self.indicator(call, clause),
        }
    }

    fn expr(&mut self, expr: &Expr) -> Result<Node, RuletraderError> {
        match expr {
            Expr::Comparison { left, op, right } => Ok(Node::Compare {
                left: self.operand(left, expr)?,
                op: *op,
                right: self.operand(right, expr)?,
            }),
            Expr::Cross {
                direction,
                left,
                right,
            } => Ok(Node::Cross {
                direction: *direction,
                left: self.operand(left, expr)?,
                right: self.operand(right, expr)?,
            }),
            Expr::And { left, right } => Ok(Node::And(
                Box::new(self.expr(left)?),
                Box::new(self.expr(right)?),
            )),
            Expr::Or { left, right } => Ok(Node::Or(
                Box::new(self.expr(left)?),
                Box::new(self.expr(right)?),
            )),
        }
    }
}

/// Check every clause against the schema and lower it.
pub fn compile(rules: &RuleSet, schema: &FrameSchema) -> Result<SignalEvaluator, RuletraderError> {
    let mut lowering = Lowering {
        schema,
        required: BTreeMap::new(),
    };

    let entry = rules
        .entry
        .iter()
        .map(|e| lowering.expr(e))
        .collect::<Result<Vec<_>, _>>()?;
    let exit = rules
        .exit
        .iter()
        .map(|e| lowering.expr(e))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(
        entry_roots = entry.len(),
        exit_roots = exit.len(),
        columns = lowering.required.len(),
        "compiled rule set"
    );

    Ok(SignalEvaluator {
        entry,
        exit,
        required: lowering.required,
    })
}

/// Compile against the frame's own schema and evaluate in one step.
pub fn generate_signals(
    rules: &RuleSet,
    frame: &HistoricalFrame,
) -> Result<SignalTable, RuletraderError> {
    compile(rules, &frame.schema())?.evaluate(frame)
}

struct EvalContext<'f> {
    frame: &'f HistoricalFrame,
    cache: HashMap<IndicatorKey, Vec<f64>>,
}

impl<'f> EvalContext<'f> {
    fn new(frame: &'f HistoricalFrame) -> Self {
        Self {
            frame,
            cache: HashMap::new(),
        }
    }

    fn series(&self, source: &SeriesSource) -> Cow<'f, [f64]> {
        let n = self.frame.len();
        match source {
            SeriesSource::Column(name) => match self.frame.column(name) {
                Some(values) => Cow::Borrowed(values),
                None => Cow::Owned(vec![f64::NAN; n]),
            },
            SeriesSource::Previous(name) => {
                let mut shifted = vec![f64::NAN; n];
                if let Some(values) = self.frame.column(name) {
                    for i in 1..n {
                        shifted[i] = values[i - 1];
                    }
                }
                Cow::Owned(shifted)
            }
        }
    }

    /// Compute every indicator a node needs, once per key.
    fn warm(&mut self, node: &Node) {
        match node {
            Node::Compare { left, right, .. } | Node::Cross { left, right, .. } => {
                self.warm_source(left);
                self.warm_source(right);
            }
            Node::And(a, b) | Node::Or(a, b) => {
                self.warm(a);
                self.warm(b);
            }
        }
    }

    fn warm_source(&mut self, source: &Source) {
        if let Source::Indicator { key, input } = source {
            if self.cache.contains_key(key) {
                return;
            }
            let values = key.kind.compute(&self.series(input), key.period);
            tracing::debug!(indicator = %key, "computed indicator");
            self.cache.insert(key.clone(), values);
        }
    }

    fn values(&self, source: &Source) -> Cow<'_, [f64]> {
        let n = self.frame.len();
        match source {
            Source::Series(series) => self.series(series),
            Source::Constant(value) => Cow::Owned(vec![*value; n]),
            Source::Indicator { key, .. } => match self.cache.get(key) {
                Some(values) => Cow::Borrowed(values.as_slice()),
                None => Cow::Owned(vec![f64::NAN; n]),
            },
        }
    }

    fn eval(&self, node: &Node) -> Vec<bool> {
        match node {
            Node::Compare { left, op, right } => {
                let l = self.values(left);
                let r = self.values(right);
                l.iter().zip(r.iter()).map(|(&a, &b)| op.apply(a, b)).collect()
            }
            Node::Cross {
                direction,
                left,
                right,
            } => {
                let l = self.values(left);
                let r = self.values(right);
                (0..self.frame.len())
                    .map(|t| t > 0 && crossed(*direction, l[t - 1], r[t - 1], l[t], r[t]))
                    .collect()
            }
            Node::And(a, b) => combine(self.eval(a), self.eval(b), |x, y| x && y),
            Node::Or(a, b) => combine(self.eval(a), self.eval(b), |x, y| x || y),
        }
    }

    fn eval_roots(&self, roots: &[Node], op: fn(bool, bool) -> bool) -> Vec<bool> {
        roots
            .iter()
            .map(|node| self.eval(node))
            .reduce(|acc, next| combine(acc, next, op))
            .unwrap_or_else(|| vec![false; self.frame.len()])
    }
}

fn crossed(direction: CrossDirection, prev_l: f64, prev_r: f64, l: f64, r: f64) -> bool {
    match direction {
        CrossDirection::Above => l > r && prev_l <= prev_r,
        CrossDirection::Below => l < r && prev_l >= prev_r,
    }
}

fn combine(a: Vec<bool>, b: Vec<bool>, op: impl Fn(bool, bool) -> bool) -> Vec<bool> {
    a.into_iter().zip(b).map(|(x, y)| op(x, y)).collect()
}

impl SignalEvaluator {
    /// Run the compiled rules over a frame.
    ///
    /// Fails if the frame lacks a column the rules read; indicators are
    /// computed once per evaluation and shared between entry and exit.
    pub fn evaluate(&self, frame: &HistoricalFrame) -> Result<SignalTable, RuletraderError> {
        if let Some((column, clause)) = self.required.iter().find(|(c, _)| !frame.has_column(c)) {
            return Err(RuletraderError::MissingColumn {
                column: column.clone(),
                clause: clause.clone(),
            });
        }

        let mut ctx = EvalContext::new(frame);
        for node in self.entry.iter().chain(self.exit.iter()) {
            ctx.warm(node);
        }

        let entry = ctx.eval_roots(&self.entry, |x, y| x && y);
        let exit = ctx.eval_roots(&self.exit, |x, y| x || y);
        let table = SignalTable::new(frame.index().to_vec(), entry, exit)?;

        tracing::debug!(
            bars = table.len(),
            entries = table.entry_count(),
            exits = table.exit_count(),
            indicators = ctx.cache.len(),
            "evaluated signals"
        );
        Ok(table)
    }

    /// Frame columns the compiled rules read.
    pub fn required_columns(&self) -> impl Iterator<Item = &str> {
        self.required.keys().map(String::as_str)
    }

    pub fn entry_roots(&self) -> usize {
        self.entry.len()
    }

    pub fn exit_roots(&self) -> usize {
        self.exit.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use crate::domain::rule_parser::parse;
    use chrono::NaiveDate;

    fn make_bars(closes: &[f64]) -> Vec<OhlcvBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                date: NaiveDate::from_ymd_opt(2024, 1, (i + 1) as u32).unwrap(),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    fn frame(closes: &[f64]) -> HistoricalFrame {
        HistoricalFrame::from_bars(&make_bars(closes)).unwrap()
    }

    fn signals(text: &str, closes: &[f64]) -> SignalTable {
        generate_signals(&parse(text).unwrap(), &frame(closes)).unwrap()
    }

    #[test]
    fn comparison_against_number() {
        let table = signals("ENTRY: close > 100\nEXIT: close < 90", &[95.0, 105.0, 80.0, 120.0, 70.0]);
        assert_eq!(table.entry(), &[false, true, false, true, false]);
        assert_eq!(table.exit(), &[false, false, true, false, true]);
    }

    #[test]
    fn empty_sections_never_fire() {
        let table = signals("ENTRY:\nEXIT:", &[1.0, 2.0, 3.0]);
        assert_eq!(table.entry(), &[false, false, false]);
        assert_eq!(table.exit(), &[false, false, false]);
    }

    #[test]
    fn entry_roots_and_exit_roots_or() {
        let rules = RuleSet::new(
            vec![
                parse_root("close > 1"),
                parse_root("close < 3"),
            ],
            vec![parse_root("close < 2"), parse_root("close > 3")],
        );
        let table = generate_signals(&rules, &frame(&[1.0, 2.0, 3.0, 4.0])).unwrap();
        assert_eq!(table.entry(), &[false, true, false, false]);
        assert_eq!(table.exit(), &[true, false, false, true]);
    }

    fn parse_root(text: &str) -> Expr {
        crate::domain::rule_parser::parse_expr(text).unwrap()
    }

    #[test]
    fn sma_warmup_compares_false() {
        let table = signals("ENTRY: close > sma(close, 3)\nEXIT: close < sma(close, 3)", &[1.0, 2.0, 3.0, 1.0]);
        // sma: NaN, NaN, 2.0, 2.0
        assert_eq!(table.entry(), &[false, false, true, false]);
        assert_eq!(table.exit(), &[false, false, false, true]);
    }

    #[test]
    fn cross_above_and_below() {
        let closes = [1.0, 3.0, 1.0, 3.0, 3.0];
        let table = signals("ENTRY: close crosses above 2\nEXIT: close crosses below 2", &closes);
        assert_eq!(table.entry(), &[false, true, false, true, false]);
        assert_eq!(table.exit(), &[false, false, true, false, false]);
    }

    #[test]
    fn cross_from_equal_counts() {
        let table = signals("ENTRY: close crosses above 2\nEXIT:", &[2.0, 2.5]);
        assert_eq!(table.entry(), &[false, true]);
    }

    #[test]
    fn cross_is_false_on_first_bar() {
        let table = signals("ENTRY: close crosses above 0\nEXIT:", &[5.0, 6.0]);
        assert_eq!(table.entry(), &[false, false]);
    }

    #[test]
    fn yesterday_high_is_shifted_high() {
        // highs: 11, 13, 12, 16 ; closes: 10, 12, 11, 15
        let table = signals("ENTRY: close > yesterday's high\nEXIT:", &[10.0, 12.0, 11.0, 15.0]);
        assert_eq!(table.entry(), &[false, true, false, true]);
    }

    #[test]
    fn indicator_over_yesterday_high() {
        let table = signals("ENTRY: close > sma(yesterday_high, 1)\nEXIT:", &[10.0, 12.0, 11.0]);
        assert_eq!(table.entry(), &[false, true, false]);
    }

    #[test]
    fn combinators_follow_precedence() {
        let closes = [1.0, 2.0, 3.0, 4.0];
        let table = signals("ENTRY: close < 2 OR close > 2 AND close < 4\nEXIT:", &closes);
        assert_eq!(table.entry(), &[true, false, true, false]);
        let table = signals("ENTRY: (close < 2 OR close > 2) AND close < 4\nEXIT:", &closes);
        assert_eq!(table.entry(), &[true, false, true, false]);
        let table = signals("ENTRY: (close < 2 OR close > 2) AND close > 1\nEXIT:", &closes);
        assert_eq!(table.entry(), &[false, false, true, true]);
    }

    #[test]
    fn unknown_indicator_is_semantic_error() {
        let rules = parse("ENTRY: ema(close, 10) > 1\nEXIT:").unwrap();
        let err = compile(&rules, &FrameSchema::ohlcv()).unwrap_err();
        assert!(err.is_semantic());
        match err {
            RuletraderError::UnknownIndicator { name, clause } => {
                assert_eq!(name, "ema");
                assert_eq!(clause, "ema(close, 10) > 1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_positive_period_is_semantic_error() {
        for text in ["ENTRY: sma(close, 0) > 1\nEXIT:", "ENTRY:\nEXIT: rsi(close, -2) < 30"] {
            let rules = parse(text).unwrap();
            let err = compile(&rules, &FrameSchema::ohlcv()).unwrap_err();
            assert!(matches!(err, RuletraderError::InvalidPeriod { .. }), "{text}");
        }
    }

    #[test]
    fn missing_column_names_clause() {
        let rules = parse("ENTRY: close > 1 AND vwap > close\nEXIT:").unwrap();
        let err = compile(&rules, &FrameSchema::ohlcv()).unwrap_err();
        match err {
            RuletraderError::MissingColumn { column, clause } => {
                assert_eq!(column, "vwap");
                assert_eq!(clause, "vwap > close");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn extra_columns_are_addressable() {
        let f = frame(&[1.0, 2.0, 3.0])
            .with_column("vwap", vec![2.0, 2.0, 2.0])
            .unwrap();
        let rules = parse("ENTRY: close > vwap\nEXIT:").unwrap();
        let table = generate_signals(&rules, &f).unwrap();
        assert_eq!(table.entry(), &[false, false, true]);
    }

    #[test]
    fn evaluate_rejects_frame_missing_compiled_column() {
        let schema = FrameSchema::new(["open", "high", "low", "close", "volume", "vwap"]);
        let rules = parse("ENTRY: close > vwap\nEXIT:").unwrap();
        let evaluator = compile(&rules, &schema).unwrap();
        assert_eq!(
            evaluator.required_columns().collect::<Vec<_>>(),
            vec!["close", "vwap"]
        );
        let err = evaluator.evaluate(&frame(&[1.0])).unwrap_err();
        assert!(matches!(err, RuletraderError::MissingColumn { .. }));
    }

    #[test]
    fn evaluator_is_reusable_across_frames() {
        let rules = parse("ENTRY: close > 2\nEXIT:").unwrap();
        let evaluator = compile(&rules, &FrameSchema::ohlcv()).unwrap();
        assert_eq!(evaluator.entry_roots(), 1);
        assert_eq!(evaluator.exit_roots(), 0);
        let a = evaluator.evaluate(&frame(&[1.0, 3.0])).unwrap();
        let b = evaluator.evaluate(&frame(&[3.0, 1.0, 5.0])).unwrap();
        assert_eq!(a.entry(), &[false, true]);
        assert_eq!(b.entry(), &[true, false, true]);
    }

    #[test]
    fn signal_index_matches_frame() {
        let f = frame(&[1.0, 2.0]);
        let table = generate_signals(&parse("ENTRY:\nEXIT:").unwrap(), &f).unwrap();
        assert_eq!(table.index(), f.index());
    }
}
