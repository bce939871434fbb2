//! Rule AST data structures.
//!
//! This module defines the abstract syntax tree for trading rules:
//! - `SeriesRef`: a frame column, or the derived previous-bar high
//! - `Operand`: what can be compared (series, numeric literals, indicator calls)
//! - `IndicatorCall`: an indicator applied to a series with a period
//! - `Expr`: comparison, cross-event, and the AND/OR combinators
//! - `RuleSet`: the parser's output, entry and exit roots in source order
//!
//! Every node serializes to a canonical mapping tagged by `type`, and
//! `Display` renders rule-language text that parses back to the same tree.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the derived previous-bar high reference.
pub const YESTERDAY_HIGH: &str = "yesterday_high";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SeriesRef {
    Column(String),
    YesterdayHigh,
}

impl SeriesRef {
    pub fn column(name: impl Into<String>) -> Self {
        SeriesRef::from(name.into())
    }

    /// The frame column this reference reads from.
    pub fn source_column(&self) -> &str {
        match self {
            SeriesRef::Column(name) => name,
            SeriesRef::YesterdayHigh => "high",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SeriesRef::Column(name) => name,
            SeriesRef::YesterdayHigh => YESTERDAY_HIGH,
        }
    }
}

impl From<String> for SeriesRef {
    fn from(name: String) -> Self {
        if name == YESTERDAY_HIGH {
            SeriesRef::YesterdayHigh
        } else {
            SeriesRef::Column(name)
        }
    }
}

impl From<SeriesRef> for String {
    fn from(series: SeriesRef) -> Self {
        match series {
            SeriesRef::Column(name) => name,
            SeriesRef::YesterdayHigh => YESTERDAY_HIGH.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorCall {
    pub name: String,
    pub series: SeriesRef,
    pub period: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operand {
    Series { value: SeriesRef },
    Number { value: f64 },
    Indicator(IndicatorCall),
}

impl Operand {
    pub fn column(name: &str) -> Self {
        Operand::Series {
            value: SeriesRef::column(name),
        }
    }

    pub fn number(value: f64) -> Self {
        Operand::Number { value }
    }

    pub fn indicator(name: &str, series: &str, period: i64) -> Self {
        Operand::Indicator(IndicatorCall {
            name: name.to_string(),
            series: SeriesRef::column(series),
            period,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
        }
    }

    /// NaN on either side yields `false`.
    pub fn apply(self, left: f64, right: f64) -> bool {
        match self {
            CompareOp::Gt => left > right,
            CompareOp::Lt => left < right,
            CompareOp::Ge => left >= right,
            CompareOp::Le => left <= right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossDirection {
    Above,
    Below,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expr {
    Comparison {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    Cross {
        #[serde(rename = "dir")]
        direction: CrossDirection,
        left: Operand,
        right: Operand,
    },
    And {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Or {
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn compare(left: Operand, op: CompareOp, right: Operand) -> Self {
        Expr::Comparison { left, op, right }
    }

    pub fn cross(left: Operand, direction: CrossDirection, right: Operand) -> Self {
        Expr::Cross {
            direction,
            left,
            right,
        }
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Expr::And {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn or(left: Expr, right: Expr) -> Self {
        Expr::Or {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Canonical `{type, ...fields}` mapping of this node.
    pub fn to_mapping(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Or { .. } => 1,
            Expr::And { .. } => 2,
            Expr::Comparison { .. } | Expr::Cross { .. } => 3,
        }
    }

    fn fmt_child(&self, f: &mut fmt::Formatter<'_>, child: &Expr, right_side: bool) -> fmt::Result {
        let parent = self.precedence();
        let prec = child.precedence();
        if prec < parent || (right_side && prec == parent) {
            write!(f, "({})", child)
        } else {
            write!(f, "{}", child)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub entry: Vec<Expr>,
    pub exit: Vec<Expr>,
}

impl RuleSet {
    pub fn new(entry: Vec<Expr>, exit: Vec<Expr>) -> Self {
        Self { entry, exit }
    }

    pub fn to_mapping(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Load a rule set from its canonical JSON mapping.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl fmt::Display for SeriesRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesRef::Column(name) => write!(f, "{}", name),
            SeriesRef::YesterdayHigh => write!(f, "yesterday's high"),
        }
    }
}

impl fmt::Display for IndicatorCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {})", self.name, self.series.name(), self.period)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Series { value } => write!(f, "{}", value),
            Operand::Number { value } => write!(f, "{}", value),
            Operand::Indicator(call) => write!(f, "{}", call),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for CrossDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrossDirection::Above => f.write_str("crosses above"),
            CrossDirection::Below => f.write_str("crosses below"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Comparison { left, op, right } => write!(f, "{} {} {}", left, op, right),
            Expr::Cross {
                direction,
                left,
                right,
            } => write!(f, "{} {} {}", left, direction, right),
            Expr::And { left, right } => {
                self.fmt_child(f, left, false)?;
                f.write_str(" AND ")?;
                self.fmt_child(f, right, true)
            }
            Expr::Or { left, right } => {
                self.fmt_child(f, left, false)?;
                f.write_str(" OR ")?;
                self.fmt_child(f, right, true)
            }
        }
    }
}

/// Joins several roots under one combinator keyword, parenthesizing
/// anything that binds looser than the keyword.
fn write_section(f: &mut fmt::Formatter<'_>, roots: &[Expr], keyword: &str, prec: u8) -> fmt::Result {
    for (i, root) in roots.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", keyword)?;
        }
        let needs_parens = root.precedence() < prec || (i > 0 && root.precedence() == prec);
        if needs_parens {
            write!(f, "({})", root)?;
        } else {
            write!(f, "{}", root)?;
        }
    }
    Ok(())
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ENTRY:")?;
        if !self.entry.is_empty() {
            f.write_str(" ")?;
            write_section(f, &self.entry, "AND", 2)?;
        }
        f.write_str("\nEXIT:")?;
        if !self.exit.is_empty() {
            f.write_str(" ")?;
            write_section(f, &self.exit, "OR", 1)?;
        }
        Ok(())
    }
}
