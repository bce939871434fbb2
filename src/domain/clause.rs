//! Structured clauses rendered into rule-language text.
//!
//! A clause extractor hands over `{left, operator, right}` triples grouped
//! into entry and exit lists. Each triple becomes one comparison or cross
//! event; a section's clauses are joined with `AND`. An empty list renders
//! an empty section, which never fires.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::ast::Expr;
use crate::domain::error::RuletraderError;
use crate::domain::rule_parser;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClauseValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for ClauseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClauseValue::Number(v) => write!(f, "{}", v),
            ClauseValue::Text(s) => f.write_str(s.trim()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredClause {
    pub left: String,
    pub operator: String,
    pub right: ClauseValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClauseSet {
    #[serde(default)]
    pub entry: Vec<StructuredClause>,
    #[serde(default)]
    pub exit: Vec<StructuredClause>,
}

impl ClauseSet {
    pub fn from_json(json: &str) -> Result<Self, RuletraderError> {
        serde_json::from_str(json).map_err(|e| RuletraderError::ClauseInvalid {
            reason: format!("malformed clause JSON: {}", e),
        })
    }
}

fn operator_text(operator: &str) -> Option<&'static str> {
    match operator.trim() {
        ">" => Some(">"),
        "<" => Some("<"),
        ">=" => Some(">="),
        "<=" => Some("<="),
        "crosses_above" | "crosses above" => Some("crosses above"),
        "crosses_below" | "crosses below" => Some("crosses below"),
        _ => None,
    }
}

impl StructuredClause {
    /// Rule text for this clause, checked against the grammar.
    pub fn render(&self) -> Result<String, RuletraderError> {
        let left = self.left.trim();
        if left.is_empty() {
            return Err(RuletraderError::ClauseInvalid {
                reason: "clause has an empty left side".into(),
            });
        }
        let right = self.right.to_string();
        if right.is_empty() {
            return Err(RuletraderError::ClauseInvalid {
                reason: format!("clause on '{}' has an empty right side", left),
            });
        }
        let op = operator_text(&self.operator).ok_or_else(|| RuletraderError::ClauseInvalid {
            reason: format!("unsupported operator '{}'", self.operator),
        })?;

        let text = format!("{} {} {}", left, op, right);
        let expr = rule_parser::parse_expr(&text).map_err(|e| RuletraderError::ClauseInvalid {
            reason: format!("`{}` is not a valid clause: {}", text, e.message),
        })?;
        match expr {
            Expr::Comparison { .. } | Expr::Cross { .. } => Ok(text),
            Expr::And { .. } | Expr::Or { .. } => Err(RuletraderError::ClauseInvalid {
                reason: format!("`{}` combines several conditions in one clause", text),
            }),
        }
    }
}

fn render_section(clauses: &[StructuredClause]) -> Result<String, RuletraderError> {
    let parts = clauses
        .iter()
        .map(StructuredClause::render)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join(" AND "))
}

/// Render both sections into a full `ENTRY:` / `EXIT:` program.
pub fn render_rules(clauses: &ClauseSet) -> Result<String, RuletraderError> {
    let entry = render_section(&clauses.entry)?;
    let exit = render_section(&clauses.exit)?;

    let mut out = String::from("ENTRY:");
    if !entry.is_empty() {
        out.push(' ');
        out.push_str(&entry);
    }
    out.push_str("\nEXIT:");
    if !exit.is_empty() {
        out.push(' ');
        out.push_str(&exit);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ast::CrossDirection;

    fn clause(left: &str, operator: &str, right: ClauseValue) -> StructuredClause {
        StructuredClause {
            left: left.into(),
            operator: operator.into(),
            right,
        }
    }

    #[test]
    fn renders_extractor_output() {
        let json = r#"{
            "entry": [
                {"left": "close", "operator": ">", "right": "sma(close,20)"},
                {"left": "volume", "operator": ">", "right": 1000000},
                {"left": "close", "operator": "crosses_above", "right": "yesterday_high"}
            ],
            "exit": [
                {"left": "rsi(close,14)", "operator": "<", "right": 30.0}
            ]
        }"#;
        let set = ClauseSet::from_json(json).unwrap();
        let text = render_rules(&set).unwrap();
        assert_eq!(
            text,
            "ENTRY: close > sma(close,20) AND volume > 1000000 AND close crosses above yesterday_high\nEXIT: rsi(close,14) < 30"
        );

        let rules = rule_parser::parse(&text).unwrap();
        assert_eq!(rules.entry.len(), 1);
        assert!(matches!(rules.entry[0], Expr::And { .. }));
        assert_eq!(rules.exit.len(), 1);
    }

    #[test]
    fn cross_operator_spellings() {
        let a = clause("close", "crosses above", ClauseValue::Number(5.0)).render().unwrap();
        let b = clause("close", "crosses_below", ClauseValue::Number(5.0)).render().unwrap();
        assert_eq!(a, "close crosses above 5");
        assert_eq!(b, "close crosses below 5");
        assert!(matches!(
            rule_parser::parse_expr(&b).unwrap(),
            Expr::Cross {
                direction: CrossDirection::Below,
                ..
            }
        ));
    }

    #[test]
    fn empty_lists_render_empty_sections() {
        let text = render_rules(&ClauseSet::default()).unwrap();
        assert_eq!(text, "ENTRY:\nEXIT:");
        let rules = rule_parser::parse(&text).unwrap();
        assert!(rules.entry.is_empty());
        assert!(rules.exit.is_empty());
    }

    #[test]
    fn missing_section_key_defaults_to_empty() {
        let set = ClauseSet::from_json(r#"{"entry": [{"left": "close", "operator": ">", "right": 1}]}"#).unwrap();
        assert!(set.exit.is_empty());
        assert_eq!(render_rules(&set).unwrap(), "ENTRY: close > 1\nEXIT:");
    }

    #[test]
    fn rejects_unknown_operator() {
        let err = clause("close", "==", ClauseValue::Number(1.0)).render().unwrap_err();
        assert!(matches!(err, RuletraderError::ClauseInvalid { .. }));
        assert!(err.to_string().contains("'=='"));
    }

    #[test]
    fn rejects_empty_sides() {
        assert!(clause(" ", ">", ClauseValue::Number(1.0)).render().is_err());
        assert!(clause("close", ">", ClauseValue::Text("  ".into())).render().is_err());
    }

    #[test]
    fn rejects_text_outside_grammar() {
        let err = clause("close price", ">", ClauseValue::Number(1.0)).render().unwrap_err();
        assert!(err.to_string().contains("not a valid clause"));
    }

    #[test]
    fn rejects_combinator_inside_one_clause() {
        let err = clause("volume", ">", ClauseValue::Text("1 OR close > 0".into()))
            .render()
            .unwrap_err();
        assert!(matches!(err, RuletraderError::ClauseInvalid { .. }));
        assert!(err.to_string().contains("several conditions"));

        let set = ClauseSet {
            entry: vec![
                clause("close", ">", ClauseValue::Number(100.0)),
                clause("volume", ">", ClauseValue::Text("1 OR close > 0".into())),
            ],
            exit: vec![],
        };
        assert!(render_rules(&set).is_err());

        let err = clause("close > 1 AND volume", ">", ClauseValue::Number(5.0))
            .render()
            .unwrap_err();
        assert!(err.to_string().contains("several conditions"));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = ClauseSet::from_json("{\"entry\": 3}").unwrap_err();
        assert!(err.to_string().contains("malformed clause JSON"));
    }
}
