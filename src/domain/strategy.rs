//! Strategy definition: a named rule set.

use serde::Serialize;

use crate::domain::ast::RuleSet;
use crate::domain::error::ParseError;
use crate::domain::rule_parser;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Strategy {
    pub name: String,
    pub description: String,
    pub rules: RuleSet,
}

/// Join separately configured entry and exit expressions into one program.
pub fn compose_rule_text(entry: &str, exit: &str) -> String {
    format!("ENTRY: {}\nEXIT: {}", entry.trim(), exit.trim())
}

impl Strategy {
    pub fn new(name: impl Into<String>, description: impl Into<String>, rules: RuleSet) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            rules,
        }
    }

    /// Parse a full `ENTRY:` / `EXIT:` program.
    pub fn parse(
        name: impl Into<String>,
        description: impl Into<String>,
        text: &str,
    ) -> Result<Self, ParseError> {
        Ok(Self::new(name, description, rule_parser::parse(text)?))
    }

    /// Canonical rule text for this strategy.
    pub fn rule_text(&self) -> String {
        self.rules.to_string()
    }
}
