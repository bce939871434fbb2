//! Rule language parser.
//!
//! Recursive descent over the rule text, one character of lookahead, no
//! separate lexer. Converts text to a [`RuleSet`] with error messages that
//! carry the byte offset of the offending token.
//!
//! ```text
//! program     := "ENTRY" ":" expr? "EXIT" ":" expr?
//! expr        := and_expr ("OR" and_expr)*
//! and_expr    := primary ("AND" primary)*
//! primary     := "(" expr ")" | operand (comp_op | cross_op) operand
//! comp_op     := ">" | "<" | ">=" | "<="
//! cross_op    := "crosses" ("above" | "below")
//! operand     := number | "yesterday's high" | NAME "(" series "," integer ")" | NAME
//! ```
//!
//! AND binds tighter than OR and both fold to the left. Keywords are
//! case-sensitive; indicator names are normalized to lowercase.

use crate::domain::ast::{CompareOp, CrossDirection, Expr, IndicatorCall, Operand, RuleSet, SeriesRef};
use crate::domain::error::ParseError;

const RESERVED: [&str; 4] = ["AND", "OR", "ENTRY", "EXIT"];

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            position: self.pos,
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(_) => Err(self.error(format!(
                "expected '{}', found '{}'",
                expected,
                self.peek_word()
            ))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        let remaining = self.remaining();
        remaining.starts_with(keyword)
            && !remaining[keyword.len()..]
                .chars()
                .next()
                .is_some_and(is_word_char)
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    fn consume_exact(&mut self, s: &str) -> bool {
        if self.remaining().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn peek_word(&self) -> String {
        let word: String = self.remaining().chars().take_while(|&c| is_word_char(c)).collect();
        if word.is_empty() {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        } else {
            word
        }
    }

    fn parse_identifier(&mut self) -> Result<String, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch.is_alphabetic() || ch == '_' => {}
            _ => {
                return Err(self.error(format!("expected identifier, found '{}'", self.peek_word())));
            }
        }
        let word = self.peek_word();
        if RESERVED.contains(&word.as_str()) {
            return Err(self.error(format!("expected identifier, found keyword '{}'", word)));
        }
        self.pos += word.len();
        Ok(word)
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if self.peek() == Some('-') {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected number".to_string(),
                position: start,
            });
        }
        if self.peek().is_some_and(is_word_char) {
            return Err(self.error(format!(
                "invalid number: '{}' is followed by '{}'",
                &self.input[start..self.pos],
                self.peek_word()
            )));
        }

        let num_str = &self.input[start..self.pos];
        match num_str.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            Ok(_) => Err(ParseError {
                message: format!("number out of range: {}", num_str),
                position: start,
            }),
            Err(_) => Err(ParseError {
                message: format!("invalid number: {}", num_str),
                position: start,
            }),
        }
    }

    fn parse_period(&mut self, indicator: &str) -> Result<i64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;

        if self.peek() == Some('-') {
            self.advance();
        }
        while self.peek().is_some_and(|ch| ch.is_ascii_digit()) {
            self.advance();
        }

        let text = &self.input[start..self.pos];
        if text.is_empty() || text == "-" {
            self.pos = start;
            return Err(self.error(format!(
                "expected integer period for {}, found '{}'",
                indicator,
                self.peek_word()
            )));
        }
        if self.peek() == Some('.') || self.peek().is_some_and(is_word_char) {
            return Err(ParseError {
                message: format!("period for {} must be an integer", indicator),
                position: start,
            });
        }
        text.parse::<i64>().map_err(|_| ParseError {
            message: format!("invalid period: {}", text),
            position: start,
        })
    }

    fn try_yesterday_high(&mut self) -> bool {
        let start = self.pos;
        if self.consume_exact("yesterday's") || self.consume_exact("yesterday\u{2019}s") {
            self.skip_whitespace();
            if self.consume_keyword("high") {
                return true;
            }
        }
        self.pos = start;
        false
    }

    fn parse_series(&mut self) -> Result<SeriesRef, ParseError> {
        self.skip_whitespace();
        if self.try_yesterday_high() {
            return Ok(SeriesRef::YesterdayHigh);
        }
        Ok(SeriesRef::from(self.parse_identifier()?))
    }

    fn parse_indicator_call(&mut self, name: String) -> Result<Operand, ParseError> {
        self.expect_char('(')?;
        self.skip_whitespace();
        if self.peek() == Some(')') {
            return Err(self.error(format!(
                "{} expects (series, period), found no arguments",
                name
            )));
        }
        let series = self.parse_series()?;
        self.skip_whitespace();
        if self.peek() == Some(')') {
            return Err(self.error(format!("{} expects (series, period), missing period", name)));
        }
        self.expect_char(',')?;
        let period = self.parse_period(&name)?;
        self.skip_whitespace();
        if self.peek() == Some(',') {
            return Err(self.error(format!(
                "{} expects (series, period), found extra argument",
                name
            )));
        }
        self.expect_char(')')?;

        Ok(Operand::Indicator(IndicatorCall {
            name: name.to_lowercase(),
            series,
            period,
        }))
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        self.skip_whitespace();

        if self
            .peek()
            .is_some_and(|ch| ch.is_ascii_digit() || ch == '-' || ch == '.')
        {
            let value = self.parse_number()?;
            return Ok(Operand::Number { value });
        }

        if self.try_yesterday_high() {
            return Ok(Operand::Series {
                value: SeriesRef::YesterdayHigh,
            });
        }

        let name = match self.parse_identifier() {
            Ok(name) => name,
            Err(_) => {
                return Err(self.error(format!("expected operand, found '{}'", self.peek_word())));
            }
        };

        self.skip_whitespace();
        if self.peek() == Some('(') {
            return self.parse_indicator_call(name);
        }

        Ok(Operand::Series {
            value: SeriesRef::from(name),
        })
    }

    fn parse_compare_op(&mut self) -> Option<CompareOp> {
        if self.consume_exact(">=") {
            Some(CompareOp::Ge)
        } else if self.consume_exact("<=") {
            Some(CompareOp::Le)
        } else if self.consume_exact(">") {
            Some(CompareOp::Gt)
        } else if self.consume_exact("<") {
            Some(CompareOp::Lt)
        } else {
            None
        }
    }

    fn parse_clause(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_operand()?;
        self.skip_whitespace();

        if let Some(op) = self.parse_compare_op() {
            let right = self.parse_operand()?;
            return Ok(Expr::Comparison { left, op, right });
        }

        if self.consume_keyword("crosses") {
            self.skip_whitespace();
            let direction = if self.consume_keyword("above") {
                CrossDirection::Above
            } else if self.consume_keyword("below") {
                CrossDirection::Below
            } else {
                return Err(self.error(format!(
                    "expected 'above' or 'below' after 'crosses', found '{}'",
                    self.peek_word()
                )));
            };
            let right = self.parse_operand()?;
            return Ok(Expr::Cross {
                direction,
                left,
                right,
            });
        }

        Err(self.error(format!(
            "expected comparison operator ('>', '<', '>=', '<=') or 'crosses above'/'crosses below', found '{}'",
            self.peek_word()
        )))
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        self.skip_whitespace();
        if self.peek() == Some('(') {
            self.advance();
            let expr = self.parse_expr()?;
            self.expect_char(')')?;
            return Ok(expr);
        }
        self.parse_clause()
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            self.skip_whitespace();
            if !self.consume_keyword("AND") {
                return Ok(expr);
            }
            let right = self.parse_primary()?;
            expr = Expr::and(expr, right);
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_and()?;
        loop {
            self.skip_whitespace();
            if !self.consume_keyword("OR") {
                return Ok(expr);
            }
            let right = self.parse_and()?;
            expr = Expr::or(expr, right);
        }
    }

    fn expect_section(&mut self, label: &str) -> Result<(), ParseError> {
        self.skip_whitespace();
        if self.at_end() {
            return Err(self.error(format!("missing '{}:' section", label)));
        }
        if !self.consume_keyword(label) {
            return Err(self.error(format!("expected '{}:', found '{}'", label, self.peek_word())));
        }
        self.expect_char(':')
    }

    /// Parses a section body; an empty body yields no roots.
    fn parse_section_body(&mut self, next_label: Option<&str>) -> Result<Vec<Expr>, ParseError> {
        self.skip_whitespace();
        let empty = match next_label {
            Some(label) => self.at_end() || self.peek_keyword(label),
            None => self.at_end(),
        };
        if empty {
            return Ok(Vec::new());
        }
        Ok(vec![self.parse_expr()?])
    }

    fn parse_program(&mut self) -> Result<RuleSet, ParseError> {
        self.expect_section("ENTRY")?;
        let entry = self.parse_section_body(Some("EXIT"))?;

        self.skip_whitespace();
        if !self.at_end() && !self.peek_keyword("EXIT") {
            return Err(self.error(format!(
                "expected 'AND', 'OR' or 'EXIT:', found '{}'",
                self.peek_word()
            )));
        }
        self.expect_section("EXIT")?;
        let exit = self.parse_section_body(None)?;

        self.skip_whitespace();
        if !self.at_end() {
            return Err(self.error(format!(
                "unexpected input after EXIT section: '{}'",
                self.remaining()
            )));
        }
        Ok(RuleSet { entry, exit })
    }

    fn parse_single(&mut self) -> Result<Expr, ParseError> {
        self.skip_whitespace();
        if self.at_end() {
            return Err(self.error("expected expression, found end of input"));
        }
        let expr = self.parse_expr()?;
        self.skip_whitespace();
        if !self.at_end() {
            return Err(self.error(format!(
                "unexpected input after expression: '{}'",
                self.remaining()
            )));
        }
        Ok(expr)
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Parse a full rule program with `ENTRY:` and `EXIT:` sections.
pub fn parse(input: &str) -> Result<RuleSet, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse_program()
}

/// Parse a single boolean expression without section labels.
pub fn parse_expr(input: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse_single()
}
