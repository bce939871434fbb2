//! Domain error types.
//!
//! Three fatal families surface from the core: syntax errors from the rule
//! parser, semantic errors from the compiler, and validation errors raised
//! before a simulation starts. Numeric edge cases (undefined warmup windows,
//! zero-loss RSI windows) are never errors.

/// A parse error with position information for rule parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    ///
    /// Multi-line rule text is narrowed to the offending line so the caret
    /// lines up with it.
    pub fn display_with_context(&self, input: &str) -> String {
        let position = self.position.min(input.len());
        let line_start = input[..position].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let line_end = input[position..]
            .find('\n')
            .map(|i| position + i)
            .unwrap_or(input.len());
        let column = input[line_start..position].chars().count();
        let caret = " ".repeat(column) + "^";
        format!(
            "{line}\n{caret}\n{err}",
            line = &input[line_start..line_end],
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for ruletrader.
#[derive(Debug, thiserror::Error)]
pub enum RuletraderError {
    #[error(transparent)]
    RuleParse(#[from] ParseError),

    #[error("unknown indicator '{name}' in clause `{clause}`")]
    UnknownIndicator { name: String, clause: String },

    #[error("invalid period {period} for {name} in clause `{clause}`: period must be positive")]
    InvalidPeriod {
        name: String,
        period: i64,
        clause: String,
    },

    #[error("column '{column}' referenced by clause `{clause}` is not in the frame")]
    MissingColumn { column: String, clause: String },

    #[error("invalid signals: {reason}")]
    SignalValidation { reason: String },

    #[error("invalid frame: {reason}")]
    FrameInvalid { reason: String },

    #[error("invalid clause: {reason}")]
    ClauseInvalid { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RuletraderError {
    /// True for errors raised while compiling rules against a frame.
    pub fn is_semantic(&self) -> bool {
        matches!(
            self,
            RuletraderError::UnknownIndicator { .. }
                | RuletraderError::InvalidPeriod { .. }
                | RuletraderError::MissingColumn { .. }
        )
    }

    /// Process exit status for this error family.
    pub fn exit_status(&self) -> u8 {
        match self {
            RuletraderError::Io(_) | RuletraderError::Report { .. } => 1,
            RuletraderError::ConfigParse { .. }
            | RuletraderError::ConfigMissing { .. }
            | RuletraderError::ConfigInvalid { .. } => 2,
            RuletraderError::Data { .. } => 3,
            RuletraderError::RuleParse(_)
            | RuletraderError::UnknownIndicator { .. }
            | RuletraderError::InvalidPeriod { .. }
            | RuletraderError::MissingColumn { .. }
            | RuletraderError::ClauseInvalid { .. } => 4,
            RuletraderError::SignalValidation { .. } | RuletraderError::FrameInvalid { .. } => 5,
        }
    }
}

impl From<&RuletraderError> for std::process::ExitCode {
    fn from(err: &RuletraderError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_context_single_line() {
        let err = ParseError {
            message: "expected operand".into(),
            position: 7,
        };
        let ctx = err.display_with_context("ENTRY: > 5");
        let lines: Vec<&str> = ctx.lines().collect();
        assert_eq!(lines[0], "ENTRY: > 5");
        assert_eq!(lines[1], "       ^");
        assert!(lines[2].contains("position 7"));
    }

    #[test]
    fn display_with_context_points_into_second_line() {
        let input = "ENTRY: close > 1\nEXIT: close ! 2";
        let err = ParseError {
            message: "unexpected".into(),
            position: input.find('!').unwrap(),
        };
        let ctx = err.display_with_context(input);
        let lines: Vec<&str> = ctx.lines().collect();
        assert_eq!(lines[0], "EXIT: close ! 2");
        assert_eq!(lines[1], "            ^");
    }

    #[test]
    fn display_with_context_at_end_of_input() {
        let err = ParseError {
            message: "expected 'EXIT'".into(),
            position: 100,
        };
        let ctx = err.display_with_context("ENTRY: close > 1");
        assert!(ctx.lines().nth(1).unwrap().ends_with('^'));
    }

    #[test]
    fn semantic_classification() {
        let err = RuletraderError::MissingColumn {
            column: "vwap".into(),
            clause: "vwap > 1".into(),
        };
        assert!(err.is_semantic());
        let err = RuletraderError::SignalValidation {
            reason: "length".into(),
        };
        assert!(!err.is_semantic());
    }

    #[test]
    fn exit_codes_by_family() {
        let parse = RuletraderError::RuleParse(ParseError {
            message: "x".into(),
            position: 0,
        });
        assert_eq!(parse.exit_status(), 4);
        let cfg = RuletraderError::ConfigMissing {
            section: "backtest".into(),
            key: "symbol".into(),
        };
        assert_eq!(cfg.exit_status(), 2);
        let val = RuletraderError::SignalValidation { reason: "x".into() };
        assert_eq!(val.exit_status(), 5);
    }
}
