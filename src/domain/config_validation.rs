//! Configuration validation.
//!
//! Validates config fields before any data is loaded or rules are compiled.

use crate::domain::error::RuletraderError;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), RuletraderError> {
    validate_initial_capital(config)?;
    validate_price_field(config)?;
    validate_dates(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), RuletraderError> {
    validate_rule_source(config)
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), RuletraderError> {
    let Some(raw) = config.get_string("backtest", "initial_capital") else {
        return Ok(());
    };
    let invalid = |reason: &str| RuletraderError::ConfigInvalid {
        section: "backtest".to_string(),
        key: "initial_capital".to_string(),
        reason: reason.to_string(),
    };
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| invalid("initial_capital must be a number"))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid("initial_capital must be positive"));
    }
    Ok(())
}

fn validate_price_field(config: &dyn ConfigPort) -> Result<(), RuletraderError> {
    match config.get_string("backtest", "price_field") {
        Some(s) if s.trim().is_empty() => Err(RuletraderError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "price_field".to_string(),
            reason: "price_field must name a column".to_string(),
        }),
        _ => Ok(()),
    }
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), RuletraderError> {
    let start_date = parse_optional_date(config, "start_date")?;
    let end_date = parse_optional_date(config, "end_date")?;

    if let (Some(start), Some(end)) = (start_date, end_date) {
        if start > end {
            return Err(RuletraderError::ConfigInvalid {
                section: "backtest".to_string(),
                key: "start_date".to_string(),
                reason: "start_date must not be after end_date".to_string(),
            });
        }
    }
    Ok(())
}

/// Read an optional `YYYY-MM-DD` date from `[backtest]`.
pub fn parse_optional_date(
    config: &dyn ConfigPort,
    field: &str,
) -> Result<Option<NaiveDate>, RuletraderError> {
    match config.get_string("backtest", field) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| RuletraderError::ConfigInvalid {
                section: "backtest".to_string(),
                key: field.to_string(),
                reason: format!("invalid {} format, expected YYYY-MM-DD", field),
            }),
    }
}

fn validate_rule_source(config: &dyn ConfigPort) -> Result<(), RuletraderError> {
    let rules_file = config
        .get_string("strategy", "rules_file")
        .filter(|s| !s.trim().is_empty());
    let entry = config.get_string("strategy", "entry");
    let exit = config.get_string("strategy", "exit");

    match (rules_file, entry, exit) {
        (Some(_), None, None) => Ok(()),
        (Some(_), _, _) => Err(RuletraderError::ConfigInvalid {
            section: "strategy".to_string(),
            key: "rules_file".to_string(),
            reason: "set either rules_file or entry/exit, not both".to_string(),
        }),
        (None, Some(_), Some(_)) => Ok(()),
        (None, None, _) => Err(RuletraderError::ConfigMissing {
            section: "strategy".to_string(),
            key: "entry".to_string(),
        }),
        (None, Some(_), None) => Err(RuletraderError::ConfigMissing {
            section: "strategy".to_string(),
            key: "exit".to_string(),
        }),
    }
}
