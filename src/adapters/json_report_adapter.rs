//! JSON report adapter implementing ReportPort.
//!
//! Writes one pretty-printed document per run:
//! `{strategy: {name, description, rules, ast}, metrics, trades, equity_curve}`.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::domain::ast::RuleSet;
use crate::domain::backtest::{BacktestResult, EquityPoint};
use crate::domain::error::RuletraderError;
use crate::domain::metrics::Metrics;
use crate::domain::position::Trade;
use crate::domain::strategy::Strategy;
use crate::ports::report_port::ReportPort;

#[derive(Serialize)]
struct StrategySection<'a> {
    name: &'a str,
    description: &'a str,
    rules: String,
    ast: &'a RuleSet,
}

#[derive(Serialize)]
struct ReportDocument<'a> {
    strategy: StrategySection<'a>,
    metrics: &'a Metrics,
    final_equity: Option<f64>,
    trades: &'a [Trade],
    equity_curve: &'a [EquityPoint],
}

#[derive(Debug, Default)]
pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Render the report document without touching the filesystem.
    pub fn render(
        &self,
        result: &BacktestResult,
        strategy: &Strategy,
    ) -> Result<String, RuletraderError> {
        let document = ReportDocument {
            strategy: StrategySection {
                name: &strategy.name,
                description: &strategy.description,
                rules: strategy.rule_text(),
                ast: &strategy.rules,
            },
            metrics: &result.metrics,
            final_equity: result.final_equity(),
            trades: &result.trades,
            equity_curve: &result.equity_curve,
        };
        serde_json::to_string_pretty(&document).map_err(|e| RuletraderError::Report {
            reason: format!("failed to serialize report: {}", e),
        })
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(
        &self,
        result: &BacktestResult,
        strategy: &Strategy,
        output_path: &str,
    ) -> Result<(), RuletraderError> {
        let json = self.render(result, strategy)?;

        let path = Path::new(output_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| RuletraderError::Report {
                reason: format!("cannot create {}: {}", parent.display(), e),
            })?;
        }
        fs::write(path, json).map_err(|e| RuletraderError::Report {
            reason: format!("cannot write {}: {}", path.display(), e),
        })?;
        tracing::info!(path = %path.display(), "report written");
        Ok(())
    }
}
