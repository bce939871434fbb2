//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::ast::RuleSet;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult};
use crate::domain::backtest::{DEFAULT_INITIAL_CAPITAL, DEFAULT_PRICE_FIELD};
use crate::domain::clause::{render_rules, ClauseSet};
use crate::domain::compiler;
use crate::domain::config_validation::{
    parse_optional_date, validate_backtest_config, validate_strategy_config,
};
use crate::domain::error::RuletraderError;
use crate::domain::rule_parser;
use crate::domain::strategy::{compose_rule_text, Strategy};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

pub const DEFAULT_REPORT_PATH: &str = "report.json";

#[derive(Parser, Debug)]
#[command(name = "ruletrader", about = "Trading rule compiler and backtester")]
pub struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile rules and backtest them over one symbol
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Rule file overriding the [strategy] section
        #[arg(short, long)]
        rules: Option<PathBuf>,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Backtest an externally produced signal file
    Simulate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        signals: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Parse a rule file and print its AST as JSON
    Validate {
        #[arg(short, long)]
        rules: PathBuf,
    },
    /// Render structured clause JSON into rule text
    Render {
        #[arg(long)]
        clauses: PathBuf,
    },
    /// List symbols available in the data directory
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            rules,
            symbol,
            output,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config, rules.as_deref(), symbol.as_deref())
            } else {
                run_backtest(&config, rules.as_deref(), symbol.as_deref(), output.as_deref())
            }
        }
        Command::Simulate {
            config,
            signals,
            symbol,
            output,
        } => run_simulate(&config, &signals, symbol.as_deref(), output.as_deref()),
        Command::Validate { rules } => run_validate(&rules),
        Command::Render { clauses } => run_render(&clauses),
        Command::ListSymbols { config } => run_list_symbols(&config),
    }
}

fn fail(err: &RuletraderError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

/// Report a failure, pointing at the offending position for syntax errors.
fn fail_with_rules(err: &RuletraderError, rule_text: &str) -> ExitCode {
    match err {
        RuletraderError::RuleParse(e) => {
            eprintln!("error: failed to parse rules:\n{}", e.display_with_context(rule_text));
            err.into()
        }
        _ => fail(err),
    }
}

fn read_text(path: &Path) -> Result<String, RuletraderError> {
    fs::read_to_string(path).map_err(|e| {
        RuletraderError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read {}: {}", path.display(), e),
        ))
    })
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

/// Directory holding the config file, used to resolve paths inside it.
pub fn config_dir(config_path: &Path) -> &Path {
    config_path.parent().unwrap_or_else(|| Path::new(""))
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, RuletraderError> {
    validate_backtest_config(adapter)?;

    let price_field = adapter
        .get_string("backtest", "price_field")
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_else(|| DEFAULT_PRICE_FIELD.to_string());

    Ok(BacktestConfig {
        initial_capital: adapter.get_double("backtest", "initial_capital", DEFAULT_INITIAL_CAPITAL),
        price_field,
    })
}

pub fn load_date_range(
    adapter: &dyn ConfigPort,
) -> Result<(Option<NaiveDate>, Option<NaiveDate>), RuletraderError> {
    Ok((
        parse_optional_date(adapter, "start_date")?,
        parse_optional_date(adapter, "end_date")?,
    ))
}

/// The `--symbol` override, else `[backtest] symbol`.
pub fn resolve_symbol(
    symbol_override: Option<&str>,
    adapter: &dyn ConfigPort,
) -> Result<String, RuletraderError> {
    match symbol_override.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => Ok(s.to_string()),
        None => adapter.require_string("backtest", "symbol"),
    }
}

pub fn data_dir(adapter: &dyn ConfigPort) -> PathBuf {
    adapter
        .get_string("data", "dir")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Full `ENTRY:` / `EXIT:` rule text from a rule file or the `[strategy]` section.
///
/// An explicit rule file wins over the config; inside the config,
/// `rules_file` and inline `entry`/`exit` are mutually exclusive.
/// A relative `rules_file` is resolved against `config_dir`.
pub fn load_rule_text(
    adapter: &dyn ConfigPort,
    config_dir: &Path,
    rules_override: Option<&Path>,
) -> Result<String, RuletraderError> {
    if let Some(path) = rules_override {
        return read_text(path);
    }

    validate_strategy_config(adapter)?;
    if let Some(file) = adapter
        .get_string("strategy", "rules_file")
        .filter(|s| !s.trim().is_empty())
    {
        return read_text(&config_dir.join(file.trim()));
    }

    let entry = adapter.get_string("strategy", "entry").unwrap_or_default();
    let exit = adapter.get_string("strategy", "exit").unwrap_or_default();
    Ok(compose_rule_text(&entry, &exit))
}

pub fn build_strategy(adapter: &dyn ConfigPort, rule_text: &str) -> Result<Strategy, RuletraderError> {
    let name = adapter
        .get_string("strategy", "name")
        .unwrap_or_else(|| "Unnamed".to_string());
    let description = adapter
        .get_string("strategy", "description")
        .unwrap_or_default();

    Ok(Strategy::parse(name, description, rule_text)?)
}

fn resolve_output(output_override: Option<&Path>, adapter: &dyn ConfigPort) -> PathBuf {
    output_override
        .map(Path::to_path_buf)
        .or_else(|| {
            adapter
                .get_string("report", "output")
                .filter(|s| !s.trim().is_empty())
                .map(|s| PathBuf::from(s.trim()))
        })
        .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_PATH))
}

/// Fetch the frame, compile the strategy against it and simulate.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    strategy: &Strategy,
    bt_config: &BacktestConfig,
    symbol: &str,
    date_range: (Option<NaiveDate>, Option<NaiveDate>),
) -> Result<BacktestResult, RuletraderError> {
    let (start_date, end_date) = date_range;
    let frame = data_port.fetch_frame(symbol, start_date, end_date)?;

    let signals = compiler::generate_signals(&strategy.rules, &frame)?;
    tracing::info!(
        symbol,
        bars = frame.len(),
        entries = signals.entry_count(),
        exits = signals.exit_count(),
        "signals generated"
    );

    backtest_engine::run_backtest(&frame, &signals, bt_config)
}

pub fn print_summary(symbol: &str, result: &BacktestResult) {
    let m = &result.metrics;
    eprintln!("\n=== Results: {} ===", symbol);
    eprintln!("Bars:             {}", result.equity_curve.len());
    if let Some(equity) = result.final_equity() {
        eprintln!("Final Equity:     {:.4}", equity);
    }
    eprintln!("Total Return:     {:.2}%", m.total_return_pct);
    eprintln!("Max Drawdown:     {:.2}%", m.max_drawdown_pct);
    eprintln!("Total Trades:     {}", m.num_trades);
    eprintln!("Win Rate:         {:.1}%", m.win_rate_pct);
    eprintln!("Avg Trade:        {:.2}%", m.avg_trade_return_pct);

    if !result.trades.is_empty() {
        eprintln!("\n=== Trades ===");
        for t in &result.trades {
            eprintln!(
                "  {} @ {:.2} -> {} @ {:.2}  {:+.2}%",
                t.entry_date, t.entry_price, t.exit_date, t.exit_price, t.return_pct
            );
        }
    }
}

fn write_report(result: &BacktestResult, strategy: &Strategy, output: &Path) -> ExitCode {
    match JsonReportAdapter::new().write(result, strategy, &output.to_string_lossy()) {
        Ok(()) => {
            eprintln!("\nReport written to: {}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_backtest(
    config_path: &Path,
    rules_path: Option<&Path>,
    symbol_override: Option<&str>,
    output_path: Option<&Path>,
) -> ExitCode {
    // Stage 1: Load config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Backtest settings
    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let date_range = match load_date_range(&adapter) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };
    let symbol = match resolve_symbol(symbol_override, &adapter) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    // Stage 3: Rules
    let rule_text = match load_rule_text(&adapter, config_dir(config_path), rules_path) {
        Ok(t) => t,
        Err(e) => return fail(&e),
    };
    let strategy = match build_strategy(&adapter, &rule_text) {
        Ok(s) => s,
        Err(e) => return fail_with_rules(&e, &rule_text),
    };
    eprintln!("Loading strategy: {}", strategy.name);

    // Stage 4: Compile and simulate
    let data_port = CsvAdapter::new(data_dir(&adapter));
    eprintln!("Running backtest on {}...", symbol);
    let result =
        match run_backtest_pipeline(&data_port, &strategy, &bt_config, &symbol, date_range) {
            Ok(r) => r,
            Err(e) => return fail(&e),
        };

    // Stage 5: Summary and report
    print_summary(&symbol, &result);
    let output = resolve_output(output_path, &adapter);
    write_report(&result, &strategy, &output)
}

pub fn run_dry_run(
    config_path: &Path,
    rules_path: Option<&Path>,
    symbol_override: Option<&str>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = build_backtest_config(&adapter) {
        return fail(&e);
    }
    let date_range = match load_date_range(&adapter) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };
    let symbol = match resolve_symbol(symbol_override, &adapter) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    let rule_text = match load_rule_text(&adapter, config_dir(config_path), rules_path) {
        Ok(t) => t,
        Err(e) => return fail(&e),
    };
    let strategy = match build_strategy(&adapter, &rule_text) {
        Ok(s) => s,
        Err(e) => return fail_with_rules(&e, &rule_text),
    };
    eprintln!("Config validated successfully");

    eprintln!("\nStrategy rules (parsed):");
    for line in strategy.rule_text().lines() {
        eprintln!("  {}", line);
    }

    // Column checks need the frame's schema, not its values.
    let data_port = CsvAdapter::new(data_dir(&adapter));
    let frame = match data_port.fetch_frame(&symbol, date_range.0, date_range.1) {
        Ok(f) => f,
        Err(e) => return fail(&e),
    };
    let evaluator = match compiler::compile(&strategy.rules, &frame.schema()) {
        Ok(ev) => ev,
        Err(e) => return fail(&e),
    };

    eprintln!("\nColumns read by rules:");
    for column in evaluator.required_columns() {
        eprintln!("  {}", column);
    }
    eprintln!("\nData: {} ({} bars)", symbol, frame.len());

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_simulate(
    config_path: &Path,
    signals_path: &Path,
    symbol_override: Option<&str>,
    output_path: Option<&Path>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let date_range = match load_date_range(&adapter) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };
    let symbol = match resolve_symbol(symbol_override, &adapter) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    eprintln!("Loading signals from {}", signals_path.display());
    let signals = match CsvAdapter::read_signals(signals_path) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    let data_port = CsvAdapter::new(data_dir(&adapter));
    let frame = match data_port.fetch_frame(&symbol, date_range.0, date_range.1) {
        Ok(f) => f,
        Err(e) => return fail(&e),
    };

    let result = match backtest_engine::run_backtest(&frame, &signals, &bt_config) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    let name = adapter
        .get_string("strategy", "name")
        .unwrap_or_else(|| "External signals".to_string());
    let strategy = Strategy::new(
        name,
        format!("signals from {}", signals_path.display()),
        RuleSet::default(),
    );

    print_summary(&symbol, &result);
    let output = resolve_output(output_path, &adapter);
    write_report(&result, &strategy, &output)
}

fn run_validate(rules_path: &Path) -> ExitCode {
    let text = match read_text(rules_path) {
        Ok(t) => t,
        Err(e) => return fail(&e),
    };

    let rules = match rule_parser::parse(&text) {
        Ok(r) => r,
        Err(e) => return fail_with_rules(&RuletraderError::RuleParse(e), &text),
    };

    match rules.to_json_pretty() {
        Ok(json) => {
            println!("{}", json);
            eprintln!(
                "Rules are valid: {} entry clause(s), {} exit clause(s)",
                rules.entry.len(),
                rules.exit.len()
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(&RuletraderError::Report {
            reason: format!("failed to serialize rules: {}", e),
        }),
    }
}

fn run_render(clauses_path: &Path) -> ExitCode {
    let json = match read_text(clauses_path) {
        Ok(t) => t,
        Err(e) => return fail(&e),
    };

    match ClauseSet::from_json(&json).and_then(|set| render_rules(&set)) {
        Ok(text) => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_list_symbols(config_path: &Path) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let adapter = CsvAdapter::new(data_dir(&config));
    match adapter.list_symbols() {
        Ok(symbols) => {
            for symbol in &symbols {
                println!("{}", symbol);
            }
            eprintln!("{} symbol(s)", symbols.len());
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}
