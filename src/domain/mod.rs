//! Core domain types and logic.

pub mod ast;
pub mod backtest;
pub mod clause;
pub mod compiler;
pub mod config_validation;
pub mod error;
pub mod frame;
pub mod indicator;
pub mod metrics;
pub mod ohlcv;
pub mod position;
pub mod rule_parser;
pub mod signals;
pub mod strategy;
