//! Command execution for the `sql-firewall` binary.
//!
//! Kept apart from `main` so commands can be driven from tests without
//! spawning a process.
//!
//! # Exit codes
//!
//! - `0` - every statement is SAFE, LOW or was not validated
//! - `1` - the worst statement is MEDIUM
//! - `2` - a statement is HIGH or CRITICAL, or failed to bind or parse

mod check;
mod helpers;
mod types;

pub use check::{run_check, run_params};
pub use helpers::{
    calculate_exit_code, create_output_options, exit_code_for_risk, load_config,
    parse_params_json, read_sql_input
};
pub use types::{
    CheckParams, CommandResult, ParamsParams, PlaceholderReport, StatementOutcome,
    StatementReport
};
