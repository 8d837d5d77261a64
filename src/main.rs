//! # SQL Firewall
//!
//! Placeholder binding and AST-based screening for SQL statements.
//!
//! `sql-firewall` reads SQL from a file or stdin, binds the supplied
//! parameters, renders the statement for the requested placeholder style and
//! reports security findings: tautologies, injection patterns, cartesian
//! products, unsafe DML and DDL, and excessive complexity.
//!
//! # Quick Start
//!
//! ```bash
//! # Check a statement with positional parameters
//! echo "SELECT * FROM users WHERE id = ?" | sql-firewall check -p '[123]'
//!
//! # Convert named parameters to qmark style
//! sql-firewall check -i query.sql -p '{"id": 5}' --style qmark -f json
//!
//! # Reject risky statements
//! sql-firewall check -i batch.sql --strict
//!
//! # List placeholders
//! sql-firewall params -i query.sql -d postgresql
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded from (in order of precedence):
//!
//! 1. Command-line flags (`--dialect`, `--strict`)
//! 2. Environment variables (`SQL_FIREWALL_STRICT`, `SQL_FIREWALL_DIALECT`,
//!    `SQL_FIREWALL_MAX_JOINS`)
//! 3. `--config FILE`, or `.sql-firewall.toml` in the current directory
//! 4. `~/.config/sql-firewall/config.toml`
//!
//! # Exit Codes
//!
//! - `0` - SAFE, LOW or not validated
//! - `1` - MEDIUM risk
//! - `2` - HIGH or CRITICAL risk, or a statement failed
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `warn`).

use std::{io, process};

use clap::Parser;
use sql_firewall::{
    app::{CheckParams, ParamsParams, run_check, run_params},
    cli::{Cli, Commands},
    error::AppResult
};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
        )
        .with_writer(io::stderr)
        .init();

    match run() {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e.render_message());
            process::exit(2);
        }
    }
}

fn run() -> AppResult<i32> {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check {
            file,
            params,
            dialect,
            style,
            strict,
            format,
            verbose,
            no_color
        } => run_check(&CheckParams {
            input_path: file,
            params_json: params,
            dialect,
            style,
            strict,
            output_format: format,
            verbose,
            no_color,
            config_path: cli.config
        })?,
        Commands::Params {
            file,
            dialect,
            format,
            no_color
        } => run_params(&ParamsParams {
            input_path: file,
            dialect,
            output_format: format,
            no_color,
            config_path: cli.config
        })?
    };

    println!("{}", result.output);
    Ok(result.exit_code)
}
