use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::{dialect::SqlDialect, parameters::ParameterStyle};

/// SQL Firewall - bind parameters and screen SQL statements for risky patterns
#[derive(Parser, Debug)]
#[command(name = "sql-firewall")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to .sql-firewall.toml lookup)
    #[arg(short, long, global = true, env = "SQL_FIREWALL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate SQL and render it for a driver
    Check {
        /// Path to SQL file (use - for stdin)
        #[arg(short = 'i', long, default_value = "-")]
        file: PathBuf,

        /// Parameters as JSON: object, array or scalar
        #[arg(short, long)]
        params: Option<String>,

        /// SQL dialect for parsing
        #[arg(short, long, value_enum)]
        dialect: Option<Dialect>,

        /// Placeholder style to render (defaults to the input's own style)
        #[arg(short, long, value_enum)]
        style: Option<Style>,

        /// Reject statements at or above the configured risk level
        #[arg(long)]
        strict: bool,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: Format,

        /// Include warnings, timings and metadata
        #[arg(short, long)]
        verbose: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool
    },

    /// List placeholders found in SQL
    Params {
        /// Path to SQL file (use - for stdin)
        #[arg(short = 'i', long, default_value = "-")]
        file: PathBuf,

        /// SQL dialect for tokenizing
        #[arg(short, long, value_enum)]
        dialect: Option<Dialect>,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: Format,

        /// Disable colored output
        #[arg(long)]
        no_color: bool
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Dialect {
    Generic,
    Mysql,
    Postgresql,
    Sqlite,
    Clickhouse,
    Duckdb,
    Mssql,
    Bigquery,
    Snowflake
}

impl From<Dialect> for SqlDialect {
    fn from(dialect: Dialect) -> Self {
        match dialect {
            Dialect::Generic => Self::Generic,
            Dialect::Mysql => Self::MySQL,
            Dialect::Postgresql => Self::PostgreSQL,
            Dialect::Sqlite => Self::SQLite,
            Dialect::Clickhouse => Self::ClickHouse,
            Dialect::Duckdb => Self::DuckDB,
            Dialect::Mssql => Self::MsSql,
            Dialect::Bigquery => Self::BigQuery,
            Dialect::Snowflake => Self::Snowflake
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Style {
    /// `?`
    Qmark,
    /// `$1`
    Numeric,
    /// `:name`
    NamedColon,
    /// `:1`
    PositionalColon,
    /// `@name`
    NamedAt,
    /// `$name`
    NamedDollar,
    /// `%(name)s`
    PyformatNamed,
    /// `%s`
    PyformatPositional,
    /// Inline values as SQL literals
    Static
}

impl From<Style> for ParameterStyle {
    fn from(style: Style) -> Self {
        match style {
            Style::Qmark => Self::Qmark,
            Style::Numeric => Self::Numeric,
            Style::NamedColon => Self::NamedColon,
            Style::PositionalColon => Self::PositionalColon,
            Style::NamedAt => Self::NamedAt,
            Style::NamedDollar => Self::NamedDollar,
            Style::PyformatNamed => Self::PyformatNamed,
            Style::PyformatPositional => Self::PyformatPositional,
            Style::Static => Self::Static
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Format {
    Text,
    Json,
    Yaml
}
