use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlparser::dialect::{
    BigQueryDialect, ClickHouseDialect, Dialect, DuckDbDialect, GenericDialect, MsSqlDialect,
    MySqlDialect, PostgreSqlDialect, SQLiteDialect, SnowflakeDialect
};

use crate::parameters::ParameterStyle;

/// SQL dialect for tokenizing, parsing and rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum SqlDialect {
    #[default]
    Generic,
    MySQL,
    PostgreSQL,
    SQLite,
    ClickHouse,
    DuckDB,
    MsSql,
    BigQuery,
    Snowflake
}

impl SqlDialect {
    /// Convert to sqlparser dialect for parsing
    pub fn into_parser_dialect(self) -> Box<dyn Dialect> {
        match self {
            Self::Generic => Box::new(GenericDialect {}),
            Self::MySQL => Box::new(MySqlDialect {}),
            Self::PostgreSQL => Box::new(PostgreSqlDialect {}),
            Self::SQLite => Box::new(SQLiteDialect {}),
            Self::ClickHouse => Box::new(ClickHouseDialect {}),
            Self::DuckDB => Box::new(DuckDbDialect {}),
            Self::MsSql => Box::new(MsSqlDialect {}),
            Self::BigQuery => Box::new(BigQueryDialect),
            Self::Snowflake => Box::new(SnowflakeDialect)
        }
    }

    /// Dialects with PostgreSQL JSON/array operators (`?|`, `?&`, `@>`, `<@`)
    pub fn has_json_operators(self) -> bool {
        matches!(self, Self::PostgreSQL | Self::DuckDB)
    }

    /// Dialects where `\` escapes a quote inside literals and `#` starts a
    /// line comment
    pub fn has_backslash_escapes(self) -> bool {
        matches!(self, Self::MySQL | Self::BigQuery)
    }

    /// Placeholder style a driver for this dialect expects by default
    pub fn default_parameter_style(self) -> ParameterStyle {
        match self {
            Self::PostgreSQL => ParameterStyle::Numeric,
            Self::MySQL => ParameterStyle::PyformatPositional,
            Self::MsSql => ParameterStyle::NamedAt,
            Self::BigQuery => ParameterStyle::NamedAt,
            Self::Generic
            | Self::SQLite
            | Self::ClickHouse
            | Self::DuckDB
            | Self::Snowflake => ParameterStyle::Qmark
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Generic => "generic",
            Self::MySQL => "mysql",
            Self::PostgreSQL => "postgresql",
            Self::SQLite => "sqlite",
            Self::ClickHouse => "clickhouse",
            Self::DuckDB => "duckdb",
            Self::MsSql => "mssql",
            Self::BigQuery => "bigquery",
            Self::Snowflake => "snowflake"
        };
        f.write_str(name)
    }
}

impl FromStr for SqlDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "generic" | "ansi" => Ok(Self::Generic),
            "mysql" | "mariadb" => Ok(Self::MySQL),
            "postgresql" | "postgres" | "pg" => Ok(Self::PostgreSQL),
            "sqlite" => Ok(Self::SQLite),
            "clickhouse" => Ok(Self::ClickHouse),
            "duckdb" => Ok(Self::DuckDB),
            "mssql" | "tsql" | "sqlserver" => Ok(Self::MsSql),
            "bigquery" => Ok(Self::BigQuery),
            "snowflake" => Ok(Self::Snowflake),
            other => Err(format!("unknown dialect '{}'", other))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_aliases() {
        assert_eq!("postgres".parse::<SqlDialect>(), Ok(SqlDialect::PostgreSQL));
        assert_eq!("TSQL".parse::<SqlDialect>(), Ok(SqlDialect::MsSql));
        assert!("oracle".parse::<SqlDialect>().is_err());
    }

    #[test]
    fn test_backslash_escape_dialects() {
        assert!(SqlDialect::MySQL.has_backslash_escapes());
        assert!(!SqlDialect::PostgreSQL.has_backslash_escapes());
        assert!(!SqlDialect::Generic.has_backslash_escapes());
    }

    #[test]
    fn test_display_parses_back() {
        for d in [SqlDialect::Generic, SqlDialect::MySQL, SqlDialect::PostgreSQL, SqlDialect::SQLite] {
            assert_eq!(d.to_string().parse::<SqlDialect>(), Ok(d));
        }
    }
}
