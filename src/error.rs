//! Error taxonomy for parameter handling, parsing and validation.
//!
//! Library code returns [`FirewallError`]. The binary converts it into
//! [`AppError`] at the process boundary.

pub use masterror::{AppError, AppResult};
use thiserror::Error;

use crate::validation::{RiskLevel, SecurityIssue};

/// Longest SQL excerpt carried by an error.
const SQL_EXCERPT_LEN: usize = 200;

/// Result alias used across the library
pub type FirewallResult<T> = Result<T, FirewallError>;

/// Errors raised while binding parameters or screening a statement.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FirewallError {
    /// Supplied parameter shape does not match the placeholders
    #[error("Parameter style mismatch: {message} [sql: {sql}]")]
    ParameterStyleMismatch { message: String, sql: String },

    /// A placeholder has no value, or a sequence has the wrong length
    #[error("Missing parameter: {message} [sql: {sql}]")]
    MissingParameter { message: String, sql: String },

    /// Values supplied for a statement without placeholders
    #[error("Extra parameter: {message} [sql: {sql}]")]
    ExtraParameter { message: String, sql: String },

    /// The SQL text could not be parsed
    #[error("{message} [sql: {sql}]")]
    Parsing { message: String, sql: String },

    /// Strict mode rejected the statement
    #[error("SQL validation failed ({risk_level}): {summary} [sql: {sql}]")]
    Validation {
        sql:        String,
        summary:    String,
        risk_level: RiskLevel,
        issues:     Vec<SecurityIssue>,
        warnings:   Vec<SecurityIssue>
    },

    /// A transformer failed in a way that cannot be recovered
    #[error("Transformation '{component}' failed: {message} [sql: {sql}]")]
    Transformation {
        component: String,
        message:   String,
        sql:       String
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to read input
    #[error("Failed to read '{path}': {source}")]
    Io {
        path:   String,
        #[source]
        source: std::io::Error
    }
}

impl FirewallError {
    /// Failures that abort a pipeline run instead of being recorded
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Parsing { .. })
    }

    /// SQL excerpt attached to the error, if any
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::ParameterStyleMismatch { sql, .. }
            | Self::MissingParameter { sql, .. }
            | Self::ExtraParameter { sql, .. }
            | Self::Parsing { sql, .. }
            | Self::Validation { sql, .. }
            | Self::Transformation { sql, .. } => Some(sql),
            Self::Config(_) | Self::Io { .. } => None
        }
    }

    /// Risk level carried by a validation error
    pub fn risk_level(&self) -> Option<RiskLevel> {
        match self {
            Self::Validation { risk_level, .. } => Some(*risk_level),
            _ => None
        }
    }
}

impl From<FirewallError> for AppError {
    fn from(err: FirewallError) -> Self {
        match err {
            FirewallError::Io { .. } => AppError::internal(err.to_string()),
            other => AppError::bad_request(other.to_string())
        }
    }
}

/// Create parameter style mismatch error
pub fn style_mismatch_error(message: impl Into<String>, sql: &str) -> FirewallError {
    FirewallError::ParameterStyleMismatch {
        message: message.into(),
        sql:     sql_excerpt(sql)
    }
}

/// Create missing parameter error
pub fn missing_parameter_error(message: impl Into<String>, sql: &str) -> FirewallError {
    FirewallError::MissingParameter {
        message: message.into(),
        sql:     sql_excerpt(sql)
    }
}

/// Create extra parameter error
pub fn extra_parameter_error(message: impl Into<String>, sql: &str) -> FirewallError {
    FirewallError::ExtraParameter {
        message: message.into(),
        sql:     sql_excerpt(sql)
    }
}

/// Create parse error with optional position info
pub fn parse_error(message: impl Into<String>, sql: &str) -> FirewallError {
    let msg = message.into();
    FirewallError::Parsing {
        message: format_sql_error("SQL parse error", &msg),
        sql:     sql_excerpt(sql)
    }
}

/// Create transformation error
pub fn transformation_error(
    component: impl Into<String>,
    message: impl Into<String>,
    sql: &str
) -> FirewallError {
    FirewallError::Transformation {
        component: component.into(),
        message:   message.into(),
        sql:       sql_excerpt(sql)
    }
}

/// Create config error
pub fn config_error(message: impl Into<String>) -> FirewallError {
    FirewallError::Config(message.into())
}

/// Create file read error
pub fn file_read_error(path: &str, source: std::io::Error) -> FirewallError {
    FirewallError::Io {
        path: path.to_string(),
        source
    }
}

/// Truncate SQL to a bounded excerpt on a char boundary
pub fn sql_excerpt(sql: &str) -> String {
    let trimmed = sql.trim();
    if trimmed.len() <= SQL_EXCERPT_LEN {
        return trimmed.to_string();
    }
    let mut end = SQL_EXCERPT_LEN;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}

/// Format SQL error with position highlighting
fn format_sql_error(prefix: &str, message: &str) -> String {
    // sqlparser format: "... at Line: X, Column Y"
    if let Some(pos) = extract_position(message) {
        format!(
            "{} at line {}, column {}: {}",
            prefix, pos.line, pos.column, message
        )
    } else {
        format!("{}: {}", prefix, message)
    }
}

struct SqlPosition {
    line:   usize,
    column: usize
}

fn extract_position(message: &str) -> Option<SqlPosition> {
    let line_marker = "Line: ";
    let col_marker = ", Column ";

    let line_start = message.find(line_marker)?;
    let line_num_start = line_start + line_marker.len();
    let col_start = message[line_num_start..].find(col_marker)?;
    let line_str = &message[line_num_start..line_num_start + col_start];
    let col_num_start = line_num_start + col_start + col_marker.len();

    let col_end = message[col_num_start..]
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(message.len() - col_num_start);
    let col_str = &message[col_num_start..col_num_start + col_end];

    match (line_str.parse(), col_str.parse()) {
        (Ok(line), Ok(column)) => Some(SqlPosition { line, column }),
        _ => None
    }
}
