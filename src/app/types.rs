//! Application types for CLI commands.
//!
//! Command parameters as collected from the command line, the per-statement
//! reports a check produces and the final command result.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Serialize;

use crate::{
    cli::{Dialect, Format, Style},
    dialect::SqlDialect,
    parameters::{ParameterInfo, ParameterShape, ParameterStyle},
    statement::CompiledStatement,
    validation::{RiskLevel, SecurityIssue}
};

/// Parameters for the check command.
///
/// # Example
///
/// ```
/// use sql_firewall::{app::CheckParams, cli::Format};
///
/// let params = CheckParams {
///     input_path:    "queries.sql".into(),
///     params_json:   Some(r#"{"id": 5}"#.to_string()),
///     dialect:       None,
///     style:         None,
///     strict:        false,
///     output_format: Format::Json,
///     verbose:       false,
///     no_color:      true,
///     config_path:   None
/// };
/// assert!(params.params_json.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct CheckParams {
    /// Path to the SQL file or "-" for stdin.
    pub input_path:    PathBuf,
    /// Parameters as a JSON document, applied to every statement.
    pub params_json:   Option<String>,
    /// Dialect override; the configured dialect applies otherwise.
    pub dialect:       Option<Dialect>,
    /// Placeholder style to render; each statement keeps its own otherwise.
    pub style:         Option<Style>,
    /// Force strict mode on.
    pub strict:        bool,
    pub output_format: Format,
    pub verbose:       bool,
    pub no_color:      bool,
    /// Explicit configuration file.
    pub config_path:   Option<PathBuf>
}

/// Parameters for the params command.
#[derive(Debug, Clone)]
pub struct ParamsParams {
    pub input_path:    PathBuf,
    pub dialect:       Option<Dialect>,
    pub output_format: Format,
    pub no_color:      bool,
    pub config_path:   Option<PathBuf>
}

/// Rendered output and the exit code it maps to.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (0, 1 or 2).
    pub exit_code: i32,
    /// Formatted report for stdout.
    pub output:    String
}

/// Verdict for one statement of the input.
#[derive(Debug, Clone, Serialize)]
pub struct StatementReport {
    /// 1-based position of the statement in the input
    pub index:   usize,
    /// Statement text as written
    pub input:   String,
    pub outcome: StatementOutcome
}

/// Outcome of binding and validating one statement.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StatementOutcome {
    /// Parameters bound and the statement rendered; findings may still be
    /// present when strict mode is off
    Compiled {
        compiled: CompiledStatement,
        #[serde(skip_serializing_if = "IndexMap::is_empty")]
        metadata: IndexMap<String, serde_json::Value>
    },
    /// Binding, parsing or strict validation failed
    Failed {
        error:      String,
        #[serde(skip_serializing_if = "Option::is_none")]
        risk_level: Option<RiskLevel>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        issues:     Vec<SecurityIssue>
    }
}

impl StatementReport {
    /// Risk of the statement; `None` for failures without a verdict
    pub fn risk_level(&self) -> Option<RiskLevel> {
        match &self.outcome {
            StatementOutcome::Compiled {
                compiled, ..
            } => Some(compiled.validation.risk_level),
            StatementOutcome::Failed {
                risk_level, ..
            } => *risk_level
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, StatementOutcome::Failed { .. })
    }
}

/// Placeholders found in the input.
#[derive(Debug, Clone, Serialize)]
pub struct PlaceholderReport {
    pub dialect:      SqlDialect,
    /// Style that governs binding
    pub style:        ParameterStyle,
    /// Shape of parameters the SQL expects
    pub shape:        ParameterShape,
    pub placeholders: Vec<ParameterInfo>
}
