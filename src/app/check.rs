//! The `check` and `params` commands.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info};

use super::{
    helpers::{
        calculate_exit_code, create_output_options, load_config, parse_params_json,
        read_sql_input
    },
    types::{
        CheckParams, CommandResult, ParamsParams, PlaceholderReport, StatementOutcome,
        StatementReport
    }
};
use crate::{
    error::{AppError, AppResult, FirewallError},
    output::{format_check_report, format_placeholders},
    parameters::{
        ParameterStyle, Parameters, dominant_style, expected_shape, split_statements, tokenize
    },
    statement::SqlProcessor
};

/// Validates and renders every statement of the input.
///
/// Statements are split on `;` and checked in parallel. Each one is bound
/// to the same parameters and judged on its own; the worst verdict sets the
/// exit code.
///
/// # Errors
///
/// Returns an error when the input, the parameters or the configuration
/// cannot be read. Per-statement failures are reported, not returned.
pub fn run_check(params: &CheckParams) -> AppResult<CommandResult> {
    let sql = read_sql_input(&params.input_path)?;
    let config = load_config(params.config_path.as_deref(), params.dialect, params.strict)?;
    let parameters = parse_params_json(params.params_json.as_deref())?;
    let dialect = config.processing.dialect;
    let processor = Arc::new(SqlProcessor::new(config)?);

    let pieces = split_statements(&sql, dialect);
    if pieces.is_empty() {
        return Err(AppError::bad_request("No SQL statements in input"));
    }
    info!(statements = pieces.len(), %dialect, "checking input");

    let style = params.style.map(ParameterStyle::from);
    let reports: Vec<StatementReport> = pieces
        .par_iter()
        .enumerate()
        .map(|(index, piece)| {
            check_statement(&processor, index + 1, piece, parameters.as_ref(), style)
        })
        .collect();

    let opts = create_output_options(params.output_format, params.no_color, params.verbose);
    Ok(CommandResult {
        exit_code: calculate_exit_code(&reports),
        output:    format_check_report(&reports, &opts)
    })
}

fn check_statement(
    processor: &Arc<SqlProcessor>,
    index: usize,
    sql: &str,
    parameters: Option<&Parameters>,
    style: Option<ParameterStyle>
) -> StatementReport {
    let mut statement = processor.statement(sql);
    if let Some(parameters) = parameters {
        statement = statement.with_parameters(parameters.clone());
    }
    let compiled = match style {
        Some(style) => statement.compile_as(style),
        None => statement.compile()
    };

    let outcome = match compiled {
        Ok(compiled) => StatementOutcome::Compiled {
            metadata: statement
                .processed()
                .map(|processed| processed.results.metadata.clone())
                .unwrap_or_default(),
            compiled
        },
        Err(err) => {
            debug!(index, error = %err, "statement failed");
            let issues = match &err {
                FirewallError::Validation {
                    issues, ..
                } => issues.clone(),
                _ => Vec::new()
            };
            StatementOutcome::Failed {
                risk_level: err.risk_level(),
                error: err.to_string(),
                issues
            }
        }
    };

    StatementReport {
        index,
        input: sql.to_string(),
        outcome
    }
}

/// Lists the placeholders of the whole input.
///
/// # Errors
///
/// Returns an error when the input or configuration cannot be read.
pub fn run_params(params: &ParamsParams) -> AppResult<CommandResult> {
    let sql = read_sql_input(&params.input_path)?;
    let config = load_config(params.config_path.as_deref(), params.dialect, false)?;
    let dialect = config.processing.dialect;

    let placeholders = tokenize(&sql, dialect);
    let report = PlaceholderReport {
        dialect,
        style: dominant_style(&placeholders),
        shape: expected_shape(&placeholders),
        placeholders
    };

    let opts = create_output_options(params.output_format, params.no_color, false);
    Ok(CommandResult {
        exit_code: 0,
        output:    format_placeholders(&report, &opts)
    })
}
