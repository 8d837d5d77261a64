//! Helper functions for CLI operations.
//!
//! Reading input, decoding parameters, layering configuration and mapping
//! verdicts to exit codes.

use std::{
    env,
    fs::read_to_string,
    io::{self, Read},
    path::Path
};

use super::types::StatementReport;
use crate::{
    cli::{Dialect, Format},
    config::FirewallConfig,
    error::{AppError, AppResult, file_read_error},
    output::{OutputFormat, OutputOptions},
    parameters::Parameters,
    validation::RiskLevel
};

/// Reads SQL from a file or from stdin when the path is "-".
///
/// # Errors
///
/// Returns an error if the file cannot be read or stdin fails.
pub fn read_sql_input(path: &Path) -> AppResult<String> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| file_read_error("stdin", e))?;
        Ok(buffer)
    } else {
        read_to_string(path).map_err(|e| file_read_error(&path.display().to_string(), e).into())
    }
}

/// Decodes `--params` JSON into parameters.
///
/// Objects become mappings, arrays sequences, anything else a scalar.
///
/// # Example
///
/// ```
/// use sql_firewall::{app::parse_params_json, parameters::Parameters};
///
/// let params = parse_params_json(Some("[1, 2]")).unwrap();
/// assert_eq!(params, Some(Parameters::from(vec![1i64, 2])));
/// assert_eq!(parse_params_json(None).unwrap(), None);
/// ```
///
/// # Errors
///
/// Returns an error for malformed JSON or nested values that cannot bind.
pub fn parse_params_json(json: Option<&str>) -> AppResult<Option<Parameters>> {
    let Some(json) = json else {
        return Ok(None);
    };
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| AppError::bad_request(format!("Invalid --params JSON: {}", e)))?;
    Parameters::from_json(&value).map(Some).ok_or_else(|| {
        AppError::bad_request("Parameter values must be null, booleans, numbers or strings")
    })
}

/// Builds the effective configuration.
///
/// An explicit file replaces the default file lookup; environment
/// variables apply on top of either, and command-line flags win last.
///
/// # Errors
///
/// Returns an error when a config file is unreadable or invalid.
pub fn load_config(
    path: Option<&Path>,
    dialect: Option<Dialect>,
    strict: bool
) -> AppResult<FirewallConfig> {
    let mut config = match path {
        Some(path) => {
            let mut config = FirewallConfig::from_file(path)?;
            config.apply_env(|key| env::var(key).ok())?;
            config
        }
        None => FirewallConfig::load()?
    };
    if let Some(dialect) = dialect {
        config.processing.dialect = dialect.into();
    }
    if strict {
        config.processing.strict_mode = true;
    }
    config.validate()?;
    Ok(config)
}

/// Exit code for a single verdict.
///
/// ```
/// use sql_firewall::{app::exit_code_for_risk, validation::RiskLevel};
///
/// assert_eq!(exit_code_for_risk(RiskLevel::Low), 0);
/// assert_eq!(exit_code_for_risk(RiskLevel::Medium), 1);
/// assert_eq!(exit_code_for_risk(RiskLevel::Critical), 2);
/// ```
pub fn exit_code_for_risk(risk: RiskLevel) -> i32 {
    match risk {
        RiskLevel::Skip | RiskLevel::Safe | RiskLevel::Low => 0,
        RiskLevel::Medium => 1,
        RiskLevel::High | RiskLevel::Critical => 2
    }
}

/// Exit code for a whole check: the worst statement decides, and any
/// failed statement yields `2`.
pub fn calculate_exit_code(reports: &[StatementReport]) -> i32 {
    reports
        .iter()
        .map(|report| {
            if report.is_failed() {
                2
            } else {
                report.risk_level().map_or(0, exit_code_for_risk)
            }
        })
        .max()
        .unwrap_or(0)
}

/// Creates output options from CLI flags.
pub fn create_output_options(format: Format, no_color: bool, verbose: bool) -> OutputOptions {
    OutputOptions {
        format: match format {
            Format::Text => OutputFormat::Text,
            Format::Json => OutputFormat::Json,
            Format::Yaml => OutputFormat::Yaml
        },
        colored: !no_color,
        verbose
    }
}
