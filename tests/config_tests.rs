use std::{io::Write, path::Path};

use sql_firewall::{
    config::FirewallConfig, dialect::SqlDialect, error::FirewallError, validation::RiskLevel
};
use tempfile::NamedTempFile;

#[test]
fn test_default_config() {
    let config = FirewallConfig::default();

    assert!(config.processing.enable_parsing);
    assert!(config.processing.enable_validation);
    assert!(!config.processing.strict_mode);
    assert_eq!(config.processing.dialect, SqlDialect::Generic);
    assert!(config.dml.require_where_delete);
    assert!(config.validate().is_ok());
}

#[test]
fn test_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[processing]
dialect = "postgresql"
strict_mode = true

[cartesian]
max_joins = 4
warn_joins = 2
"#
    )
    .unwrap();

    let config = FirewallConfig::from_file(file.path()).unwrap();
    assert_eq!(config.processing.dialect, SqlDialect::PostgreSQL);
    assert!(config.processing.strict_mode);
    assert_eq!(config.cartesian.max_joins, 4);
    assert_eq!(config.cartesian.warn_joins, 2);
    assert!(config.tautology.enabled);
}

#[test]
fn test_missing_file_is_config_error() {
    let err = FirewallConfig::from_file(Path::new("/nonexistent/sql-firewall.toml")).unwrap_err();
    assert!(matches!(err, FirewallError::Config(_)));
}

#[test]
fn test_invalid_toml() {
    let err = FirewallConfig::from_toml("[processing\nstrict_mode = ").unwrap_err();
    assert!(err.to_string().contains("Invalid config file"));
}

#[test]
fn test_env_overrides() {
    let mut config = FirewallConfig::default();
    config
        .apply_env(|key| match key {
            "SQL_FIREWALL_STRICT" => Some("yes".to_string()),
            "SQL_FIREWALL_DIALECT" => Some("mysql".to_string()),
            "SQL_FIREWALL_MAX_JOINS" => Some("20".to_string()),
            _ => None
        })
        .unwrap();
    assert!(config.processing.strict_mode);
    assert_eq!(config.processing.dialect, SqlDialect::MySQL);
    assert_eq!(config.cartesian.max_joins, 20);
}

#[test]
fn test_env_rejects_bad_number() {
    let mut config = FirewallConfig::default();
    let err = config
        .apply_env(|key| (key == "SQL_FIREWALL_MAX_JOINS").then(|| "many".to_string()))
        .unwrap_err();
    assert!(err.to_string().contains("SQL_FIREWALL_MAX_JOINS"));
}

#[test]
fn test_validate_rejects_inverted_join_limits() {
    let mut config = FirewallConfig::default();
    config.cartesian.warn_joins = 10;
    config.cartesian.max_joins = 5;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_bad_custom_pattern() {
    let mut config = FirewallConfig::default();
    config.injection.custom_patterns.push("(unclosed".to_string());
    assert!(config.validate().is_err());
}

#[test]
fn test_strict_min_risk_parses_uppercase() {
    let config = FirewallConfig::from_toml(
        r#"
        [processing]
        strict_min_risk = "CRITICAL"
        "#
    )
    .unwrap();
    assert_eq!(config.processing.strict_min_risk, RiskLevel::Critical);
}
