// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use sql_firewall::error::{
    AppError, FirewallError, config_error, file_read_error, missing_parameter_error, parse_error,
    sql_excerpt
};

#[test]
fn test_file_read_error() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let error = file_read_error("/path/to/file.sql", io_error);
    assert!(error.to_string().contains("/path/to/file.sql"));
    assert!(error.sql().is_none());
}

#[test]
fn test_missing_parameter_carries_sql() {
    let error = missing_parameter_error("no value for 'id'", "SELECT * FROM t WHERE id = :id");
    assert!(matches!(error, FirewallError::MissingParameter { .. }));
    assert_eq!(error.sql(), Some("SELECT * FROM t WHERE id = :id"));
    assert!(error.to_string().contains("no value for 'id'"));
}

#[test]
fn test_parse_error_is_fatal() {
    assert!(parse_error("Expected an expression", "SELECT FROM").is_fatal());
    assert!(!config_error("bad").is_fatal());
}

#[test]
fn test_sql_excerpt_truncates() {
    let long = format!("SELECT {} FROM t", "a, ".repeat(200));
    let excerpt = sql_excerpt(&long);
    assert!(excerpt.len() < long.len());
    assert!(excerpt.ends_with("..."));
    assert_eq!(sql_excerpt("  SELECT 1  "), "SELECT 1");
}

#[test]
fn test_sql_excerpt_respects_char_boundaries() {
    let sql = "é".repeat(150);
    let excerpt = sql_excerpt(&sql);
    assert!(excerpt.ends_with("..."));
}

#[test]
fn test_into_app_error() {
    let app: AppError = config_error("bad threshold").into();
    assert!(app.render_message().contains("bad threshold"));

    let app: AppError = missing_parameter_error("no value for 'id'", "SELECT :id").into();
    let message = app.render_message();
    assert!(message.contains("no value for 'id'"));
    assert!(message.contains("SELECT :id"));
}
