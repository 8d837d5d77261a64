//! Integration tests for the sql-firewall binary.

use std::io::Write;

use assert_cmd::{Command, cargo::cargo_bin_cmd};
use predicates::prelude::*;
use tempfile::NamedTempFile;

fn cmd() -> Command {
    let mut cmd = cargo_bin_cmd!("sql-firewall");
    cmd.env_remove("SQL_FIREWALL_STRICT")
        .env_remove("SQL_FIREWALL_DIALECT")
        .env_remove("SQL_FIREWALL_MAX_JOINS")
        .env_remove("SQL_FIREWALL_CONFIG");
    cmd
}

fn sql_file(sql: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", sql).unwrap();
    file
}

#[test]
fn test_check_safe_statement() {
    let file = sql_file("SELECT * FROM users WHERE id = ?;");
    cmd()
        .args(["check", "-i", file.path().to_str().unwrap(), "-p", "[123]", "--no-color"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SELECT * FROM users WHERE id = ?"))
        .stdout(predicate::str::contains("[SAFE]"));
}

#[test]
fn test_check_from_stdin() {
    cmd()
        .args(["check", "--no-color"])
        .write_stdin("SELECT * FROM t WHERE id = :id")
        .args(["-p", r#"{"id": 5}"#, "-s", "qmark"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SELECT * FROM t WHERE id = ?"))
        .stdout(predicate::str::contains("[5]"));
}

#[test]
fn test_check_delete_without_where_exits_two() {
    let file = sql_file("DELETE FROM users");
    cmd()
        .args(["check", "-i", file.path().to_str().unwrap(), "--no-color"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("WHERE clause"));
}

#[test]
fn test_check_json_format() {
    let file = sql_file("SELECT * FROM a, b");
    let output = cmd()
        .args(["check", "-i", file.path().to_str().unwrap(), "-f", "json"])
        .output()
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["summary"]["total"], 1);
    assert_eq!(json["statements"][0]["outcome"]["status"], "compiled");
    assert_eq!(
        json["statements"][0]["outcome"]["compiled"]["validation"]["issues"][0]["kind"],
        "CARTESIAN_PRODUCT"
    );
}

#[test]
fn test_check_yaml_format() {
    let file = sql_file("SELECT 1");
    cmd()
        .args(["check", "-i", file.path().to_str().unwrap(), "-f", "yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("status: compiled"));
}

#[test]
fn test_check_missing_parameter_fails() {
    let file = sql_file("SELECT * FROM users WHERE name = :name");
    cmd()
        .args(["check", "-i", file.path().to_str().unwrap(), "--no-color"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("FAILED"))
        .stdout(predicate::str::contains("Missing parameter"));
}

#[test]
fn test_check_strict_rejects() {
    let file = sql_file("SELECT 1; DELETE FROM users");
    cmd()
        .args(["check", "-i", file.path().to_str().unwrap(), "--strict", "--no-color"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("SQL validation failed"))
        .stdout(predicate::str::contains("2 statement(s), 1 failed"));
}

#[test]
fn test_check_file_not_found() {
    cmd()
        .args(["check", "-i", "/nonexistent/queries.sql"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read '/nonexistent/queries.sql'"));
}

#[test]
fn test_check_invalid_params_json() {
    let file = sql_file("SELECT ?");
    cmd()
        .args(["check", "-i", file.path().to_str().unwrap(), "-p", "{not json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid --params JSON"));
}

#[test]
fn test_check_with_config_file() {
    let mut config = NamedTempFile::new().unwrap();
    writeln!(config, "[dml]\nrequire_where_delete = false").unwrap();
    let file = sql_file("DELETE FROM users");
    cmd()
        .args([
            "--config",
            config.path().to_str().unwrap(),
            "check",
            "-i",
            file.path().to_str().unwrap(),
            "--no-color"
        ])
        .assert()
        .success();
}

#[test]
fn test_params_lists_placeholders() {
    let file = sql_file("SELECT * FROM t WHERE a = $1 AND b = $2");
    cmd()
        .args(["params", "-i", file.path().to_str().unwrap(), "-d", "postgresql", "--no-color"])
        .assert()
        .success()
        .stdout(predicate::str::contains("numeric style"))
        .stdout(predicate::str::contains("$2"));
}

#[test]
fn test_help() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("params"));
}
