use serde_json::json;
use sqlparser::ast::Statement;

use super::{IssueKind, RiskLevel, SecurityIssue};
use crate::{
    config::DmlConfig,
    error::FirewallResult,
    pipeline::{ProcessingContext, Processor, ProcessorKind},
    tree::{StatementCategory, categorize, modified_tables}
};

/// Guards data-modifying and schema-changing statements.
///
/// # Notes
///
/// - UPDATE and DELETE must carry a WHERE clause
/// - DDL is rejected unless its operation is in `allowed_ddl`
/// - DCL (GRANT, REVOKE) is always reported
/// - Writes to `protected_tables` are reported whatever the statement kind
#[derive(Debug, Clone, Copy, Default)]
pub struct DmlSafetyValidator;

impl Processor for DmlSafetyValidator {
    fn name(&self) -> &'static str {
        "dml_safety"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Validator
    }

    fn process(&self, ctx: &mut ProcessingContext) -> FirewallResult<()> {
        let config = &ctx.config.dml;
        let mut issues = Vec::new();
        let mut types = Vec::with_capacity(ctx.statements.len());

        for statement in &ctx.statements {
            let (category, operation) = categorize(statement);
            types.push(json!({ "category": category, "operation": operation.as_str() }));
            let tables = modified_tables(statement);
            let target = tables.first().map_or("table", |t| t.as_str());

            if let Some(missing) = missing_where(statement, config) {
                issues.push(
                    SecurityIssue::new(
                        IssueKind::UnsafeDml,
                        RiskLevel::High,
                        "missing-where",
                        format!(
                            "{} on {} has no WHERE clause and affects every row",
                            missing, target
                        )
                    )
                    .with_node(missing)
                    .with_meta("table", target)
                );
            }

            match category {
                StatementCategory::Ddl if config.block_ddl && !ddl_allowed(&operation, config) => {
                    issues.push(
                        SecurityIssue::new(
                            IssueKind::BlockedDdl,
                            RiskLevel::High,
                            "blocked-ddl",
                            format!("{} statements are not allowed", operation)
                        )
                        .with_node(operation.as_str())
                        .with_meta("operation", operation.as_str())
                    );
                }
                StatementCategory::Dcl => {
                    issues.push(
                        SecurityIssue::new(
                            IssueKind::BlockedDdl,
                            RiskLevel::Medium,
                            "permission-change",
                            format!("{} changes database permissions", operation)
                        )
                        .with_node(operation.as_str())
                        .with_meta("operation", operation.as_str())
                    );
                }
                _ => {}
            }

            for table in tables.iter().filter(|t| is_protected(t, config)) {
                issues.push(
                    SecurityIssue::new(
                        IssueKind::UnsafeDml,
                        RiskLevel::High,
                        "protected-table",
                        format!("{} modifies protected table {}", operation, table)
                    )
                    .with_meta("table", table.as_str())
                );
            }
        }

        ctx.set_metadata("statement_type", json!(types));
        for issue in issues {
            ctx.add_issue(issue);
        }
        Ok(())
    }
}

/// Statement keyword when a required WHERE is absent
fn missing_where(statement: &Statement, config: &DmlConfig) -> Option<&'static str> {
    match statement {
        Statement::Update(update) if update.selection.is_none() && config.require_where_update => {
            Some("UPDATE")
        }
        Statement::Delete(delete) if delete.selection.is_none() && config.require_where_delete => {
            Some("DELETE")
        }
        _ => None
    }
}

fn ddl_allowed(operation: &str, config: &DmlConfig) -> bool {
    config
        .allowed_ddl
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(operation))
}

fn is_protected(table: &str, config: &DmlConfig) -> bool {
    let base = table.rsplit('.').next().unwrap_or(table);
    config
        .protected_tables
        .iter()
        .any(|p| p.eq_ignore_ascii_case(table) || p.eq_ignore_ascii_case(base))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{config::FirewallConfig, dialect::SqlDialect, tree::parse_statements};

    fn run_with(sql: &str, config: FirewallConfig) -> ProcessingContext {
        let statements = parse_statements(sql, SqlDialect::Generic).unwrap();
        let mut ctx =
            ProcessingContext::new(sql, SqlDialect::Generic, Arc::new(config), statements);
        DmlSafetyValidator.process(&mut ctx).unwrap();
        ctx
    }

    fn run(sql: &str) -> ProcessingContext {
        run_with(sql, FirewallConfig::default())
    }

    #[test]
    fn test_delete_without_where() {
        let ctx = run("DELETE FROM users");
        assert_eq!(ctx.risk_level(), RiskLevel::High);
        assert!(ctx.issues()[0].description.contains("WHERE clause"));
        assert!(!ctx.validation_result().is_safe);
    }

    #[test]
    fn test_update_with_where_passes() {
        let ctx = run("UPDATE users SET active = false WHERE id = 7");
        assert!(ctx.issues().is_empty());
        assert_eq!(ctx.metadata["statement_type"][0]["operation"], json!("UPDATE"));
    }

    #[test]
    fn test_update_without_where_switch() {
        assert_eq!(run("UPDATE users SET active = false").issues().len(), 1);
        let mut config = FirewallConfig::default();
        config.dml.require_where_update = false;
        assert!(run_with("UPDATE users SET active = false", config).issues().is_empty());
    }

    #[test]
    fn test_ddl_blocked_unless_allowed() {
        let ctx = run("DROP TABLE users");
        assert_eq!(ctx.issues()[0].kind, IssueKind::BlockedDdl);

        let mut config = FirewallConfig::default();
        config.dml.allowed_ddl.push("drop".into());
        assert!(run_with("DROP TABLE users", config).issues().is_empty());
    }

    #[test]
    fn test_protected_table() {
        let mut config = FirewallConfig::default();
        config.dml.protected_tables.push("audit_log".into());
        let ctx = run_with("INSERT INTO public.audit_log (id) VALUES (1)", config);
        assert_eq!(ctx.issues()[0].pattern.as_str(), "protected-table");
    }

    #[test]
    fn test_select_is_clean() {
        let ctx = run("SELECT * FROM users WHERE id = 1");
        assert!(ctx.issues().is_empty());
        assert_eq!(ctx.metadata["statement_type"][0]["category"], json!("DQL"));
    }
}
