use sqlparser::ast::{BinaryOperator, Expr, Statement};

use super::{IssueKind, RiskLevel, SecurityIssue};
use crate::{
    config::TautologyConfig,
    error::FirewallResult,
    pipeline::{ProcessingContext, Processor, ProcessorKind},
    tree::{
        Comparison, as_comparison, collect_selects, exprs_equivalent, flatten, is_null_literal,
        literal_value, select_joins, strip_nested
    }
};

/// Detects conditions that hold (or fail) regardless of the data.
///
/// Checks WHERE, HAVING and JOIN ON conditions of every SELECT plus the
/// WHERE of UPDATE and DELETE.
#[derive(Debug, Clone, Copy, Default)]
pub struct TautologyValidator;

impl Processor for TautologyValidator {
    fn name(&self) -> &'static str {
        "tautology"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Validator
    }

    fn process(&self, ctx: &mut ProcessingContext) -> FirewallResult<()> {
        let config = &ctx.config.tautology;
        let mut findings = Findings::default();
        for statement in &ctx.statements {
            for (clause, condition) in conditions(statement, config) {
                scan(condition, clause, config, &mut findings);
            }
        }
        for issue in findings.issues {
            ctx.add_issue(issue);
        }
        for warning in findings.warnings {
            ctx.add_warning(warning);
        }
        Ok(())
    }
}

#[derive(Default)]
struct Findings {
    issues:   Vec<SecurityIssue>,
    warnings: Vec<SecurityIssue>
}

fn conditions<'a>(
    statement: &'a Statement,
    config: &TautologyConfig
) -> Vec<(&'static str, &'a Expr)> {
    let mut out = Vec::new();
    match statement {
        Statement::Update(update) => {
            if let Some(selection) = &update.selection {
                out.push(("WHERE", selection));
            }
        }
        Statement::Delete(delete) => {
            if let Some(selection) = &delete.selection {
                out.push(("WHERE", selection));
            }
        }
        _ => {}
    }
    for scope in collect_selects(statement) {
        if let Some(selection) = &scope.select.selection {
            out.push(("WHERE", selection));
        }
        if config.check_having
            && let Some(having) = &scope.select.having
        {
            out.push(("HAVING", having));
        }
        if config.check_joins {
            for join in select_joins(scope.select) {
                if let Some(on) = join.on {
                    out.push(("JOIN ON", on));
                }
            }
        }
    }
    out
}

/// Outcome of evaluating a comparison whose operands are known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Constant {
    AlwaysTrue,
    AlwaysFalse
}

fn evaluate(expr: &Expr) -> Option<(Constant, f32)> {
    let (left, cmp, right) = as_comparison(expr)?;
    if is_null_literal(left) || is_null_literal(right) {
        return None;
    }
    if exprs_equivalent(left, right) {
        let confidence = if literal_value(left).is_some() { 1.0 } else { 0.8 };
        let constant = if cmp.is_reflexive() {
            Constant::AlwaysTrue
        } else {
            Constant::AlwaysFalse
        };
        return Some((constant, confidence));
    }
    compare_numbers(left, cmp, right).map(|holds| {
        let constant = if holds {
            Constant::AlwaysTrue
        } else {
            Constant::AlwaysFalse
        };
        (constant, 1.0)
    })
}

/// `1 < 2`, `5 >= 3` and friends between two numeric literals
fn compare_numbers(left: &Expr, cmp: Comparison, right: &Expr) -> Option<bool> {
    let number = |e: &Expr| match literal_value(e)? {
        sqlparser::ast::Value::Number(n, _) => n.parse::<f64>().ok(),
        _ => None
    };
    let (a, b) = (number(left)?, number(right)?);
    Some(match cmp {
        Comparison::Eq => a == b,
        Comparison::NotEq => a != b,
        Comparison::Lt => a < b,
        Comparison::Gt => a > b,
        Comparison::LtEq => a <= b,
        Comparison::GtEq => a >= b
    })
}

fn scan(expr: &Expr, clause: &str, config: &TautologyConfig, findings: &mut Findings) {
    let expr = strip_nested(expr);
    let disjuncts = flatten(expr, &BinaryOperator::Or);
    if disjuncts.len() > 1 {
        for leaf in &disjuncts {
            scan(leaf, clause, config, findings);
        }
        if let Some(leaf) = disjuncts
            .iter()
            .find(|leaf| matches!(evaluate(leaf), Some((Constant::AlwaysTrue, _))))
        {
            findings.issues.push(
                SecurityIssue::new(
                    IssueKind::Tautology,
                    config.risk_level.max(RiskLevel::High),
                    "or-tautology",
                    format!(
                        "{} clause is always true: OR branch '{}' holds for every row",
                        clause, leaf
                    )
                )
                .with_node("BinaryOp(OR)")
                .with_confidence(0.95)
                .with_meta("clause", clause)
                .with_meta("condition", expr.to_string())
            );
        }
        return;
    }
    let conjuncts = flatten(expr, &BinaryOperator::And);
    if conjuncts.len() > 1 {
        for leaf in conjuncts {
            scan(leaf, clause, config, findings);
        }
        return;
    }
    let Some((constant, confidence)) = evaluate(expr) else {
        return;
    };
    let Some((_, cmp, _)) = as_comparison(expr) else {
        return;
    };
    match constant {
        Constant::AlwaysTrue => findings.issues.push(
            SecurityIssue::new(
                IssueKind::Tautology,
                config.risk_level,
                "always-true-comparison",
                format!("{} condition '{}' is always true", clause, expr)
            )
            .with_node(format!("BinaryOp({})", cmp.symbol()))
            .with_confidence(confidence)
            .with_meta("clause", clause)
        ),
        Constant::AlwaysFalse => findings.warnings.push(
            SecurityIssue::new(
                IssueKind::Tautology,
                RiskLevel::Low,
                "contradiction",
                format!("{} condition '{}' is always false", clause, expr)
            )
            .with_node(format!("BinaryOp({})", cmp.symbol()))
            .with_confidence(confidence)
            .with_meta("clause", clause)
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{config::FirewallConfig, dialect::SqlDialect, tree::parse_statements};

    fn run(sql: &str) -> ProcessingContext {
        let statements = parse_statements(sql, SqlDialect::Generic).unwrap();
        let mut ctx = ProcessingContext::new(
            sql,
            SqlDialect::Generic,
            Arc::new(FirewallConfig::default()),
            statements
        );
        TautologyValidator.process(&mut ctx).unwrap();
        ctx
    }

    fn patterns(ctx: &ProcessingContext) -> Vec<&str> {
        ctx.issues().iter().map(|i| i.pattern.as_str()).collect()
    }

    #[test]
    fn test_or_tautology() {
        let ctx = run("SELECT * FROM t WHERE 1=1 OR username='admin'");
        let found = patterns(&ctx);
        assert!(found.contains(&"always-true-comparison"));
        assert!(found.contains(&"or-tautology"));
        assert!(ctx.risk_level() >= RiskLevel::Medium);
    }

    #[test]
    fn test_clean_where() {
        let ctx = run("SELECT * FROM t WHERE id = 5 AND name = 'x'");
        assert!(ctx.issues().is_empty());
        assert!(ctx.warnings().is_empty());
    }

    #[test]
    fn test_string_tautology() {
        let ctx = run("SELECT * FROM users WHERE name = '' OR 'a' = 'a'");
        assert!(patterns(&ctx).contains(&"or-tautology"));
    }

    #[test]
    fn test_column_self_comparison() {
        let ctx = run("SELECT * FROM t WHERE t.id = t.id");
        assert_eq!(ctx.issues().len(), 1);
        assert!((ctx.issues()[0].confidence - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_contradiction_is_warning() {
        let ctx = run("SELECT * FROM t WHERE a = 1 AND 1 <> 1");
        assert!(ctx.issues().is_empty());
        assert_eq!(ctx.warnings()[0].pattern.as_str(), "contradiction");
    }

    #[test]
    fn test_numeric_literal_comparison() {
        let ctx = run("SELECT * FROM t WHERE id = 3 OR 2 > 1");
        assert!(patterns(&ctx).contains(&"or-tautology"));
    }

    #[test]
    fn test_having_and_join_on() {
        let ctx = run(
            "SELECT a, COUNT(*) FROM t JOIN u ON 1 = 1 GROUP BY a HAVING COUNT(*) >= COUNT(*)"
        );
        let clauses: Vec<&str> = ctx
            .issues()
            .iter()
            .filter_map(|i| i.metadata.get("clause").map(String::as_str))
            .collect();
        assert!(clauses.contains(&"JOIN ON"));
        assert!(clauses.contains(&"HAVING"));
    }

    #[test]
    fn test_delete_where() {
        let ctx = run("DELETE FROM t WHERE 'x' = 'x'");
        assert_eq!(ctx.issues().len(), 1);
    }

    #[test]
    fn test_null_comparison_ignored() {
        let ctx = run("SELECT * FROM t WHERE NULL = NULL");
        assert!(ctx.issues().is_empty());
    }
}
