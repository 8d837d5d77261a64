use std::ops::ControlFlow;

use compact_str::CompactString;
use regex::Regex;
use sqlparser::ast::{Expr, SelectItem, Statement, visit_expressions, visit_relations};

use super::{IssueKind, RiskLevel, SecurityIssue};
use crate::{
    config::InjectionConfig,
    dialect::SqlDialect,
    error::{FirewallResult, config_error},
    parameters::find_comments,
    pipeline::{ProcessingContext, Processor, ProcessorKind},
    tree::{
        QueryScope, call_args, collect_queries, function_arg_count, function_depth, is_literal,
        is_null_literal, query_selects, union_count
    }
};

/// Detects injection fingerprints in the tree and in the SQL text.
///
/// # Notes
///
/// - UNION abuse: too many UNIONs, NULL-padded branches, column mismatches
/// - Comments outside string literals
/// - Access to system schemas not in `allowed_schemas`
/// - Stacked statements, deeply nested or over-wide function calls
/// - Literal-only subqueries and custom regex patterns
#[derive(Debug, Clone)]
pub struct InjectionValidator {
    custom: Vec<Regex>
}

impl InjectionValidator {
    /// Compile the configured custom patterns
    pub fn new(config: &InjectionConfig) -> FirewallResult<Self> {
        let custom = config
            .custom_patterns
            .iter()
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| config_error(format!("Invalid custom pattern '{}': {}", p, e)))
            })
            .collect::<FirewallResult<Vec<_>>>()?;
        Ok(Self {
            custom
        })
    }
}

impl Processor for InjectionValidator {
    fn name(&self) -> &'static str {
        "injection"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Validator
    }

    fn process(&self, ctx: &mut ProcessingContext) -> FirewallResult<()> {
        let config = &ctx.config.injection;
        let mut issues = Vec::new();

        if ctx.statements.len() > 1 && !config.allow_multiple_statements {
            issues.push(
                SecurityIssue::new(
                    IssueKind::Injection,
                    RiskLevel::High,
                    "stacked-statements",
                    format!(
                        "{} statements submitted in one call; stacked queries are a common injection vector",
                        ctx.statements.len()
                    )
                )
                .with_confidence(0.9)
                .with_meta("statements", ctx.statements.len().to_string())
            );
        }

        for statement in &ctx.statements {
            for scope in collect_queries(statement) {
                check_unions(scope, config, &mut issues);
                check_literal_subquery(scope, &mut issues);
            }
            check_functions(statement, config, &mut issues);
            check_system_schemas(statement, config, &mut issues);
        }

        if config.detect_comments {
            check_comments(&ctx.sql, ctx.dialect, &mut issues);
        }

        for (regex, source) in self.custom.iter().zip(&config.custom_patterns) {
            if let Some(found) = regex.find(&ctx.sql) {
                issues.push(
                    SecurityIssue::new(
                        IssueKind::Injection,
                        config.risk_level,
                        "custom-pattern",
                        format!("SQL matches custom pattern '{}'", source)
                    )
                    .with_confidence(0.8)
                    .with_meta("match", found.as_str())
                );
            }
        }

        for issue in issues {
            ctx.add_issue(issue);
        }
        Ok(())
    }
}

fn check_unions(scope: QueryScope<'_>, config: &InjectionConfig, issues: &mut Vec<SecurityIssue>) {
    let unions = union_count(scope.query);
    if unions == 0 {
        return;
    }
    if unions > config.max_union_count {
        issues.push(
            SecurityIssue::new(
                IssueKind::Injection,
                config.risk_level,
                "excessive-union",
                format!(
                    "{} UNION operators exceed the limit of {}",
                    unions, config.max_union_count
                )
            )
            .with_node("SetOperation")
            .with_confidence(0.8)
            .with_meta("unions", unions.to_string())
        );
    }
    let branches = query_selects(scope.query);
    for select in &branches {
        let nulls = select
            .projection
            .iter()
            .filter(|item| matches!(item, SelectItem::UnnamedExpr(e) if is_null_literal(e)))
            .count();
        if nulls < 2 || nulls * 2 <= select.projection.len() {
            continue;
        }
        let (risk, confidence) = if nulls > config.max_null_padding {
            (RiskLevel::High, 0.9)
        } else {
            (RiskLevel::Medium, 0.7)
        };
        issues.push(
            SecurityIssue::new(
                IssueKind::Injection,
                risk,
                "union-null-padding",
                format!(
                    "UNION branch pads {} of {} columns with NULL, typical of column-count probing",
                    nulls,
                    select.projection.len()
                )
            )
            .with_node("Select")
            .with_confidence(confidence)
            .with_meta("nulls", nulls.to_string())
        );
    }
    let widths: Vec<usize> = branches
        .iter()
        .filter(|s| {
            !s.projection.iter().any(|item| {
                matches!(
                    item,
                    SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(..)
                )
            })
        })
        .map(|s| s.projection.len())
        .collect();
    if widths.windows(2).any(|w| w[0] != w[1]) {
        issues.push(
            SecurityIssue::new(
                IssueKind::StructuralAttack,
                RiskLevel::Medium,
                "union-column-mismatch",
                format!(
                    "UNION branches select different column counts: {}",
                    widths
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            )
            .with_node("SetOperation")
            .with_confidence(0.7)
        );
    }
}

/// `(SELECT 'a', 1)` inside another query probes output shape
fn check_literal_subquery(scope: QueryScope<'_>, issues: &mut Vec<SecurityIssue>) {
    if scope.depth == 0 {
        return;
    }
    for select in query_selects(scope.query) {
        let literal_only = !select.projection.is_empty()
            && select.from.is_empty()
            && select.projection.iter().all(|item| match item {
                SelectItem::UnnamedExpr(e)
                | SelectItem::ExprWithAlias {
                    expr: e, ..
                } => is_literal(e),
                _ => false
            });
        if literal_only {
            issues.push(
                SecurityIssue::new(
                    IssueKind::StructuralAttack,
                    RiskLevel::Medium,
                    "literal-subquery",
                    format!("Subquery at depth {} selects only literals", scope.depth)
                )
                .with_node("Subquery")
                .with_confidence(0.6)
            );
        }
    }
}

fn check_functions(statement: &Statement, config: &InjectionConfig, issues: &mut Vec<SecurityIssue>) {
    let mut deepest = 0;
    let mut widest: Option<(CompactString, usize)> = None;
    let _ = visit_expressions(statement, |expr| {
        if call_args(expr).is_some() {
            deepest = deepest.max(function_depth(expr));
        }
        if let Expr::Function(func) = expr {
            let args = function_arg_count(func);
            if args > config.max_function_args && widest.as_ref().is_none_or(|(_, n)| args > *n) {
                widest = Some((func.name.to_string().into(), args));
            }
        }
        ControlFlow::<()>::Continue(())
    });
    if deepest > config.max_function_depth {
        issues.push(
            SecurityIssue::new(
                IssueKind::AstAnomaly,
                RiskLevel::Medium,
                "nested-functions",
                format!(
                    "Function calls nested {} deep exceed the limit of {}",
                    deepest, config.max_function_depth
                )
            )
            .with_node("Function")
            .with_confidence(0.7)
        );
    }
    if let Some((name, args)) = widest {
        issues.push(
            SecurityIssue::new(
                IssueKind::AstAnomaly,
                RiskLevel::Medium,
                "excessive-arguments",
                format!(
                    "{}() called with {} arguments, limit is {}",
                    name, args, config.max_function_args
                )
            )
            .with_node("Function")
            .with_confidence(0.7)
        );
    }
}

fn check_system_schemas(
    statement: &Statement,
    config: &InjectionConfig,
    issues: &mut Vec<SecurityIssue>
) {
    let mut hits: Vec<String> = Vec::new();
    let _ = visit_relations(statement, |name| {
        let rendered = name.to_string().to_lowercase();
        let parts: Vec<&str> = rendered
            .split('.')
            .map(|p| p.trim_matches(|c| matches!(c, '"' | '`' | '[' | ']')))
            .collect();
        let Some((table, qualifiers)) = parts.split_last() else {
            return ControlFlow::Continue(());
        };
        let is_system = qualifiers
            .iter()
            .any(|part| config.system_schemas.iter().any(|s| s.eq_ignore_ascii_case(part)))
            || config.system_tables.iter().any(|t| t.eq_ignore_ascii_case(table));
        let allowed = parts
            .iter()
            .any(|part| config.allowed_schemas.iter().any(|s| s.eq_ignore_ascii_case(part)));
        if is_system && !allowed && !hits.contains(&rendered) {
            hits.push(rendered);
        }
        ControlFlow::<()>::Continue(())
    });
    for relation in hits {
        issues.push(
            SecurityIssue::new(
                IssueKind::Injection,
                config.risk_level,
                "system-schema-access",
                format!("Query reads system catalog '{}'", relation)
            )
            .with_node("Table")
            .with_confidence(0.85)
            .with_meta("relation", relation)
        );
    }
}

fn check_comments(sql: &str, dialect: SqlDialect, issues: &mut Vec<SecurityIssue>) {
    for range in find_comments(sql, dialect) {
        let text = &sql[range.clone()];
        let (risk, confidence, kind) = if text.starts_with("--") || text.starts_with('#') {
            (RiskLevel::Medium, 0.7, "line")
        } else {
            (RiskLevel::Low, 0.6, "block")
        };
        issues.push(
            SecurityIssue::new(
                IssueKind::Injection,
                risk,
                "comment-syntax",
                format!("SQL contains a {} comment outside string literals", kind)
            )
            .with_confidence(confidence)
            .with_meta("offset", range.start.to_string())
        );
    }
}
