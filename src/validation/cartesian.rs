use indexmap::{IndexMap, IndexSet};
use serde_json::json;

use super::{IssueKind, RiskLevel, SecurityIssue};
use crate::{
    config::CartesianConfig,
    error::FirewallResult,
    pipeline::{ProcessingContext, Processor, ProcessorKind},
    tree::{
        ColumnRef, JoinKind, SelectScope, TableRef, collect_columns, collect_selects, select_joins,
        select_tables, table_ref
    }
};

/// Flags joins that multiply rows without a condition and join-heavy queries.
///
/// Every SELECT is checked, subqueries included; their findings are
/// prefixed with "in subquery".
#[derive(Debug, Clone, Copy, Default)]
pub struct CartesianValidator;

impl Processor for CartesianValidator {
    fn name(&self) -> &'static str {
        "cartesian"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Validator
    }

    fn process(&self, ctx: &mut ProcessingContext) -> FirewallResult<()> {
        let config = &ctx.config.cartesian;
        let mut issues = Vec::new();
        let mut warnings = Vec::new();
        let mut counts: IndexMap<&'static str, usize> = IndexMap::new();

        for statement in &ctx.statements {
            for scope in collect_selects(statement) {
                check_select(scope, config, &mut counts, &mut issues, &mut warnings);
            }
        }

        if !counts.is_empty() {
            ctx.set_metadata("joins", json!(counts));
        }
        for issue in issues {
            ctx.add_issue(issue);
        }
        for warning in warnings {
            ctx.add_warning(warning);
        }
        Ok(())
    }
}

fn scope_prefix(depth: usize) -> &'static str {
    if depth > 0 { "In subquery: " } else { "" }
}

fn check_select(
    scope: SelectScope<'_>,
    config: &CartesianConfig,
    counts: &mut IndexMap<&'static str, usize>,
    issues: &mut Vec<SecurityIssue>,
    warnings: &mut Vec<SecurityIssue>
) {
    let select = scope.select;
    let prefix = scope_prefix(scope.depth);
    let joins = select_joins(select);

    for join in &joins {
        let label = match join.kind {
            JoinKind::Inner => "INNER",
            JoinKind::Left => "LEFT",
            JoinKind::Right => "RIGHT",
            JoinKind::Full => "FULL",
            JoinKind::Cross => "CROSS",
            JoinKind::Other => "OTHER"
        };
        *counts.entry(label).or_default() += 1;

        let target = join
            .table
            .as_ref()
            .map_or_else(|| "a table expression".to_string(), ToString::to_string);
        if join.kind == JoinKind::Cross {
            let issue = SecurityIssue::new(
                IssueKind::CartesianProduct,
                config.risk_level,
                "cross-join",
                format!("{}CROSS JOIN with {} produces a cartesian product", prefix, target)
            )
            .with_node("Join")
            .with_meta("table", target);
            if config.allow_cross_join {
                warnings.push(SecurityIssue {
                    risk_level: RiskLevel::Low,
                    ..issue
                });
            } else {
                issues.push(issue);
            }
        } else if !join.constrained {
            issues.push(
                SecurityIssue::new(
                    IssueKind::CartesianProduct,
                    config.risk_level,
                    "join-without-condition",
                    format!(
                        "{}{} JOIN with {} has neither ON nor USING",
                        prefix, join.kind, target
                    )
                )
                .with_node("Join")
                .with_confidence(0.9)
                .with_meta("table", target)
            );
        }
    }

    let tables = select_tables(select);
    let mut seen: IndexSet<&str> = IndexSet::new();
    for table in tables.iter().filter(|t| t.name != "(subquery)") {
        if !seen.insert(table.name.as_str()) {
            *counts.entry("SELF").or_default() += 1;
        }
    }

    if select.from.len() >= 2 {
        let roots: Vec<TableRef> = select
            .from
            .iter()
            .filter_map(|item| table_ref(&item.relation))
            .collect();
        if !correlated(select.selection.as_ref(), &roots) {
            let names = roots
                .iter()
                .map(|t| t.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            issues.push(
                SecurityIssue::new(
                    IssueKind::CartesianProduct,
                    config.risk_level,
                    "implicit-cross-join",
                    format!(
                        "{}Tables {} are listed in FROM without a WHERE condition relating them",
                        prefix, names
                    )
                )
                .with_node("From")
                .with_confidence(0.9)
                .with_meta("tables", names)
            );
        }
    }

    let total = joins.len() + select.from.len().saturating_sub(1);
    if total > config.max_joins {
        issues.push(
            SecurityIssue::new(
                IssueKind::ExcessiveJoins,
                config.risk_level,
                "excessive-joins",
                format!(
                    "{}{} joins exceed the limit of {}",
                    prefix, total, config.max_joins
                )
            )
            .with_meta("joins", total.to_string())
        );
    } else if total > config.warn_joins {
        warnings.push(
            SecurityIssue::new(
                IssueKind::ExcessiveJoins,
                RiskLevel::Medium,
                "many-joins",
                format!(
                    "{}{} joins exceed the warning threshold of {}",
                    prefix, total, config.warn_joins
                )
            )
            .with_meta("joins", total.to_string())
        );
    }
}

/// Whether WHERE references every comma-joined table.
///
/// Unqualified columns may belong to any table, so each one covers one
/// table that no qualified column mentions.
fn correlated(selection: Option<&sqlparser::ast::Expr>, tables: &[TableRef]) -> bool {
    let Some(selection) = selection else {
        return false;
    };
    let mut columns: IndexSet<ColumnRef> = IndexSet::new();
    collect_columns(selection, &mut columns);
    let unqualified = columns.iter().filter(|c| c.qualifier.is_none()).count();
    let uncovered = tables
        .iter()
        .filter(|table| {
            !columns.iter().any(|c| {
                c.qualifier
                    .as_ref()
                    .is_some_and(|q| table.answers_to(q))
            })
        })
        .count();
    uncovered <= unqualified
}
