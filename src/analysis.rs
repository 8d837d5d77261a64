//! Structural complexity metrics.
//!
//! The score weighs each construct by how much work it typically adds to
//! query planning and execution:
//!
//! | Metric          | Weight |
//! |-----------------|--------|
//! | table           | 1      |
//! | join            | 3      |
//! | subquery depth  | 5      |
//! | condition       | 1      |
//! | function call   | 1      |
//! | window function | 5      |
//! | union           | 4      |

use std::ops::ControlFlow;

use indexmap::IndexSet;
use serde::Serialize;
use sqlparser::ast::{BinaryOperator, Expr, Statement, visit_expressions, visit_relations};

use crate::{
    error::FirewallResult,
    pipeline::{ProcessingContext, Processor, ProcessorKind},
    tree::{
        ColumnRef, collect_columns, collect_queries, collect_selects, flatten,
        max_subquery_depth, select_exprs, select_joins, strip_nested, union_count
    },
    validation::{IssueKind, RiskLevel, SecurityIssue}
};

/// Query complexity metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct QueryComplexity {
    pub score:           u32,
    pub table_count:     u32,
    pub column_count:    u32,
    pub join_count:      u32,
    pub subquery_depth:  u32,
    pub condition_count: u32,
    pub function_count:  u32,
    pub window_count:    u32,
    pub union_count:     u32
}

impl QueryComplexity {
    /// Combine metrics of several statements; depth takes the maximum
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        let mut combined = Self {
            score:           0,
            table_count:     self.table_count + other.table_count,
            column_count:    self.column_count + other.column_count,
            join_count:      self.join_count + other.join_count,
            subquery_depth:  self.subquery_depth.max(other.subquery_depth),
            condition_count: self.condition_count + other.condition_count,
            function_count:  self.function_count + other.function_count,
            window_count:    self.window_count + other.window_count,
            union_count:     self.union_count + other.union_count
        };
        combined.score = combined.weighted_score();
        combined
    }

    fn weighted_score(&self) -> u32 {
        self.table_count
            + self.join_count * 3
            + self.subquery_depth * 5
            + self.condition_count
            + self.function_count
            + self.window_count * 5
            + self.union_count * 4
    }
}

/// Calculate complexity metrics for a statement
pub fn calculate_complexity(statement: &Statement) -> QueryComplexity {
    let mut table_count = 0u32;
    let _ = visit_relations(statement, |_| {
        table_count += 1;
        ControlFlow::<()>::Continue(())
    });

    let mut function_count = 0u32;
    let mut window_count = 0u32;
    let _ = visit_expressions(statement, |expr| {
        if let Expr::Function(func) = expr {
            function_count += 1;
            if func.over.is_some() {
                window_count += 1;
            }
        }
        ControlFlow::<()>::Continue(())
    });

    let mut join_count = 0usize;
    let mut condition_count = 0usize;
    let mut columns: IndexSet<ColumnRef> = IndexSet::new();
    for scope in collect_selects(statement) {
        let select = scope.select;
        join_count += select_joins(select).len() + select.from.len().saturating_sub(1);
        for expr in select_exprs(select) {
            collect_columns(expr, &mut columns);
        }
        let conditions = select
            .selection
            .iter()
            .chain(select.having.iter())
            .chain(select_joins(select).into_iter().filter_map(|j| j.on));
        condition_count += conditions.map(count_conditions).sum::<usize>();
    }

    let unions: usize = collect_queries(statement)
        .iter()
        .map(|scope| union_count(scope.query))
        .sum();

    let mut complexity = QueryComplexity {
        score: 0,
        table_count,
        column_count: columns.len() as u32,
        join_count: join_count as u32,
        subquery_depth: max_subquery_depth(statement) as u32,
        condition_count: condition_count as u32,
        function_count,
        window_count,
        union_count: unions as u32
    };
    complexity.score = complexity.weighted_score();
    complexity
}

/// Leaf predicates of an AND/OR tree
fn count_conditions(expr: &Expr) -> usize {
    let expr = strip_nested(expr);
    if let Expr::BinaryOp {
        op: op @ (BinaryOperator::And | BinaryOperator::Or),
        ..
    } = expr
    {
        return flatten(expr, op).into_iter().map(count_conditions).sum();
    }
    usize::from(!matches!(expr, Expr::Value(_)))
}

/// Records complexity metrics and warns past the configured limits
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplexityAnalyzer;

impl Processor for ComplexityAnalyzer {
    fn name(&self) -> &'static str {
        "complexity"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Analyzer
    }

    fn process(&self, ctx: &mut ProcessingContext) -> FirewallResult<()> {
        let config = &ctx.config.complexity;
        let complexity = ctx
            .statements
            .iter()
            .map(calculate_complexity)
            .fold(QueryComplexity::default(), QueryComplexity::combine);

        let mut warnings = Vec::new();
        if complexity.join_count as usize > config.max_join_count {
            warnings.push(limit_warning(
                "join-count",
                format!(
                    "{} joins exceed the complexity limit of {}",
                    complexity.join_count, config.max_join_count
                )
            ));
        }
        if complexity.subquery_depth as usize > config.max_subquery_depth {
            warnings.push(limit_warning(
                "subquery-depth",
                format!(
                    "Subqueries nested {} deep exceed the limit of {}",
                    complexity.subquery_depth, config.max_subquery_depth
                )
            ));
        }
        if complexity.score > config.max_score {
            warnings.push(limit_warning(
                "complexity-score",
                format!(
                    "Complexity score {} exceeds the limit of {}",
                    complexity.score, config.max_score
                )
            ));
        }

        ctx.set_metadata("complexity", serde_json::to_value(complexity).unwrap_or_default());
        for warning in warnings {
            ctx.add_warning(warning);
        }
        Ok(())
    }
}

fn limit_warning(pattern: &'static str, description: String) -> SecurityIssue {
    SecurityIssue::new(IssueKind::Complexity, RiskLevel::Low, pattern, description)
}
