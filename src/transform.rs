//! Tree rewrites run ahead of validation.

use std::{mem, ops::ControlFlow};

use sqlparser::ast::{Expr, Value, visit_expressions_mut};
use tracing::debug;

use crate::{
    error::{FirewallResult, parse_error},
    parameters::{ParamSource, ParameterValue, marker_name},
    pipeline::{ProcessingContext, Processor, ProcessorKind},
    tree::{Comparison, is_literal, parse_statements, render_statements}
};

/// Lifts literals compared against columns or expressions into markers.
///
/// `WHERE id = 5` becomes `WHERE id = :__param_N` with `5` bound to the
/// new marker. Comparisons between two literals are left alone so the
/// tautology validator still sees them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralParameterizer;

impl Processor for LiteralParameterizer {
    fn name(&self) -> &'static str {
        "literal_parameterizer"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Transformer
    }

    fn process(&self, ctx: &mut ProcessingContext) -> FirewallResult<()> {
        let mut statements = mem::take(&mut ctx.statements);
        let first = ctx.markers.len();
        let mut lifted: Vec<ParameterValue> = Vec::new();

        for statement in &mut statements {
            let _ = visit_expressions_mut(statement, |expr| {
                if let Expr::BinaryOp {
                    left,
                    op,
                    right
                } = expr
                    && Comparison::from_operator(op).is_some()
                {
                    if !is_literal(right) {
                        lift_into_marker(left, first, &mut lifted);
                    } else if !is_literal(left) {
                        lift_into_marker(right, first, &mut lifted);
                    }
                }
                ControlFlow::<()>::Continue(())
            });
        }

        if lifted.is_empty() {
            ctx.statements = statements;
            return Ok(());
        }

        let rendered = render_statements(&statements);
        parse_statements(&rendered, ctx.dialect).map_err(|e| {
            parse_error(format!("parameterized SQL no longer parses: {}", e), &rendered)
        })?;

        let count = lifted.len();
        for value in lifted {
            ctx.add_marker(ParamSource::Literal(value));
        }
        ctx.statements = statements;
        debug!(count, "lifted literals into markers");
        ctx.record_transformation(format!("parameterized {} literal(s)", count));
        Ok(())
    }
}

fn lift_into_marker(operand: &mut Expr, first: usize, lifted: &mut Vec<ParameterValue>) {
    if let Some(value) = lift(operand) {
        let name = marker_name(first + lifted.len());
        *operand = Expr::Value(Value::Placeholder(format!(":{}", name)).with_empty_span());
        lifted.push(value);
    }
}

fn lift(expr: &Expr) -> Option<ParameterValue> {
    let Expr::Value(value) = expr else {
        return None;
    };
    match &value.value {
        Value::Number(n, _) => n
            .parse::<i64>()
            .map(ParameterValue::Int)
            .or_else(|_| n.parse::<f64>().map(ParameterValue::Float))
            .ok(),
        Value::SingleQuotedString(s) => Some(ParameterValue::Text(s.clone())),
        Value::Boolean(b) => Some(ParameterValue::Bool(*b)),
        _ => None
    }
}
