use std::ops::ControlFlow;

use compact_str::CompactString;
use indexmap::IndexSet;
use smallvec::SmallVec;
use sqlparser::ast::{
    BinaryOperator, Expr, Function, FunctionArg, FunctionArgExpr, FunctionArguments, Query,
    UnaryOperator, Value, visit_expressions
};

/// Operands of an AND/OR chain; most conditions have only a few
pub type ExprVec<'a> = SmallVec<[&'a Expr; 4]>;

/// Column reference with optional table qualifier, lowercased
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub qualifier: Option<CompactString>,
    pub name:      CompactString
}

/// Comparison operators considered by tautology detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq
}

impl Comparison {
    pub fn from_operator(op: &BinaryOperator) -> Option<Self> {
        match op {
            BinaryOperator::Eq => Some(Self::Eq),
            BinaryOperator::NotEq => Some(Self::NotEq),
            BinaryOperator::Lt => Some(Self::Lt),
            BinaryOperator::Gt => Some(Self::Gt),
            BinaryOperator::LtEq => Some(Self::LtEq),
            BinaryOperator::GtEq => Some(Self::GtEq),
            _ => None
        }
    }

    /// Holds for identical operands (`x = x`, `x <= x`, `x >= x`)
    pub fn is_reflexive(self) -> bool {
        matches!(self, Self::Eq | Self::LtEq | Self::GtEq)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::LtEq => "<=",
            Self::GtEq => ">="
        }
    }
}

/// Skip redundant parentheses
pub fn strip_nested(mut expr: &Expr) -> &Expr {
    while let Expr::Nested(inner) = expr {
        expr = inner;
    }
    expr
}

pub fn column_ref(expr: &Expr) -> Option<ColumnRef> {
    match strip_nested(expr) {
        Expr::Identifier(ident) => Some(ColumnRef {
            qualifier: None,
            name:      ident.value.to_lowercase().into()
        }),
        Expr::CompoundIdentifier(idents) => {
            let (last, rest) = idents.split_last()?;
            Some(ColumnRef {
                qualifier: rest.last().map(|q| q.value.to_lowercase().into()),
                name:      last.value.to_lowercase().into()
            })
        }
        _ => None
    }
}

/// Literal value of an expression; bound placeholders are not literals
pub fn literal_value(expr: &Expr) -> Option<&Value> {
    match strip_nested(expr) {
        Expr::Value(v) if !matches!(v.value, Value::Placeholder(_)) => Some(&v.value),
        _ => None
    }
}

pub fn is_literal(expr: &Expr) -> bool {
    match strip_nested(expr) {
        Expr::UnaryOp {
            op: UnaryOperator::Minus | UnaryOperator::Plus,
            expr
        } => is_literal(expr),
        other => literal_value(other).is_some()
    }
}

pub fn is_null_literal(expr: &Expr) -> bool {
    matches!(literal_value(expr), Some(Value::Null))
}

/// Split `expr` on a chain of the same binary operator (`a OR b OR c`)
pub fn flatten<'a>(expr: &'a Expr, op: &BinaryOperator) -> ExprVec<'a> {
    let mut out = ExprVec::new();
    flatten_into(expr, op, &mut out);
    out
}

fn flatten_into<'a>(expr: &'a Expr, op: &BinaryOperator, out: &mut ExprVec<'a>) {
    match strip_nested(expr) {
        Expr::BinaryOp {
            left,
            op: inner,
            right
        } if inner == op => {
            flatten_into(left, op, out);
            flatten_into(right, op, out);
        }
        other => out.push(other)
    }
}

/// Decompose `left <op> right` for the comparison operators
pub fn as_comparison(expr: &Expr) -> Option<(&Expr, Comparison, &Expr)> {
    match strip_nested(expr) {
        Expr::BinaryOp {
            left,
            op,
            right
        } => Comparison::from_operator(op).map(|cmp| (left.as_ref(), cmp, right.as_ref())),
        _ => None
    }
}

/// Structural equality: same column and qualifier, or same literal value and type
pub fn exprs_equivalent(left: &Expr, right: &Expr) -> bool {
    let (left, right) = (strip_nested(left), strip_nested(right));
    if let (Some(a), Some(b)) = (column_ref(left), column_ref(right)) {
        return a == b;
    }
    match (literal_value(left), literal_value(right)) {
        (Some(a), Some(b)) => literal_eq(a, b),
        (Some(_), None) | (None, Some(_)) => false,
        (None, None) => left.to_string() == right.to_string()
    }
}

fn literal_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x, _), Value::Number(y, _)) => {
            x == y
                || matches!(
                    (x.parse::<f64>(), y.parse::<f64>()),
                    (Ok(p), Ok(q)) if p == q
                )
        }
        _ => a == b
    }
}

/// Column references anywhere inside `expr`, subqueries excluded
pub fn collect_columns(expr: &Expr, columns: &mut IndexSet<ColumnRef>) {
    match expr {
        Expr::Identifier(_) | Expr::CompoundIdentifier(_) => {
            if let Some(col) = column_ref(expr) {
                columns.insert(col);
            }
        }
        Expr::BinaryOp {
            left,
            right,
            ..
        } => {
            collect_columns(left, columns);
            collect_columns(right, columns);
        }
        Expr::UnaryOp {
            expr, ..
        }
        | Expr::Nested(expr)
        | Expr::IsNull(expr)
        | Expr::IsNotNull(expr)
        | Expr::Cast {
            expr, ..
        } => collect_columns(expr, columns),
        Expr::InList {
            expr,
            list,
            ..
        } => {
            collect_columns(expr, columns);
            for item in list {
                collect_columns(item, columns);
            }
        }
        Expr::InSubquery {
            expr, ..
        } => collect_columns(expr, columns),
        Expr::Between {
            expr,
            low,
            high,
            ..
        } => {
            collect_columns(expr, columns);
            collect_columns(low, columns);
            collect_columns(high, columns);
        }
        Expr::Like {
            expr,
            pattern,
            ..
        }
        | Expr::ILike {
            expr,
            pattern,
            ..
        } => {
            collect_columns(expr, columns);
            collect_columns(pattern, columns);
        }
        Expr::Function(func) => {
            for arg in function_args(func) {
                collect_columns(arg, columns);
            }
        }
        Expr::Case {
            operand,
            conditions,
            else_result,
            ..
        } => {
            if let Some(op) = operand {
                collect_columns(op, columns);
            }
            for case_when in conditions {
                collect_columns(&case_when.condition, columns);
                collect_columns(&case_when.result, columns);
            }
            if let Some(else_res) = else_result {
                collect_columns(else_res, columns);
            }
        }
        _ => {}
    }
}

/// Expression arguments of a function call
pub fn function_args(func: &Function) -> Vec<&Expr> {
    match &func.args {
        FunctionArguments::List(list) => list
            .args
            .iter()
            .filter_map(|arg| match arg {
                FunctionArg::Unnamed(FunctionArgExpr::Expr(e))
                | FunctionArg::Named {
                    arg: FunctionArgExpr::Expr(e),
                    ..
                } => Some(e),
                _ => None
            })
            .collect(),
        _ => Vec::new()
    }
}

/// Number of arguments in a call, wildcards included
pub fn function_arg_count(func: &Function) -> usize {
    match &func.args {
        FunctionArguments::List(list) => list.args.len(),
        _ => 0
    }
}

/// Arguments of a call, counting keyword forms such as `TRIM`, `CAST` and
/// `SUBSTRING` that the parser keeps out of [`Expr::Function`]
pub fn call_args(expr: &Expr) -> Option<ExprVec<'_>> {
    let mut args = ExprVec::new();
    match expr {
        Expr::Function(func) => args.extend(function_args(func)),
        Expr::Trim {
            expr,
            trim_what,
            trim_characters,
            ..
        } => {
            args.push(expr);
            args.extend(trim_what.as_deref());
            args.extend(trim_characters.iter().flatten());
        }
        Expr::Substring {
            expr,
            substring_from,
            substring_for,
            ..
        } => {
            args.push(expr);
            args.extend(substring_from.as_deref());
            args.extend(substring_for.as_deref());
        }
        Expr::Overlay {
            expr,
            overlay_what,
            overlay_from,
            overlay_for,
            ..
        } => {
            args.extend([&**expr, &**overlay_what, &**overlay_from]);
            args.extend(overlay_for.as_deref());
        }
        Expr::Position {
            expr,
            r#in,
            ..
        } => args.extend([&**expr, &**r#in]),
        Expr::Cast {
            expr, ..
        }
        | Expr::Extract {
            expr, ..
        }
        | Expr::Ceil {
            expr, ..
        }
        | Expr::Floor {
            expr, ..
        } => args.push(expr),
        _ => return None
    }
    Some(args)
}

/// Deepest chain of nested function calls (`a(b(c()))` is 3)
pub fn function_depth(expr: &Expr) -> usize {
    let mut depth = 0;
    let _ = visit_expressions(expr, |e| {
        if let Some(args) = call_args(e) {
            let inner = args.into_iter().map(function_depth).max().unwrap_or(0);
            depth = depth.max(inner + 1);
        }
        ControlFlow::<()>::Continue(())
    });
    depth
}

/// Subqueries directly inside `expr` (not inside those subqueries)
pub fn collect_subqueries<'a>(expr: &'a Expr, out: &mut Vec<&'a Query>) {
    match expr {
        Expr::Subquery(query) => out.push(query),
        Expr::InSubquery {
            expr,
            subquery,
            ..
        } => {
            collect_subqueries(expr, out);
            out.push(subquery);
        }
        Expr::Exists {
            subquery, ..
        } => out.push(subquery),
        Expr::BinaryOp {
            left,
            right,
            ..
        } => {
            collect_subqueries(left, out);
            collect_subqueries(right, out);
        }
        Expr::UnaryOp {
            expr, ..
        }
        | Expr::Nested(expr)
        | Expr::IsNull(expr)
        | Expr::IsNotNull(expr)
        | Expr::Cast {
            expr, ..
        } => collect_subqueries(expr, out),
        Expr::InList {
            expr,
            list,
            ..
        } => {
            collect_subqueries(expr, out);
            for item in list {
                collect_subqueries(item, out);
            }
        }
        Expr::Between {
            expr,
            low,
            high,
            ..
        } => {
            collect_subqueries(expr, out);
            collect_subqueries(low, out);
            collect_subqueries(high, out);
        }
        Expr::Function(func) => {
            for arg in function_args(func) {
                collect_subqueries(arg, out);
            }
        }
        Expr::Case {
            operand,
            conditions,
            else_result,
            ..
        } => {
            if let Some(op) = operand {
                collect_subqueries(op, out);
            }
            for cw in conditions {
                collect_subqueries(&cw.condition, out);
                collect_subqueries(&cw.result, out);
            }
            if let Some(e) = else_result {
                collect_subqueries(e, out);
            }
        }
        _ => {}
    }
}
