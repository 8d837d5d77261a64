use sqlparser::ast::{
    Expr, JoinConstraint, JoinOperator, Query, Select, SelectItem, SetExpr, SetOperator, Statement,
    TableFactor, TableWithJoins
};

use super::expr::collect_subqueries;

/// A query together with its nesting depth (0 = top level)
#[derive(Debug, Clone, Copy)]
pub struct QueryScope<'a> {
    pub query: &'a Query,
    pub depth: usize
}

/// A SELECT together with its nesting depth
#[derive(Debug, Clone, Copy)]
pub struct SelectScope<'a> {
    pub select: &'a Select,
    pub depth:  usize
}

/// Every query in a statement: top level, CTEs, derived tables and
/// expression subqueries, in document order
pub fn collect_queries(statement: &Statement) -> Vec<QueryScope<'_>> {
    let mut out = Vec::new();
    match statement {
        Statement::Query(query) => walk_query(query, 0, &mut out),
        Statement::Insert(insert) => {
            if let Some(source) = &insert.source {
                walk_query(source, 0, &mut out);
            }
        }
        Statement::Update(update) => {
            if let Some(selection) = &update.selection {
                walk_expr(selection, 1, &mut out);
            }
        }
        Statement::Delete(delete) => {
            if let Some(selection) = &delete.selection {
                walk_expr(selection, 1, &mut out);
            }
        }
        _ => {}
    }
    out
}

/// Every SELECT in a statement with the depth of its enclosing query
pub fn collect_selects(statement: &Statement) -> Vec<SelectScope<'_>> {
    collect_queries(statement)
        .into_iter()
        .flat_map(|scope| {
            query_selects(scope.query)
                .into_iter()
                .map(move |select| SelectScope {
                    select,
                    depth: scope.depth
                })
        })
        .collect()
}

/// Deepest subquery nesting in a statement
pub fn max_subquery_depth(statement: &Statement) -> usize {
    collect_queries(statement)
        .iter()
        .map(|s| s.depth)
        .max()
        .unwrap_or(0)
}

/// SELECT branches of a query body, set operations flattened
pub fn query_selects(query: &Query) -> Vec<&Select> {
    let mut out = Vec::new();
    body_selects(&query.body, &mut out);
    out
}

fn body_selects<'a>(body: &'a SetExpr, out: &mut Vec<&'a Select>) {
    match body {
        SetExpr::Select(select) => out.push(select),
        SetExpr::SetOperation {
            left,
            right,
            ..
        } => {
            body_selects(left, out);
            body_selects(right, out);
        }
        SetExpr::Query(query) => body_selects(&query.body, out),
        _ => {}
    }
}

/// Number of UNION operators in a query body
pub fn union_count(query: &Query) -> usize {
    fn count(body: &SetExpr) -> usize {
        match body {
            SetExpr::SetOperation {
                op,
                left,
                right,
                ..
            } => usize::from(*op == SetOperator::Union) + count(left) + count(right),
            SetExpr::Query(query) => count(&query.body),
            _ => 0
        }
    }
    count(&query.body)
}

/// Expressions owned by a SELECT: projection, WHERE, HAVING and JOIN ON
pub fn select_exprs(select: &Select) -> Vec<&Expr> {
    let mut out: Vec<&Expr> = select
        .projection
        .iter()
        .filter_map(|item| match item {
            SelectItem::UnnamedExpr(expr)
            | SelectItem::ExprWithAlias {
                expr, ..
            } => Some(expr),
            _ => None
        })
        .collect();
    out.extend(select.selection.as_ref());
    out.extend(select.having.as_ref());
    for item in &select.from {
        for join in &item.joins {
            if let Some(on) = join_on(&join.join_operator) {
                out.push(on);
            }
        }
    }
    out
}

fn join_on(op: &JoinOperator) -> Option<&Expr> {
    match op {
        JoinOperator::Join(JoinConstraint::On(expr))
        | JoinOperator::Inner(JoinConstraint::On(expr))
        | JoinOperator::Left(JoinConstraint::On(expr))
        | JoinOperator::LeftOuter(JoinConstraint::On(expr))
        | JoinOperator::Right(JoinConstraint::On(expr))
        | JoinOperator::RightOuter(JoinConstraint::On(expr))
        | JoinOperator::FullOuter(JoinConstraint::On(expr)) => Some(expr),
        _ => None
    }
}

fn walk_query<'a>(query: &'a Query, depth: usize, out: &mut Vec<QueryScope<'a>>) {
    out.push(QueryScope {
        query,
        depth
    });
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            walk_query(&cte.query, depth + 1, out);
        }
    }
    for select in query_selects(query) {
        for item in &select.from {
            walk_from(item, depth + 1, out);
        }
        for expr in select_exprs(select) {
            walk_expr(expr, depth + 1, out);
        }
    }
}

fn walk_from<'a>(item: &'a TableWithJoins, depth: usize, out: &mut Vec<QueryScope<'a>>) {
    walk_factor(&item.relation, depth, out);
    for join in &item.joins {
        walk_factor(&join.relation, depth, out);
    }
}

fn walk_factor<'a>(factor: &'a TableFactor, depth: usize, out: &mut Vec<QueryScope<'a>>) {
    match factor {
        TableFactor::Derived {
            subquery, ..
        } => walk_query(subquery, depth, out),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => walk_from(table_with_joins, depth, out),
        _ => {}
    }
}

fn walk_expr<'a>(expr: &'a Expr, depth: usize, out: &mut Vec<QueryScope<'a>>) {
    let mut subqueries = Vec::new();
    collect_subqueries(expr, &mut subqueries);
    for query in subqueries {
        walk_query(query, depth, out);
    }
}

#[cfg(test)]
mod tests {
    use sqlparser::{dialect::GenericDialect, parser::Parser};

    use super::*;

    fn statement(sql: &str) -> Statement {
        Parser::parse_sql(&GenericDialect {}, sql).unwrap().remove(0)
    }

    #[test]
    fn test_collect_selects_with_depth() {
        let stmt = statement(
            "SELECT a FROM (SELECT b FROM t WHERE c IN (SELECT d FROM u)) AS x WHERE EXISTS (SELECT 1 FROM v)"
        );
        let depths: Vec<usize> = collect_selects(&stmt).iter().map(|s| s.depth).collect();
        assert_eq!(depths, vec![0, 1, 2, 1]);
        assert_eq!(max_subquery_depth(&stmt), 2);
    }

    #[test]
    fn test_union_branches() {
        let stmt = statement("SELECT a FROM t UNION SELECT b FROM u UNION ALL SELECT c FROM v");
        let Statement::Query(query) = &stmt else {
            panic!("expected query");
        };
        assert_eq!(query_selects(query).len(), 3);
        assert_eq!(union_count(query), 2);
    }

    #[test]
    fn test_cte_is_nested() {
        let stmt = statement("WITH c AS (SELECT 1 AS x) SELECT x FROM c");
        assert_eq!(collect_queries(&stmt).len(), 2);
        assert_eq!(max_subquery_depth(&stmt), 1);
    }

    #[test]
    fn test_delete_subquery() {
        let stmt = statement("DELETE FROM t WHERE id IN (SELECT id FROM u)");
        assert_eq!(collect_selects(&stmt).len(), 1);
    }

    #[test]
    fn test_update_subquery() {
        let stmt = statement("UPDATE t SET a = 1 WHERE id IN (SELECT id FROM u WHERE b = 2)");
        let selects = collect_selects(&stmt);
        assert_eq!(selects.len(), 1);
        assert_eq!(selects[0].depth, 1);
    }
}
