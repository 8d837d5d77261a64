use std::fmt;

use compact_str::CompactString;
use serde::Serialize;
use sqlparser::ast::{Join, JoinConstraint, JoinOperator, Select, TableFactor, TableWithJoins};

/// A table in a FROM clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRef {
    /// Name as written, lowercased
    pub name:  CompactString,
    pub alias: Option<CompactString>
}

impl TableRef {
    /// Last component of the name (`public.users` -> `users`)
    pub fn base_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Whether a column qualifier refers to this table
    pub fn answers_to(&self, qualifier: &str) -> bool {
        match &self.alias {
            Some(alias) => alias.as_str() == qualifier,
            None => self.name.as_str() == qualifier || self.base_name() == qualifier
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{} AS {}", self.name, alias),
            None => f.write_str(&self.name)
        }
    }
}

/// Join flavour as written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
    Other
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inner => write!(f, "INNER"),
            Self::Left => write!(f, "LEFT"),
            Self::Right => write!(f, "RIGHT"),
            Self::Full => write!(f, "FULL"),
            Self::Cross => write!(f, "CROSS"),
            Self::Other => write!(f, "OTHER")
        }
    }
}

/// Classified JOIN clause
#[derive(Debug, Clone)]
pub struct JoinInfo<'a> {
    pub kind:        JoinKind,
    /// ON, USING or NATURAL present
    pub constrained: bool,
    pub on:          Option<&'a sqlparser::ast::Expr>,
    /// Joined table, if it is a plain table
    pub table:       Option<TableRef>
}

pub fn table_ref(factor: &TableFactor) -> Option<TableRef> {
    match factor {
        TableFactor::Table {
            name,
            alias,
            ..
        } => Some(TableRef {
            name:  name.to_string().to_lowercase().into(),
            alias: alias.as_ref().map(|a| a.name.value.to_lowercase().into())
        }),
        TableFactor::Derived {
            alias, ..
        } => Some(TableRef {
            name:  "(subquery)".into(),
            alias: alias.as_ref().map(|a| a.name.value.to_lowercase().into())
        }),
        _ => None
    }
}

fn constraint_info(constraint: &JoinConstraint) -> (bool, Option<&sqlparser::ast::Expr>) {
    match constraint {
        JoinConstraint::On(expr) => (true, Some(expr)),
        JoinConstraint::Using(_) | JoinConstraint::Natural => (true, None),
        JoinConstraint::None => (false, None)
    }
}

pub fn classify_join(join: &Join) -> JoinInfo<'_> {
    let (kind, (constrained, on)) = match &join.join_operator {
        JoinOperator::Join(c) | JoinOperator::Inner(c) => (JoinKind::Inner, constraint_info(c)),
        JoinOperator::Left(c) | JoinOperator::LeftOuter(c) => (JoinKind::Left, constraint_info(c)),
        JoinOperator::Right(c) | JoinOperator::RightOuter(c) => {
            (JoinKind::Right, constraint_info(c))
        }
        JoinOperator::FullOuter(c) => (JoinKind::Full, constraint_info(c)),
        JoinOperator::CrossJoin {
            ..
        } => (JoinKind::Cross, (false, None)),
        // APPLY, SEMI/ANTI and ASOF carry their own semantics
        _ => (JoinKind::Other, (true, None))
    };
    JoinInfo {
        kind,
        constrained,
        on,
        table: table_ref(&join.relation)
    }
}

/// Every plain or derived table of a FROM item, joins included
pub fn from_item_tables(item: &TableWithJoins, out: &mut Vec<TableRef>) {
    factor_tables(&item.relation, out);
    for join in &item.joins {
        factor_tables(&join.relation, out);
    }
}

fn factor_tables(factor: &TableFactor, out: &mut Vec<TableRef>) {
    match factor {
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => from_item_tables(table_with_joins, out),
        other => {
            if let Some(table) = table_ref(other) {
                out.push(table);
            }
        }
    }
}

/// Tables of a SELECT's FROM clause
pub fn select_tables(select: &Select) -> Vec<TableRef> {
    let mut out = Vec::new();
    for item in &select.from {
        from_item_tables(item, &mut out);
    }
    out
}

/// JOIN clauses of a SELECT, nested joins included
pub fn select_joins(select: &Select) -> Vec<JoinInfo<'_>> {
    let mut out = Vec::new();
    for item in &select.from {
        item_joins(item, &mut out);
    }
    out
}

fn item_joins<'a>(item: &'a TableWithJoins, out: &mut Vec<JoinInfo<'a>>) {
    if let TableFactor::NestedJoin {
        table_with_joins, ..
    } = &item.relation
    {
        item_joins(table_with_joins, out);
    }
    for join in &item.joins {
        out.push(classify_join(join));
        if let TableFactor::NestedJoin {
            table_with_joins, ..
        } = &join.relation
        {
            item_joins(table_with_joins, out);
        }
    }
}
