//! Shared helpers over the parsed statement tree.
//!
//! Every validator and analyzer reads the tree through these functions so
//! structural equality, AND/OR flattening and table/join classification are
//! defined in exactly one place.

mod expr;
mod set_expr;
mod table;

use std::fmt;

use compact_str::CompactString;
pub use expr::{
    ColumnRef, Comparison, ExprVec, as_comparison, call_args, collect_columns, collect_subqueries,
    column_ref, exprs_equivalent, flatten, function_arg_count, function_args, function_depth,
    is_literal, is_null_literal, literal_value, strip_nested
};
use serde::Serialize;
pub use set_expr::{
    QueryScope, SelectScope, collect_queries, collect_selects, max_subquery_depth,
    query_selects, select_exprs, union_count
};
use sqlparser::{
    ast::{FromTable, Statement},
    parser::Parser
};
pub use table::{
    JoinInfo, JoinKind, TableRef, classify_join, from_item_tables, select_joins, select_tables,
    table_ref
};

use crate::{
    dialect::SqlDialect,
    error::{FirewallResult, parse_error}
};

/// Parse SQL text into statements
pub fn parse_statements(sql: &str, dialect: SqlDialect) -> FirewallResult<Vec<Statement>> {
    let parser_dialect = dialect.into_parser_dialect();
    Parser::parse_sql(parser_dialect.as_ref(), sql).map_err(|e| parse_error(e.to_string(), sql))
}

/// Render statements back to SQL text, `;`-separated
pub fn render_statements(statements: &[Statement]) -> String {
    statements
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Statement class by the SQL sublanguage it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatementCategory {
    Dql,
    Dml,
    Ddl,
    Dcl,
    Tcl,
    Other
}

impl fmt::Display for StatementCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dql => write!(f, "DQL"),
            Self::Dml => write!(f, "DML"),
            Self::Ddl => write!(f, "DDL"),
            Self::Dcl => write!(f, "DCL"),
            Self::Tcl => write!(f, "TCL"),
            Self::Other => write!(f, "OTHER")
        }
    }
}

/// Category and operation keyword (`DELETE`, `DROP`, ...) of a statement
pub fn categorize(statement: &Statement) -> (StatementCategory, CompactString) {
    match statement {
        Statement::Query(_) => (StatementCategory::Dql, "SELECT".into()),
        Statement::Insert(_) => (StatementCategory::Dml, "INSERT".into()),
        Statement::Update(_) => (StatementCategory::Dml, "UPDATE".into()),
        Statement::Delete(_) => (StatementCategory::Dml, "DELETE".into()),
        Statement::Truncate(_) => (StatementCategory::Ddl, "TRUNCATE".into()),
        Statement::Drop {
            ..
        } => (StatementCategory::Ddl, "DROP".into()),
        Statement::CreateTable(_) => (StatementCategory::Ddl, "CREATE".into()),
        other => categorize_keyword(&other.to_string())
    }
}

fn categorize_keyword(rendered: &str) -> (StatementCategory, CompactString) {
    let keyword: CompactString = rendered
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase()
        .into();
    let category = match keyword.as_str() {
        "SELECT" | "WITH" | "VALUES" | "SHOW" | "EXPLAIN" | "DESCRIBE" | "DESC" => {
            StatementCategory::Dql
        }
        "INSERT" | "UPDATE" | "DELETE" | "MERGE" | "REPLACE" | "UPSERT" | "COPY" => {
            StatementCategory::Dml
        }
        "CREATE" | "ALTER" | "DROP" | "TRUNCATE" | "RENAME" | "COMMENT" => StatementCategory::Ddl,
        "GRANT" | "REVOKE" | "DENY" => StatementCategory::Dcl,
        "BEGIN" | "START" | "COMMIT" | "ROLLBACK" | "SAVEPOINT" | "RELEASE" | "END" => {
            StatementCategory::Tcl
        }
        _ => StatementCategory::Other
    };
    (category, keyword)
}

/// Tables a data-modifying statement writes to, lowercased
pub fn modified_tables(statement: &Statement) -> Vec<CompactString> {
    let lower = |s: String| CompactString::from(s.to_lowercase());
    match statement {
        Statement::Insert(insert) => vec![lower(insert.table.to_string())],
        Statement::Update(update) => vec![lower(update.table.relation.to_string())],
        Statement::Delete(delete) => {
            let items = match &delete.from {
                FromTable::WithFromKeyword(items) | FromTable::WithoutKeyword(items) => items
            };
            let mut tables: Vec<CompactString> =
                delete.tables.iter().map(|t| lower(t.to_string())).collect();
            let mut refs = Vec::new();
            for item in items {
                from_item_tables(item, &mut refs);
            }
            tables.extend(refs.into_iter().map(|t| t.name));
            tables
        }
        Statement::Truncate(truncate) => truncate
            .table_names
            .iter()
            .map(|t| lower(t.name.to_string()))
            .collect(),
        Statement::Drop {
            names, ..
        } => names.iter().map(|n| lower(n.to_string())).collect(),
        _ => Vec::new()
    }
}
