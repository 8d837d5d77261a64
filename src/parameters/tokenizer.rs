//! Single-pass placeholder tokenizer.
//!
//! One alternation regex per dialect family matches, in priority order,
//! quoted identifiers, string literals, dollar-quoted bodies, comments,
//! operators that share a leading character with a placeholder, and finally
//! the eight placeholder shapes. Only placeholder matches are kept.
//!
//! # Example
//!
//! ```
//! use sql_firewall::{
//!     dialect::SqlDialect,
//!     parameters::{ParameterStyle, tokenize}
//! };
//!
//! let params = tokenize("SELECT * FROM t WHERE a = :a AND b = '?'", SqlDialect::Generic);
//! assert_eq!(params.len(), 1);
//! assert_eq!(params[0].style, ParameterStyle::NamedColon);
//! ```

use std::{
    ops::Range,
    sync::{Arc, LazyLock}
};

use compact_str::CompactString;
use regex::{Captures, Regex};
use tracing::trace;

use super::{ParameterInfo, ParameterStyle};
use crate::{cache::BoundedCache, dialect::SqlDialect};

const LITERALS: &str = concat!(
    r#"(?P<dquote>"(?:[^"]|"")*")"#,
    r"|(?P<backtick>`[^`]*`)",
    r"|(?P<squote>'(?:[^']|'')*')",
    r"|(?P<dollar_quote>\$(?:[A-Za-z_][A-Za-z0-9_]*)?\$)",
    r"|(?P<line_comment>--[^\n]*)",
    r"|(?P<block_comment>/\*(?s:.*?)\*/)"
);

/// MySQL family: backslash escapes inside quotes and `#` line comments
const BACKSLASH_LITERALS: &str = concat!(
    r#"(?P<dquote>"(?:[^"\\]|\\(?s:.)|"")*")"#,
    r"|(?P<backtick>`[^`]*`)",
    r"|(?P<squote>'(?:[^'\\]|\\(?s:.)|'')*')",
    r"|(?P<dollar_quote>\$(?:[A-Za-z_][A-Za-z0-9_]*)?\$)",
    r"|(?P<line_comment>(?:--|#)[^\n]*)",
    r"|(?P<block_comment>/\*(?s:.*?)\*/)"
);

const PLACEHOLDERS: &str = concat!(
    r"|(?P<pyformat_named>%\((?P<pyformat_name>[A-Za-z_][A-Za-z0-9_]*)\)s)",
    r"|(?P<pyformat_positional>%s)",
    r"|(?P<dollar>\$(?P<dollar_body>[A-Za-z0-9_]+))",
    r"|(?P<positional_colon>:(?P<colon_index>[0-9]+))",
    r"|(?P<named_colon>:(?P<colon_name>[A-Za-z_][A-Za-z0-9_]*))",
    r"|(?P<named_at>@(?P<at_name>[A-Za-z_][A-Za-z0-9_]*))",
    r"|(?P<qmark>\?)"
);

/// Operators never treated as placeholders
const BASE_OPERATORS: &str = r"|(?P<operator>::|:=|%%|@@|\?\?)";

/// Adds PostgreSQL JSON/array operators
const JSON_OPERATORS: &str = r"|(?P<operator>::|:=|%%|@@|\?\?|\?\||\?&|@>|<@)";

static BASE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("{LITERALS}{BASE_OPERATORS}{PLACEHOLDERS}")).expect("valid regex")
});

static JSON_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("{LITERALS}{JSON_OPERATORS}{PLACEHOLDERS}")).expect("valid regex")
});

static BACKSLASH_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("{BACKSLASH_LITERALS}{BASE_OPERATORS}{PLACEHOLDERS}")).expect("valid regex")
});

fn regex_for(dialect: SqlDialect) -> &'static Regex {
    if dialect.has_json_operators() {
        &JSON_REGEX
    } else if dialect.has_backslash_escapes() {
        &BACKSLASH_REGEX
    } else {
        &BASE_REGEX
    }
}

/// Non-placeholder region found by the scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lexeme {
    /// String literal, quoted identifier or dollar-quoted body
    Quoted(Range<usize>),
    Comment(Range<usize>),
    /// A `;` outside literals and comments
    Terminator(usize)
}

/// Walk `sql` once, reporting placeholders and non-code regions
fn scan(
    sql: &str,
    dialect: SqlDialect,
    mut on_lexeme: impl FnMut(Lexeme),
    mut on_param: impl FnMut(ParameterInfo)
) {
    if sql.trim().is_empty() {
        return;
    }
    let regex = regex_for(dialect);
    let mut ordinal = 0;
    let mut pos = 0;
    while pos < sql.len() {
        let Some(caps) = regex.captures_at(sql, pos) else {
            break;
        };
        let Some(whole) = caps.get(0) else {
            break;
        };
        for (offset, _) in sql[pos..whole.start()].match_indices(';') {
            on_lexeme(Lexeme::Terminator(pos + offset));
        }
        let mut next = whole.end();
        if caps.name("dollar_quote").is_some() {
            let tag = whole.as_str();
            // Unterminated bodies drop only the opening tag.
            if let Some(offset) = sql[whole.end()..].find(tag) {
                next = whole.end() + offset + tag.len();
            }
            on_lexeme(Lexeme::Quoted(whole.start()..next));
        } else if caps.name("line_comment").is_some() || caps.name("block_comment").is_some() {
            on_lexeme(Lexeme::Comment(whole.range()));
        } else if caps.name("dquote").is_some()
            || caps.name("backtick").is_some()
            || caps.name("squote").is_some()
        {
            on_lexeme(Lexeme::Quoted(whole.range()));
        } else if let Some((style, name)) = placeholder_kind(&caps)
            && !glued_to_identifier(sql, whole.start(), style)
        {
            on_param(ParameterInfo {
                name,
                style,
                position: whole.start(),
                ordinal,
                literal: whole.as_str().into()
            });
            ordinal += 1;
        }
        debug_assert!(next > pos, "tokenizer must advance");
        pos = next;
    }
    for (offset, _) in sql[pos.min(sql.len())..].match_indices(';') {
        on_lexeme(Lexeme::Terminator(pos + offset));
    }
}

/// Extract placeholders from SQL text without caching
pub fn tokenize(sql: &str, dialect: SqlDialect) -> Vec<ParameterInfo> {
    let mut params = Vec::new();
    scan(sql, dialect, |_| {}, |p| params.push(p));
    trace!(count = params.len(), %dialect, "tokenized placeholders");
    params
}

/// Literals, quoted identifiers, comments and statement terminators
pub fn lexemes(sql: &str, dialect: SqlDialect) -> Vec<Lexeme> {
    let mut out = Vec::new();
    scan(sql, dialect, |l| out.push(l), |_| {});
    out
}

/// Comment ranges outside string literals
pub fn find_comments(sql: &str, dialect: SqlDialect) -> Vec<Range<usize>> {
    lexemes(sql, dialect)
        .into_iter()
        .filter_map(|l| match l {
            Lexeme::Comment(range) => Some(range),
            _ => None
        })
        .collect()
}

/// Copy of `sql` with literal contents and comments blanked out.
///
/// Offsets are preserved so matches map back onto the original text.
pub fn mask_literals(sql: &str, dialect: SqlDialect) -> String {
    let mut bytes = sql.as_bytes().to_vec();
    for lexeme in lexemes(sql, dialect) {
        if let Lexeme::Quoted(range) | Lexeme::Comment(range) = lexeme {
            bytes[range].fill(b' ');
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Split on `;` outside literals and comments, dropping empty pieces
pub fn split_statements(sql: &str, dialect: SqlDialect) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for lexeme in lexemes(sql, dialect) {
        if let Lexeme::Terminator(at) = lexeme {
            pieces.push(&sql[start..at]);
            start = at + 1;
        }
    }
    pieces.push(&sql[start..]);
    pieces.into_iter().filter(|p| !p.trim().is_empty()).map(str::trim).collect()
}

fn placeholder_kind(caps: &Captures<'_>) -> Option<(ParameterStyle, Option<CompactString>)> {
    let name = |group: &str| caps.name(group).map(|m| CompactString::from(m.as_str()));
    if caps.name("pyformat_named").is_some() {
        return Some((ParameterStyle::PyformatNamed, name("pyformat_name")));
    }
    if caps.name("pyformat_positional").is_some() {
        return Some((ParameterStyle::PyformatPositional, None));
    }
    if let Some(body) = caps.name("dollar_body") {
        let style = if body.as_str().bytes().all(|b| b.is_ascii_digit()) {
            ParameterStyle::Numeric
        } else {
            ParameterStyle::NamedDollar
        };
        return Some((style, name("dollar_body")));
    }
    if caps.name("positional_colon").is_some() {
        return Some((ParameterStyle::PositionalColon, name("colon_index")));
    }
    if caps.name("named_colon").is_some() {
        return Some((ParameterStyle::NamedColon, name("colon_name")));
    }
    if caps.name("named_at").is_some() {
        return Some((ParameterStyle::NamedAt, name("at_name")));
    }
    if caps.name("qmark").is_some() {
        return Some((ParameterStyle::Qmark, None));
    }
    None
}

/// `a:b`, `user@host`, `tbl$col` are not placeholders
fn glued_to_identifier(sql: &str, start: usize, style: ParameterStyle) -> bool {
    if matches!(
        style,
        ParameterStyle::Qmark | ParameterStyle::PyformatNamed | ParameterStyle::PyformatPositional
    ) {
        return false;
    }
    sql[..start]
        .chars()
        .next_back()
        .is_some_and(|c| c.is_alphanumeric() || c == '_')
}

/// Tokenizer with a per-(dialect, SQL) extraction cache
#[derive(Debug)]
pub struct ParameterTokenizer {
    cache: BoundedCache<(SqlDialect, String), Arc<[ParameterInfo]>>
}

impl Default for ParameterTokenizer {
    fn default() -> Self {
        Self::new(crate::config::CacheConfig::default().parameter_cache_size)
    }
}

impl ParameterTokenizer {
    pub fn new(cache_size: usize) -> Self {
        Self {
            cache: BoundedCache::new("parameters", cache_size)
        }
    }

    /// Extract placeholders, reusing the result for identical SQL text
    pub fn extract(&self, sql: &str, dialect: SqlDialect) -> Arc<[ParameterInfo]> {
        self.cache
            .get_or_insert_with((dialect, sql.to_string()), || tokenize(sql, dialect).into())
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn styles(sql: &str) -> Vec<ParameterStyle> {
        tokenize(sql, SqlDialect::Generic)
            .into_iter()
            .map(|p| p.style)
            .collect()
    }

    #[test]
    fn test_all_shapes() {
        let sql = "SELECT ?, $1, :name, :2, @at, $dol, %(py)s, %s";
        assert_eq!(
            styles(sql),
            vec![
                ParameterStyle::Qmark,
                ParameterStyle::Numeric,
                ParameterStyle::NamedColon,
                ParameterStyle::PositionalColon,
                ParameterStyle::NamedAt,
                ParameterStyle::NamedDollar,
                ParameterStyle::PyformatNamed,
                ParameterStyle::PyformatPositional
            ]
        );
    }

    #[test]
    fn test_positions_and_ordinals() {
        let params = tokenize("SELECT * FROM t WHERE a = ? AND b = ?", SqlDialect::Generic);
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].position, 26);
        assert_eq!(params[1].ordinal, 1);
        assert_eq!(params[1].literal.as_str(), "?");
    }

    #[test]
    fn test_skips_literals_and_comments() {
        let sql = r#"SELECT '?', "col:x", `a?` -- :c
            /* @d ? */ FROM t WHERE x = :real"#;
        let params = tokenize(sql, SqlDialect::Generic);
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name.as_deref(), Some("real"));
    }

    #[test]
    fn test_escaped_quote_inside_literal() {
        let params = tokenize("SELECT 'it''s :not' WHERE a = :yes", SqlDialect::Generic);
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name.as_deref(), Some("yes"));
    }

    #[test]
    fn test_mysql_backslash_escape() {
        let sql = r"SELECT 'it\'s ?' FROM t WHERE a = ? AND b = 'x\\'";
        let params = tokenize(sql, SqlDialect::MySQL);
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].position, sql.find("a = ?").unwrap() + 4);
        let params = tokenize(r#"SELECT "say \"?\"" FROM t WHERE a = %s"#, SqlDialect::MySQL);
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].style, ParameterStyle::PyformatPositional);
    }

    #[test]
    fn test_mysql_hash_comment() {
        let sql = "SELECT * FROM t # where b = ?\nWHERE a = %s";
        let params = tokenize(sql, SqlDialect::MySQL);
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].literal.as_str(), "%s");
        assert_eq!(find_comments(sql, SqlDialect::MySQL).len(), 1);
        assert!(find_comments(sql, SqlDialect::PostgreSQL).is_empty());
    }

    #[test]
    fn test_dollar_quoted_body_is_skipped() {
        let sql = "SELECT $fn$ SELECT :inner, $1 $fn$, $2";
        let params = tokenize(sql, SqlDialect::PostgreSQL);
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].literal.as_str(), "$2");
    }

    #[test]
    fn test_unterminated_quote_does_not_hang() {
        let params = tokenize("SELECT 'abc WHERE a = ?", SqlDialect::Generic);
        assert_eq!(params.len(), 1);
        let params = tokenize("SELECT $$ unterminated :x", SqlDialect::PostgreSQL);
        assert_eq!(params.len(), 1);
        assert!(tokenize("/* open", SqlDialect::Generic).is_empty());
    }

    #[test]
    fn test_cast_is_not_placeholder() {
        let params = tokenize("SELECT a::int, :b::text", SqlDialect::PostgreSQL);
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name.as_deref(), Some("b"));
    }

    #[test]
    fn test_json_operators_postgres() {
        let params = tokenize("SELECT * FROM t WHERE data ?| array['a'] AND id = $1", SqlDialect::PostgreSQL);
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].style, ParameterStyle::Numeric);
    }

    #[test]
    fn test_glued_identifier_is_not_placeholder() {
        assert!(tokenize("SELECT a:b FROM t", SqlDialect::Generic).is_empty());
        assert!(tokenize("SELECT 'x' FROM user@host", SqlDialect::Generic).is_empty());
    }

    #[test]
    fn test_percent_escape() {
        assert_eq!(styles("SELECT 10 %% 3, %s"), vec![ParameterStyle::PyformatPositional]);
    }

    #[test]
    fn test_empty_sql() {
        assert!(tokenize("", SqlDialect::Generic).is_empty());
        assert!(tokenize("   \n\t", SqlDialect::Generic).is_empty());
    }

    #[test]
    fn test_find_comments_ignores_quoted_dashes() {
        let sql = "SELECT '--not' FROM t -- real\n/* block */";
        let comments = find_comments(sql, SqlDialect::Generic);
        assert_eq!(comments.len(), 2);
        assert_eq!(&sql[comments[0].clone()], "-- real");
    }

    #[test]
    fn test_mask_literals_preserves_offsets() {
        let sql = "SELECT 'sleep(5)' /* x */, sleep(1)";
        let masked = mask_literals(sql, SqlDialect::Generic);
        assert_eq!(masked.len(), sql.len());
        assert_eq!(masked.matches("sleep").count(), 1);
        assert_eq!(masked.find("sleep"), sql.rfind("sleep"));
    }

    #[test]
    fn test_split_statements() {
        let sql = "SELECT ';' FROM a; -- c;\nDELETE FROM b WHERE x = 1;  ;";
        let pieces = split_statements(sql, SqlDialect::Generic);
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0], "SELECT ';' FROM a");
        assert!(pieces[1].ends_with("WHERE x = 1"));
    }

    #[test]
    fn test_cached_extraction() {
        let tokenizer = ParameterTokenizer::new(10);
        let first = tokenizer.extract("SELECT ?", SqlDialect::Generic);
        let second = tokenizer.extract("SELECT ?", SqlDialect::Generic);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(tokenizer.cached_entries(), 1);
    }
}
