use std::{fmt, str::FromStr};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Placeholder syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ParameterStyle {
    /// `?`
    Qmark,
    /// `$1`
    Numeric,
    /// `:name`
    NamedColon,
    /// `:1`
    PositionalColon,
    /// `@name`
    NamedAt,
    /// `$name`
    NamedDollar,
    /// `%(name)s`
    PyformatNamed,
    /// `%s`
    PyformatPositional,
    /// No placeholders
    None,
    /// Values inlined as SQL literals
    Static
}

impl ParameterStyle {
    /// Styles that bind by name
    pub fn is_named(self) -> bool {
        matches!(
            self,
            Self::NamedColon | Self::NamedAt | Self::NamedDollar | Self::PyformatNamed
        )
    }

    /// Styles that bind by position
    pub fn is_positional(self) -> bool {
        matches!(
            self,
            Self::Qmark | Self::Numeric | Self::PositionalColon | Self::PyformatPositional
        )
    }

    /// Positional styles that carry an explicit index (`$1`, `:1`)
    pub fn is_indexed(self) -> bool {
        matches!(self, Self::Numeric | Self::PositionalColon)
    }
}

impl fmt::Display for ParameterStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Qmark => "qmark",
            Self::Numeric => "numeric",
            Self::NamedColon => "named_colon",
            Self::PositionalColon => "positional_colon",
            Self::NamedAt => "named_at",
            Self::NamedDollar => "named_dollar",
            Self::PyformatNamed => "pyformat_named",
            Self::PyformatPositional => "pyformat_positional",
            Self::None => "none",
            Self::Static => "static"
        };
        f.write_str(name)
    }
}

impl FromStr for ParameterStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "qmark" | "?" => Ok(Self::Qmark),
            "numeric" | "dollar_numeric" => Ok(Self::Numeric),
            "named_colon" | "colon" => Ok(Self::NamedColon),
            "positional_colon" => Ok(Self::PositionalColon),
            "named_at" | "at" => Ok(Self::NamedAt),
            "named_dollar" => Ok(Self::NamedDollar),
            "pyformat_named" | "pyformat" => Ok(Self::PyformatNamed),
            "pyformat_positional" | "format" => Ok(Self::PyformatPositional),
            "none" => Ok(Self::None),
            "static" => Ok(Self::Static),
            other => Err(format!("unknown parameter style '{}'", other))
        }
    }
}

/// A placeholder found in SQL text.
///
/// Equality ignores `ordinal` so the same placeholder compares equal across
/// different extraction runs.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct ParameterInfo {
    /// Name for named styles, index text for `$1` / `:1`
    pub name:     Option<CompactString>,
    pub style:    ParameterStyle,
    /// Byte offset of the placeholder in the SQL text
    pub position: usize,
    /// 0-based index among placeholders only
    pub ordinal:  usize,
    /// Placeholder text exactly as written
    pub literal:  CompactString
}

impl PartialEq for ParameterInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.style == other.style
            && self.position == other.position
            && self.literal == other.literal
    }
}

impl ParameterInfo {
    /// Slot index for indexed styles (`$3` -> 2)
    pub fn index(&self) -> Option<usize> {
        if !self.style.is_indexed() {
            return None;
        }
        self.name
            .as_deref()
            .and_then(|n| n.parse::<usize>().ok())
            .and_then(|n| n.checked_sub(1))
    }

    /// Byte range of the placeholder in the SQL text
    pub fn span(&self) -> std::ops::Range<usize> {
        self.position..self.position + self.literal.len()
    }
}
