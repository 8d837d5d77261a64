use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::dialect::SqlDialect;

/// A single bound value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>)
}

impl ParameterValue {
    /// Render the value as a SQL literal. Non-finite floats have no
    /// literal form and render as `NULL`.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Bool(true) => "TRUE".to_string(),
            Self::Bool(false) => "FALSE".to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) if !f.is_finite() => "NULL".to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Self::Bytes(b) => {
                let hex: String = b.iter().map(|byte| format!("{:02X}", byte)).collect();
                format!("X'{}'", hex)
            }
        }
    }

    /// Literal for inlining into `dialect` SQL, `None` for non-finite floats
    pub fn inline_literal(&self, dialect: SqlDialect) -> Option<String> {
        match self {
            Self::Float(f) if !f.is_finite() => None,
            Self::Text(s) if dialect.has_backslash_escapes() => {
                Some(format!("'{}'", s.replace('\\', "\\\\").replace('\'', "''")))
            }
            other => Some(other.to_sql_literal())
        }
    }

    /// Convert a JSON value; nested arrays/objects are rejected
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(Self::Null),
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float)),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql_literal())
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ParameterValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for ParameterValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<ParameterValue>> From<Option<T>> for ParameterValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Values supplied for a statement, after merging call sources.
///
/// "Absent" is represented by `Option::<Parameters>::None` at call sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Parameters {
    Sequence(Vec<ParameterValue>),
    Mapping(IndexMap<String, ParameterValue>),
    Scalar(ParameterValue)
}

impl Parameters {
    /// Shape of the supplied value
    pub fn shape(&self) -> ParameterShape {
        match self {
            Self::Mapping(_) => ParameterShape::Mapping,
            Self::Sequence(_) => ParameterShape::Sequence,
            Self::Scalar(_) => ParameterShape::Scalar
        }
    }

    /// Empty mappings and sequences carry no values; a scalar always does
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Mapping(m) => m.is_empty(),
            Self::Sequence(s) => s.is_empty(),
            Self::Scalar(_) => false
        }
    }

    /// Number of supplied values
    pub fn len(&self) -> usize {
        match self {
            Self::Mapping(m) => m.len(),
            Self::Sequence(s) => s.len(),
            Self::Scalar(_) => 1
        }
    }

    /// Build parameters from JSON (object, array or scalar)
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Object(map) => map
                .iter()
                .map(|(k, v)| ParameterValue::from_json(v).map(|pv| (k.clone(), pv)))
                .collect::<Option<IndexMap<_, _>>>()
                .map(Self::Mapping),
            serde_json::Value::Array(items) => items
                .iter()
                .map(ParameterValue::from_json)
                .collect::<Option<Vec<_>>>()
                .map(Self::Sequence),
            scalar => ParameterValue::from_json(scalar).map(Self::Scalar)
        }
    }
}

impl<T: Into<ParameterValue>> From<Vec<T>> for Parameters {
    fn from(values: Vec<T>) -> Self {
        Self::Sequence(values.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<String>, V: Into<ParameterValue>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::Mapping(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Expected or supplied parameter shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterShape {
    Mapping,
    Sequence,
    Scalar,
    None
}

impl fmt::Display for ParameterShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mapping => write!(f, "mapping"),
            Self::Sequence => write!(f, "sequence"),
            Self::Scalar => write!(f, "scalar"),
            Self::None => write!(f, "none")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_literals() {
        assert_eq!(ParameterValue::Null.to_sql_literal(), "NULL");
        assert_eq!(ParameterValue::Bool(true).to_sql_literal(), "TRUE");
        assert_eq!(ParameterValue::Int(-5).to_sql_literal(), "-5");
        assert_eq!(ParameterValue::from("O'Brien").to_sql_literal(), "'O''Brien'");
        assert_eq!(ParameterValue::Bytes(vec![0xde, 0xad]).to_sql_literal(), "X'DEAD'");
        assert_eq!(ParameterValue::Float(1.5).to_sql_literal(), "1.5");
        assert_eq!(ParameterValue::Float(f64::NAN).to_sql_literal(), "NULL");
    }

    #[test]
    fn test_inline_literal() {
        assert!(ParameterValue::Float(f64::INFINITY).inline_literal(SqlDialect::Generic).is_none());
        assert!(ParameterValue::Float(f64::NAN).inline_literal(SqlDialect::MySQL).is_none());
        let text = ParameterValue::from(r"a\'b");
        assert_eq!(text.inline_literal(SqlDialect::Generic).as_deref(), Some(r"'a\''b'"));
        assert_eq!(text.inline_literal(SqlDialect::MySQL).as_deref(), Some(r"'a\\''b'"));
    }

    #[test]
    fn test_from_json_object() {
        let json = serde_json::json!({"id": 5, "name": "bob"});
        let params = Parameters::from_json(&json).unwrap();
        let Parameters::Mapping(map) = params else {
            panic!("expected mapping");
        };
        assert_eq!(map.get("id"), Some(&ParameterValue::Int(5)));
        assert_eq!(map.get("name"), Some(&ParameterValue::from("bob")));
    }

    #[test]
    fn test_from_json_rejects_nested() {
        let json = serde_json::json!([[1, 2]]);
        assert!(Parameters::from_json(&json).is_none());
    }

    #[test]
    fn test_scalar_is_never_empty() {
        assert!(!Parameters::Scalar(ParameterValue::Null).is_empty());
        assert!(Parameters::Sequence(vec![]).is_empty());
    }

    #[test]
    fn test_collect_into_mapping() {
        let params: Parameters = [("a", 1i64), ("b", 2i64)].into_iter().collect();
        assert_eq!(params.shape(), ParameterShape::Mapping);
        assert_eq!(params.len(), 2);
    }
}
