//! Placeholder style detection and value validation.

use super::{ParameterInfo, ParameterShape, ParameterStyle, Parameters};
use crate::error::{
    FirewallResult, extra_parameter_error, missing_parameter_error, style_mismatch_error
};

/// Style that governs binding when a statement mixes placeholder syntaxes.
///
/// Priority: pyformat named, pyformat positional, the first named style by
/// colon > at > dollar precedence, indexed positional, qmark, none.
pub fn dominant_style(params: &[ParameterInfo]) -> ParameterStyle {
    let has = |style: ParameterStyle| params.iter().any(|p| p.style == style);
    if params.is_empty() {
        return ParameterStyle::None;
    }
    let precedence = [
        ParameterStyle::PyformatNamed,
        ParameterStyle::PyformatPositional,
        ParameterStyle::NamedColon,
        ParameterStyle::NamedAt,
        ParameterStyle::NamedDollar,
        ParameterStyle::Numeric,
        ParameterStyle::PositionalColon,
        ParameterStyle::Qmark
    ];
    precedence
        .into_iter()
        .find(|s| has(*s))
        .unwrap_or(ParameterStyle::None)
}

/// Shape of input the placeholders require
pub fn expected_shape(params: &[ParameterInfo]) -> ParameterShape {
    if params.is_empty() {
        ParameterShape::None
    } else if params.iter().any(|p| p.style.is_named()) {
        ParameterShape::Mapping
    } else {
        ParameterShape::Sequence
    }
}

/// Number of sequence slots the placeholders consume.
///
/// Indexed placeholders (`$1`, `:1`) share slots, so `$1 ... $1` is one.
pub fn slot_count(params: &[ParameterInfo]) -> usize {
    if !params.is_empty() && params.iter().all(|p| p.style.is_indexed()) {
        return params
            .iter()
            .filter_map(ParameterInfo::index)
            .map(|i| i + 1)
            .max()
            .unwrap_or(0);
    }
    params.len()
}

/// Mapping key an anonymous placeholder is looked up by
pub fn positional_key(ordinal: usize) -> String {
    format!("param_{}", ordinal)
}

/// Validates supplied values against extracted placeholders
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterValidator;

impl ParameterValidator {
    /// Check that `supplied` can bind every placeholder in `sql`.
    ///
    /// # Errors
    ///
    /// - `ExtraParameter` when values are given for SQL without placeholders
    /// - `MissingParameter` when a value is absent or the sequence length differs
    /// - `ParameterStyleMismatch` when the shape does not match the placeholders
    pub fn validate(
        &self,
        sql: &str,
        params: &[ParameterInfo],
        supplied: Option<&Parameters>
    ) -> FirewallResult<()> {
        let expected = expected_shape(params);
        let supplied = match supplied {
            Some(p) if !p.is_empty() => p,
            _ => {
                if expected == ParameterShape::None {
                    return Ok(());
                }
                return Err(missing_parameter_error(
                    format!(
                        "statement has {} placeholder(s) but no parameters were supplied",
                        params.len()
                    ),
                    sql
                ));
            }
        };
        if expected == ParameterShape::None {
            return Err(extra_parameter_error(
                format!(
                    "statement has no placeholders but {} {} value(s) were supplied",
                    supplied.len(),
                    supplied.shape()
                ),
                sql
            ));
        }
        if params.len() == 1 && matches!(supplied, Parameters::Scalar(_)) {
            return Ok(());
        }
        match (expected, supplied) {
            (ParameterShape::Mapping, Parameters::Mapping(map)) => {
                let missing: Vec<String> = params
                    .iter()
                    .map(|p| match (&p.name, p.style.is_named()) {
                        (Some(name), true) => name.to_string(),
                        _ => positional_key(p.ordinal)
                    })
                    .filter(|key| !map.contains_key(key))
                    .collect();
                if missing.is_empty() {
                    Ok(())
                } else {
                    Err(missing_parameter_error(
                        format!("no value for {}", quote_list(&missing)),
                        sql
                    ))
                }
            }
            (ParameterShape::Sequence, Parameters::Sequence(values)) => {
                let slots = slot_count(params);
                if values.len() == slots {
                    Ok(())
                } else {
                    Err(missing_parameter_error(
                        format!(
                            "statement expects {} positional value(s) but {} were supplied",
                            slots,
                            values.len()
                        ),
                        sql
                    ))
                }
            }
            (expected, supplied) => Err(style_mismatch_error(
                format!(
                    "{} placeholders ({}) cannot bind a {} of parameters",
                    dominant_style(params),
                    expected,
                    supplied.shape()
                ),
                sql
            ))
        }
    }
}

fn quote_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("'{}'", n))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dialect::SqlDialect,
        error::FirewallError,
        parameters::{ParameterValue, tokenize}
    };

    fn check(sql: &str, supplied: Option<Parameters>) -> FirewallResult<()> {
        let params = tokenize(sql, SqlDialect::Generic);
        ParameterValidator.validate(sql, &params, supplied.as_ref())
    }

    #[test]
    fn test_dominant_style_priority() {
        let params = tokenize("SELECT ?, :a, %(b)s", SqlDialect::Generic);
        assert_eq!(dominant_style(&params), ParameterStyle::PyformatNamed);
        let params = tokenize("SELECT $1, @a, :b", SqlDialect::Generic);
        assert_eq!(dominant_style(&params), ParameterStyle::NamedColon);
        let params = tokenize("SELECT ?, $1", SqlDialect::Generic);
        assert_eq!(dominant_style(&params), ParameterStyle::Numeric);
        assert_eq!(dominant_style(&[]), ParameterStyle::None);
    }

    #[test]
    fn test_expected_shape() {
        assert_eq!(expected_shape(&tokenize("SELECT ?", SqlDialect::Generic)), ParameterShape::Sequence);
        assert_eq!(expected_shape(&tokenize("SELECT ?, :a", SqlDialect::Generic)), ParameterShape::Mapping);
        assert_eq!(expected_shape(&[]), ParameterShape::None);
    }

    #[test]
    fn test_qmark_sequence_ok() {
        assert!(check("SELECT * FROM users WHERE id = ?", Some(vec![123i64].into())).is_ok());
    }

    #[test]
    fn test_missing_named() {
        let err = check("SELECT * FROM users WHERE name = :name", None).unwrap_err();
        assert!(matches!(err, FirewallError::MissingParameter { .. }));
    }

    #[test]
    fn test_extra_parameter() {
        let err = check("SELECT 1", Some(vec![1i64].into())).unwrap_err();
        assert!(matches!(err, FirewallError::ExtraParameter { .. }));
        assert!(check("SELECT 1", Some(Parameters::Sequence(vec![]))).is_ok());
    }

    #[test]
    fn test_single_placeholder_scalar() {
        assert!(check("SELECT :a", Some(Parameters::Scalar(ParameterValue::Int(1)))).is_ok());
        assert!(check("SELECT ?", Some(Parameters::Scalar(ParameterValue::Null))).is_ok());
    }

    #[test]
    fn test_count_mismatch_is_missing_parameter() {
        let err = check("SELECT ?, ?", Some(vec![1i64].into())).unwrap_err();
        assert!(matches!(err, FirewallError::MissingParameter { .. }));
        let err = check("SELECT ?, ?", Some(vec![1i64, 2, 3].into())).unwrap_err();
        assert!(matches!(err, FirewallError::MissingParameter { .. }));
    }

    #[test]
    fn test_shape_mismatch() {
        let err = check("SELECT :a, :b", Some(vec![1i64, 2].into())).unwrap_err();
        assert!(matches!(err, FirewallError::ParameterStyleMismatch { .. }));
        let mapping: Parameters = [("a", 1i64)].into_iter().collect();
        let err = check("SELECT ?, ?", Some(mapping)).unwrap_err();
        assert!(matches!(err, FirewallError::ParameterStyleMismatch { .. }));
    }

    #[test]
    fn test_extra_keys_tolerated() {
        let mapping: Parameters = [("a", 1i64), ("unused", 2)].into_iter().collect();
        assert!(check("SELECT :a", Some(mapping)).is_ok());
    }

    #[test]
    fn test_repeated_numeric_counts_one_slot() {
        assert!(check("SELECT $1, $1", Some(vec![7i64].into())).is_ok());
    }

    #[test]
    fn test_mixed_anonymous_uses_positional_key() {
        let mapping: Parameters = [("a", 1i64), ("param_1", 2)].into_iter().collect();
        assert!(check("SELECT :a, ?", Some(mapping)).is_ok());
        let mapping: Parameters = [("a", 1i64)].into_iter().collect();
        assert!(check("SELECT :a, ?", Some(mapping)).is_err());
    }
}
