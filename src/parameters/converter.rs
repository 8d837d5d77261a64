//! Parameter merging and placeholder rewriting.
//!
//! SQL flows through two textual rewrites:
//!
//! ```text
//! caller SQL ──canonicalize──▶ :__param_0 … :__param_N ──render(style)──▶ driver SQL
//! ```
//!
//! Canonical markers are the only syntax the parser sees. Each marker is
//! bound to a [`ParamSource`] so values can be resolved regardless of the
//! style the caller wrote or the style the driver wants.

use compact_str::{CompactString, format_compact};
use indexmap::{IndexMap, map::Entry};
use serde::Serialize;

use super::{ParameterInfo, ParameterStyle, ParameterValue, Parameters, tokenize, validator};
use crate::{
    dialect::SqlDialect,
    error::{FirewallResult, missing_parameter_error, style_mismatch_error}
};

/// Name prefix of canonical markers (`:__param_0`)
pub const MARKER_PREFIX: &str = "__param_";

/// Where a canonical marker takes its value from
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamSource {
    /// Named placeholder in the caller's SQL
    Named(CompactString),
    /// Anonymous or indexed placeholder
    Positional { slot: usize, ordinal: usize },
    /// Literal lifted out of the SQL by a transformer
    Literal(ParameterValue)
}

impl ParamSource {
    fn from_info(info: &ParameterInfo) -> Self {
        match (&info.name, info.style.is_named()) {
            (Some(name), true) => Self::Named(name.clone()),
            _ => Self::Positional {
                slot:    info.index().unwrap_or(info.ordinal),
                ordinal: info.ordinal
            }
        }
    }
}

/// SQL rewritten to canonical markers plus the marker bindings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalSql {
    pub sql:     String,
    /// Marker name (without colon) to value source, in marker order
    pub markers: IndexMap<CompactString, ParamSource>
}

/// Driver-ready SQL and parameters in one placeholder style
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedSql {
    pub sql:        String,
    pub parameters: Option<Parameters>,
    pub style:      ParameterStyle
}

/// Canonical marker name for an index
pub fn marker_name(index: usize) -> CompactString {
    format_compact!("{}{}", MARKER_PREFIX, index)
}

/// Merges call sources and rewrites placeholders
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterConverter;

impl ParameterConverter {
    /// Merge explicit parameters, positional args and keyword args.
    ///
    /// - kwargs with mapping parameters: shallow merge, kwargs win
    /// - kwargs with anything else: kwargs alone
    /// - only args: a sequence
    /// - otherwise: parameters unchanged
    pub fn merge(
        &self,
        parameters: Option<Parameters>,
        args: Vec<ParameterValue>,
        kwargs: IndexMap<String, ParameterValue>
    ) -> Option<Parameters> {
        if !kwargs.is_empty() {
            return match parameters {
                Some(Parameters::Mapping(mut base)) => {
                    base.extend(kwargs);
                    Some(Parameters::Mapping(base))
                }
                _ => Some(Parameters::Mapping(kwargs))
            };
        }
        if parameters.is_none() && !args.is_empty() {
            return Some(Parameters::Sequence(args));
        }
        parameters
    }

    /// Rewrite every placeholder into a unique canonical marker in one pass
    pub fn canonicalize(&self, sql: &str, params: &[ParameterInfo]) -> CanonicalSql {
        let mut out = String::with_capacity(sql.len() + params.len() * 8);
        let mut markers = IndexMap::with_capacity(params.len());
        let mut last = 0;
        for (index, info) in params.iter().enumerate() {
            let span = info.span();
            out.push_str(&sql[last..span.start]);
            let name = marker_name(index);
            out.push(':');
            out.push_str(&name);
            markers.insert(name, ParamSource::from_info(info));
            last = span.end;
        }
        out.push_str(&sql[last..]);
        CanonicalSql {
            sql: out,
            markers
        }
    }

    /// Substitute canonical markers with `style` and resolve their values.
    ///
    /// Named targets keep caller names; anonymous sources become
    /// `param_<N>`. Indexed targets keep the caller's slot numbers when
    /// every marker is positional and the slots are gap-free, otherwise
    /// distinct sources are numbered by first appearance. `Static` inlines
    /// values as SQL literals.
    pub fn render(
        &self,
        canonical_sql: &str,
        markers: &IndexMap<CompactString, ParamSource>,
        supplied: Option<&Parameters>,
        style: ParameterStyle,
        dialect: SqlDialect
    ) -> FirewallResult<RenderedSql> {
        let occurrences: Vec<ParameterInfo> = tokenize(canonical_sql, dialect)
            .into_iter()
            .filter(|p| {
                p.style == ParameterStyle::NamedColon
                    && p.name.as_deref().is_some_and(|n| markers.contains_key(n))
            })
            .collect();
        if occurrences.is_empty() {
            return Ok(RenderedSql {
                sql: canonical_sql.to_string(),
                parameters: None,
                style
            });
        }
        if style == ParameterStyle::None {
            return Err(style_mismatch_error(
                "cannot render placeholders with style 'none'",
                canonical_sql
            ));
        }
        let single = markers.len() == 1;
        let mut out = String::with_capacity(canonical_sql.len());
        let mut sequence = Vec::new();
        let mut mapping = IndexMap::new();
        let mut numbering: IndexMap<CompactString, usize> = IndexMap::new();
        let fixed_slots = fixed_slot_count(markers);
        let mut slotted: Vec<Option<ParameterValue>> = vec![None; fixed_slots.unwrap_or(0)];
        let mut last = 0;
        for occurrence in &occurrences {
            let Some((marker_index, marker, source)) = occurrence
                .name
                .as_deref()
                .and_then(|n| markers.get_full(n))
            else {
                continue;
            };
            let value = resolve(source, supplied, single).ok_or_else(|| {
                missing_parameter_error(
                    format!("no value for placeholder {}", describe(source)),
                    canonical_sql
                )
            })?;
            let span = occurrence.span();
            out.push_str(&canonical_sql[last..span.start]);
            last = span.end;
            let key = source_key(marker, source);
            let name = binding_name(marker_index, source);
            match style {
                ParameterStyle::Qmark => {
                    out.push('?');
                    sequence.push(value);
                }
                ParameterStyle::PyformatPositional => {
                    out.push_str("%s");
                    sequence.push(value);
                }
                ParameterStyle::Numeric | ParameterStyle::PositionalColon => {
                    let number = match (fixed_slots, source) {
                        (Some(_), ParamSource::Positional { slot, .. }) => {
                            if slotted[*slot].is_none() {
                                slotted[*slot] = Some(value);
                            }
                            slot + 1
                        }
                        _ => {
                            let next = numbering.len() + 1;
                            match numbering.entry(key) {
                                Entry::Occupied(e) => *e.get(),
                                Entry::Vacant(e) => {
                                    sequence.push(value);
                                    *e.insert(next)
                                }
                            }
                        }
                    };
                    let sigil = if style == ParameterStyle::Numeric { '$' } else { ':' };
                    out.push(sigil);
                    out.push_str(&number.to_string());
                }
                ParameterStyle::NamedColon => {
                    out.push(':');
                    out.push_str(&name);
                    mapping.entry(name.to_string()).or_insert(value);
                }
                ParameterStyle::NamedAt => {
                    out.push('@');
                    out.push_str(&name);
                    mapping.entry(name.to_string()).or_insert(value);
                }
                ParameterStyle::NamedDollar => {
                    out.push('$');
                    out.push_str(&name);
                    mapping.entry(name.to_string()).or_insert(value);
                }
                ParameterStyle::PyformatNamed => {
                    out.push_str("%(");
                    out.push_str(&name);
                    out.push_str(")s");
                    mapping.entry(name.to_string()).or_insert(value);
                }
                ParameterStyle::Static | ParameterStyle::None => {
                    let literal = value.inline_literal(dialect).ok_or_else(|| {
                        style_mismatch_error(
                            format!("value {:?} has no SQL literal form", value),
                            canonical_sql
                        )
                    })?;
                    out.push_str(&literal);
                }
            }
        }
        out.push_str(&canonical_sql[last..]);
        if slotted.iter().any(Option::is_some) {
            sequence = slotted.into_iter().flatten().collect();
        }
        let parameters = if style.is_positional() {
            Some(Parameters::Sequence(sequence))
        } else if style.is_named() {
            Some(Parameters::Mapping(mapping))
        } else {
            None
        };
        Ok(RenderedSql {
            sql: out,
            parameters,
            style
        })
    }
}

fn resolve(
    source: &ParamSource,
    supplied: Option<&Parameters>,
    single: bool
) -> Option<ParameterValue> {
    match (source, supplied) {
        (ParamSource::Literal(value), _) => Some(value.clone()),
        (_, Some(Parameters::Scalar(value))) if single => Some(value.clone()),
        (ParamSource::Named(name), Some(Parameters::Mapping(map))) => map.get(name.as_str()).cloned(),
        (ParamSource::Positional { slot, .. }, Some(Parameters::Sequence(values))) => {
            values.get(*slot).cloned()
        }
        (ParamSource::Positional { ordinal, .. }, Some(Parameters::Mapping(map))) => {
            map.get(&validator::positional_key(*ordinal)).cloned()
        }
        _ => None
    }
}

/// Number of slots when every marker is positional and the slots cover
/// `0..n` exactly
fn fixed_slot_count(markers: &IndexMap<CompactString, ParamSource>) -> Option<usize> {
    let mut slots = Vec::with_capacity(markers.len());
    for source in markers.values() {
        match source {
            ParamSource::Positional { slot, .. } => slots.push(*slot),
            _ => return None
        }
    }
    slots.sort_unstable();
    slots.dedup();
    slots
        .iter()
        .enumerate()
        .all(|(i, slot)| i == *slot)
        .then_some(slots.len())
}

/// Identity used to share one number between repeated references
fn source_key(marker: &CompactString, source: &ParamSource) -> CompactString {
    match source {
        ParamSource::Named(name) => format_compact!("name:{}", name),
        ParamSource::Positional { slot, .. } => format_compact!("slot:{}", slot),
        ParamSource::Literal(_) => format_compact!("marker:{}", marker)
    }
}

fn binding_name(marker_index: usize, source: &ParamSource) -> CompactString {
    match source {
        ParamSource::Named(name) => name.clone(),
        ParamSource::Positional { .. } | ParamSource::Literal(_) => {
            format_compact!("param_{}", marker_index)
        }
    }
}

fn describe(source: &ParamSource) -> String {
    match source {
        ParamSource::Named(name) => format!("'{}'", name),
        ParamSource::Positional { slot, .. } => format!("at position {}", slot + 1),
        ParamSource::Literal(value) => format!("literal {}", value)
    }
}
