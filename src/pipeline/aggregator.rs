use std::time::Duration;

use compact_str::CompactString;
use indexmap::IndexMap;
use serde::Serialize;

use super::ProcessorKind;
use crate::{
    config::ProcessingConfig,
    error::{FirewallError, FirewallResult, sql_excerpt},
    validation::{RiskLevel, ValidationResult}
};

/// Outcome of a single component run
#[derive(Debug, Clone, Serialize)]
pub struct ComponentReport {
    pub name:       CompactString,
    pub kind:       ProcessorKind,
    pub result:     ValidationResult,
    pub elapsed_us: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error:      Option<String>
}

/// Rolled-up outcome of a pipeline run.
///
/// Component results are appended, never replaced; the overall verdict is
/// the merge of every component's result.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedResults {
    pub result:            ValidationResult,
    pub components:        Vec<ComponentReport>,
    pub failed_components: Vec<CompactString>,
    pub metadata:          IndexMap<String, serde_json::Value>,
    pub total_us:          u64
}

impl Default for AggregatedResults {
    fn default() -> Self {
        Self {
            result:            ValidationResult::safe(),
            components:        Vec::new(),
            failed_components: Vec::new(),
            metadata:          IndexMap::new(),
            total_us:          0
        }
    }
}

impl AggregatedResults {
    /// Results for a run that did not validate anything
    pub fn skipped() -> Self {
        Self {
            result: ValidationResult::skipped(),
            ..Self::default()
        }
    }

    pub(crate) fn record(
        &mut self,
        name: &str,
        kind: ProcessorKind,
        result: ValidationResult,
        elapsed: Duration,
        error: Option<String>
    ) {
        if error.is_some() {
            self.failed_components.push(name.into());
        }
        self.result = std::mem::take(&mut self.result).merge(result.clone());
        self.total_us += duration_us(elapsed);
        self.components.push(ComponentReport {
            name: name.into(),
            kind,
            result,
            elapsed_us: duration_us(elapsed),
            error
        });
    }

    pub fn risk_level(&self) -> RiskLevel {
        self.result.risk_level
    }

    pub fn is_safe(&self) -> bool {
        self.result.is_safe
    }

    pub fn component(&self, name: &str) -> Option<&ComponentReport> {
        self.components.iter().find(|c| c.name.as_str() == name)
    }

    /// Raise when strict mode is on and the risk reaches the configured level
    pub fn enforce(&self, sql: &str, processing: &ProcessingConfig) -> FirewallResult<()> {
        if !processing.strict_mode || self.result.risk_level < processing.strict_min_risk {
            return Ok(());
        }
        tracing::warn!(
            risk = %self.result.risk_level,
            issues = self.result.issues.len(),
            "strict mode rejected statement"
        );
        Err(FirewallError::Validation {
            sql:        sql_excerpt(sql),
            summary:    self.result.summary(),
            risk_level: self.result.risk_level,
            issues:     self.result.issues.clone(),
            warnings:   self.result.warnings.clone()
        })
    }
}

fn duration_us(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{IssueKind, SecurityIssue};

    fn result(risk: RiskLevel) -> ValidationResult {
        ValidationResult::from_findings(
            vec![SecurityIssue::new(IssueKind::UnsafeDml, risk, "x", "x")],
            vec![]
        )
    }

    #[test]
    fn test_record_merges_and_keeps_history() {
        let mut agg = AggregatedResults::default();
        agg.record("a", ProcessorKind::Validator, result(RiskLevel::Low), Duration::ZERO, None);
        agg.record(
            "b",
            ProcessorKind::Validator,
            ValidationResult::safe(),
            Duration::from_micros(5),
            Some("boom".into())
        );
        agg.record("c", ProcessorKind::Validator, result(RiskLevel::High), Duration::ZERO, None);
        assert_eq!(agg.risk_level(), RiskLevel::High);
        assert!(!agg.is_safe());
        assert_eq!(agg.result.issues.len(), 2);
        assert_eq!(agg.failed_components, vec!["b"]);
        assert_eq!(agg.components.len(), 3);
        assert_eq!(agg.total_us, 5);
    }

    #[test]
    fn test_enforce_strict() {
        let mut agg = AggregatedResults::default();
        agg.record("a", ProcessorKind::Validator, result(RiskLevel::High), Duration::ZERO, None);
        let mut processing = ProcessingConfig::default();
        assert!(agg.enforce("DELETE FROM t", &processing).is_ok());
        processing.strict_mode = true;
        let err = agg.enforce("DELETE FROM t", &processing).unwrap_err();
        assert_eq!(err.risk_level(), Some(RiskLevel::High));
        processing.strict_min_risk = RiskLevel::Critical;
        assert!(agg.enforce("DELETE FROM t", &processing).is_ok());
    }

    #[test]
    fn test_skipped() {
        assert_eq!(AggregatedResults::skipped().risk_level(), RiskLevel::Skip);
    }
}
