use std::sync::Arc;

use compact_str::CompactString;
use indexmap::IndexMap;
use serde::Serialize;
use sqlparser::ast::Statement;
use tracing::debug;

use crate::{
    config::FirewallConfig,
    dialect::SqlDialect,
    parameters::{ParamSource, ParameterInfo, marker_name},
    validation::{RiskLevel, SecurityIssue, ValidationResult}
};

/// A tree rewrite performed by a transformer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformationRecord {
    pub component:   CompactString,
    pub description: String
}

/// State threaded through one pipeline run.
///
/// Processors never talk to each other directly; transformers replace
/// `statements`, validators and analyzers append findings.
#[derive(Debug, Clone)]
pub struct ProcessingContext {
    /// Canonical SQL the tree was parsed from
    pub sql:             String,
    pub dialect:         SqlDialect,
    pub config:          Arc<FirewallConfig>,
    pub statements:      Vec<Statement>,
    /// Placeholders found in the caller's SQL
    pub parameters:      Vec<ParameterInfo>,
    /// Canonical marker bindings, extended by transformers
    pub markers:         IndexMap<CompactString, ParamSource>,
    pub transformations: Vec<TransformationRecord>,
    pub metadata:        IndexMap<String, serde_json::Value>,
    issues:              Vec<SecurityIssue>,
    warnings:            Vec<SecurityIssue>,
    component:           CompactString
}

impl ProcessingContext {
    pub fn new(
        sql: impl Into<String>,
        dialect: SqlDialect,
        config: Arc<FirewallConfig>,
        statements: Vec<Statement>
    ) -> Self {
        Self {
            sql: sql.into(),
            dialect,
            config,
            statements,
            parameters: Vec::new(),
            markers: IndexMap::new(),
            transformations: Vec::new(),
            metadata: IndexMap::new(),
            issues: Vec::new(),
            warnings: Vec::new(),
            component: CompactString::default()
        }
    }

    #[must_use]
    pub fn with_parameters(
        mut self,
        parameters: Vec<ParameterInfo>,
        markers: IndexMap<CompactString, ParamSource>
    ) -> Self {
        self.parameters = parameters;
        self.markers = markers;
        self
    }

    /// Name of the component currently running
    pub fn component(&self) -> &str {
        &self.component
    }

    pub(crate) fn enter(&mut self, component: &str) {
        self.component = component.into();
    }

    /// Record a blocking finding; drops it below the confidence threshold
    pub fn add_issue(&mut self, issue: SecurityIssue) {
        if let Some(issue) = self.accept(issue) {
            self.issues.push(issue);
        }
    }

    /// Record a non-blocking finding; drops it below the confidence threshold
    pub fn add_warning(&mut self, warning: SecurityIssue) {
        if let Some(warning) = self.accept(warning) {
            self.warnings.push(warning);
        }
    }

    fn accept(&self, mut issue: SecurityIssue) -> Option<SecurityIssue> {
        if issue.confidence < self.config.processing.min_confidence {
            debug!(
                component = %self.component,
                pattern = %issue.pattern,
                confidence = issue.confidence,
                "discarding low-confidence finding"
            );
            return None;
        }
        issue.component = self.component.clone();
        Some(issue)
    }

    pub fn issues(&self) -> &[SecurityIssue] {
        &self.issues
    }

    pub fn warnings(&self) -> &[SecurityIssue] {
        &self.warnings
    }

    /// Highest risk recorded so far
    pub fn risk_level(&self) -> RiskLevel {
        self.issues
            .iter()
            .chain(&self.warnings)
            .map(|i| i.risk_level)
            .fold(RiskLevel::Safe, RiskLevel::max)
    }

    /// Verdict over everything recorded so far
    pub fn validation_result(&self) -> ValidationResult {
        ValidationResult::from_findings(self.issues.clone(), self.warnings.clone())
    }

    /// Reserve the next canonical marker for `source`
    pub fn add_marker(&mut self, source: ParamSource) -> CompactString {
        let name = marker_name(self.markers.len());
        self.markers.insert(name.clone(), source);
        name
    }

    pub fn record_transformation(&mut self, description: impl Into<String>) {
        self.transformations.push(TransformationRecord {
            component:   self.component.clone(),
            description: description.into()
        });
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
    }

    pub(crate) fn finding_counts(&self) -> (usize, usize) {
        (self.issues.len(), self.warnings.len())
    }

    pub(crate) fn findings_since(&self, counts: (usize, usize)) -> ValidationResult {
        ValidationResult::from_findings(
            self.issues[counts.0..].to_vec(),
            self.warnings[counts.1..].to_vec()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::IssueKind;

    fn context(min_confidence: f32) -> ProcessingContext {
        let mut config = FirewallConfig::default();
        config.processing.min_confidence = min_confidence;
        ProcessingContext::new("SELECT 1", SqlDialect::Generic, Arc::new(config), Vec::new())
    }

    #[test]
    fn test_low_confidence_dropped() {
        let mut ctx = context(0.7);
        ctx.enter("injection");
        ctx.add_issue(
            SecurityIssue::new(IssueKind::Injection, RiskLevel::High, "weak", "weak signal")
                .with_confidence(0.4)
        );
        ctx.add_issue(SecurityIssue::new(
            IssueKind::Injection,
            RiskLevel::Medium,
            "strong",
            "strong signal"
        ));
        assert_eq!(ctx.issues().len(), 1);
        assert_eq!(ctx.issues()[0].component.as_str(), "injection");
        assert_eq!(ctx.risk_level(), RiskLevel::Medium);
    }

    #[test]
    fn test_findings_since() {
        let mut ctx = context(0.0);
        ctx.add_warning(SecurityIssue::new(IssueKind::Complexity, RiskLevel::Low, "a", "a"));
        let counts = ctx.finding_counts();
        ctx.add_issue(SecurityIssue::new(IssueKind::UnsafeDml, RiskLevel::High, "b", "b"));
        let since = ctx.findings_since(counts);
        assert_eq!(since.issues.len(), 1);
        assert!(since.warnings.is_empty());
        assert_eq!(ctx.validation_result().risk_level, RiskLevel::High);
    }

    #[test]
    fn test_add_marker_continues_numbering() {
        let mut ctx = context(0.0);
        ctx.markers.insert("__param_0".into(), ParamSource::Named("a".into()));
        let name = ctx.add_marker(ParamSource::Literal(5i64.into()));
        assert_eq!(name.as_str(), "__param_1");
    }
}
