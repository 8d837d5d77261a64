//! Type definitions shared by every validator.
//!
//! - [`RiskLevel`] - ordered severity, `Skip` through `Critical`
//! - [`IssueKind`] - category of a finding
//! - [`SecurityIssue`] - one finding with confidence and metadata
//! - [`ValidationResult`] - mergeable verdict for a statement

use std::{fmt, str::FromStr};

use compact_str::CompactString;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Severity of a finding.
///
/// Ordered from lowest to highest so `max` yields the escalated level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// Validation did not run
    Skip,
    /// Nothing found
    #[default]
    Safe,
    Low,
    Medium,
    High,
    Critical
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => write!(f, "SKIP"),
            Self::Safe => write!(f, "SAFE"),
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL")
        }
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "safe" => Ok(Self::Safe),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown risk level '{}'", other))
        }
    }
}

/// Category of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum IssueKind {
    Injection,
    Tautology,
    SuspiciousKeyword,
    CombinedAttack,
    AstAnomaly,
    StructuralAttack,
    CartesianProduct,
    ExcessiveJoins,
    UnsafeDml,
    BlockedDdl,
    Complexity
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Injection => "injection",
            Self::Tautology => "tautology",
            Self::SuspiciousKeyword => "suspicious-keyword",
            Self::CombinedAttack => "combined-attack",
            Self::AstAnomaly => "ast-anomaly",
            Self::StructuralAttack => "structural-attack",
            Self::CartesianProduct => "cartesian-product",
            Self::ExcessiveJoins => "excessive-joins",
            Self::UnsafeDml => "unsafe-dml",
            Self::BlockedDdl => "blocked-ddl",
            Self::Complexity => "complexity"
        };
        f.write_str(name)
    }
}

/// A single finding produced by a validator or analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityIssue {
    /// Category of the finding
    pub kind:        IssueKind,
    /// Severity contributed to the verdict
    pub risk_level:  RiskLevel,
    /// Human-readable description
    pub description: String,
    /// Identifier of the matched pattern (e.g. `union-null-padding`)
    pub pattern:     CompactString,
    /// Tree node type the finding is anchored to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type:   Option<CompactString>,
    /// Confidence in `[0, 1]`
    pub confidence:  f32,
    /// Component that produced the finding
    #[serde(default)]
    pub component:   CompactString,
    /// Extra context (tables involved, counts, ...)
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub metadata:    IndexMap<CompactString, String>
}

impl SecurityIssue {
    /// Create an issue with full confidence
    pub fn new(
        kind: IssueKind,
        risk_level: RiskLevel,
        pattern: impl Into<CompactString>,
        description: impl Into<String>
    ) -> Self {
        Self {
            kind,
            risk_level,
            description: description.into(),
            pattern: pattern.into(),
            node_type: None,
            confidence: 1.0,
            component: CompactString::default(),
            metadata: IndexMap::new()
        }
    }

    /// Set confidence, clamped to `[0, 1]`
    #[must_use]
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn with_node(mut self, node_type: impl Into<CompactString>) -> Self {
        self.node_type = Some(node_type.into());
        self
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<CompactString>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for SecurityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.risk_level, self.kind, self.description)
    }
}

/// Verdict for a statement or a single component.
///
/// Issues block, warnings do not. Both contribute to the risk level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_safe:    bool,
    pub risk_level: RiskLevel,
    pub issues:     Vec<SecurityIssue>,
    pub warnings:   Vec<SecurityIssue>
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::safe()
    }
}

impl ValidationResult {
    /// Result with no findings
    pub fn safe() -> Self {
        Self {
            is_safe:    true,
            risk_level: RiskLevel::Safe,
            issues:     Vec::new(),
            warnings:   Vec::new()
        }
    }

    /// Result for a statement that was not validated
    pub fn skipped() -> Self {
        Self {
            risk_level: RiskLevel::Skip,
            ..Self::safe()
        }
    }

    /// Build a result from findings, escalating risk to the highest one
    pub fn from_findings(issues: Vec<SecurityIssue>, warnings: Vec<SecurityIssue>) -> Self {
        let risk_level = issues
            .iter()
            .chain(warnings.iter())
            .map(|i| i.risk_level)
            .fold(RiskLevel::Safe, RiskLevel::max);
        Self {
            is_safe: issues.is_empty(),
            risk_level,
            issues,
            warnings
        }
    }

    /// Combine two results: union of findings, max risk, AND of safety
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.is_safe = self.is_safe && other.is_safe;
        self.risk_level = self.risk_level.max(other.risk_level);
        self.issues.extend(other.issues);
        self.warnings.extend(other.warnings);
        self
    }

    /// Whether any finding is present
    pub fn has_findings(&self) -> bool {
        !self.issues.is_empty() || !self.warnings.is_empty()
    }

    /// One-line summary of the blocking issues
    pub fn summary(&self) -> String {
        if self.issues.is_empty() {
            return format!("{} warning(s)", self.warnings.len());
        }
        self.issues
            .iter()
            .map(|i| i.description.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}
