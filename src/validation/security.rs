use std::{ops::ControlFlow, sync::LazyLock};

use compact_str::CompactString;
use indexmap::IndexSet;
use regex::Regex;
use sqlparser::ast::{Expr, visit_expressions};

use super::{IssueKind, RiskLevel, SecurityIssue};
use crate::{
    config::SecurityConfig,
    error::FirewallResult,
    parameters::mask_literals,
    pipeline::{ProcessingContext, Processor, ProcessorKind}
};

static OBFUSCATION_PATTERNS: LazyLock<Vec<(Regex, &'static str, &'static str)>> =
    LazyLock::new(|| {
        vec![
            (
                Regex::new(r"0x[0-9a-fA-F]{10,}").expect("valid regex"),
                "hex-encoded-string",
                "long hex-encoded string"
            ),
            (
                Regex::new(r"(?i)CHAR\s*\(\s*\d+\s*\)(\s*(\+|\|\|)\s*CHAR\s*\(\s*\d+\s*\)){3,}")
                    .expect("valid regex"),
                "char-obfuscation",
                "chain of CHAR() calls building a string"
            ),
            (
                Regex::new(r"(?i)\bWAITFOR\s+DELAY\b").expect("valid regex"),
                "time-delay",
                "WAITFOR DELAY time-based probe"
            ),
        ]
    });

/// Flags dangerous functions, file/OS access and co-occurring attack signals.
///
/// Runs after the tautology and injection validators so their findings
/// count towards the combined-attack indicator total.
#[derive(Debug, Clone)]
pub struct SecurityValidator {
    functions:     IndexSet<CompactString>,
    file_keywords: Vec<String>
}

impl SecurityValidator {
    pub fn new(config: &SecurityConfig) -> Self {
        Self {
            functions:     config
                .dangerous_functions
                .iter()
                .map(|f| CompactString::from(f.to_lowercase()))
                .collect(),
            file_keywords: config
                .file_keywords
                .iter()
                .map(|k| normalize_whitespace(&k.to_lowercase()))
                .collect()
        }
    }

    fn is_dangerous(&self, name: &str) -> bool {
        let name = name.to_lowercase().replace(['"', '`', '[', ']'], "");
        let last = name.rsplit('.').next().unwrap_or(&name);
        self.functions.contains(name.as_str()) || self.functions.contains(last)
    }
}

impl Processor for SecurityValidator {
    fn name(&self) -> &'static str {
        "security"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Validator
    }

    fn process(&self, ctx: &mut ProcessingContext) -> FirewallResult<()> {
        let mut issues = Vec::new();

        let mut called: IndexSet<String> = IndexSet::new();
        for statement in &ctx.statements {
            let _ = visit_expressions(statement, |expr| {
                if let Expr::Function(func) = expr {
                    let name = func.name.to_string();
                    if self.is_dangerous(&name) {
                        called.insert(name.to_lowercase());
                    }
                }
                ControlFlow::<()>::Continue(())
            });
        }
        for name in called {
            issues.push(
                SecurityIssue::new(
                    IssueKind::SuspiciousKeyword,
                    RiskLevel::High,
                    "dangerous-function",
                    format!("Call to dangerous function {}()", name)
                )
                .with_node("Function")
                .with_confidence(0.9)
                .with_meta("function", name)
            );
        }

        let masked = mask_literals(&ctx.sql, ctx.dialect);
        let normalized = normalize_whitespace(&masked.to_lowercase());
        for keyword in &self.file_keywords {
            if normalized.contains(keyword.as_str()) {
                issues.push(
                    SecurityIssue::new(
                        IssueKind::SuspiciousKeyword,
                        RiskLevel::High,
                        "file-access",
                        format!("File or OS access keyword '{}'", keyword.to_uppercase())
                    )
                    .with_confidence(0.9)
                    .with_meta("keyword", keyword.clone())
                );
            }
        }
        for (regex, pattern, label) in OBFUSCATION_PATTERNS.iter() {
            if regex.is_match(&masked) {
                issues.push(
                    SecurityIssue::new(
                        IssueKind::SuspiciousKeyword,
                        RiskLevel::Medium,
                        *pattern,
                        format!("Obfuscated payload: {}", label)
                    )
                    .with_confidence(0.7)
                );
            }
        }

        let mut indicators: IndexSet<&'static str> =
            ctx.issues().iter().filter_map(indicator).collect();
        indicators.extend(issues.iter().filter_map(indicator));
        let threshold = ctx.config.security.combined_threshold;
        if threshold > 0 && indicators.len() >= threshold {
            let list = indicators.iter().copied().collect::<Vec<_>>().join(", ");
            issues.push(
                SecurityIssue::new(
                    IssueKind::CombinedAttack,
                    RiskLevel::Critical,
                    "combined-attack",
                    format!(
                        "{} independent attack indicators in one statement: {}",
                        indicators.len(),
                        list
                    )
                )
                .with_confidence(0.9)
                .with_meta("indicators", list)
            );
        }

        for issue in issues {
            ctx.add_issue(issue);
        }
        Ok(())
    }
}

/// Attack family an issue belongs to, for co-occurrence counting
fn indicator(issue: &SecurityIssue) -> Option<&'static str> {
    match issue.kind {
        IssueKind::Tautology => Some("tautology"),
        IssueKind::SuspiciousKeyword => Some("suspicious-keyword"),
        IssueKind::Injection | IssueKind::StructuralAttack => match issue.pattern.as_str() {
            p if p.starts_with("union") || p == "excessive-union" => Some("union"),
            "comment-syntax" => Some("comment"),
            "stacked-statements" => Some("stacked-statements"),
            "system-schema-access" => Some("system-schema"),
            "literal-subquery" => Some("literal-subquery"),
            _ => Some("injection-pattern")
        },
        _ => None
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
