use colored::Colorize;
use serde::Serialize;

use crate::{
    app::{PlaceholderReport, StatementOutcome, StatementReport},
    statement::CompiledStatement,
    validation::{RiskLevel, SecurityIssue}
};

/// Output format for results
#[derive(Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml
}

/// Output options
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format:  OutputFormat,
    pub colored: bool,
    pub verbose: bool
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            format:  OutputFormat::Text,
            colored: true,
            verbose: false
        }
    }
}

/// Check result for serialization
#[derive(Debug, Serialize)]
pub struct CheckReport<'a> {
    pub summary:    CheckSummary,
    pub statements: &'a [StatementReport]
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CheckSummary {
    pub total:      usize,
    pub failed:     usize,
    /// Highest risk among statements that produced a verdict
    pub risk_level: RiskLevel
}

impl CheckSummary {
    pub fn from_reports(reports: &[StatementReport]) -> Self {
        Self {
            total:      reports.len(),
            failed:     reports.iter().filter(|r| r.is_failed()).count(),
            risk_level: reports
                .iter()
                .filter_map(StatementReport::risk_level)
                .fold(RiskLevel::Skip, RiskLevel::max)
        }
    }
}

/// Format a check report based on output options
pub fn format_check_report(reports: &[StatementReport], opts: &OutputOptions) -> String {
    let report = CheckReport {
        summary:    CheckSummary::from_reports(reports),
        statements: reports
    };
    match opts.format {
        OutputFormat::Json => serde_json::to_string_pretty(&report).unwrap_or_default(),
        OutputFormat::Yaml => serde_yaml::to_string(&report).unwrap_or_default(),
        OutputFormat::Text => format_check_text(&report, opts)
    }
}

/// Format the placeholder listing based on output options
pub fn format_placeholders(report: &PlaceholderReport, opts: &OutputOptions) -> String {
    match opts.format {
        OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
        OutputFormat::Yaml => serde_yaml::to_string(report).unwrap_or_default(),
        OutputFormat::Text => format_placeholders_text(report, opts)
    }
}

fn format_check_text(report: &CheckReport<'_>, opts: &OutputOptions) -> String {
    let mut output = String::new();
    if opts.colored {
        output.push_str(&"=== SQL Firewall Report ===\n\n".bold().to_string());
    } else {
        output.push_str("=== SQL Firewall Report ===\n\n");
    }

    for statement in report.statements {
        let label = match &statement.outcome {
            StatementOutcome::Compiled {
                compiled, ..
            } => risk_label(compiled.validation.risk_level, opts),
            StatementOutcome::Failed {
                ..
            } => paint("FAILED", opts, |s| s.red().bold().to_string())
        };
        let header = format!("Statement #{}", statement.index);
        if opts.colored {
            output.push_str(&format!("{} [{}]\n", header.cyan().bold(), label));
        } else {
            output.push_str(&format!("{} [{}]\n", header, label));
        }
        output.push_str(&format!("  Input:      {}\n", statement.input));

        match &statement.outcome {
            StatementOutcome::Compiled {
                compiled,
                metadata
            } => {
                push_compiled(&mut output, compiled, opts);
                if opts.verbose
                    && let Some(complexity) = metadata.get("complexity")
                {
                    output.push_str(&format!(
                        "  Complexity: score {}\n",
                        complexity["score"].as_u64().unwrap_or_default()
                    ));
                }
            }
            StatementOutcome::Failed {
                error,
                issues,
                ..
            } => {
                output.push_str(&format!("  Error:      {}\n", error));
                push_issues(&mut output, "Issues", issues, opts);
            }
        }
        output.push('\n');
    }

    let summary = &report.summary;
    output.push_str(&format!(
        "Summary: {} statement(s), {} failed, highest risk {}\n",
        summary.total,
        summary.failed,
        risk_label(summary.risk_level, opts)
    ));
    output
}

fn push_compiled(output: &mut String, compiled: &CompiledStatement, opts: &OutputOptions) {
    output.push_str(&format!("  SQL:        {}\n", compiled.sql));
    output.push_str(&format!("  Style:      {}\n", compiled.style));
    if let Some(parameters) = &compiled.parameters {
        output.push_str(&format!(
            "  Parameters: {}\n",
            serde_json::to_string(parameters).unwrap_or_default()
        ));
    }
    push_issues(output, "Issues", &compiled.validation.issues, opts);
    if opts.verbose {
        push_issues(output, "Warnings", &compiled.validation.warnings, opts);
    }
}

fn push_issues(output: &mut String, title: &str, issues: &[SecurityIssue], opts: &OutputOptions) {
    if issues.is_empty() {
        return;
    }
    output.push_str(&format!("  {}:\n", title));
    for issue in issues {
        output.push_str(&format!(
            "    - [{}] {} ({}): {}\n",
            risk_label(issue.risk_level, opts),
            issue.kind,
            issue.pattern,
            issue.description
        ));
    }
}

fn format_placeholders_text(report: &PlaceholderReport, opts: &OutputOptions) -> String {
    let header = format!(
        "Placeholders ({} style, expects {}):",
        report.style, report.shape
    );
    let mut output = if opts.colored {
        header.cyan().bold().to_string()
    } else {
        header
    };
    output.push('\n');

    if report.placeholders.is_empty() {
        output.push_str("  none\n");
        return output;
    }
    for info in &report.placeholders {
        let name = info.name.as_deref().unwrap_or("-");
        output.push_str(&format!(
            "  #{} {} at {} (name: {})\n",
            info.ordinal, info.literal, info.position, name
        ));
    }
    output
}

fn risk_label(risk: RiskLevel, opts: &OutputOptions) -> String {
    let text = risk.to_string();
    match risk {
        RiskLevel::Skip | RiskLevel::Safe | RiskLevel::Low => {
            paint(&text, opts, |s| s.green().to_string())
        }
        RiskLevel::Medium => paint(&text, opts, |s| s.yellow().to_string()),
        RiskLevel::High | RiskLevel::Critical => paint(&text, opts, |s| s.red().bold().to_string())
    }
}

fn paint(text: &str, opts: &OutputOptions, style: impl Fn(&str) -> String) -> String {
    if opts.colored {
        style(text)
    } else {
        text.to_string()
    }
}
