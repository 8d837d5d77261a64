use std::sync::Arc;

use sql_firewall::{
    config::FirewallConfig,
    dialect::SqlDialect,
    error::{FirewallResult, config_error},
    pipeline::{ProcessingContext, Processor, ProcessorKind, StatementPipeline},
    statement::SqlProcessor,
    tree::parse_statements,
    validation::{IssueKind, RiskLevel, SecurityIssue, TautologyValidator}
};

fn processor() -> SqlProcessor {
    SqlProcessor::new(FirewallConfig::default()).unwrap()
}

#[test]
fn test_default_pipeline_order() {
    let mut config = FirewallConfig::default();
    config.processing.enable_transformations = true;
    config.processing.parameterize_literals = true;
    let pipeline = StatementPipeline::from_config(&config).unwrap();
    assert_eq!(
        pipeline.component_names(),
        vec![
            "literal_parameterizer",
            "tautology",
            "injection",
            "security",
            "cartesian",
            "dml_safety",
            "complexity"
        ]
    );
}

#[test]
fn test_parsing_disabled_builds_empty_pipeline() {
    let mut config = FirewallConfig::default();
    config.processing.enable_parsing = false;
    assert!(StatementPipeline::from_config(&config).unwrap().is_empty());
}

#[test]
fn test_components_report_separately() {
    let processed = processor()
        .process("SELECT * FROM a, b WHERE 1 = 1", SqlDialect::Generic)
        .unwrap();
    let results = &processed.results;
    assert!(!results.is_safe());
    assert!(
        !results
            .component("tautology")
            .unwrap()
            .result
            .issues
            .is_empty()
    );
    assert!(
        !results
            .component("cartesian")
            .unwrap()
            .result
            .issues
            .is_empty()
    );
    assert!(results.component("dml_safety").unwrap().result.issues.is_empty());
    assert!(results.metadata.contains_key("complexity"));
}

#[test]
fn test_union_injection_is_flagged() {
    let processed = processor()
        .process(
            "SELECT id FROM users WHERE id = 1 UNION SELECT NULL, NULL, NULL",
            SqlDialect::Generic
        )
        .unwrap();
    let issues = &processed.results.result.issues;
    assert!(issues.iter().any(|i| i.kind == IssueKind::Injection));
}

#[test]
fn test_combined_attack_escalates_to_critical() {
    let processed = processor()
        .process(
            "SELECT * FROM users WHERE id = 1 OR 1 = 1 UNION SELECT NULL, NULL, NULL -- x",
            SqlDialect::MySQL
        )
        .unwrap();
    assert_eq!(processed.results.risk_level(), RiskLevel::Critical);
    assert!(
        processed
            .results
            .result
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::CombinedAttack)
    );
}

#[test]
fn test_min_confidence_discards_weak_findings() {
    let mut config = FirewallConfig::default();
    config.processing.min_confidence = 0.95;
    let processed = SqlProcessor::new(config)
        .unwrap()
        .process("SELECT * FROM t WHERE a = a", SqlDialect::Generic)
        .unwrap();
    assert!(processed.results.result.issues.is_empty());
}

struct Failing;

impl Processor for Failing {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Analyzer
    }

    fn process(&self, _ctx: &mut ProcessingContext) -> FirewallResult<()> {
        Err(config_error("broken component"))
    }
}

struct Flag;

impl Processor for Flag {
    fn name(&self) -> &'static str {
        "flag"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Validator
    }

    fn process(&self, ctx: &mut ProcessingContext) -> FirewallResult<()> {
        ctx.add_issue(SecurityIssue::new(
            IssueKind::AstAnomaly,
            RiskLevel::Low,
            "flag",
            "flagged"
        ));
        Ok(())
    }
}

#[test]
fn test_failed_component_does_not_stop_pipeline() {
    let pipeline = StatementPipeline::new().with(Failing).with(Flag);
    let sql = "SELECT 1";
    let mut ctx = ProcessingContext::new(
        sql,
        SqlDialect::Generic,
        Arc::new(FirewallConfig::default()),
        parse_statements(sql, SqlDialect::Generic).unwrap()
    );
    let results = pipeline.run(&mut ctx).unwrap();
    assert_eq!(results.failed_components, vec!["failing"]);
    assert_eq!(results.risk_level(), RiskLevel::Low);
    assert_eq!(results.components.len(), 2);
    assert_eq!(ctx.issues()[0].component.as_str(), "flag");
}

#[test]
fn test_custom_pipeline_processor() {
    let processor = SqlProcessor::with_pipeline(
        FirewallConfig::default(),
        StatementPipeline::new().with(TautologyValidator)
    );
    let processed = processor.process("DELETE FROM users", SqlDialect::Generic).unwrap();
    assert!(processed.results.is_safe());
    assert_eq!(processed.results.components.len(), 1);
}
