//! Sequential processing pipeline over one parsed tree.
//!
//! ```text
//! ┌────────────────┐     ┌───────────────────┐     ┌──────────────────┐
//! │ ProcessingCtx  │────▶│ StatementPipeline │────▶│ AggregatedResults│
//! └────────────────┘     └───────────────────┘     └──────────────────┘
//!                                  │
//!                 ┌────────────────┼────────────────┐
//!                 ▼                ▼                ▼
//!           transformers      validators        analyzers
//! ```
//!
//! Components run in order over a single [`ProcessingContext`]. A component
//! that fails is recorded and skipped; the tree a failed transformer was
//! rewriting is restored. Only fatal errors abort the run.

mod aggregator;
mod context;

use std::time::Instant;

pub use aggregator::{AggregatedResults, ComponentReport};
pub use context::{ProcessingContext, TransformationRecord};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    analysis::ComplexityAnalyzer,
    config::FirewallConfig,
    error::{FirewallResult, transformation_error},
    transform::LiteralParameterizer,
    validation::{
        CartesianValidator, DmlSafetyValidator, InjectionValidator, SecurityValidator,
        TautologyValidator
    }
};

/// Role of a component in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorKind {
    /// Rewrites the tree
    Transformer,
    /// Records blocking issues
    Validator,
    /// Records metrics and warnings
    Analyzer
}

/// A pipeline component.
///
/// Components are stateless between runs and must be `Send + Sync` so one
/// pipeline can serve many threads.
pub trait Processor: Send + Sync {
    /// Stable component name used in reports and logs
    fn name(&self) -> &'static str;

    fn kind(&self) -> ProcessorKind;

    /// Inspect or rewrite the context.
    ///
    /// Errors are recorded against the component. Errors for which
    /// [`FirewallError::is_fatal`](crate::error::FirewallError::is_fatal)
    /// holds abort the run.
    fn process(&self, ctx: &mut ProcessingContext) -> FirewallResult<()>;
}

/// Ordered list of components sharing one context per run
#[derive(Default)]
pub struct StatementPipeline {
    components: Vec<Box<dyn Processor>>
}

impl std::fmt::Debug for StatementPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementPipeline")
            .field("components", &self.component_names())
            .finish()
    }
}

impl StatementPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the default component set enabled by `config`
    ///
    /// # Notes
    ///
    /// - Transformers run first, then validators, then analyzers
    /// - Nothing is added when parsing is disabled
    pub fn from_config(config: &FirewallConfig) -> FirewallResult<Self> {
        let mut pipeline = Self::new();
        let processing = &config.processing;
        if !processing.enable_parsing {
            return Ok(pipeline);
        }
        if processing.enable_transformations && processing.parameterize_literals {
            pipeline.push(LiteralParameterizer);
        }
        if processing.enable_validation {
            if config.tautology.enabled {
                pipeline.push(TautologyValidator);
            }
            if config.injection.enabled {
                pipeline.push(InjectionValidator::new(&config.injection)?);
            }
            if config.security.enabled {
                pipeline.push(SecurityValidator::new(&config.security));
            }
            if config.cartesian.enabled {
                pipeline.push(CartesianValidator);
            }
            if config.dml.enabled {
                pipeline.push(DmlSafetyValidator);
            }
        }
        if processing.enable_analysis && config.complexity.enabled {
            pipeline.push(ComplexityAnalyzer);
        }
        Ok(pipeline)
    }

    pub fn push(&mut self, component: impl Processor + 'static) {
        self.components.push(Box::new(component));
    }

    #[must_use]
    pub fn with(mut self, component: impl Processor + 'static) -> Self {
        self.push(component);
        self
    }

    pub fn component_names(&self) -> Vec<&'static str> {
        self.components.iter().map(|c| c.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Run every component over `ctx`
    pub fn run(&self, ctx: &mut ProcessingContext) -> FirewallResult<AggregatedResults> {
        let mut results = AggregatedResults::default();
        for component in &self.components {
            let name = component.name();
            let kind = component.kind();
            ctx.enter(name);
            let counts = ctx.finding_counts();
            let snapshot =
                (kind == ProcessorKind::Transformer).then(|| ctx.statements.clone());
            let start = Instant::now();
            let outcome = component.process(ctx);
            let elapsed = start.elapsed();
            let error = match outcome {
                Ok(()) => None,
                Err(err) if err.is_fatal() => {
                    warn!(component = name, error = %err, "component failed fatally");
                    return Err(transformation_error(name, err.to_string(), &ctx.sql));
                }
                Err(err) => {
                    warn!(component = name, error = %err, "component failed, continuing");
                    if let Some(statements) = snapshot {
                        ctx.statements = statements;
                    }
                    Some(err.to_string())
                }
            };
            let component_result = ctx.findings_since(counts);
            debug!(
                component = name,
                elapsed_us = elapsed.as_micros() as u64,
                risk = %component_result.risk_level,
                "component finished"
            );
            results.record(name, kind, component_result, elapsed, error);
        }
        ctx.enter("");
        results.metadata = ctx.metadata.clone();
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        dialect::SqlDialect,
        error::{FirewallError, parse_error},
        tree::parse_statements,
        validation::{IssueKind, RiskLevel, SecurityIssue}
    };

    struct Flagger(RiskLevel);

    impl Processor for Flagger {
        fn name(&self) -> &'static str {
            "flagger"
        }

        fn kind(&self) -> ProcessorKind {
            ProcessorKind::Validator
        }

        fn process(&self, ctx: &mut ProcessingContext) -> FirewallResult<()> {
            ctx.add_issue(SecurityIssue::new(IssueKind::Injection, self.0, "flag", "flagged"));
            Ok(())
        }
    }

    struct Breaker {
        fatal: bool
    }

    impl Processor for Breaker {
        fn name(&self) -> &'static str {
            "breaker"
        }

        fn kind(&self) -> ProcessorKind {
            ProcessorKind::Transformer
        }

        fn process(&self, ctx: &mut ProcessingContext) -> FirewallResult<()> {
            ctx.statements.clear();
            if self.fatal {
                Err(parse_error("rewrite produced invalid SQL", &ctx.sql))
            } else {
                Err(crate::error::config_error("not configured"))
            }
        }
    }

    fn context(sql: &str) -> ProcessingContext {
        let statements = parse_statements(sql, SqlDialect::Generic).unwrap();
        ProcessingContext::new(
            sql,
            SqlDialect::Generic,
            Arc::new(FirewallConfig::default()),
            statements
        )
    }

    #[test]
    fn test_failed_transformer_restores_tree() {
        let pipeline = StatementPipeline::new()
            .with(Breaker {
                fatal: false
            })
            .with(Flagger(RiskLevel::Low));
        let mut ctx = context("SELECT 1");
        let results = pipeline.run(&mut ctx).unwrap();
        assert_eq!(ctx.statements.len(), 1);
        assert_eq!(results.failed_components, vec!["breaker"]);
        assert_eq!(results.risk_level(), RiskLevel::Low);
        assert_eq!(results.components.len(), 2);
    }

    #[test]
    fn test_fatal_error_aborts() {
        let pipeline = StatementPipeline::new()
            .with(Breaker {
                fatal: true
            })
            .with(Flagger(RiskLevel::Low));
        let mut ctx = context("SELECT 1");
        let err = pipeline.run(&mut ctx).unwrap_err();
        assert!(matches!(err, FirewallError::Transformation { .. }));
    }

    #[test]
    fn test_per_component_results() {
        let pipeline = StatementPipeline::new()
            .with(Flagger(RiskLevel::Medium))
            .with(Flagger(RiskLevel::Critical));
        let mut ctx = context("SELECT 1");
        let results = pipeline.run(&mut ctx).unwrap();
        assert_eq!(results.components[0].result.risk_level, RiskLevel::Medium);
        assert_eq!(results.components[1].result.risk_level, RiskLevel::Critical);
        assert_eq!(results.risk_level(), RiskLevel::Critical);
        assert_eq!(results.result.issues.len(), 2);
    }

    #[test]
    fn test_from_config_respects_switches() {
        let mut config = FirewallConfig::default();
        let names = StatementPipeline::from_config(&config).unwrap().component_names();
        assert!(names.contains(&"tautology"));
        assert!(names.contains(&"complexity"));
        assert!(!names.contains(&"literal_parameterizer"));

        config.processing.enable_transformations = true;
        config.processing.parameterize_literals = true;
        config.processing.enable_validation = false;
        let names = StatementPipeline::from_config(&config).unwrap().component_names();
        assert_eq!(names, vec!["literal_parameterizer", "complexity"]);

        config.processing.enable_parsing = false;
        assert!(StatementPipeline::from_config(&config).unwrap().is_empty());
    }
}
