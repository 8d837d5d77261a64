//! Statement processing and the immutable statement wrapper.
//!
//! [`SqlProcessor`] owns the caches and the pipeline and turns SQL text into
//! a [`ProcessedStatement`]. [`SqlStatement`] pairs SQL with call parameters
//! and compiles it for a driver:
//!
//! ```text
//! SqlStatement ──validate()──▶ ValidationResult
//!      │
//!      └──compile_as(style)──▶ CompiledStatement { sql, parameters, style, validation }
//! ```
//!
//! Every `with_*` method returns a new statement; the receiver is never
//! modified.

use std::sync::{Arc, OnceLock};

use compact_str::CompactString;
use indexmap::IndexMap;
use serde::Serialize;
use sqlparser::ast::Statement;
use tracing::debug;

use crate::{
    cache::BoundedCache,
    config::FirewallConfig,
    dialect::SqlDialect,
    error::FirewallResult,
    parameters::{
        ParamSource, ParameterConverter, ParameterInfo, ParameterStyle, ParameterTokenizer,
        ParameterValidator, ParameterValue, Parameters, dominant_style
    },
    pipeline::{AggregatedResults, ProcessingContext, StatementPipeline, TransformationRecord},
    tree::{parse_statements, render_statements},
    validation::ValidationResult
};

type CacheKey = (SqlDialect, String);

/// Result of running SQL text through extraction, parsing and the pipeline
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedStatement {
    /// SQL with canonical markers, re-rendered from the tree when a
    /// transformer rewrote it
    pub sql:             String,
    pub dialect:         SqlDialect,
    pub markers:         IndexMap<CompactString, ParamSource>,
    /// Placeholders as written by the caller
    pub placeholders:    Vec<ParameterInfo>,
    #[serde(skip)]
    pub statements:      Vec<Statement>,
    pub results:         AggregatedResults,
    pub transformations: Vec<TransformationRecord>
}

/// Shared entry point: caches, pipeline and configuration.
///
/// One processor is built per configuration and shared across threads
/// behind an [`Arc`].
#[derive(Debug)]
pub struct SqlProcessor {
    config:         Arc<FirewallConfig>,
    tokenizer:      ParameterTokenizer,
    validator:      ParameterValidator,
    converter:      ParameterConverter,
    pipeline:       StatementPipeline,
    parse_cache:    BoundedCache<CacheKey, Arc<Vec<Statement>>>,
    analysis_cache: BoundedCache<CacheKey, Arc<ProcessedStatement>>
}

impl SqlProcessor {
    /// Build a processor with the default pipeline for `config`
    pub fn new(config: FirewallConfig) -> FirewallResult<Self> {
        config.validate()?;
        let pipeline = StatementPipeline::from_config(&config)?;
        Ok(Self::with_pipeline(config, pipeline))
    }

    /// Build a processor around a custom pipeline
    pub fn with_pipeline(config: FirewallConfig, pipeline: StatementPipeline) -> Self {
        let cache = &config.cache;
        Self {
            tokenizer: ParameterTokenizer::new(cache.parameter_cache_size),
            validator: ParameterValidator,
            converter: ParameterConverter,
            parse_cache: BoundedCache::new("parse", cache.parse_cache_size),
            analysis_cache: BoundedCache::new("analysis", cache.analysis_cache_size),
            pipeline,
            config: Arc::new(config)
        }
    }

    pub fn config(&self) -> &FirewallConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &StatementPipeline {
        &self.pipeline
    }

    /// Wrap `sql` in a statement bound to this processor, using the
    /// configured dialect
    pub fn statement(self: &Arc<Self>, sql: impl Into<String>) -> SqlStatement {
        SqlStatement {
            processor:  Arc::clone(self),
            sql:        Arc::from(sql.into()),
            dialect:    self.config.processing.dialect,
            parameters: None,
            args:       Vec::new(),
            kwargs:     IndexMap::new(),
            processed:  OnceLock::new()
        }
    }

    /// Placeholders in `sql`, cached per dialect and text
    pub fn placeholders(&self, sql: &str, dialect: SqlDialect) -> Arc<[ParameterInfo]> {
        self.tokenizer.extract(sql, dialect)
    }

    /// Extract, canonicalize, parse and run the pipeline over `sql`.
    ///
    /// Results are cached per dialect and text. Parse errors are returned,
    /// component failures are recorded in the results.
    pub fn process(
        &self,
        sql: &str,
        dialect: SqlDialect
    ) -> FirewallResult<Arc<ProcessedStatement>> {
        let key = (dialect, sql.to_string());
        if let Some(hit) = self.analysis_cache.get(&key) {
            return Ok(hit);
        }
        debug!(%dialect, len = sql.len(), "processing statement");

        let placeholders = self.tokenizer.extract(sql, dialect);
        let canonical = self.converter.canonicalize(sql, &placeholders);
        let processing = &self.config.processing;

        let processed = if processing.enable_parsing {
            let statements = self.parse(&canonical.sql, dialect)?;
            let mut ctx = ProcessingContext::new(
                canonical.sql.as_str(),
                dialect,
                Arc::clone(&self.config),
                statements.as_ref().clone()
            )
            .with_parameters(placeholders.to_vec(), canonical.markers);
            let mut results = self.pipeline.run(&mut ctx)?;
            if !processing.enable_validation && !results.result.has_findings() {
                results.result = ValidationResult::skipped();
            }
            let sql = if ctx.transformations.is_empty() {
                canonical.sql
            } else {
                render_statements(&ctx.statements)
            };
            ProcessedStatement {
                sql,
                dialect,
                markers: ctx.markers,
                placeholders: ctx.parameters,
                statements: ctx.statements,
                results,
                transformations: ctx.transformations
            }
        } else {
            ProcessedStatement {
                sql: canonical.sql,
                dialect,
                markers: canonical.markers,
                placeholders: placeholders.to_vec(),
                statements: Vec::new(),
                results: AggregatedResults::skipped(),
                transformations: Vec::new()
            }
        };

        let processed = Arc::new(processed);
        self.analysis_cache.insert(key, Arc::clone(&processed));
        Ok(processed)
    }

    fn parse(&self, sql: &str, dialect: SqlDialect) -> FirewallResult<Arc<Vec<Statement>>> {
        let key = (dialect, sql.to_string());
        if let Some(hit) = self.parse_cache.get(&key) {
            return Ok(hit);
        }
        debug!(%dialect, "parse cache miss");
        let statements = Arc::new(parse_statements(sql, dialect)?);
        self.parse_cache.insert(key, Arc::clone(&statements));
        Ok(statements)
    }

    /// Entry counts of the extraction, parse and analysis caches
    pub fn cache_sizes(&self) -> (usize, usize, usize) {
        (
            self.tokenizer.cached_entries(),
            self.parse_cache.len(),
            self.analysis_cache.len()
        )
    }

    pub fn clear_caches(&self) {
        self.parse_cache.clear();
        self.analysis_cache.clear();
    }
}

/// SQL plus call parameters, bound to a processor.
///
/// Processing runs at most once per statement and is shared by clones.
/// Changing SQL or dialect produces a statement that processes afresh;
/// changing parameters keeps the processed tree.
#[derive(Debug, Clone)]
pub struct SqlStatement {
    processor:  Arc<SqlProcessor>,
    sql:        Arc<str>,
    dialect:    SqlDialect,
    parameters: Option<Parameters>,
    args:       Vec<ParameterValue>,
    kwargs:     IndexMap<String, ParameterValue>,
    processed:  OnceLock<Arc<ProcessedStatement>>
}

impl SqlStatement {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    #[must_use]
    pub fn with_sql(&self, sql: impl Into<String>) -> Self {
        Self {
            sql: Arc::from(sql.into()),
            processed: OnceLock::new(),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_dialect(&self, dialect: SqlDialect) -> Self {
        Self {
            dialect,
            processed: OnceLock::new(),
            ..self.clone()
        }
    }

    /// Replace the explicit parameters
    #[must_use]
    pub fn with_parameters(&self, parameters: impl Into<Parameters>) -> Self {
        Self {
            parameters: Some(parameters.into()),
            ..self.clone()
        }
    }

    /// Replace the positional call arguments
    #[must_use]
    pub fn with_args<I, V>(&self, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParameterValue>
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ..self.clone()
        }
    }

    /// Add keyword call arguments; later values win
    #[must_use]
    pub fn with_kwargs<I, K, V>(&self, kwargs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ParameterValue>
    {
        let mut merged = self.kwargs.clone();
        merged.extend(kwargs.into_iter().map(|(k, v)| (k.into(), v.into())));
        Self {
            kwargs: merged,
            ..self.clone()
        }
    }

    /// Parameters after merging explicit values, args and kwargs
    pub fn parameters(&self) -> Option<Parameters> {
        self.processor
            .converter
            .merge(self.parameters.clone(), self.args.clone(), self.kwargs.clone())
    }

    /// Placeholders found in the SQL
    pub fn placeholders(&self) -> Arc<[ParameterInfo]> {
        self.processor.placeholders(&self.sql, self.dialect)
    }

    /// Dominant placeholder style of the SQL
    pub fn style(&self) -> ParameterStyle {
        dominant_style(&self.placeholders())
    }

    /// Processed form, computed on first use
    pub fn processed(&self) -> FirewallResult<&ProcessedStatement> {
        if let Some(processed) = self.processed.get() {
            return Ok(processed.as_ref());
        }
        let processed = self.processor.process(&self.sql, self.dialect)?;
        Ok(self.processed.get_or_init(|| processed).as_ref())
    }

    /// Parsed tree, possibly rewritten by transformers
    pub fn statements(&self) -> FirewallResult<&[Statement]> {
        Ok(self.processed()?.statements.as_slice())
    }

    /// Check parameters, run the pipeline and apply strict mode.
    ///
    /// # Errors
    ///
    /// - Parameter errors whenever values do not fit the placeholders
    /// - `Parsing` when the SQL does not parse
    /// - `Validation` in strict mode at or above `strict_min_risk`
    pub fn validate(&self) -> FirewallResult<ValidationResult> {
        let placeholders = self.placeholders();
        let parameters = self.parameters();
        self.processor
            .validator
            .validate(&self.sql, &placeholders, parameters.as_ref())?;
        let processed = self.processed()?;
        processed
            .results
            .enforce(&self.sql, &self.processor.config.processing)?;
        Ok(processed.results.result.clone())
    }

    /// Compile for the caller's own placeholder style.
    ///
    /// SQL without placeholders keeps style `None` unless a transformer
    /// introduced markers, in which case the dialect's default style is used.
    pub fn compile(&self) -> FirewallResult<CompiledStatement> {
        let style = match self.style() {
            ParameterStyle::None if !self.processed()?.markers.is_empty() => {
                self.dialect.default_parameter_style()
            }
            style => style
        };
        self.compile_as(style)
    }

    /// Validate and render for `style`
    pub fn compile_as(&self, style: ParameterStyle) -> FirewallResult<CompiledStatement> {
        let validation = self.validate()?;
        let processed = self.processed()?;
        let parameters = self.parameters();
        let rendered = self.processor.converter.render(
            &processed.sql,
            &processed.markers,
            parameters.as_ref(),
            style,
            self.dialect
        )?;
        Ok(CompiledStatement {
            sql: rendered.sql,
            parameters: rendered.parameters,
            style: rendered.style,
            validation
        })
    }
}

/// Driver-ready output of [`SqlStatement::compile_as`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledStatement {
    pub sql:        String,
    pub parameters: Option<Parameters>,
    pub style:      ParameterStyle,
    pub validation: ValidationResult
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::RiskLevel;

    fn processor(config: FirewallConfig) -> Arc<SqlProcessor> {
        Arc::new(SqlProcessor::new(config).unwrap())
    }

    #[test]
    fn test_with_methods_return_new_values() {
        let processor = processor(FirewallConfig::default());
        let base = processor.statement("SELECT * FROM t WHERE id = ?");
        let bound = base.with_args([1i64]);
        assert!(base.parameters().is_none());
        assert_eq!(bound.parameters(), Some(vec![1i64].into()));
        let other = bound.with_sql("SELECT 1");
        assert_eq!(bound.sql(), "SELECT * FROM t WHERE id = ?");
        assert_eq!(other.sql(), "SELECT 1");
    }

    #[test]
    fn test_processing_is_cached() {
        let processor = processor(FirewallConfig::default());
        let a = processor.process("SELECT 1", SqlDialect::Generic).unwrap();
        let b = processor.process("SELECT 1", SqlDialect::Generic).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(processor.cache_sizes().2, 1);
    }

    #[test]
    fn test_parsing_disabled_skips() {
        let mut config = FirewallConfig::default();
        config.processing.enable_parsing = false;
        let processor = processor(config);
        let result = processor.statement("DELETE FROM users").validate().unwrap();
        assert_eq!(result.risk_level, RiskLevel::Skip);
    }

    #[test]
    fn test_strict_mode_raises() {
        let mut config = FirewallConfig::default();
        config.processing.strict_mode = true;
        let processor = processor(config);
        let err = processor.statement("DELETE FROM users").validate().unwrap_err();
        assert_eq!(err.risk_level(), Some(RiskLevel::High));
    }

    #[test]
    fn test_compile_parameterized_literals_uses_dialect_style() {
        let mut config = FirewallConfig::default();
        config.processing.enable_transformations = true;
        config.processing.parameterize_literals = true;
        let processor = processor(config);
        let compiled = processor
            .statement("SELECT * FROM users WHERE id = 42")
            .with_dialect(SqlDialect::PostgreSQL)
            .compile()
            .unwrap();
        assert_eq!(compiled.sql, "SELECT * FROM users WHERE id = $1");
        assert_eq!(compiled.parameters, Some(vec![42i64].into()));
        assert_eq!(compiled.style, ParameterStyle::Numeric);
    }

    #[test]
    fn test_kwargs_merge_with_mapping() {
        let processor = processor(FirewallConfig::default());
        let compiled = processor
            .statement("SELECT * FROM t WHERE a = :a AND b = :b")
            .with_parameters([("a", 1i64)].into_iter().collect::<Parameters>())
            .with_kwargs([("b", 2i64)])
            .compile_as(ParameterStyle::NamedAt)
            .unwrap();
        assert_eq!(compiled.sql, "SELECT * FROM t WHERE a = @a AND b = @b");
        let expected: Parameters = [("a", 1i64), ("b", 2)].into_iter().collect();
        assert_eq!(compiled.parameters, Some(expected));
    }
}
