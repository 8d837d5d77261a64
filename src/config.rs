//! Configuration loading and management.
//!
//! Configuration is loaded from multiple sources with the following precedence
//! (highest to lowest):
//!
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. `.sql-firewall.toml` in current directory
//! 4. `~/.config/sql-firewall/config.toml`
//! 5. Default values
//!
//! # Configuration File Format
//!
//! ```toml
//! [processing]
//! dialect = "postgresql"
//! strict_mode = true
//! strict_min_risk = "HIGH"
//! min_confidence = 0.5
//!
//! [cache]
//! parameter_cache_size = 1000
//!
//! [cartesian]
//! max_joins = 8
//! warn_joins = 4
//!
//! [injection]
//! allowed_schemas = ["information_schema"]
//! custom_patterns = ["(?i)\\bdbms_pipe\\b"]
//!
//! [dml]
//! allowed_ddl = ["CREATE"]
//! protected_tables = ["audit_log"]
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `SQL_FIREWALL_STRICT` | Raise on risky statements (`1`/`true`) |
//! | `SQL_FIREWALL_DIALECT` | Default SQL dialect |
//! | `SQL_FIREWALL_MAX_JOINS` | Maximum joins per SELECT |

use std::{
    env, fs,
    path::{Path, PathBuf}
};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    dialect::SqlDialect,
    error::{FirewallResult, config_error},
    validation::RiskLevel
};

/// Firewall configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirewallConfig {
    pub processing: ProcessingConfig,
    pub cache:      CacheConfig,
    pub tautology:  TautologyConfig,
    pub injection:  InjectionConfig,
    pub cartesian:  CartesianConfig,
    pub dml:        DmlConfig,
    pub security:   SecurityConfig,
    pub complexity: ComplexityConfig
}

/// Pipeline switches and strict-mode policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub dialect:                SqlDialect,
    pub enable_parsing:         bool,
    pub enable_validation:      bool,
    pub enable_analysis:        bool,
    pub enable_transformations: bool,
    /// Lift comparison literals into bound parameters
    pub parameterize_literals:  bool,
    pub strict_mode:            bool,
    /// Lowest risk that strict mode rejects
    pub strict_min_risk:        RiskLevel,
    /// Findings below this confidence are discarded
    pub min_confidence:         f32
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            dialect:                SqlDialect::Generic,
            enable_parsing:         true,
            enable_validation:      true,
            enable_analysis:        true,
            enable_transformations: false,
            parameterize_literals:  false,
            strict_mode:            false,
            strict_min_risk:        RiskLevel::High,
            min_confidence:         0.5
        }
    }
}

/// Maximum entries per cache; `0` disables a cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub parameter_cache_size: usize,
    pub parse_cache_size:     usize,
    pub analysis_cache_size:  usize
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            parameter_cache_size: 1000,
            parse_cache_size:     1000,
            analysis_cache_size:  1000
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TautologyConfig {
    pub enabled:      bool,
    pub risk_level:   RiskLevel,
    pub check_having: bool,
    pub check_joins:  bool
}

impl Default for TautologyConfig {
    fn default() -> Self {
        Self {
            enabled:      true,
            risk_level:   RiskLevel::Medium,
            check_having: true,
            check_joins:  true
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectionConfig {
    pub enabled:                   bool,
    pub risk_level:                RiskLevel,
    pub max_union_count:           usize,
    /// NULL columns in one UNION branch before it counts as padding
    pub max_null_padding:          usize,
    pub max_function_depth:        usize,
    pub max_function_args:         usize,
    pub detect_comments:           bool,
    pub allow_multiple_statements: bool,
    /// Schema or catalog qualifiers that mark a system relation
    pub system_schemas:            Vec<String>,
    /// Catalog tables flagged even without a qualifier
    pub system_tables:             Vec<String>,
    /// System schemas the application may legitimately read
    pub allowed_schemas:           Vec<String>,
    /// Extra regexes matched against the rendered SQL
    pub custom_patterns:           Vec<String>
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            enabled:                   true,
            risk_level:                RiskLevel::High,
            max_union_count:           3,
            max_null_padding:          5,
            max_function_depth:        5,
            max_function_args:         20,
            detect_comments:           true,
            allow_multiple_statements: false,
            system_schemas:            [
                "information_schema",
                "pg_catalog",
                "mysql",
                "performance_schema",
                "sys",
                "master"
            ]
            .map(String::from)
            .to_vec(),
            system_tables:             [
                "pg_shadow",
                "pg_authid",
                "pg_user",
                "sqlite_master",
                "sqlite_schema",
                "sysobjects",
                "syslogins"
            ]
            .map(String::from)
            .to_vec(),
            allowed_schemas:           Vec::new(),
            custom_patterns:           Vec::new()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartesianConfig {
    pub enabled:          bool,
    pub risk_level:       RiskLevel,
    pub max_joins:        usize,
    pub warn_joins:       usize,
    pub allow_cross_join: bool
}

impl Default for CartesianConfig {
    fn default() -> Self {
        Self {
            enabled:          true,
            risk_level:       RiskLevel::High,
            max_joins:        10,
            warn_joins:       5,
            allow_cross_join: false
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmlConfig {
    pub enabled:              bool,
    pub require_where_update: bool,
    pub require_where_delete: bool,
    pub block_ddl:            bool,
    /// DDL operations permitted when `block_ddl` is on (`CREATE`, `ALTER`, ...)
    pub allowed_ddl:          Vec<String>,
    pub protected_tables:     Vec<String>
}

impl Default for DmlConfig {
    fn default() -> Self {
        Self {
            enabled:              true,
            require_where_update: true,
            require_where_delete: true,
            block_ddl:            true,
            allowed_ddl:          Vec::new(),
            protected_tables:     Vec::new()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub enabled:             bool,
    pub dangerous_functions: Vec<String>,
    pub file_keywords:       Vec<String>,
    /// Independent attack indicators that escalate to a combined attack
    pub combined_threshold:  usize
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enabled:             true,
            dangerous_functions: [
                "sleep",
                "pg_sleep",
                "benchmark",
                "waitfor",
                "load_file",
                "xp_cmdshell",
                "sp_executesql",
                "sp_oacreate",
                "dbms_pipe.receive_message",
                "utl_http.request",
                "pg_read_file",
                "lo_import",
                "lo_export"
            ]
            .map(String::from)
            .to_vec(),
            file_keywords:       ["into outfile", "into dumpfile", "load data", "copy program"]
                .map(String::from)
                .to_vec(),
            combined_threshold:  2
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplexityConfig {
    pub enabled:            bool,
    pub max_join_count:     usize,
    pub max_subquery_depth: usize,
    pub max_score:          u32
}

impl Default for ComplexityConfig {
    fn default() -> Self {
        Self {
            enabled:            true,
            max_join_count:     8,
            max_subquery_depth: 3,
            max_score:          100
        }
    }
}

impl FirewallConfig {
    /// Load configuration from file and environment
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. Config file in current directory (.sql-firewall.toml)
    /// 3. Config file in home directory (~/.config/sql-firewall/config.toml)
    /// 4. Default values
    pub fn load() -> FirewallResult<Self> {
        let mut config = Self::default();

        if let Some(home) = env::var_os("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("sql-firewall")
                .join("config.toml");
            if home_config.exists() {
                config = Self::from_file(&home_config)?;
            }
        }

        let local_config = PathBuf::from(".sql-firewall.toml");
        if local_config.exists() {
            config = Self::from_file(&local_config)?;
        }

        config.apply_env(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read one TOML file
    pub fn from_file(path: &Path) -> FirewallResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| config_error(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> FirewallResult<Self> {
        toml::from_str(content).map_err(|e| config_error(format!("Invalid config file: {}", e)))
    }

    /// Override fields from environment lookups
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> FirewallResult<()> {
        if let Some(strict) = lookup("SQL_FIREWALL_STRICT") {
            self.processing.strict_mode = matches!(
                strict.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        if let Some(dialect) = lookup("SQL_FIREWALL_DIALECT") {
            self.processing.dialect = dialect.parse().map_err(config_error)?;
        }
        if let Some(max_joins) = lookup("SQL_FIREWALL_MAX_JOINS") {
            self.cartesian.max_joins = max_joins.trim().parse().map_err(|_| {
                config_error(format!("SQL_FIREWALL_MAX_JOINS must be a number, got '{}'", max_joins))
            })?;
        }
        Ok(())
    }

    /// Check thresholds and compile custom patterns
    pub fn validate(&self) -> FirewallResult<()> {
        if !(0.0..=1.0).contains(&self.processing.min_confidence) {
            return Err(config_error(format!(
                "min_confidence must be within [0, 1], got {}",
                self.processing.min_confidence
            )));
        }
        if self.cartesian.warn_joins > self.cartesian.max_joins {
            return Err(config_error(format!(
                "warn_joins ({}) exceeds max_joins ({})",
                self.cartesian.warn_joins, self.cartesian.max_joins
            )));
        }
        for pattern in &self.injection.custom_patterns {
            Regex::new(pattern)
                .map_err(|e| config_error(format!("Invalid custom pattern '{}': {}", pattern, e)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = FirewallConfig::from_toml(
            r#"
            [processing]
            strict_mode = true
            strict_min_risk = "MEDIUM"

            [dml]
            protected_tables = ["audit_log"]
            "#
        )
        .unwrap();
        assert!(config.processing.strict_mode);
        assert_eq!(config.processing.strict_min_risk, RiskLevel::Medium);
        assert!(config.processing.enable_validation);
        assert_eq!(config.dml.protected_tables, vec!["audit_log"]);
        assert_eq!(config.cartesian.max_joins, 10);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = FirewallConfig::default();
        config
            .apply_env(|key| match key {
                "SQL_FIREWALL_STRICT" => Some("true".into()),
                "SQL_FIREWALL_DIALECT" => Some("postgres".into()),
                "SQL_FIREWALL_MAX_JOINS" => Some("7".into()),
                _ => None
            })
            .unwrap();
        assert!(config.processing.strict_mode);
        assert_eq!(config.processing.dialect, SqlDialect::PostgreSQL);
        assert_eq!(config.cartesian.max_joins, 7);
    }

    #[test]
    fn test_bad_env_value() {
        let mut config = FirewallConfig::default();
        let err = config
            .apply_env(|key| (key == "SQL_FIREWALL_MAX_JOINS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("SQL_FIREWALL_MAX_JOINS"));
    }

    #[test]
    fn test_validate_rejects_bad_pattern() {
        let mut config = FirewallConfig::default();
        config.injection.custom_patterns.push("(unclosed".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_join_limits() {
        let mut config = FirewallConfig::default();
        config.cartesian.warn_joins = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(FirewallConfig::from_toml("[processing\nstrict_mode = ").is_err());
    }
}
