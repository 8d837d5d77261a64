//! Security validators over the parsed tree.
//!
//! Each validator is a [`Processor`](crate::pipeline::Processor) that reads
//! the statements in the [`ProcessingContext`](crate::pipeline::ProcessingContext)
//! and records [`SecurityIssue`]s.
//!
//! | Component    | Detects                                                   |
//! |--------------|-----------------------------------------------------------|
//! | `tautology`  | always-true comparisons, OR tautologies, contradictions   |
//! | `injection`  | UNION abuse, comments, system schemas, stacked statements |
//! | `security`   | dangerous functions, file access, combined attacks        |
//! | `cartesian`  | CROSS JOIN, unconstrained joins, join count limits        |
//! | `dml_safety` | UPDATE/DELETE without WHERE, DDL, protected tables        |

mod cartesian;
mod dml;
mod injection;
mod security;
mod tautology;
mod types;

pub use cartesian::CartesianValidator;
pub use dml::DmlSafetyValidator;
pub use injection::InjectionValidator;
pub use security::SecurityValidator;
pub use tautology::TautologyValidator;
pub use types::{IssueKind, RiskLevel, SecurityIssue, ValidationResult};
