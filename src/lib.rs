//! # SQL Firewall Library
//!
//! Parameter binding and security screening for SQL statements.
//!
//! - [`parameters`] - placeholder tokenizing, validation and style conversion
//! - [`statement`] - the processor and the immutable statement wrapper
//! - [`pipeline`] - processing context, processor trait and aggregation
//! - [`validation`] - tautology, injection, security, cartesian and DML checks
//! - [`analysis`] - complexity metrics
//! - [`transform`] - literal parameterization
//! - [`tree`] - shared AST helpers
//!
//! ```
//! use std::sync::Arc;
//!
//! use sql_firewall::{
//!     config::FirewallConfig, parameters::ParameterStyle, statement::SqlProcessor
//! };
//!
//! let processor = Arc::new(SqlProcessor::new(FirewallConfig::default()).unwrap());
//! let compiled = processor
//!     .statement("SELECT * FROM t WHERE id = :id")
//!     .with_kwargs([("id", 5i64)])
//!     .compile_as(ParameterStyle::Qmark)
//!     .unwrap();
//! assert_eq!(compiled.sql, "SELECT * FROM t WHERE id = ?");
//! ```

pub mod analysis;
pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod dialect;
pub mod error;
pub mod output;
pub mod parameters;
pub mod pipeline;
pub mod statement;
pub mod transform;
pub mod tree;
pub mod validation;
