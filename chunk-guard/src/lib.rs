//! # chunk-guard - Chunked data validation for Rust
//!
//! chunk-guard validates tabular files (CSV, Parquet, NDJSON) against a list
//! of rules while holding only one batch of rows in memory at a time. It is
//! built on Apache Arrow, with DataFusion's readers doing the file parsing.
//!
//! ## Overview
//!
//! A job names one or more files and, for each file, an ordered list of rule
//! descriptors. The [`ValidationEngine`](core::ValidationEngine) streams every
//! file through its rules and reports, per rule, how many rows were checked,
//! how many failed and the first few failing rows. Rule outcomes roll up into
//! a file status and a job status, and the job status maps to a process exit
//! code.
//!
//! ## Quick Start
//!
//! ```rust
//! use chunk_guard::prelude::*;
//! use chunk_guard::sources::{MemoryLoader, MemorySource};
//! use arrow::array::{ArrayRef, StringArray};
//! use arrow::record_batch::RecordBatch;
//! use std::sync::Arc;
//!
//! # async fn example() -> chunk_guard::error::Result<()> {
//! let emails: ArrayRef = Arc::new(StringArray::from(vec![Some("a@x.com"), None, Some("bad")]));
//! let batch = RecordBatch::try_from_iter(vec![("email", emails)])?;
//! let loader = MemoryLoader::new()
//!     .with_source("users", MemorySource::try_from_batches("users", vec![batch])?);
//!
//! let job = JobSpec::new("users").with_file(
//!     FileSpec::new("users")
//!         .with_rule(RuleDescriptor::new("MandatoryFieldCheck").with_param("field", "email"))
//!         .with_rule(
//!             RuleDescriptor::new("RegexCheck")
//!                 .with_severity(Severity::Warning)
//!                 .with_param("field", "email")
//!                 .with_param("pattern", "^[^@]+@[^@]+$"),
//!         ),
//! );
//!
//! let outcome = ValidationEngine::new(Arc::new(loader)).run(&job).await?;
//! assert_eq!(outcome.status, Status::Failed);
//! assert_eq!(outcome.exit_code(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Rules
//!
//! Streaming rules decide row by row in a single pass. Statistical rules
//! (`UniqueKeyCheck`, `StatisticalOutlierCheck`) build an aggregate in a
//! first pass and flag rows against it in a second, so they need a source
//! that can be read twice. Every rule can be scoped to a subset of rows with
//! a condition such as `status == 'ACTIVE' AND age >= 18`.
//!
//! ## Architecture
//!
//! - **`core`**: the rule traits, outcomes, status roll-up and the engine
//! - **`rules`**: the built-in rule catalogue
//! - **`condition`**: the row-filter expression language
//! - **`sources`**: batch sources and loaders
//! - **`resolver`**: reference datasets for cross-file rules
//! - **`stats`**: running moments and the quantile sketch
//! - **`config`**: job, file and rule descriptors

pub mod batch;
pub mod condition;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod prelude;
pub mod resolver;
pub mod rules;
pub mod sources;
pub mod stats;
