//! Prelude for commonly used types and traits in chunk-guard.

pub use crate::config::{FileFormat, FileSpec, JobSpec, RuleDescriptor, Settings};
pub use crate::core::{
    CancellationCheck, CancellationFlag, JobOutcome, RuleOutcome, Severity, Status,
    ValidationEngine,
};
pub use crate::error::{ErrorContext, ErrorKind, GuardError, Result};
pub use crate::logging::LogConfig;
pub use crate::sources::{BatchSource, SourceLoader};
