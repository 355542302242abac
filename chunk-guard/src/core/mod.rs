//! Core validation types: the rule contract, outcomes, status roll-up and
//! the engine that ties them together.

pub mod aggregator;
pub mod cancel;
pub mod engine;
pub mod level;
pub mod outcome;
pub mod registry;
pub mod rule;
pub mod sampler;

pub use aggregator::{roll_up_job_status, FileStatusMachine};
pub use cancel::{CancellationCheck, CancellationFlag, NeverCancel};
pub use engine::ValidationEngine;
pub use level::{Severity, Status};
pub use outcome::{FileOutcome, JobOutcome, RuleError, RuleOutcome, SampleFailure};
pub use registry::{RuleContext, RuleFactory, RuleRegistry};
pub use rule::{
    AggregateState, DuplicateKeys, QuantileSummary, RuleKind, StatisticalRule, StreamingRule,
};
pub use sampler::{FailureSampler, FailureTally};
