//! Results of a validation run at rule, file and job level.

use super::level::{Severity, Status};
use super::sampler::FailureTally;
use crate::config::{RuleDescriptor, Settings};
use crate::error::{ErrorKind, ErrorLocation, GuardError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One failing row kept as an example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleFailure {
    /// Absolute zero-based row offset in the file
    pub row_offset: u64,
    /// Field that failed, if the rule checks a single field
    pub field: Option<String>,
    /// Display form of the value, `None` for null
    pub value: Option<String>,
    /// Why the row failed
    pub reason: String,
}

/// A rule that could not run to completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleError {
    /// Error category
    pub kind: ErrorKind,
    /// Human-readable detail
    pub message: String,
    /// File being validated
    pub file: Option<String>,
    /// Rule type id
    pub rule_type: Option<String>,
    /// Field the rule operates on
    pub field: Option<String>,
}

impl RuleError {
    /// Captures `error`, filling missing location parts from `fallback`.
    pub fn from_error(error: &GuardError, fallback: &ErrorLocation) -> Self {
        let location = error
            .location()
            .cloned()
            .unwrap_or_default()
            .or(fallback);
        Self {
            kind: error.kind(),
            message: error.detail(),
            file: location.file,
            rule_type: location.rule_type,
            field: location.field,
        }
    }
}

/// The terminal result of one rule against one file.
///
/// `passed` is always `failed_count == 0 && error.is_none()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    /// Rule type id
    pub rule_type: String,
    /// Configured severity
    pub severity: Severity,
    /// Primary field, if any
    pub field: Option<String>,
    /// Condition text, if the rule was scoped
    pub condition: Option<String>,
    /// Whether the rule passed
    pub passed: bool,
    /// Rows (or file-level checks) that failed
    pub failed_count: u64,
    /// Rows the rule evaluated
    pub total_count: u64,
    /// Summary for humans
    pub message: String,
    /// First failures in scan order
    pub samples: Vec<SampleFailure>,
    /// Rule-specific measurement (row count, mean, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<f64>,
    /// Set when the rule could not run to completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RuleError>,
}

impl RuleOutcome {
    /// Builds an outcome from counted rows.
    pub fn from_tally(tally: FailureTally, message: impl Into<String>) -> Self {
        Self {
            rule_type: String::new(),
            severity: Severity::default(),
            field: None,
            condition: None,
            passed: tally.failed_count == 0,
            failed_count: tally.failed_count,
            total_count: tally.total_count,
            message: message.into(),
            samples: tally.samples,
            metric: None,
            error: None,
        }
    }

    /// Builds a failed outcome for a rule that errored.
    pub fn from_error(error: &GuardError, fallback: &ErrorLocation) -> Self {
        let rule_error = RuleError::from_error(error, fallback);
        Self {
            rule_type: rule_error.rule_type.clone().unwrap_or_default(),
            severity: Severity::default(),
            field: rule_error.field.clone(),
            condition: None,
            passed: false,
            failed_count: 0,
            total_count: 0,
            message: error.to_string(),
            samples: Vec::new(),
            metric: None,
            error: Some(rule_error),
        }
    }

    /// Attaches a metric.
    pub fn with_metric(mut self, metric: f64) -> Self {
        self.metric = Some(metric);
        self
    }

    /// Sets the reported field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Stamps type, severity, condition and (if unset) field from the
    /// descriptor that produced this outcome.
    pub fn for_rule(mut self, descriptor: &RuleDescriptor) -> Self {
        self.rule_type = descriptor.rule_type.clone();
        self.severity = descriptor.severity;
        self.condition = descriptor.condition.clone();
        if self.field.is_none() {
            self.field = descriptor.field().map(str::to_string);
        }
        self.passed = self.failed_count == 0 && self.error.is_none();
        self
    }

    /// Returns true if the rule failed and its severity is `severity`.
    pub fn is_failure_at(&self, severity: Severity) -> bool {
        !self.passed && self.severity == severity
    }

    /// Fraction of evaluated rows that failed.
    pub fn failure_rate(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.failed_count as f64 / self.total_count as f64
        }
    }
}

/// Results for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileOutcome {
    /// File path as configured
    pub path: String,
    /// Format the file was read as
    pub format: String,
    /// Rolled-up status
    pub status: Status,
    /// Rule outcomes in declared order
    pub rules: Vec<RuleOutcome>,
    /// Rows streamed in pass one
    pub rows_processed: u64,
    /// Batches streamed in pass one
    pub batches_processed: u64,
    /// Wall time spent on the file
    pub duration_ms: u64,
}

impl FileOutcome {
    /// Outcomes that did not pass.
    pub fn failed_rules(&self) -> impl Iterator<Item = &RuleOutcome> {
        self.rules.iter().filter(|r| !r.passed)
    }

    /// First outcome for a rule type.
    pub fn rule(&self, rule_type: &str) -> Option<&RuleOutcome> {
        self.rules.iter().find(|r| r.rule_type == rule_type)
    }
}

/// Results for a whole job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    /// Job name
    pub name: String,
    /// Maximum file status
    pub status: Status,
    /// File outcomes in declared order
    pub files: Vec<FileOutcome>,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Wall time of the run
    pub duration_ms: u64,
    /// Settings the job ran with
    pub settings: Settings,
}

impl JobOutcome {
    /// Process exit code for this outcome.
    ///
    /// `0` for a passing job, a warning job unless `fail_on_warning` is set,
    /// and a failed job when `fail_on_error` is off; `1` otherwise.
    pub fn exit_code(&self) -> i32 {
        match self.status {
            Status::Failed if self.settings.fail_on_error => 1,
            Status::Warning if self.settings.fail_on_warning => 1,
            _ => 0,
        }
    }

    /// Outcome for a file path.
    pub fn file(&self, path: &str) -> Option<&FileOutcome> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Total failed rule outcomes across all files.
    pub fn failed_rule_count(&self) -> usize {
        self.files.iter().map(|f| f.failed_rules().count()).sum()
    }

    /// Serializes to compact JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serializes to indented JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
