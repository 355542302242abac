//! Rule severities and file/job statuses.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The severity of a validation rule.
///
/// A failing `Error` rule fails its file; a failing `Warning` rule only
/// downgrades it. Severities are ordered: Error > Warning.
///
/// # Examples
///
/// ```rust
/// use chunk_guard::core::Severity;
///
/// assert!(Severity::Error > Severity::Warning);
/// assert_eq!(Severity::default(), Severity::Error);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Issues that should be investigated but don't block processing
    Warning = 1,
    /// Critical data quality issues
    #[default]
    Error = 2,
}

impl Severity {
    /// Returns the string representation of the severity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The status of a file or a whole job.
///
/// `NotStarted` and `Running` only appear while a file is in flight; finished
/// outcomes are always `Passed`, `Warning` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// No rule has been dispatched yet
    #[default]
    NotStarted,
    /// Rules are executing
    Running,
    /// Every rule passed
    Passed,
    /// At least one warning rule failed, no error rule failed
    Warning,
    /// At least one error rule failed
    Failed,
}

impl Status {
    /// Returns the string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::NotStarted => "not_started",
            Status::Running => "running",
            Status::Passed => "passed",
            Status::Warning => "warning",
            Status::Failed => "failed",
        }
    }

    /// Rank used for roll-ups: Failed > Warning > Passed > in-flight states.
    pub fn rank(&self) -> u8 {
        match self {
            Status::NotStarted => 0,
            Status::Running => 1,
            Status::Passed => 2,
            Status::Warning => 3,
            Status::Failed => 4,
        }
    }

    /// Returns the more severe of two statuses.
    pub fn max(self, other: Status) -> Status {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }

    /// Returns true for `Passed`, `Warning` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Passed | Status::Warning | Status::Failed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
