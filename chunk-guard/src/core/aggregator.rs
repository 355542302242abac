//! Folding rule outcomes into file and job status.

use super::level::{Severity, Status};
use super::outcome::RuleOutcome;

/// Tracks the status of one file while its rules report in.
///
/// The machine starts in `NotStarted`, moves to `Running` on the first
/// dispatched rule and becomes `Failed` as soon as an error-severity rule
/// fails. `Failed` is sticky. [`finish`](Self::finish) settles a running
/// file on `Warning` or `Passed`.
///
/// # Examples
///
/// ```rust
/// use chunk_guard::core::{FileStatusMachine, Status};
///
/// let mut machine = FileStatusMachine::new();
/// assert_eq!(machine.status(), Status::NotStarted);
/// machine.start();
/// assert_eq!(machine.finish(), Status::Passed);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FileStatusMachine {
    status: Status,
    saw_warning: bool,
}

impl FileStatusMachine {
    /// Creates a machine in `NotStarted`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the file as running.
    pub fn start(&mut self) {
        if self.status == Status::NotStarted {
            self.status = Status::Running;
        }
    }

    /// Folds in one terminal rule outcome.
    pub fn record(&mut self, outcome: &RuleOutcome) {
        self.start();
        if outcome.is_failure_at(Severity::Error) {
            self.status = Status::Failed;
        } else if outcome.is_failure_at(Severity::Warning) {
            self.saw_warning = true;
        }
    }

    /// Current status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Settles the final status.
    pub fn finish(&mut self) -> Status {
        if !self.status.is_terminal() {
            self.status = if self.saw_warning {
                Status::Warning
            } else {
                Status::Passed
            };
        }
        self.status
    }
}

/// The most severe of the given file statuses; `Passed` for no files.
pub fn roll_up_job_status<I>(statuses: I) -> Status
where
    I: IntoIterator<Item = Status>,
{
    statuses.into_iter().fold(Status::Passed, Status::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sampler::FailureTally;

    fn outcome(severity: Severity, failed: u64) -> RuleOutcome {
        let mut outcome = RuleOutcome::from_tally(
            FailureTally {
                failed_count: failed,
                total_count: 10,
                samples: Vec::new(),
            },
            "",
        );
        outcome.severity = severity;
        outcome
    }

    #[test]
    fn test_failed_is_sticky() {
        let mut machine = FileStatusMachine::new();
        machine.record(&outcome(Severity::Error, 1));
        assert_eq!(machine.status(), Status::Failed);
        machine.record(&outcome(Severity::Warning, 1));
        machine.record(&outcome(Severity::Error, 0));
        assert_eq!(machine.finish(), Status::Failed);
    }

    #[test]
    fn test_warning_only_file() {
        let mut machine = FileStatusMachine::new();
        machine.record(&outcome(Severity::Error, 0));
        assert_eq!(machine.status(), Status::Running);
        machine.record(&outcome(Severity::Warning, 3));
        assert_eq!(machine.finish(), Status::Warning);
    }

    #[test]
    fn test_file_without_rules_passes() {
        assert_eq!(FileStatusMachine::new().finish(), Status::Passed);
    }

    #[test]
    fn test_job_roll_up() {
        assert_eq!(roll_up_job_status([]), Status::Passed);
        assert_eq!(
            roll_up_job_status([Status::Passed, Status::Warning, Status::Passed]),
            Status::Warning
        );
        assert_eq!(
            roll_up_job_status([Status::Failed, Status::Warning]),
            Status::Failed
        );
    }
}
