//! The execution orchestrator.
//!
//! [`ValidationEngine::run`] drives every file of a job through its rules:
//!
//! 1. All conditions of the job are parsed before any data is read.
//! 2. Each file is opened and every enabled rule is resolved, built and
//!    initialised against the file's columns. A rule that cannot be set up
//!    fails on its own; the file carries on.
//! 3. Pass one streams the file once. Every streaming rule and the first
//!    pass of every statistical rule see each batch before the next one is
//!    requested.
//! 4. Pass two re-reads the file for statistical rules only.
//!
//! Only problems with the job as a whole end the run early: bad settings, a
//! condition that does not parse, a primary file that cannot be opened or
//! read, or cancellation.

use super::aggregator::{roll_up_job_status, FileStatusMachine};
use super::cancel::{CancellationCheck, NeverCancel};
use super::outcome::{FileOutcome, JobOutcome, RuleOutcome};
use super::registry::{RuleContext, RuleRegistry};
use super::rule::{AggregateState, RuleKind, StatisticalRule, StreamingRule};
use crate::batch::Batch;
use crate::condition::{Condition, RowMask};
use crate::config::{FileSpec, JobSpec, RuleDescriptor, Settings};
use crate::error::{ErrorContext, ErrorKind, ErrorLocation, GuardError, Result};
use crate::logging::{truncate_field, LogConfig};
use crate::resolver::{ReferenceResolver, ReferenceSpec};
use crate::sources::{BatchCursor, BatchSource, DataFusionLoader, SourceLoader};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Runs validation jobs.
///
/// # Examples
///
/// ```rust,no_run
/// use chunk_guard::config::{FileSpec, JobSpec, RuleDescriptor};
/// use chunk_guard::core::ValidationEngine;
///
/// # async fn example() -> chunk_guard::error::Result<()> {
/// let job = JobSpec::new("customers").with_file(
///     FileSpec::new("customers.csv")
///         .with_rule(RuleDescriptor::new("MandatoryFieldCheck").with_param("field", "email")),
/// );
///
/// let outcome = ValidationEngine::default().run(&job).await?;
/// std::process::exit(outcome.exit_code());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ValidationEngine {
    loader: Arc<dyn SourceLoader>,
    registry: Arc<RuleRegistry>,
    cancellation: Arc<dyn CancellationCheck>,
    log: LogConfig,
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new(Arc::new(DataFusionLoader::new()))
    }
}

impl ValidationEngine {
    /// Creates an engine with the built-in rules that reads through `loader`.
    pub fn new(loader: Arc<dyn SourceLoader>) -> Self {
        Self {
            loader,
            registry: Arc::new(RuleRegistry::with_builtin()),
            cancellation: Arc::new(NeverCancel),
            log: LogConfig::default(),
        }
    }

    /// Replaces the rule registry.
    pub fn with_registry(mut self, registry: RuleRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Sets the check polled at every batch boundary.
    pub fn with_cancellation(mut self, check: impl CancellationCheck + 'static) -> Self {
        self.cancellation = Arc::new(check);
        self
    }

    /// Sets how much the engine logs while scanning.
    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// The rule registry.
    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Runs a job to completion.
    ///
    /// Rule failures and rule errors are reported in the returned outcome.
    /// An `Err` means the job as a whole could not be run.
    #[instrument(skip(self, job), fields(job.name = %job.name, job.files = job.files.len()))]
    pub async fn run(&self, job: &JobSpec) -> Result<JobOutcome> {
        job.validate()?;
        let conditions = compile_conditions(job)?;

        info!(
            job.name = %job.name,
            job.files = job.files.len(),
            settings.chunk_size = job.settings.chunk_size,
            settings.max_sample_failures = job.settings.max_sample_failures,
            "Starting validation job"
        );
        let started_at = Utc::now();
        let start = Instant::now();

        let mut resolver = ReferenceResolver::new(Arc::clone(&self.loader), job.settings.chunk_size);
        let mut files = Vec::with_capacity(job.files.len());
        for (file, file_conditions) in job.files.iter().zip(conditions) {
            let outcome = self
                .run_file(file, file_conditions, &job.settings, &mut resolver)
                .await
                .inspect_err(|e| {
                    error!(
                        file = %file.path,
                        error = %e,
                        error.kind = %e.kind(),
                        "Validation job aborted"
                    );
                })?;
            files.push(outcome);
        }

        let status = roll_up_job_status(files.iter().map(|f| f.status));
        let outcome = JobOutcome {
            name: job.name.clone(),
            status,
            files,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            settings: job.settings.clone(),
        };

        info!(
            job.name = %outcome.name,
            job.status = %outcome.status,
            job.failed_rules = outcome.failed_rule_count(),
            job.duration_ms = outcome.duration_ms,
            "Validation job completed"
        );
        Ok(outcome)
    }

    #[instrument(skip_all, fields(file = %file.path))]
    async fn run_file(
        &self,
        file: &FileSpec,
        conditions: Vec<Option<Condition>>,
        settings: &Settings,
        resolver: &mut ReferenceResolver,
    ) -> Result<FileOutcome> {
        let start = Instant::now();
        let source = self
            .loader
            .open(&file.path, file.format, settings.chunk_size)
            .await?;
        let metadata = source.metadata().await?;

        info!(
            file = %file.path,
            format = %metadata.format,
            columns = metadata.columns.len(),
            rules = conditions.len(),
            "Validating file"
        );

        let mut machine = FileStatusMachine::new();
        let mut slots = Vec::with_capacity(conditions.len());
        for (descriptor, condition) in file.enabled_rules().zip(conditions) {
            machine.start();
            let location = descriptor.location().with_file(&file.path);
            let prepared = self
                .prepare(descriptor, condition.as_ref(), &metadata.columns, settings, resolver)
                .await;
            let state = match prepared {
                Ok(RuleKind::Streaming(rule)) => SlotState::Streaming(rule),
                Ok(RuleKind::Statistical(_)) if !source.is_replayable() => {
                    let err = GuardError::source_replay(
                        location.clone(),
                        "source cannot be read twice, which two-pass rules require",
                    );
                    SlotState::Done(RuleOutcome::from_error(&err, &location))
                }
                Ok(RuleKind::Statistical(rule)) => SlotState::Statistical(rule, None),
                Err(e) => SlotState::Done(RuleOutcome::from_error(&e, &location)),
            };
            slots.push(RuleSlot {
                descriptor,
                condition,
                location,
                state,
            });
        }

        let mut rows_processed = 0;
        let mut batches_processed = 0;
        if slots.iter().any(RuleSlot::is_active) {
            let stream = source
                .open_batches()
                .await
                .with_context(|| format!("cannot scan '{}'", file.path))?;
            let mut cursor = BatchCursor::new(stream, settings.chunk_size);
            loop {
                self.check_cancelled(&file.path)?;
                let Some(batch) = cursor.next_batch().await else {
                    break;
                };
                let batch = batch.with_context(|| {
                    format!(
                        "first pass over '{}' failed after {} rows",
                        file.path,
                        cursor.rows_emitted()
                    )
                })?;
                crate::log_data_op!(
                    self.log,
                    file = %file.path,
                    batch.sequence = batch.sequence(),
                    batch.row_offset = batch.row_offset(),
                    batch.rows = batch.num_rows(),
                    "Pass one batch"
                );
                for slot in slots.iter_mut() {
                    slot.pass_one(&batch);
                }
            }
            rows_processed = cursor.rows_emitted();
            batches_processed = cursor.batches_emitted();

            for slot in slots.iter_mut() {
                slot.seal();
            }

            if slots.iter().any(RuleSlot::awaits_pass_two) {
                if let Err(e) = self
                    .replay(source.as_ref(), &mut slots, rows_processed, settings, &file.path)
                    .await
                {
                    if e.kind() == ErrorKind::Cancelled {
                        return Err(e);
                    }
                    warn!(file = %file.path, error = %e, "Second pass failed");
                    for slot in slots.iter_mut().filter(|s| s.awaits_pass_two()) {
                        slot.terminate(&e);
                    }
                }
            }
        }

        let mut rules = Vec::with_capacity(slots.len());
        for slot in slots {
            let outcome = slot.finish();
            log_outcome(&self.log, &file.path, &outcome);
            machine.record(&outcome);
            rules.push(outcome);
        }

        let outcome = FileOutcome {
            path: file.path.clone(),
            format: metadata.format,
            status: machine.finish(),
            rules,
            rows_processed,
            batches_processed,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            file = %outcome.path,
            file.status = %outcome.status,
            rows = outcome.rows_processed,
            batches = outcome.batches_processed,
            duration_ms = outcome.duration_ms,
            "File validation completed"
        );
        Ok(outcome)
    }

    /// Resolves references, builds the rule, checks its condition against the
    /// file's columns and initialises it.
    async fn prepare(
        &self,
        descriptor: &RuleDescriptor,
        condition: Option<&Condition>,
        columns: &[String],
        settings: &Settings,
        resolver: &mut ReferenceResolver,
    ) -> Result<RuleKind> {
        let mut context = RuleContext::new(settings.max_sample_failures);
        if let Some(spec) = ReferenceSpec::from_descriptor(descriptor)? {
            context = context.with_reference(resolver.resolve(&spec).await?);
        }

        let mut kind = self.registry.create(descriptor, &context)?;
        crate::perf_debug!(
            self.log,
            rule.type = %descriptor.rule_type,
            rule.statistical = kind.is_statistical(),
            rule.reference = context.reference.is_some(),
            "Rule created"
        );
        if let Some(condition) = condition {
            condition.check_fields(columns)?;
        }
        match &mut kind {
            RuleKind::Streaming(rule) => rule.init(columns)?,
            RuleKind::Statistical(rule) => rule.init(columns)?,
        }
        Ok(kind)
    }

    /// Streams the source a second time into every rule awaiting pass two.
    async fn replay(
        &self,
        source: &dyn BatchSource,
        slots: &mut [RuleSlot<'_>],
        expected_rows: u64,
        settings: &Settings,
        path: &str,
    ) -> Result<()> {
        let location = ErrorLocation::new().with_file(path);
        let replay_error = |message: String| GuardError::source_replay(location.clone(), message);

        let stream = source
            .open_batches()
            .await
            .map_err(|e| replay_error(format!("cannot reopen source for the second pass: {e}")))?;
        let mut cursor = BatchCursor::new(stream, settings.chunk_size);
        loop {
            self.check_cancelled(path)?;
            let Some(batch) = cursor.next_batch().await else {
                break;
            };
            let batch =
                batch.map_err(|e| replay_error(format!("second pass read failed: {e}")))?;
            if cursor.rows_emitted() > expected_rows {
                return Err(replay_error(format!(
                    "second pass produced more than the {expected_rows} rows of the first"
                )));
            }
            crate::log_data_op!(
                self.log,
                file = %path,
                batch.sequence = batch.sequence(),
                batch.rows = batch.num_rows(),
                "Pass two batch"
            );
            for slot in slots.iter_mut() {
                slot.pass_two(&batch);
            }
        }

        if cursor.rows_emitted() != expected_rows {
            return Err(replay_error(format!(
                "second pass produced {} rows, first pass {expected_rows}",
                cursor.rows_emitted()
            )));
        }
        Ok(())
    }

    fn check_cancelled(&self, path: &str) -> Result<()> {
        if self.cancellation.is_cancelled() {
            warn!(file = %path, "Cancellation requested");
            return Err(GuardError::Cancelled {
                file: path.to_string(),
            });
        }
        Ok(())
    }
}

/// Parses the condition of every enabled rule of every file.
fn compile_conditions(job: &JobSpec) -> Result<Vec<Vec<Option<Condition>>>> {
    job.files
        .iter()
        .map(|file| {
            file.enabled_rules()
                .map(|rule| {
                    rule.condition
                        .as_deref()
                        .filter(|text| !text.trim().is_empty())
                        .map(|text| Condition::parse_with(text, rule.condition_case_insensitive))
                        .transpose()
                        .inspect_err(|e| {
                            error!(
                                file = %file.path,
                                rule.type = %rule.rule_type,
                                error = %e,
                                "Invalid rule condition"
                            );
                        })
                })
                .collect()
        })
        .collect()
}

fn log_outcome(log: &LogConfig, path: &str, outcome: &RuleOutcome) {
    let metric = outcome.metric.filter(|_| log.log_metrics);
    match &outcome.error {
        Some(err) => error!(
            file = %path,
            rule.type = %outcome.rule_type,
            rule.severity = %outcome.severity,
            rule.field = ?outcome.field,
            error.kind = %err.kind,
            error.message = %truncate_field(&err.message, log.max_field_length),
            "Rule could not complete"
        ),
        None if !outcome.passed => warn!(
            file = %path,
            rule.type = %outcome.rule_type,
            rule.severity = %outcome.severity,
            rule.field = ?outcome.field,
            failed = outcome.failed_count,
            total = outcome.total_count,
            failure_rate = outcome.failure_rate(),
            metric = ?metric,
            message = %truncate_field(&outcome.message, log.max_field_length),
            "Rule failed"
        ),
        None => crate::log_rule!(
            log,
            file = %path,
            rule.type = %outcome.rule_type,
            total = outcome.total_count,
            metric = ?metric,
            "Rule passed"
        ),
    }
}

enum SlotState {
    Streaming(Box<dyn StreamingRule>),
    /// The aggregate is `None` until pass one is sealed
    Statistical(Box<dyn StatisticalRule>, Option<AggregateState>),
    Done(RuleOutcome),
}

/// One configured rule and where it is in its lifecycle.
struct RuleSlot<'a> {
    descriptor: &'a RuleDescriptor,
    condition: Option<Condition>,
    location: ErrorLocation,
    state: SlotState,
}

impl RuleSlot<'_> {
    fn is_active(&self) -> bool {
        !matches!(self.state, SlotState::Done(_))
    }

    fn awaits_pass_two(&self) -> bool {
        matches!(self.state, SlotState::Statistical(_, Some(_)))
    }

    fn mask(&self, batch: &Batch) -> RowMask {
        let Some(condition) = &self.condition else {
            return RowMask::all(batch.num_rows());
        };
        let missing = condition.missing_fields(batch);
        if !missing.is_empty() {
            warn!(
                file = ?self.location.file,
                rule.type = %self.descriptor.rule_type,
                batch.sequence = batch.sequence(),
                missing = ?missing,
                "Condition field missing from batch, no rows selected"
            );
            return RowMask::none(batch.num_rows());
        }
        condition.evaluate(batch)
    }

    fn pass_one(&mut self, batch: &Batch) {
        if !matches!(
            self.state,
            SlotState::Streaming(_) | SlotState::Statistical(_, None)
        ) {
            return;
        }
        let mask = self.mask(batch);
        let result = match &mut self.state {
            SlotState::Streaming(rule) => rule.observe(batch, &mask),
            SlotState::Statistical(rule, None) => rule.pass_one_observe(batch, &mask),
            _ => Ok(()),
        };
        if let Err(e) = result {
            self.terminate(&e);
        }
    }

    fn seal(&mut self) {
        let sealed = match &mut self.state {
            SlotState::Statistical(rule, None) => rule.pass_one_finish(),
            _ => return,
        };
        match sealed {
            Ok(aggregate) => {
                if let SlotState::Statistical(_, slot) = &mut self.state {
                    *slot = Some(aggregate);
                }
            }
            Err(e) => self.terminate(&e),
        }
    }

    fn pass_two(&mut self, batch: &Batch) {
        if !self.awaits_pass_two() {
            return;
        }
        let mask = self.mask(batch);
        let result = match &mut self.state {
            SlotState::Statistical(rule, Some(aggregate)) => {
                rule.pass_two_observe(batch, &mask, aggregate)
            }
            _ => Ok(()),
        };
        if let Err(e) = result {
            self.terminate(&e);
        }
    }

    fn terminate(&mut self, error: &GuardError) {
        debug!(
            rule.type = %self.descriptor.rule_type,
            error = %error,
            "Terminating rule"
        );
        self.state = SlotState::Done(RuleOutcome::from_error(error, &self.location));
    }

    fn finish(self) -> RuleOutcome {
        let outcome = match self.state {
            SlotState::Streaming(rule) => rule.finish(),
            SlotState::Statistical(rule, Some(_)) => rule.pass_two_finish(),
            SlotState::Statistical(_, None) => RuleOutcome::from_error(
                &GuardError::Internal("statistical rule finished without an aggregate".to_string()),
                &self.location,
            ),
            SlotState::Done(outcome) => outcome,
        };
        outcome.for_rule(self.descriptor)
    }
}
