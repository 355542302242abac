//! Job configuration handed to the engine by the configuration front-end.
//!
//! These are plain `serde` types: a YAML or JSON front-end deserializes into
//! [`JobSpec`] and the engine takes it from there. Rule parameters stay as a
//! JSON object map and are read through the typed accessors on
//! [`RuleDescriptor`], which report missing or mistyped parameters as
//! configuration errors carrying the rule and field names.

use crate::core::Severity;
use crate::error::{ErrorLocation, GuardError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;

/// Default number of rows per batch.
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// Default number of sample failures kept per rule.
pub const DEFAULT_MAX_SAMPLE_FAILURES: usize = 100;

/// On-disk format of a data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// Comma separated values with a header row
    Csv,
    /// Apache Parquet
    Parquet,
    /// Newline-delimited JSON
    Json,
}

impl FileFormat {
    /// Infers the format from a file extension.
    pub fn from_path(path: &str) -> Option<Self> {
        let extension = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "csv" | "txt" => Some(FileFormat::Csv),
            "parquet" => Some(FileFormat::Parquet),
            "json" | "jsonl" | "ndjson" => Some(FileFormat::Json),
            _ => None,
        }
    }

    /// Returns the string representation of the format.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Parquet => "parquet",
            FileFormat::Json => "json",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_true() -> bool {
    true
}

/// One configured validation rule, parsed once per job.
///
/// # Examples
///
/// ```rust
/// use chunk_guard::config::RuleDescriptor;
/// use chunk_guard::core::Severity;
///
/// let rule = RuleDescriptor::new("RegexCheck")
///     .with_severity(Severity::Warning)
///     .with_param("field", "email")
///     .with_param("pattern", r"^[^@]+@[^@]+$")
///     .with_condition("status == 'ACTIVE'");
///
/// assert_eq!(rule.field(), Some("email"));
/// assert!(rule.enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDescriptor {
    /// Rule type id, resolved through the registry
    #[serde(rename = "type")]
    pub rule_type: String,
    /// Effect of a failure on file status
    #[serde(default)]
    pub severity: Severity,
    /// Rule-specific parameters
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Optional row filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Disabled rules are skipped entirely
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Compare strings in the condition without regard to case
    #[serde(default)]
    pub condition_case_insensitive: bool,
}

impl RuleDescriptor {
    /// Creates an enabled error-severity descriptor with no parameters.
    pub fn new(rule_type: impl Into<String>) -> Self {
        Self {
            rule_type: rule_type.into(),
            severity: Severity::Error,
            params: Map::new(),
            condition: None,
            enabled: true,
            condition_case_insensitive: false,
        }
    }

    /// Sets the severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Sets a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Sets the condition expression.
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Enables or disables the rule.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Makes condition string comparisons case-insensitive.
    pub fn with_case_insensitive_condition(mut self, enabled: bool) -> Self {
        self.condition_case_insensitive = enabled;
        self
    }

    /// The primary field of the rule (`field`, or `column` as an alias).
    pub fn field(&self) -> Option<&str> {
        self.params
            .get("field")
            .or_else(|| self.params.get("column"))
            .and_then(Value::as_str)
    }

    /// Location describing this rule for error messages.
    pub fn location(&self) -> ErrorLocation {
        let location = ErrorLocation::new().with_rule(&self.rule_type);
        match self.field() {
            Some(field) => location.with_field(field),
            None => location,
        }
    }

    fn invalid(&self, key: &str, expected: &str) -> GuardError {
        GuardError::configuration(
            self.location(),
            format!("parameter '{key}' must be {expected}"),
        )
    }

    /// The primary field, which must be present.
    pub fn required_field(&self) -> Result<&str> {
        self.field().ok_or_else(|| {
            GuardError::configuration(self.location(), "missing required parameter 'field'")
        })
    }

    /// A required string parameter.
    pub fn param_str(&self, key: &str) -> Result<&str> {
        self.opt_str(key)?.ok_or_else(|| {
            GuardError::configuration(
                self.location(),
                format!("missing required parameter '{key}'"),
            )
        })
    }

    /// An optional string parameter.
    pub fn opt_str(&self, key: &str) -> Result<Option<&str>> {
        match self.params.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(self.invalid(key, "a string")),
        }
    }

    /// An optional numeric parameter.
    pub fn opt_f64(&self, key: &str) -> Result<Option<f64>> {
        match self.params.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.invalid(key, "a number")),
            Some(_) => Err(self.invalid(key, "a number")),
        }
    }

    /// An optional non-negative integer parameter.
    pub fn opt_u64(&self, key: &str) -> Result<Option<u64>> {
        match self.params.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| self.invalid(key, "a non-negative integer")),
            Some(_) => Err(self.invalid(key, "a non-negative integer")),
        }
    }

    /// A boolean parameter with a default.
    pub fn param_bool_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.params.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(self.invalid(key, "a boolean")),
        }
    }

    /// A list of strings; a single string is accepted as a one-element list.
    ///
    /// Non-string scalars in the list are converted to their JSON text so that
    /// `values: [1, 2, 3]` works for numeric columns.
    pub fn param_str_list(&self, key: &str) -> Result<Vec<String>> {
        match self.params.get(key) {
            Some(Value::String(s)) => Ok(vec![s.clone()]),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    Value::Number(n) => Ok(n.to_string()),
                    Value::Bool(b) => Ok(b.to_string()),
                    _ => Err(self.invalid(key, "a list of scalars")),
                })
                .collect(),
            None | Some(Value::Null) => Err(GuardError::configuration(
                self.location(),
                format!("missing required parameter '{key}'"),
            )),
            Some(_) => Err(self.invalid(key, "a string or a list of strings")),
        }
    }
}

/// One data file and the rules to run against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSpec {
    /// Path (or loader-specific name) of the file
    pub path: String,
    /// Explicit format; inferred from the extension when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<FileFormat>,
    /// Rules in declared order
    #[serde(default)]
    pub validations: Vec<RuleDescriptor>,
}

impl FileSpec {
    /// Creates a file spec with no rules.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            format: None,
            validations: Vec::new(),
        }
    }

    /// Sets the format explicitly.
    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Appends a rule.
    pub fn with_rule(mut self, rule: RuleDescriptor) -> Self {
        self.validations.push(rule);
        self
    }

    /// The explicit format, or one inferred from the path.
    pub fn resolved_format(&self) -> Option<FileFormat> {
        self.format.or_else(|| FileFormat::from_path(&self.path))
    }

    /// Enabled rules in declared order.
    pub fn enabled_rules(&self) -> impl Iterator<Item = &RuleDescriptor> {
        self.validations.iter().filter(|rule| rule.enabled)
    }
}

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Rows per batch
    pub chunk_size: usize,
    /// Sample failures kept per rule
    pub max_sample_failures: usize,
    /// Whether a FAILED job exits with code 1
    pub fail_on_error: bool,
    /// Whether a WARNING job exits with code 1
    pub fail_on_warning: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_sample_failures: DEFAULT_MAX_SAMPLE_FAILURES,
            fail_on_error: true,
            fail_on_warning: false,
        }
    }
}

impl Settings {
    /// Sets the chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets the sample cap.
    pub fn with_max_sample_failures(mut self, max: usize) -> Self {
        self.max_sample_failures = max;
        self
    }

    /// Sets whether errors fail the process.
    pub fn with_fail_on_error(mut self, enabled: bool) -> Self {
        self.fail_on_error = enabled;
        self
    }

    /// Sets whether warnings fail the process.
    pub fn with_fail_on_warning(mut self, enabled: bool) -> Self {
        self.fail_on_warning = enabled;
        self
    }

    /// Checks the settings for values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(GuardError::configuration(
                ErrorLocation::new(),
                "settings.chunk_size must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn default_job_name() -> String {
    "validation_job".to_string()
}

/// A complete validation job.
///
/// # Examples
///
/// ```rust
/// use chunk_guard::config::JobSpec;
///
/// let job = JobSpec::from_json_str(r#"{
///     "name": "customers",
///     "files": [{
///         "path": "customers.csv",
///         "validations": [
///             {"type": "MandatoryFieldCheck", "severity": "error", "params": {"field": "email"}}
///         ]
///     }],
///     "settings": {"chunk_size": 5000}
/// }"#).unwrap();
///
/// assert_eq!(job.settings.chunk_size, 5000);
/// assert_eq!(job.settings.max_sample_failures, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Job name, echoed into the outcome
    #[serde(default = "default_job_name")]
    pub name: String,
    /// Files in declared order
    #[serde(default)]
    pub files: Vec<FileSpec>,
    /// Engine settings
    #[serde(default)]
    pub settings: Settings,
}

impl JobSpec {
    /// Creates an empty job with default settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            files: Vec::new(),
            settings: Settings::default(),
        }
    }

    /// Appends a file.
    pub fn with_file(mut self, file: FileSpec) -> Self {
        self.files.push(file);
        self
    }

    /// Replaces the settings.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Parses and validates a JSON job description.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let job: JobSpec = serde_json::from_str(json)?;
        job.validate()?;
        Ok(job)
    }

    /// Checks job-level invariants.
    pub fn validate(&self) -> Result<()> {
        self.settings.validate()?;
        for file in &self.files {
            if file.path.trim().is_empty() {
                return Err(GuardError::configuration(
                    ErrorLocation::new(),
                    "every file needs a non-empty path",
                ));
            }
        }
        Ok(())
    }
}
