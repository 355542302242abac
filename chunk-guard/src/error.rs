//! Error types for the chunk-guard validation engine.
//!
//! All errors are represented by [`GuardError`]. Rule-scoped variants carry an
//! [`ErrorLocation`] naming the file, rule type and field involved so that an
//! unattended batch job can be diagnosed from the log line alone.
//!
//! Errors travel on two channels:
//!
//! - **Rule level**: configuration, data-shape, replay and resource errors are
//!   caught by the engine and folded into a failed
//!   [`RuleOutcome`](crate::core::RuleOutcome). They never abort the job.
//! - **Job level**: errors returned from
//!   [`ValidationEngine::run`](crate::core::ValidationEngine::run) abort the
//!   whole run and map to exit code 2.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Exit code reported for engine and configuration errors.
pub const ENGINE_ERROR_EXIT_CODE: i32 = 2;

/// Where an error happened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLocation {
    /// File being validated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Rule type id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_type: Option<String>,
    /// Field the rule operates on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorLocation {
    /// Creates an empty location.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the file.
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Sets the rule type.
    pub fn with_rule(mut self, rule_type: impl Into<String>) -> Self {
        self.rule_type = Some(rule_type.into());
        self
    }

    /// Sets the field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Fills in any part of this location that is still unset from `other`.
    pub fn or(mut self, other: &ErrorLocation) -> Self {
        if self.file.is_none() {
            self.file = other.file.clone();
        }
        if self.rule_type.is_none() {
            self.rule_type = other.rule_type.clone();
        }
        if self.field.is_none() {
            self.field = other.field.clone();
        }
        self
    }
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = self.file.as_deref().unwrap_or("-");
        let rule = self.rule_type.as_deref().unwrap_or("-");
        let field = self.field.as_deref().unwrap_or("-");
        write!(f, "file={file} rule={rule} field={field}")
    }
}

/// The category of an error, as stored in serialized outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad parameters, unknown condition field, missing reference key
    Configuration,
    /// An expected column is absent from a batch
    DataShape,
    /// A two-pass rule ran against a source that cannot be replayed
    SourceReplay,
    /// A reference file could not be read
    Resource,
    /// A condition expression could not be parsed
    Condition,
    /// The primary data source failed
    Source,
    /// The run was cancelled by the host
    Cancelled,
    /// Anything else
    Internal,
}

impl ErrorKind {
    /// Returns the snake_case name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::DataShape => "data_shape",
            ErrorKind::SourceReplay => "source_replay",
            ErrorKind::Resource => "resource",
            ErrorKind::Condition => "condition",
            ErrorKind::Source => "source",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The main error type for chunk-guard.
#[derive(Error, Debug)]
pub enum GuardError {
    /// Invalid rule parameters, unknown fields, unknown rule types.
    #[error("Configuration error ({location}): {message}")]
    Configuration {
        /// Where the error occurred
        location: ErrorLocation,
        /// Detailed error message
        message: String,
    },

    /// A column the rule depends on is missing from the data.
    #[error("Data shape error ({location}): {message}")]
    DataShape {
        /// Where the error occurred
        location: ErrorLocation,
        /// Detailed error message
        message: String,
    },

    /// A two-pass rule cannot get a second, identical pass over its source.
    #[error("Source replay error ({location}): {message}")]
    SourceReplay {
        /// Where the error occurred
        location: ErrorLocation,
        /// Detailed error message
        message: String,
    },

    /// A reference dataset could not be loaded.
    #[error("Resource error ({location}): {message}")]
    Resource {
        /// Where the error occurred
        location: ErrorLocation,
        /// Detailed error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A condition expression is syntactically invalid.
    #[error("Invalid condition '{expression}' at position {position}: {message}")]
    Condition {
        /// The expression text
        expression: String,
        /// Byte offset of the offending token
        position: usize,
        /// Detailed error message
        message: String,
    },

    /// The primary data source could not be opened or read.
    #[error("Data source error for '{file}': {message}")]
    Source {
        /// The file being read
        file: String,
        /// Detailed error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The host asked the engine to stop.
    #[error("Validation cancelled while processing '{file}'")]
    Cancelled {
        /// The file being processed when cancellation was observed
        file: String,
    },

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Context added on the way up. Kind and location are the inner error's.
    #[error("{context}: {source}")]
    Context {
        /// What was being done when the error occurred
        context: String,
        /// The underlying error
        #[source]
        source: Box<GuardError>,
    },
}

/// A type alias for `Result<T, GuardError>`.
pub type Result<T> = std::result::Result<T, GuardError>;

impl GuardError {
    /// Creates a configuration error.
    pub fn configuration(location: ErrorLocation, message: impl Into<String>) -> Self {
        Self::Configuration {
            location,
            message: message.into(),
        }
    }

    /// Creates a data shape error.
    pub fn data_shape(location: ErrorLocation, message: impl Into<String>) -> Self {
        Self::DataShape {
            location,
            message: message.into(),
        }
    }

    /// Creates a source replay error.
    pub fn source_replay(location: ErrorLocation, message: impl Into<String>) -> Self {
        Self::SourceReplay {
            location,
            message: message.into(),
        }
    }

    /// Creates a resource error.
    pub fn resource(location: ErrorLocation, message: impl Into<String>) -> Self {
        Self::Resource {
            location,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a resource error with a source error.
    pub fn resource_with_source(
        location: ErrorLocation,
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Resource {
            location,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a data source error.
    pub fn source(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            file: file.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a data source error with a source error.
    pub fn source_with_source(
        file: impl Into<String>,
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Source {
            file: file.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Wraps the error with a description of what was being done.
    pub fn wrap(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GuardError::Context { source, .. } => source.kind(),
            GuardError::Configuration { .. } => ErrorKind::Configuration,
            GuardError::DataShape { .. } => ErrorKind::DataShape,
            GuardError::SourceReplay { .. } => ErrorKind::SourceReplay,
            GuardError::Resource { .. } => ErrorKind::Resource,
            GuardError::Condition { .. } => ErrorKind::Condition,
            GuardError::Source { .. } | GuardError::DataFusion(_) | GuardError::Io(_) => {
                ErrorKind::Source
            }
            GuardError::Cancelled { .. } => ErrorKind::Cancelled,
            GuardError::Arrow(_) | GuardError::Serialization(_) | GuardError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Returns the location attached to this error, if any.
    pub fn location(&self) -> Option<&ErrorLocation> {
        match self {
            GuardError::Configuration { location, .. }
            | GuardError::DataShape { location, .. }
            | GuardError::SourceReplay { location, .. }
            | GuardError::Resource { location, .. } => Some(location),
            GuardError::Context { source, .. } => source.location(),
            _ => None,
        }
    }

    /// Fills in missing location parts from `fallback`.
    pub fn located(self, fallback: &ErrorLocation) -> Self {
        match self {
            GuardError::Configuration { location, message } => GuardError::Configuration {
                location: location.or(fallback),
                message,
            },
            GuardError::DataShape { location, message } => GuardError::DataShape {
                location: location.or(fallback),
                message,
            },
            GuardError::SourceReplay { location, message } => GuardError::SourceReplay {
                location: location.or(fallback),
                message,
            },
            GuardError::Resource {
                location,
                message,
                source,
            } => GuardError::Resource {
                location: location.or(fallback),
                message,
                source,
            },
            GuardError::Context { context, source } => GuardError::Context {
                context,
                source: Box::new(source.located(fallback)),
            },
            other => other,
        }
    }

    /// The message without the location prefix.
    pub fn detail(&self) -> String {
        match self {
            GuardError::Configuration { message, .. }
            | GuardError::DataShape { message, .. }
            | GuardError::SourceReplay { message, .. }
            | GuardError::Resource { message, .. } => message.clone(),
            GuardError::Context { context, source } => format!("{context}: {}", source.detail()),
            other => other.to_string(),
        }
    }

    /// Process exit code for a run that ended with this error.
    pub fn exit_code(&self) -> i32 {
        ENGINE_ERROR_EXIT_CODE
    }
}

impl From<serde_json::Error> for GuardError {
    fn from(err: serde_json::Error) -> Self {
        GuardError::Serialization(err.to_string())
    }
}

/// Extension trait for adding context to errors.
///
/// The context is prepended to the message; the error keeps its kind and
/// location, so a wrapped rule error stays local to its rule.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<GuardError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| e.into().wrap(msg))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().wrap(f()))
    }
}
