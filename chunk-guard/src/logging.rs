//! Logging configuration for the validation engine.
//!
//! The engine emits `tracing` events with structured fields (`file`,
//! `rule.type`, `batch.sequence`, ...). [`LogConfig`] decides how chatty the
//! hot loop is; [`setup`] installs a subscriber for binaries and tests.

use tracing::Level;

/// What the engine logs while it runs.
///
/// Per-batch events fire once per chunk, so on large files they are the
/// expensive part of logging. They are off unless `log_data_operations` is
/// set and debug output is enabled.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level below which the engine skips building debug events
    pub base_level: Level,
    /// Log each passing rule outcome, not just failures
    pub log_rule_details: bool,
    /// Log every batch read in either pass
    pub log_data_operations: bool,
    /// Include rule metrics in outcome events
    pub log_metrics: bool,
    /// Longest message or value logged before truncation
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_level: Level::INFO,
            log_rule_details: false,
            log_data_operations: true,
            log_metrics: true,
            max_field_length: 256,
        }
    }
}

impl LogConfig {
    /// Everything, for debugging a job.
    pub fn verbose() -> Self {
        Self {
            base_level: Level::DEBUG,
            log_rule_details: true,
            log_data_operations: true,
            log_metrics: true,
            max_field_length: 1024,
        }
    }

    /// Warnings and errors only.
    pub fn production() -> Self {
        Self {
            base_level: Level::WARN,
            log_rule_details: false,
            log_data_operations: false,
            log_metrics: false,
            max_field_length: 128,
        }
    }

    /// Same as [`LogConfig::default`].
    pub fn balanced() -> Self {
        Self::default()
    }

    /// Whether per-batch debug events should be built at all.
    pub fn logs_batches(&self) -> bool {
        self.log_data_operations && self.base_level >= Level::DEBUG
    }
}

/// Debug event gated on the config's base level.
#[macro_export]
macro_rules! perf_debug {
    ($config:expr, $($arg:tt)*) => {
        if $config.base_level >= tracing::Level::DEBUG {
            tracing::debug!($($arg)*);
        }
    };
}

/// Debug event for a passing rule, gated on `log_rule_details`.
#[macro_export]
macro_rules! log_rule {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_rule_details {
            tracing::debug!($($arg)*);
        }
    };
}

/// Debug event for a batch read, gated on [`LogConfig::logs_batches`].
#[macro_export]
macro_rules! log_data_op {
    ($config:expr, $($arg:tt)*) => {
        if $config.logs_batches() {
            tracing::debug!($($arg)*);
        }
    };
}

/// Truncates `value` to at most `max_length` bytes on a character boundary.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        return value.to_string();
    }
    let mut end = max_length;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &value[..end])
}

/// Subscriber setup for binaries embedding the engine.
pub mod setup {
    use tracing::Level;

    /// How to install the global subscriber.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Level for everything outside this crate
        pub level: Level,
        /// Level for `chunk_guard` events
        pub guard_level: Level,
        /// Emit JSON lines instead of human-readable text
        pub json_format: bool,
        /// Overrides the generated filter
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::INFO,
                guard_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// JSON output, warnings from dependencies, info from the engine.
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                guard_level: Level::INFO,
                json_format: true,
                env_filter: None,
            }
        }

        /// Debug everywhere, plain text.
        pub fn development() -> Self {
            Self {
                level: Level::DEBUG,
                guard_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }

        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level;
            self
        }

        pub fn with_guard_level(mut self, level: Level) -> Self {
            self.guard_level = level;
            self
        }

        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// The filter directive string.
        pub fn env_filter(&self) -> String {
            if let Some(ref filter) = self.env_filter {
                filter.clone()
            } else {
                format!(
                    "{},chunk_guard={}",
                    self.level.as_str().to_lowercase(),
                    self.guard_level.as_str().to_lowercase()
                )
            }
        }
    }

    /// Installs a global `fmt` subscriber. `RUST_LOG`, when set, wins over
    /// the configured filter.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use chunk_guard::logging::setup::{init_logging, LoggingConfig};
    ///
    /// init_logging(LoggingConfig::development().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(config.env_filter()))?;

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer().json().boxed()
        } else {
            tracing_subscriber::fmt::layer().boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        Ok(())
    }
}
