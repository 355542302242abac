//! Lookup table from rule type id to constructor.

use super::rule::RuleKind;
use crate::config::RuleDescriptor;
use crate::error::{GuardError, Result};
use crate::resolver::ReferenceIndex;
use std::collections::HashMap;
use std::sync::Arc;

/// What a factory gets besides the descriptor.
#[derive(Debug, Clone)]
pub struct RuleContext {
    /// Sample cap from the job settings
    pub max_sample_failures: usize,
    /// Reference index, when the descriptor names a `reference_file`
    pub reference: Option<Arc<ReferenceIndex>>,
}

impl RuleContext {
    /// A context without reference data.
    pub fn new(max_sample_failures: usize) -> Self {
        Self {
            max_sample_failures,
            reference: None,
        }
    }

    /// Attaches a resolved reference index.
    pub fn with_reference(mut self, reference: Arc<ReferenceIndex>) -> Self {
        self.reference = Some(reference);
        self
    }

    /// The reference index, or a configuration error naming the rule.
    pub fn require_reference(&self, descriptor: &RuleDescriptor) -> Result<Arc<ReferenceIndex>> {
        self.reference.clone().ok_or_else(|| {
            GuardError::configuration(
                descriptor.location(),
                "rule needs a 'reference_file' parameter",
            )
        })
    }
}

/// Builds a rule from its descriptor.
pub type RuleFactory = fn(&RuleDescriptor, &RuleContext) -> Result<RuleKind>;

/// The closed set of rule types an engine can run.
///
/// Built once and shared read-only; there is no global registration.
///
/// # Examples
///
/// ```rust
/// use chunk_guard::core::RuleRegistry;
///
/// let registry = RuleRegistry::with_builtin();
/// assert!(registry.contains("MandatoryFieldCheck"));
/// assert!(registry.contains("StatisticalOutlierCheck"));
/// assert!(!registry.contains("NoSuchCheck"));
/// ```
#[derive(Clone, Default)]
pub struct RuleRegistry {
    factories: HashMap<String, RuleFactory>,
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rule_types", &self.rule_types())
            .finish()
    }
}

impl RuleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in rule.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        crate::rules::register_builtin(&mut registry);
        registry
    }

    /// Registers (or replaces) a rule type.
    pub fn register(&mut self, rule_type: impl Into<String>, factory: RuleFactory) -> &mut Self {
        self.factories.insert(rule_type.into(), factory);
        self
    }

    /// Returns true if `rule_type` is known.
    pub fn contains(&self, rule_type: &str) -> bool {
        self.factories.contains_key(rule_type)
    }

    /// Registered type ids, sorted.
    pub fn rule_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Instantiates the rule a descriptor names.
    pub fn create(&self, descriptor: &RuleDescriptor, context: &RuleContext) -> Result<RuleKind> {
        let factory = self.factories.get(&descriptor.rule_type).ok_or_else(|| {
            GuardError::configuration(
                descriptor.location(),
                format!("unknown rule type '{}'", descriptor.rule_type),
            )
        })?;
        factory(descriptor, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_unknown_rule_type() {
        let registry = RuleRegistry::with_builtin();
        let err = registry
            .create(&RuleDescriptor::new("Telepathy"), &RuleContext::new(10))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("unknown rule type 'Telepathy'"));
    }

    #[test]
    fn test_builtin_catalogue() {
        let registry = RuleRegistry::with_builtin();
        assert_eq!(
            registry.rule_types(),
            vec![
                "CrossFileDuplicateCheck",
                "DateFormatCheck",
                "EmptyFileCheck",
                "MandatoryFieldCheck",
                "RangeCheck",
                "ReferentialIntegrityCheck",
                "RegexCheck",
                "RowCountRangeCheck",
                "StatisticalOutlierCheck",
                "StringLengthCheck",
                "UniqueKeyCheck",
                "ValidValuesCheck",
            ]
        );
    }

    #[test]
    fn test_register_custom_rule() {
        fn empty_file(descriptor: &RuleDescriptor, context: &RuleContext) -> Result<RuleKind> {
            crate::rules::row_count::empty_file(descriptor, context)
        }
        let mut registry = RuleRegistry::new();
        registry.register("NoRows", empty_file);
        let kind = registry
            .create(&RuleDescriptor::new("NoRows"), &RuleContext::new(10))
            .unwrap();
        assert!(!kind.is_statistical());
    }
}
