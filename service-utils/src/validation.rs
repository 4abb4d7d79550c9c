//! Structural validation of decoded values.
//!
//! A [`Validator`] holds rules keyed by the concrete type they check. After a
//! structured response or configuration file is decoded, the rule registered
//! for that type (if any) runs against the value. Types without a rule pass.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type Rule = Arc<dyn Fn(&dyn Any) -> Result<(), ValidationErrors> + Send + Sync>;

/// A single failed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Field that failed
    pub field: String,
    /// What was wrong with it
    pub message: String,
}

/// Collection of failed checks for one value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Failed fields in the order they were recorded.
    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Check whether nothing failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Convert into a result, failing when any field was recorded.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one field failed.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("validation failed")?;
        for (i, err) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{} {}", err.field, err.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Registry of validation rules keyed by type.
#[derive(Clone, Default)]
pub struct Validator {
    rules: HashMap<TypeId, Rule>,
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl Validator {
    /// Create a validator with no rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the rule for values of type `T`, replacing any previous one.
    #[must_use]
    pub fn with_rule<T, F>(mut self, rule: F) -> Self
    where
        T: Any,
        F: Fn(&T) -> Result<(), ValidationErrors> + Send + Sync + 'static,
    {
        let erased: Rule = Arc::new(move |value: &dyn Any| {
            value.downcast_ref::<T>().map_or(Ok(()), &rule)
        });
        self.rules.insert(TypeId::of::<T>(), erased);
        self
    }

    /// Check whether a rule exists for `T`.
    #[must_use]
    pub fn has_rule<T: Any>(&self) -> bool {
        self.rules.contains_key(&TypeId::of::<T>())
    }

    /// Validate a type-erased value.
    ///
    /// # Errors
    ///
    /// Returns the failures reported by the rule registered for the value's type.
    pub fn validate_any(&self, value: &dyn Any) -> Result<(), ValidationErrors> {
        match self.rules.get(&value.type_id()) {
            Some(rule) => rule(value),
            None => Ok(()),
        }
    }

    /// Validate a typed value.
    ///
    /// # Errors
    ///
    /// Returns the failures reported by the rule registered for `T`.
    pub fn validate<T: Any>(&self, value: &T) -> Result<(), ValidationErrors> {
        self.validate_any(value)
    }
}

/// Record an error when `value` is empty.
pub fn require_non_empty(errors: &mut ValidationErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, "is required");
    }
}
