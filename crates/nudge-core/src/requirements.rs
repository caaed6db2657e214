use std::collections::BTreeMap;
use std::fmt;

use crate::document::RequirementSet;
use crate::value::Value;

type Predicate = Box<dyn Fn(&Value) -> bool + Send + Sync>;

/// Caller-registered predicates over user-defined requirement values.
///
/// An entry passes only if every registered key is present in its
/// requirements and every predicate accepts the value.
#[derive(Default)]
pub struct RequirementChecks {
    checks: BTreeMap<String, Predicate>,
}

impl RequirementChecks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, key: impl Into<String>, predicate: F)
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.checks.insert(key.into(), Box::new(predicate));
    }

    #[must_use]
    pub fn with<F>(mut self, key: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.register(key, predicate);
        self
    }

    /// Register a check that passes when the value equals `expected`.
    #[must_use]
    pub fn with_equals(self, key: impl Into<String>, expected: Value) -> Self {
        self.with(key, move |value| *value == expected)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    #[must_use]
    pub fn evaluate(&self, requirements: Option<&RequirementSet>) -> bool {
        if self.checks.is_empty() {
            return true;
        }
        let Some(requirements) = requirements else {
            return false;
        };
        self.checks.iter().all(|(key, predicate)| {
            requirements
                .user_defined
                .get(key)
                .is_some_and(|value| predicate(value))
        })
    }
}

impl fmt::Debug for RequirementChecks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.checks.keys()).finish()
    }
}
