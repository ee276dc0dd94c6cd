//! Mutators module: the mutator ids each equivalence rule owns.
//!
//! Ids are plain strings chosen by the mutation engine. The defaults below can be
//! replaced through [`MutatorIds`], which is what the filter factory is configured with.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

macro_rules! return_mutators {
    ($( $(#[$doc:meta])* $name:ident => $id:expr ),* $(,)?) => {
        $(
            $(#[$doc])*
            pub const $name: &str = $id;
        )*

        /// Every return-value mutator id known to the rule set.
        pub const RETURN_MUTATORS: &[&str] = &[$($name),*];
    };
}

return_mutators! {
    /// Replaces primitive return values with 0.
    PRIMITIVE_RETURNS => "PRIMITIVE_RETURNS",
    /// Replaces boolean return values with true.
    TRUE_RETURNS => "TRUE_RETURNS",
    /// Replaces boolean return values with false.
    FALSE_RETURNS => "FALSE_RETURNS",
    /// Replaces object return values with an "empty" value.
    EMPTY_RETURNS => "EMPTY_RETURNS",
    /// Replaces object return values with null.
    NULL_RETURNS => "NULL_RETURNS",
}

/// Immutable set of mutator ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutatorSet {
    ids: BTreeSet<String>,
}

impl MutatorSet {
    pub fn builder() -> MutatorSetBuilder {
        MutatorSetBuilder::new()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct MutatorSetBuilder {
    ids: BTreeSet<String>,
}

impl MutatorSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mutator(mut self, id: impl Into<String>) -> Self {
        self.ids.insert(id.into());
        self
    }

    pub fn build(self) -> MutatorSet {
        MutatorSet { ids: self.ids }
    }
}

/// The ids the return-value mutators are registered under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutatorIds {
    pub primitive_returns: String,
    pub true_returns: String,
    pub false_returns: String,
    pub empty_returns: String,
    pub null_returns: String,
}

impl Default for MutatorIds {
    fn default() -> Self {
        Self {
            primitive_returns: PRIMITIVE_RETURNS.to_string(),
            true_returns: TRUE_RETURNS.to_string(),
            false_returns: FALSE_RETURNS.to_string(),
            empty_returns: EMPTY_RETURNS.to_string(),
            null_returns: NULL_RETURNS.to_string(),
        }
    }
}

impl MutatorIds {
    /// Mutators that may be replaced by a primitive zero.
    pub fn zero_returns(&self) -> MutatorSet {
        MutatorSet::builder()
            .mutator(&self.primitive_returns)
            .mutator(&self.false_returns)
            .build()
    }

    pub fn true_returns(&self) -> MutatorSet {
        MutatorSet::builder().mutator(&self.true_returns).build()
    }

    /// Mutators that may be replaced by an empty, zero or false object.
    pub fn empty_returns(&self) -> MutatorSet {
        MutatorSet::builder()
            .mutator(&self.empty_returns)
            .mutator(&self.false_returns)
            .build()
    }

    pub fn null_returns(&self) -> MutatorSet {
        MutatorSet::builder().mutator(&self.null_returns).build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_contains() {
        let set = MutatorSet::builder().mutator("A").mutator("B").mutator("A").build();
        assert_eq!(set.len(), 2);
        assert!(set.contains("A"));
        assert!(!set.contains("C"));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[test]
    fn test_default_ownership() {
        let ids = MutatorIds::default();
        assert!(ids.zero_returns().contains(PRIMITIVE_RETURNS));
        assert!(ids.zero_returns().contains(FALSE_RETURNS));
        assert!(ids.empty_returns().contains(EMPTY_RETURNS));
        assert!(ids.empty_returns().contains(FALSE_RETURNS));
        assert!(!ids.empty_returns().contains(NULL_RETURNS));
        assert_eq!(ids.true_returns().len(), 1);
        assert_eq!(ids.null_returns().len(), 1);
        assert_eq!(RETURN_MUTATORS.len(), 5);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let ids: MutatorIds = serde_json::from_str(r#"{"null_returns":"org.example.NullReturns"}"#).unwrap();
        assert_eq!(ids.null_returns, "org.example.NullReturns");
        assert_eq!(ids.true_returns, TRUE_RETURNS);
        assert!(ids.null_returns().contains("org.example.NullReturns"));
    }

    #[test]
    fn test_set_serialization_deserialization() {
        let set = MutatorSet::builder().mutator("X").build();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["X"]"#);
        let back: MutatorSet = serde_json::from_str(&json).unwrap();
        assert_eq!(set, back);
    }
}
