//! Mutation module: the descriptor records produced by mutation generation.

use crate::tree::Location;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One candidate mutant, as described by the mutator that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MutationDescriptor {
    /// Globally unique id of the mutator.
    pub mutator: String,
    /// Index of the mutated instruction in the method body.
    pub instruction_index: usize,
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl MutationDescriptor {
    pub fn new(mutator: impl Into<String>, location: Location, instruction_index: usize) -> Self {
        Self {
            mutator: mutator.into(),
            instruction_index,
            location,
            description: None,
            line: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

impl fmt::Display for MutationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}[{}]", self.mutator, self.location, self.instruction_index)?;
        if let Some(line) = self.line {
            write!(f, " line {}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let m = MutationDescriptor::new("NULL_RETURNS", Location::new("a/B", "c", "()Ljava/lang/Object;"), 3)
            .with_line(17);
        assert_eq!(m.to_string(), "NULL_RETURNS at a/B::c()Ljava/lang/Object;[3] line 17");
    }

    #[test]
    fn test_optional_fields_default_when_absent() {
        let json = r#"{"mutator":"MATH","instruction_index":2,
            "location":{"class_name":"a/B","method_name":"c","method_desc":"()I"}}"#;
        let m: MutationDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(m.mutator, "MATH");
        assert_eq!(m.instruction_index, 2);
        assert_eq!(m.description, None);
        assert_eq!(m.line, None);
    }

    #[test]
    fn test_serialization_deserialization() {
        let m = MutationDescriptor::new("EMPTY_RETURNS", Location::new("a/B", "c", "()Ljava/util/List;"), 5)
            .with_description("replaced return value with Collections.emptyList");
        let json = serde_json::to_string(&m).unwrap();
        let back: MutationDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(m, back);
    }
}
