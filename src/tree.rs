//! Tree module: the compiled unit (class) and its methods, as handed to the filters.

use crate::ir::{InsnRef, InstructionStream};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a method within the program: owning class, name and descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub class_name: String,
    pub method_name: String,
    pub method_desc: String,
}

impl Location {
    pub fn new(
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        method_desc: impl Into<String>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
            method_desc: method_desc.into(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}{}", self.class_name, self.method_name, self.method_desc)
    }
}

/// One method body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodTree {
    location: Location,
    instructions: InstructionStream,
}

impl MethodTree {
    pub fn new(location: Location, instructions: InstructionStream) -> Self {
        Self { location, instructions }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn instructions(&self) -> &InstructionStream {
        &self.instructions
    }

    pub fn instruction(&self, index: usize) -> Option<&InsnRef> {
        self.instructions.get(index)
    }

    /// Nearest real instruction before the one at `index`; `None` when `index` names no
    /// instruction of this method.
    pub fn real_instruction_before(&self, index: usize) -> Option<&InsnRef> {
        self.instruction(index)?;
        self.instructions.real_instruction_before(index)
    }
}

/// A compiled unit: a class and the methods it declares.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassTree {
    name: String,
    methods: Vec<MethodTree>,
}

impl ClassTree {
    pub fn new(name: impl Into<String>, methods: Vec<MethodTree>) -> Self {
        Self { name: name.into(), methods }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &[MethodTree] {
        &self.methods
    }

    /// Linear lookup; filters cache the result per unit instead of calling this per mutation.
    pub fn method_at(&self, location: &Location) -> Option<&MethodTree> {
        self.methods.iter().find(|m| m.location() == location)
    }
}
