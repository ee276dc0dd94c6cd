//! Mutequiv: equivalent-mutant filtering for bytecode mutation testing.
//!
//! Return-value mutators work from the raw instruction stream, so they sometimes replace a
//! return value with the value the method already returns. Such mutants can never be
//! killed. This crate recognizes the common shapes of that situation and removes the
//! mutants before any test runs.
//!
//! # Architecture
//! - Instruction model and compiled units (`ir`, `tree`)
//! - Slots and per-evaluation context (`slot`, `context`)
//! - Predicate algebra over single instructions (`predicates`)
//! - Declarative sequence queries, compiled into reusable matchers (`query`, `compiler`, `matcher`)
//! - Mutation descriptors and the mutator ids the rules own (`mutation`, `mutators`)
//! - Return-value equivalence rules and the filter chain that applies them (`equivalent`, `interceptor`)
//! - Feature identity and toggles (`feature`)

mod ir;
mod tree;
mod slot;
mod context;
mod predicates;
mod query;
mod compiler;
mod matcher;
mod mutation;
mod mutators;
mod interceptor;
mod equivalent;
mod feature;

pub use ir::*;
pub use tree::*;
pub use slot::*;
pub use context::*;
pub use predicates::*;
pub use query::*;
pub use compiler::*;
pub use matcher::*;
pub use mutation::*;
pub use mutators::*;
pub use interceptor::*;
pub use equivalent::*;
pub use feature::*;

use thiserror::Error;

/// Unified error type for Mutequiv operations
#[derive(Debug, Error)]
pub enum MutequivError {
    #[error("Query error: slot '{0}' is read before it is bound")]
    UnboundSlot(String),
    #[error("Query error: ignore predicate captures into slot '{0}'")]
    CapturingIgnore(String),
    #[error("Method not found in {class}: {method}")]
    MethodNotFound { class: String, method: String },
    #[error("Interceptor used outside of begin/end")]
    NoActiveUnit,
    #[error("Feature parse error: {0}")]
    FeatureParse(String),
    #[error("Unknown feature: {0}")]
    UnknownFeature(String),
}
