//! Interceptor module: per-unit filters over batches of mutations, and their composition.
//!
//! An interceptor sees one compiled unit at a time: `begin` with the unit, any number of
//! `intercept` calls, then `end`. Filters only ever remove mutations; survivors keep
//! their relative order.

use crate::feature::{Feature, InterceptorParameters};
use crate::mutation::MutationDescriptor;
use crate::mutators::MutatorSet;
use crate::tree::{ClassTree, Location, MethodTree};
use crate::MutequivError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// What an interceptor does to the mutations it is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum InterceptorType {
    Other,
    /// Changes mutations or adds candidates.
    Modify,
    /// Only removes mutations.
    Filter,
    Report,
}

pub trait MutationInterceptor: Send {
    fn interceptor_type(&self) -> InterceptorType;

    fn begin(&mut self, unit: &Arc<ClassTree>);

    fn intercept(&mut self, mutations: Vec<MutationDescriptor>) -> Result<Vec<MutationDescriptor>, MutequivError>;

    fn end(&mut self);
}

/// Builds interceptors and describes the feature they implement.
pub trait MutationInterceptorFactory: Send + Sync {
    fn description(&self) -> &str;

    fn provides(&self) -> Feature;

    fn create_interceptor(&self, params: &InterceptorParameters) -> Box<dyn MutationInterceptor>;
}

/// Decides whether one mutation is trivially equivalent to the unmutated method.
pub trait EquivalenceRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Mutators whose mutations this rule may remove. Nothing else is ever inspected.
    fn mutators(&self) -> &MutatorSet;

    fn is_equivalent(&self, mutation: &MutationDescriptor, method: &MethodTree) -> bool;
}

/// Method lookups for the unit currently being analysed.
#[derive(Debug)]
struct UnitCache {
    unit: Arc<ClassTree>,
    methods: HashMap<Location, usize>,
}

impl UnitCache {
    fn new(unit: &Arc<ClassTree>) -> Self {
        let mut methods = HashMap::with_capacity(unit.methods().len());
        for (i, method) in unit.methods().iter().enumerate() {
            methods.entry(method.location().clone()).or_insert(i);
        }
        Self { unit: Arc::clone(unit), methods }
    }

    fn resolve(&self, location: &Location) -> Result<&MethodTree, MutequivError> {
        self.methods
            .get(location)
            .map(|&i| &self.unit.methods()[i])
            .ok_or_else(|| MutequivError::MethodNotFound {
                class: self.unit.name().to_string(),
                method: location.to_string(),
            })
    }
}

/// Applies one [`EquivalenceRule`] with the per-unit lifecycle.
///
/// Holds per-unit state between `begin` and `end`; use one instance per worker.
#[derive(Debug)]
pub struct RuleFilter<R> {
    rule: R,
    current: Option<UnitCache>,
}

impl<R: EquivalenceRule> RuleFilter<R> {
    pub fn new(rule: R) -> Self {
        Self { rule, current: None }
    }

    pub fn rule(&self) -> &R {
        &self.rule
    }
}

impl<R: EquivalenceRule> MutationInterceptor for RuleFilter<R> {
    fn interceptor_type(&self) -> InterceptorType {
        InterceptorType::Filter
    }

    fn begin(&mut self, unit: &Arc<ClassTree>) {
        self.current = Some(UnitCache::new(unit));
    }

    fn intercept(&mut self, mutations: Vec<MutationDescriptor>) -> Result<Vec<MutationDescriptor>, MutequivError> {
        if mutations.is_empty() {
            return Ok(mutations);
        }
        let cache = self.current.as_ref().ok_or(MutequivError::NoActiveUnit)?;
        let mut kept = Vec::with_capacity(mutations.len());
        for mutation in mutations {
            if !self.rule.mutators().contains(&mutation.mutator) {
                kept.push(mutation);
                continue;
            }
            let method = cache.resolve(&mutation.location)?;
            if self.rule.is_equivalent(&mutation, method) {
                log::debug!("{}: filtered equivalent mutant {}", self.rule.name(), mutation);
            } else {
                kept.push(mutation);
            }
        }
        Ok(kept)
    }

    fn end(&mut self) {
        self.current = None;
    }
}

/// Runs several interceptors in sequence over the same unit, each seeing the output of
/// the one before it.
pub struct CompoundInterceptor {
    children: Vec<Box<dyn MutationInterceptor>>,
    kind: InterceptorType,
}

impl CompoundInterceptor {
    pub fn new(children: Vec<Box<dyn MutationInterceptor>>) -> Self {
        Self { children, kind: InterceptorType::Other }
    }

    /// Reports `kind` as this compound's type.
    pub fn with_type(mut self, kind: InterceptorType) -> Self {
        self.kind = kind;
        self
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl MutationInterceptor for CompoundInterceptor {
    fn interceptor_type(&self) -> InterceptorType {
        self.kind
    }

    fn begin(&mut self, unit: &Arc<ClassTree>) {
        for child in &mut self.children {
            child.begin(unit);
        }
    }

    fn intercept(&mut self, mutations: Vec<MutationDescriptor>) -> Result<Vec<MutationDescriptor>, MutequivError> {
        let before = mutations.len();
        let mut current = mutations;
        for child in &mut self.children {
            current = child.intercept(current)?;
        }
        if current.len() != before {
            log::debug!("{} of {} mutations removed", before - current.len(), before);
        }
        Ok(current)
    }

    fn end(&mut self) {
        for child in &mut self.children {
            child.end();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Instruction, InstructionStream, Opcode};

    /// Treats every owned mutation at an even index as equivalent.
    struct EvenIndex(MutatorSet);

    impl EquivalenceRule for EvenIndex {
        fn name(&self) -> &'static str {
            "even"
        }

        fn mutators(&self) -> &MutatorSet {
            &self.0
        }

        fn is_equivalent(&self, mutation: &MutationDescriptor, _method: &MethodTree) -> bool {
            mutation.instruction_index % 2 == 0
        }
    }

    fn loc() -> Location {
        Location::new("a/B", "m", "()I")
    }

    fn unit() -> Arc<ClassTree> {
        Arc::new(ClassTree::new(
            "a/B",
            vec![MethodTree::new(loc(), InstructionStream::new(vec![Instruction::op(Opcode::Ireturn)]))],
        ))
    }

    fn filter(id: &str) -> RuleFilter<EvenIndex> {
        RuleFilter::new(EvenIndex(MutatorSet::builder().mutator(id).build()))
    }

    fn batch() -> Vec<MutationDescriptor> {
        (0..6)
            .map(|i| MutationDescriptor::new(if i < 3 { "A" } else { "B" }, loc(), i))
            .collect()
    }

    #[test]
    fn test_only_owned_mutations_are_inspected() {
        let mut f = filter("A");
        f.begin(&unit());
        let out = f.intercept(batch()).unwrap();
        let idx: Vec<_> = out.iter().map(|m| m.instruction_index).collect();
        assert_eq!(idx, vec![1, 3, 4, 5]);
        f.end();
    }

    #[test]
    fn test_empty_batch_needs_no_unit() {
        let mut f = filter("A");
        assert!(f.intercept(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_intercept_without_begin_fails() {
        let mut f = filter("A");
        assert!(matches!(f.intercept(batch()), Err(MutequivError::NoActiveUnit)));
        f.begin(&unit());
        f.end();
        assert!(matches!(f.intercept(batch()), Err(MutequivError::NoActiveUnit)));
    }

    #[test]
    fn test_unresolvable_method_fails_fast() {
        let mut f = filter("A");
        f.begin(&unit());
        let stray = MutationDescriptor::new("A", Location::new("a/B", "missing", "()V"), 0);
        match f.intercept(vec![stray]) {
            Err(MutequivError::MethodNotFound { class, method }) => {
                assert_eq!(class, "a/B");
                assert_eq!(method, "a/B::missing()V");
            }
            other => panic!("Expected MethodNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_compound_threads_batch_through_children() {
        let mut c = CompoundInterceptor::new(vec![Box::new(filter("A")), Box::new(filter("B"))])
            .with_type(InterceptorType::Filter);
        assert_eq!(c.interceptor_type(), InterceptorType::Filter);
        assert_eq!(c.len(), 2);
        c.begin(&unit());
        let out = c.intercept(batch()).unwrap();
        let idx: Vec<_> = out.iter().map(|m| m.instruction_index).collect();
        assert_eq!(idx, vec![1, 3, 5]);
        c.end();
        assert!(c.intercept(batch()).is_err());
    }

    #[test]
    fn test_empty_compound_is_identity() {
        let mut c = CompoundInterceptor::new(Vec::new());
        assert!(c.is_empty());
        assert_eq!(c.interceptor_type(), InterceptorType::Other);
        c.begin(&unit());
        assert_eq!(c.intercept(batch()).unwrap(), batch());
    }
}
