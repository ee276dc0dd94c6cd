//! Equivalent return-value mutant filtering.
//!
//! The return-value mutators replace whatever a method returns with a fixed surrogate
//! (0, true, false, null or an empty value) without looking at what the method already
//! returns. When the instructions in front of the return already produce that
//! surrogate, the mutant is identical in behaviour to the unmutated method and is removed here.
//!
//! Every rule errs on the side of keeping a mutant: anything that is not one of the
//! shapes below is treated as killable.

use crate::compiler::QueryParams;
use crate::context::Context;
use crate::feature::{Feature, InterceptorParameters};
use crate::interceptor::{
    CompoundInterceptor, EquivalenceRule, InterceptorType, MutationInterceptor, MutationInterceptorFactory,
    RuleFilter,
};
use crate::ir::{Constant, InsnRef, Opcode};
use crate::matcher::SequenceMatcher;
use crate::mutation::MutationDescriptor;
use crate::mutators::{MutatorIds, MutatorSet};
use crate::predicates::{
    any_instruction, get_static, is_instruction, method_call_to, not_an_instruction, opcode,
    takes_no_args, variable_access, variable_matches, zero_constant, Predicate,
};
use crate::query::{QueryStart, SequenceQuery};
use crate::slot::Slot;
use crate::tree::MethodTree;
use crate::MutequivError;
use std::sync::Arc;

const BOOLEAN: &str = "java/lang/Boolean";

/// Wrapper types whose `valueOf` boxes a primitive.
const BOX_TYPES: &[&str] = &[
    "java/lang/Integer",
    "java/lang/Long",
    "java/lang/Short",
    "java/lang/Byte",
    "java/lang/Character",
    "java/lang/Float",
    "java/lang/Double",
    BOOLEAN,
];

/// No-argument factories whose result is an empty value.
const EMPTY_FACTORIES: &[(&str, &str)] = &[
    ("java/util/Optional", "empty"),
    ("java/util/stream/Stream", "empty"),
    ("java/util/Collections", "emptyList"),
    ("java/util/Collections", "emptyMap"),
    ("java/util/Collections", "emptySet"),
    ("java/util/List", "of"),
    ("java/util/Set", "of"),
];

/// Wraps `motif` so it must end right before the mutated instruction, with anything
/// before and after it.
fn anchored(motif: SequenceQuery, mutated: &Slot<InsnRef>) -> Result<SequenceMatcher, MutequivError> {
    QueryStart::any()
        .zero_or_more(QueryStart::matching(any_instruction()))
        .then(motif)
        .then(is_instruction(mutated.read()))
        .zero_or_more(QueryStart::matching(any_instruction()))
        .compile(
            QueryParams::new()
                .with_ignores(not_an_instruction())
                .with_bound(mutated.write()),
        )
}

/// Runs `matcher` with the instruction at `index` bound as the mutated instruction.
fn matches_at(matcher: &SequenceMatcher, mutated: &Slot<InsnRef>, method: &MethodTree, index: usize) -> bool {
    let Some(insn) = method.instruction(index) else {
        return false;
    };
    let mut ctx = Context::start(method.instructions());
    ctx.store(mutated.write(), Arc::clone(insn));
    matcher.matches(&mut ctx)
}

fn real_opcode_before(method: &MethodTree, index: usize) -> Option<Opcode> {
    method.real_instruction_before(index).and_then(|insn| insn.opcode())
}

fn no_args_call(owner: &str, name: &str) -> Predicate {
    method_call_to(owner, name).and(takes_no_args())
}

fn boxes_primitive() -> Predicate {
    BOX_TYPES
        .iter()
        .map(|owner| method_call_to(owner, "valueOf"))
        .reduce(Predicate::or)
        .unwrap_or_else(|| Predicate::from_fn(|_, _| false))
}

fn loads_empty_return_onto_stack() -> Predicate {
    EMPTY_FACTORIES
        .iter()
        .map(|(owner, name)| no_args_call(owner, name))
        .reduce(Predicate::or)
        .unwrap_or_else(|| Predicate::from_fn(|_, _| false))
}

/// Primitive zero already returned: `ICONST_0`, `LCONST_0`, `FCONST_0` or `DCONST_0`
/// directly before the mutated return.
#[derive(Debug, Clone)]
pub struct PrimitiveEquivalentRule {
    mutators: MutatorSet,
}

impl PrimitiveEquivalentRule {
    pub fn new(mutators: MutatorSet) -> Self {
        Self { mutators }
    }
}

impl EquivalenceRule for PrimitiveEquivalentRule {
    fn name(&self) -> &'static str {
        "primitive-zero"
    }

    fn mutators(&self) -> &MutatorSet {
        &self.mutators
    }

    fn is_equivalent(&self, mutation: &MutationDescriptor, method: &MethodTree) -> bool {
        real_opcode_before(method, mutation.instruction_index).is_some_and(Opcode::is_zero_constant)
    }
}

/// `true` already returned, either as a primitive `ICONST_1` or boxed through
/// `Boolean.valueOf` or `Boolean.TRUE`.
#[derive(Debug, Clone)]
pub struct HardCodedTrueRule {
    mutators: MutatorSet,
    mutated: Slot<InsnRef>,
    equivalent_true: Arc<SequenceMatcher>,
}

impl HardCodedTrueRule {
    pub fn new(mutators: MutatorSet) -> Result<Self, MutequivError> {
        let mutated = Slot::new("mutated instruction");
        let boxed_true = QueryStart::matching(opcode(Opcode::Iconst1)).then(method_call_to(BOOLEAN, "valueOf"));
        let constant_true = QueryStart::matching(get_static(BOOLEAN, "TRUE"));
        let equivalent_true = anchored(boxed_true.or(constant_true), &mutated)?;
        Ok(Self { mutators, mutated, equivalent_true: Arc::new(equivalent_true) })
    }
}

impl EquivalenceRule for HardCodedTrueRule {
    fn name(&self) -> &'static str {
        "hard-coded-true"
    }

    fn mutators(&self) -> &MutatorSet {
        &self.mutators
    }

    fn is_equivalent(&self, mutation: &MutationDescriptor, method: &MethodTree) -> bool {
        let index = mutation.instruction_index;
        real_opcode_before(method, index) == Some(Opcode::Iconst1)
            || matches_at(&self.equivalent_true, &self.mutated, method, index)
    }
}

/// Zero, false or empty already returned: a boxed zero, `Boolean.FALSE`, a no-argument
/// empty factory (directly or through one local variable) or the empty string.
#[derive(Debug, Clone)]
pub struct EmptyReturnsRule {
    mutators: MutatorSet,
    mutated: Slot<InsnRef>,
    zero_values: Arc<SequenceMatcher>,
    indirect_zero_values: Arc<SequenceMatcher>,
}

impl EmptyReturnsRule {
    pub fn new(mutators: MutatorSet) -> Result<Self, MutequivError> {
        let mutated = Slot::new("mutated instruction");
        let local: Slot<usize> = Slot::new("local variable");

        let constant_zero = QueryStart::matching(zero_constant()).then(boxes_primitive());
        let constant_false = QueryStart::matching(get_static(BOOLEAN, "FALSE"));
        let zero_values = anchored(
            constant_zero
                .or(constant_false)
                .or(QueryStart::matching(loads_empty_return_onto_stack())),
            &mutated,
        )?;

        let stores_to = |p: Predicate| opcode(Opcode::Astore).and(p);
        let indirect = QueryStart::matching(loads_empty_return_onto_stack())
            .then(stores_to(variable_access(local.write())))
            // anything that does not overwrite the local; a jump straight to the
            // load is not ruled out
            .zero_or_more(QueryStart::matching(stores_to(variable_matches(local.read())).negate()))
            .then(opcode(Opcode::Aload).and(variable_matches(local.read())));
        let indirect_zero_values = anchored(indirect, &mutated)?;

        Ok(Self {
            mutators,
            mutated,
            zero_values: Arc::new(zero_values),
            indirect_zero_values: Arc::new(indirect_zero_values),
        })
    }

    fn returns_empty_string(method: &MethodTree, index: usize) -> bool {
        method
            .real_instruction_before(index)
            .and_then(|insn| insn.constant())
            .is_some_and(|c| matches!(c, Constant::String(s) if s.is_empty()))
    }
}

impl EquivalenceRule for EmptyReturnsRule {
    fn name(&self) -> &'static str {
        "empty-returns"
    }

    fn mutators(&self) -> &MutatorSet {
        &self.mutators
    }

    fn is_equivalent(&self, mutation: &MutationDescriptor, method: &MethodTree) -> bool {
        let index = mutation.instruction_index;
        matches_at(&self.zero_values, &self.mutated, method, index)
            || matches_at(&self.indirect_zero_values, &self.mutated, method, index)
            || Self::returns_empty_string(method, index)
    }
}

/// `null` already returned: `ACONST_NULL` directly before the mutated return.
#[derive(Debug, Clone)]
pub struct NullReturnsRule {
    mutators: MutatorSet,
}

impl NullReturnsRule {
    pub fn new(mutators: MutatorSet) -> Self {
        Self { mutators }
    }
}

impl EquivalenceRule for NullReturnsRule {
    fn name(&self) -> &'static str {
        "null-returns"
    }

    fn mutators(&self) -> &MutatorSet {
        &self.mutators
    }

    fn is_equivalent(&self, mutation: &MutationDescriptor, method: &MethodTree) -> bool {
        real_opcode_before(method, mutation.instruction_index) == Some(Opcode::AconstNull)
    }
}

/// Factory for the trivial return-value equivalence filter.
///
/// Matchers are compiled once here and shared by every interceptor it creates; the
/// interceptors themselves carry per-unit state and must not be shared between workers.
#[derive(Debug, Clone)]
pub struct EquivalentReturnMutationFilter {
    primitive: PrimitiveEquivalentRule,
    null: NullReturnsRule,
    empty: EmptyReturnsRule,
    hard_coded_true: HardCodedTrueRule,
}

impl EquivalentReturnMutationFilter {
    pub const FEATURE_NAME: &'static str = "FRETEQUIV";

    pub fn new() -> Result<Self, MutequivError> {
        Self::with_mutators(&MutatorIds::default())
    }

    pub fn with_mutators(ids: &MutatorIds) -> Result<Self, MutequivError> {
        Ok(Self {
            primitive: PrimitiveEquivalentRule::new(ids.zero_returns()),
            null: NullReturnsRule::new(ids.null_returns()),
            empty: EmptyReturnsRule::new(ids.empty_returns())?,
            hard_coded_true: HardCodedTrueRule::new(ids.true_returns())?,
        })
    }

    /// The filter chain without going through feature selection.
    pub fn interceptor(&self) -> CompoundInterceptor {
        let children: Vec<Box<dyn MutationInterceptor>> = vec![
            Box::new(RuleFilter::new(self.primitive.clone())),
            Box::new(RuleFilter::new(self.null.clone())),
            Box::new(RuleFilter::new(self.empty.clone())),
            Box::new(RuleFilter::new(self.hard_coded_true.clone())),
        ];
        CompoundInterceptor::new(children).with_type(InterceptorType::Filter)
    }
}

impl MutationInterceptorFactory for EquivalentReturnMutationFilter {
    fn description(&self) -> &str {
        "Trivial return vals equivalence filter"
    }

    fn provides(&self) -> Feature {
        Feature::named(Self::FEATURE_NAME)
            .with_on_by_default(true)
            .with_description("Filters return vals mutants with bytecode equivalent to the unmutated class")
    }

    fn create_interceptor(&self, _params: &InterceptorParameters) -> Box<dyn MutationInterceptor> {
        Box::new(self.interceptor())
    }
}
