//! Predicates module: the boolean tests a query applies to one instruction at a time.
//!
//! Every test implements the single [`Match`] capability. [`Predicate`] wraps a shared
//! test together with the slots it reads and writes, so the compiler can check slot
//! usage before anything runs.

use crate::context::Context;
use crate::ir::{Constant, InsnRef, Opcode, OpcodeClass};
use crate::slot::{SlotKey, SlotRead, SlotWrite};
use std::fmt;
use std::sync::Arc;

pub trait Match: Send + Sync {
    /// Tests one instruction. A capturing test writes its slot only when it returns true.
    fn test(&self, ctx: &mut Context<'_>, insn: &InsnRef) -> bool;
}

impl<F> Match for F
where
    F: Fn(&mut Context<'_>, &InsnRef) -> bool + Send + Sync,
{
    fn test(&self, ctx: &mut Context<'_>, insn: &InsnRef) -> bool {
        self(ctx, insn)
    }
}

/// Slots a predicate depends on (`reads`) and slots it is guaranteed to bind when it
/// succeeds (`writes`). Reads satisfied by the predicate's own earlier writes are not listed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotUsage {
    pub reads: Vec<SlotKey>,
    pub writes: Vec<SlotKey>,
}

impl SlotUsage {
    fn reading(key: SlotKey) -> Self {
        Self { reads: vec![key], writes: Vec::new() }
    }

    fn writing(key: SlotKey) -> Self {
        Self { reads: Vec::new(), writes: vec![key] }
    }

    fn then(&self, next: &SlotUsage) -> Self {
        let mut reads = self.reads.clone();
        for r in &next.reads {
            if !self.writes.contains(r) && !reads.contains(r) {
                reads.push(*r);
            }
        }
        Self { reads, writes: union(&self.writes, &next.writes) }
    }

    fn either(&self, other: &SlotUsage) -> Self {
        Self {
            reads: union(&self.reads, &other.reads),
            writes: self.writes.iter().filter(|w| other.writes.contains(w)).copied().collect(),
        }
    }
}

fn union(a: &[SlotKey], b: &[SlotKey]) -> Vec<SlotKey> {
    let mut out = a.to_vec();
    out.extend(b.iter().filter(|k| !a.contains(k)));
    out
}

#[derive(Clone)]
pub struct Predicate {
    inner: Arc<dyn Match>,
    usage: SlotUsage,
}

impl Predicate {
    pub fn new<M: Match + 'static>(test: M) -> Self {
        Self { inner: Arc::new(test), usage: SlotUsage::default() }
    }

    /// Builds a non-capturing predicate from a closure.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&mut Context<'_>, &InsnRef) -> bool + Send + Sync + 'static,
    {
        Self::new(f)
    }

    fn with_usage(mut self, usage: SlotUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn usage(&self) -> &SlotUsage {
        &self.usage
    }

    pub fn captures(&self) -> bool {
        !self.usage.writes.is_empty()
    }

    pub fn test(&self, ctx: &mut Context<'_>, insn: &InsnRef) -> bool {
        self.inner.test(ctx, insn)
    }

    pub fn and(self, other: Predicate) -> Predicate {
        let usage = self.usage.then(&other.usage);
        let (a, b) = (self.inner, other.inner);
        if self.usage.writes.is_empty() {
            Predicate::from_fn(move |ctx, insn| a.test(ctx, insn) && b.test(ctx, insn)).with_usage(usage)
        } else {
            // a's captures must not survive if b rejects
            Predicate::from_fn(move |ctx, insn| {
                let mut branch = ctx.clone();
                if a.test(&mut branch, insn) && b.test(&mut branch, insn) {
                    *ctx = branch;
                    true
                } else {
                    false
                }
            })
            .with_usage(usage)
        }
    }

    pub fn or(self, other: Predicate) -> Predicate {
        let usage = self.usage.either(&other.usage);
        let (a, b) = (self.inner, other.inner);
        Predicate::from_fn(move |ctx, insn| a.test(ctx, insn) || b.test(ctx, insn)).with_usage(usage)
    }

    pub fn negate(self) -> Predicate {
        let usage = SlotUsage { reads: self.usage.reads.clone(), writes: Vec::new() };
        let inner = self.inner;
        if self.usage.writes.is_empty() {
            Predicate::from_fn(move |ctx, insn| !inner.test(ctx, insn)).with_usage(usage)
        } else {
            Predicate::from_fn(move |ctx, insn| !inner.test(&mut ctx.clone(), insn)).with_usage(usage)
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate").field("usage", &self.usage).finish_non_exhaustive()
    }
}

pub fn any_instruction() -> Predicate {
    Predicate::from_fn(|_, _| true)
}

pub fn opcode(op: Opcode) -> Predicate {
    Predicate::from_fn(move |_, insn| insn.opcode() == Some(op))
}

pub fn opcode_in(ops: &[Opcode]) -> Predicate {
    let ops = ops.to_vec();
    Predicate::from_fn(move |_, insn| insn.opcode().is_some_and(|op| ops.contains(&op)))
}

pub fn opcode_class(class: OpcodeClass) -> Predicate {
    Predicate::from_fn(move |_, insn| insn.class() == class)
}

/// `ICONST_0`, `LCONST_0`, `FCONST_0` or `DCONST_0`.
pub fn zero_constant() -> Predicate {
    Predicate::from_fn(|_, insn| insn.opcode().is_some_and(Opcode::is_zero_constant))
}

pub fn method_call_to(owner: &str, name: &str) -> Predicate {
    let (owner, name) = (owner.to_string(), name.to_string());
    Predicate::from_fn(move |_, insn| insn.call().is_some_and(|c| c.owner == owner && c.name == name))
}

pub fn method_call_named(name: &str) -> Predicate {
    let name = name.to_string();
    Predicate::from_fn(move |_, insn| insn.call().is_some_and(|c| c.name == name))
}

/// A call whose descriptor declares no parameters.
pub fn takes_no_args() -> Predicate {
    Predicate::from_fn(|_, insn| insn.call().and_then(|c| c.argument_count()) == Some(0))
}

pub fn get_static(owner: &str, name: &str) -> Predicate {
    let (owner, name) = (owner.to_string(), name.to_string());
    Predicate::from_fn(move |_, insn| {
        insn.opcode() == Some(Opcode::Getstatic)
            && insn.field().is_some_and(|f| f.owner == owner && f.name == name)
    })
}

pub fn loads_constant(constant: Constant) -> Predicate {
    Predicate::from_fn(move |_, insn| insn.constant() == Some(&constant))
}

/// Matches any load or store and captures its variable index.
pub fn variable_access(slot: SlotWrite<usize>) -> Predicate {
    Predicate::from_fn(move |ctx, insn| match insn.var() {
        Some(var) => {
            ctx.store(slot, var);
            true
        }
        None => false,
    })
    .with_usage(SlotUsage::writing(slot.key()))
}

/// Matches a load or store of the variable captured earlier in `slot`.
pub fn variable_matches(slot: SlotRead<usize>) -> Predicate {
    Predicate::from_fn(move |ctx, insn| insn.var().is_some() && insn.var() == ctx.retrieve(slot))
        .with_usage(SlotUsage::reading(slot.key()))
}

/// Captures the instruction itself.
pub fn store_instruction(slot: SlotWrite<InsnRef>) -> Predicate {
    Predicate::from_fn(move |ctx, insn| {
        ctx.store(slot, Arc::clone(insn));
        true
    })
    .with_usage(SlotUsage::writing(slot.key()))
}

/// Matches only the very instruction bound to `slot`, compared by identity.
pub fn is_instruction(slot: SlotRead<InsnRef>) -> Predicate {
    Predicate::from_fn(move |ctx, insn| ctx.retrieve(slot).is_some_and(|bound| Arc::ptr_eq(&bound, insn)))
        .with_usage(SlotUsage::reading(slot.key()))
}

/// Line numbers, frames and labels.
pub fn not_an_instruction() -> Predicate {
    Predicate::from_fn(|_, insn| insn.is_marker())
}

pub fn is_label() -> Predicate {
    Predicate::from_fn(|_, insn| insn.is_label())
}
