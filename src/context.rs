//! Context module: per-evaluation state for the sequence matcher.
//!
//! A context holds the stream being matched and the slot bindings made so far. The
//! matcher clones it on every branch it explores and hands back only the winning
//! branch's bindings.

use crate::ir::InstructionStream;
use crate::slot::{Binding, SlotId, SlotRead, SlotValue, SlotWrite};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Context<'a> {
    stream: &'a InstructionStream,
    bindings: HashMap<SlotId, Binding>,
}

impl<'a> Context<'a> {
    pub fn start(stream: &'a InstructionStream) -> Self {
        Self { stream, bindings: HashMap::new() }
    }

    pub fn stream(&self) -> &'a InstructionStream {
        self.stream
    }

    /// Binds `value`, replacing any earlier binding of the same slot.
    pub fn store<T: SlotValue>(&mut self, slot: SlotWrite<T>, value: T) {
        self.bindings.insert(slot.key().id, value.into_binding());
    }

    pub fn retrieve<T: SlotValue>(&self, slot: SlotRead<T>) -> Option<T> {
        self.bindings.get(&slot.key().id).and_then(T::from_binding)
    }

    pub fn is_bound<T>(&self, slot: SlotRead<T>) -> bool {
        self.bindings.contains_key(&slot.key().id)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Same slots bound to the same values; instructions compare by identity.
    pub fn same_bindings(&self, other: &Context<'_>) -> bool {
        self.bindings.len() == other.bindings.len()
            && self
                .bindings
                .iter()
                .all(|(id, binding)| other.bindings.get(id).is_some_and(|o| binding.same_as(o)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{InsnRef, Instruction, Opcode};
    use crate::slot::Slot;
    use std::sync::Arc;

    fn stream() -> InstructionStream {
        InstructionStream::new(vec![Instruction::load(Opcode::Aload, 1), Instruction::op(Opcode::Areturn)])
    }

    #[test]
    fn test_store_and_retrieve() {
        let s = stream();
        let var: Slot<usize> = Slot::new("var");
        let insn: Slot<InsnRef> = Slot::new("insn");
        let mut ctx = Context::start(&s);
        assert!(ctx.is_empty());
        ctx.store(var.write(), 3);
        ctx.store(insn.write(), Arc::clone(&s[1]));
        assert_eq!(ctx.retrieve(var.read()), Some(3));
        assert!(Arc::ptr_eq(&ctx.retrieve(insn.read()).unwrap(), &s[1]));
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn test_unbound_slot_reads_none() {
        let s = stream();
        let var: Slot<usize> = Slot::new("var");
        let ctx = Context::start(&s);
        assert!(!ctx.is_bound(var.read()));
        assert_eq!(ctx.retrieve(var.read()), None);
    }

    #[test]
    fn test_clone_does_not_leak_bindings() {
        let s = stream();
        let var: Slot<usize> = Slot::new("var");
        let ctx = Context::start(&s);
        let mut branch = ctx.clone();
        branch.store(var.write(), 1);
        assert!(branch.is_bound(var.read()));
        assert!(!ctx.is_bound(var.read()));
    }

    #[test]
    fn test_store_overwrites() {
        let s = stream();
        let var: Slot<usize> = Slot::new("var");
        let mut ctx = Context::start(&s);
        ctx.store(var.write(), 1);
        ctx.store(var.write(), 2);
        assert_eq!(ctx.retrieve(var.read()), Some(2));
    }

    #[test]
    fn test_same_bindings() {
        let s = InstructionStream::new(vec![Instruction::op(Opcode::Areturn), Instruction::op(Opcode::Areturn)]);
        let var: Slot<usize> = Slot::new("var");
        let insn: Slot<InsnRef> = Slot::new("insn");
        let mut a = Context::start(&s);
        let mut b = Context::start(&s);
        assert!(a.same_bindings(&b));
        a.store(var.write(), 1);
        assert!(!a.same_bindings(&b));
        b.store(var.write(), 1);
        assert!(a.same_bindings(&b));

        a.store(insn.write(), Arc::clone(&s[0]));
        b.store(insn.write(), Arc::clone(&s[1]));
        // equal instructions, different positions
        assert!(!a.same_bindings(&b));
        b.store(insn.write(), Arc::clone(&s[0]));
        assert!(a.same_bindings(&b));
    }
}
