//! Slot module: named, typed capture cells shared between the clauses of one query.
//!
//! A [`Slot`] is only a key. The value lives in the [`Context`](crate::Context) of a
//! single evaluation, so one compiled matcher can hold slots and still be shared.

use crate::ir::InsnRef;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

static NEXT_SLOT_ID: AtomicU32 = AtomicU32::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u32);

/// A value held by a context for some slot.
#[derive(Debug, Clone)]
pub enum Binding {
    Instruction(InsnRef),
    Index(usize),
}

impl Binding {
    /// Instructions are the same only if they are the same token.
    pub fn same_as(&self, other: &Binding) -> bool {
        match (self, other) {
            (Binding::Instruction(a), Binding::Instruction(b)) => Arc::ptr_eq(a, b),
            (Binding::Index(a), Binding::Index(b)) => a == b,
            _ => false,
        }
    }
}

/// Types a slot can capture.
pub trait SlotValue: Clone + Send + Sync + 'static {
    fn into_binding(self) -> Binding;
    fn from_binding(binding: &Binding) -> Option<Self>;
}

impl SlotValue for InsnRef {
    fn into_binding(self) -> Binding {
        Binding::Instruction(self)
    }

    fn from_binding(binding: &Binding) -> Option<Self> {
        match binding {
            Binding::Instruction(insn) => Some(Arc::clone(insn)),
            _ => None,
        }
    }
}

impl SlotValue for usize {
    fn into_binding(self) -> Binding {
        Binding::Index(self)
    }

    fn from_binding(binding: &Binding) -> Option<Self> {
        match binding {
            Binding::Index(i) => Some(*i),
            _ => None,
        }
    }
}

/// Slot identity plus its name, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub id: SlotId,
    pub name: &'static str,
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

pub struct Slot<T> {
    key: SlotKey,
    _value: PhantomData<fn() -> T>,
}

impl<T: SlotValue> Slot<T> {
    /// Creates a slot distinct from every other slot, whatever its name.
    pub fn new(name: &'static str) -> Self {
        let id = SlotId(NEXT_SLOT_ID.fetch_add(1, Ordering::Relaxed));
        Self { key: SlotKey { id, name }, _value: PhantomData }
    }

    pub fn key(&self) -> SlotKey {
        self.key
    }

    pub fn write(&self) -> SlotWrite<T> {
        SlotWrite { key: self.key, _value: PhantomData }
    }

    pub fn read(&self) -> SlotRead<T> {
        SlotRead { key: self.key, _value: PhantomData }
    }
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self { key: self.key, _value: PhantomData }
    }
}

impl<T> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot").field("key", &self.key).finish()
    }
}

/// Handle used to bind a slot.
pub struct SlotWrite<T> {
    key: SlotKey,
    _value: PhantomData<fn() -> T>,
}

impl<T> SlotWrite<T> {
    pub fn key(&self) -> SlotKey {
        self.key
    }
}

impl<T> Clone for SlotWrite<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SlotWrite<T> {}

/// Handle used to read back a slot bound earlier in the same evaluation.
pub struct SlotRead<T> {
    key: SlotKey,
    _value: PhantomData<fn() -> T>,
}

impl<T> SlotRead<T> {
    pub fn key(&self) -> SlotKey {
        self.key
    }
}

impl<T> Clone for SlotRead<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SlotRead<T> {}
