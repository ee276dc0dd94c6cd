//! Intermediate Representation (IR) for the matcher: the instruction tokens of one method body.
//!
//! Instructions are produced outside this crate (by whatever reads compiled classes) and
//! are only ever read here. Each token is shared behind an [`Arc`] so that a slot can
//! capture "this exact instruction" and later compare by identity.

use serde::{Deserialize, Serialize};
use std::ops::Index;
use std::sync::Arc;

/// Shared, identity-comparable handle to an instruction.
pub type InsnRef = Arc<Instruction>;

/// Label identifier used by jumps and markers.
pub type LabelId = u32;

/// The subset of JVM opcodes the matcher needs to tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Opcode {
    Nop,
    AconstNull,
    IconstM1,
    Iconst0,
    Iconst1,
    Iconst2,
    Iconst3,
    Iconst4,
    Iconst5,
    Lconst0,
    Lconst1,
    Fconst0,
    Fconst1,
    Fconst2,
    Dconst0,
    Dconst1,
    Bipush,
    Sipush,
    Ldc,
    Iload,
    Lload,
    Fload,
    Dload,
    Aload,
    Istore,
    Lstore,
    Fstore,
    Dstore,
    Astore,
    Pop,
    Dup,
    Iadd,
    Isub,
    Imul,
    Idiv,
    Ladd,
    Lsub,
    Fadd,
    Dadd,
    Goto,
    Ifeq,
    Ifne,
    IfIcmpeq,
    IfIcmpne,
    Ireturn,
    Lreturn,
    Freturn,
    Dreturn,
    Areturn,
    Return,
    Getstatic,
    Putstatic,
    Getfield,
    Putfield,
    Invokevirtual,
    Invokespecial,
    Invokestatic,
    Invokeinterface,
    Invokedynamic,
    New,
    Checkcast,
    Athrow,
}

/// Categorical view of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum OpcodeClass {
    PushConstant,
    LoadLocal,
    StoreLocal,
    StaticFieldRead,
    InvokeMethod,
    LoadConstantObject,
    Return,
    Marker,
    Other,
}

impl Opcode {
    pub fn class(self) -> OpcodeClass {
        use Opcode::*;
        match self {
            AconstNull | IconstM1 | Iconst0 | Iconst1 | Iconst2 | Iconst3 | Iconst4 | Iconst5
            | Lconst0 | Lconst1 | Fconst0 | Fconst1 | Fconst2 | Dconst0 | Dconst1 | Bipush
            | Sipush => OpcodeClass::PushConstant,
            Ldc => OpcodeClass::LoadConstantObject,
            Iload | Lload | Fload | Dload | Aload => OpcodeClass::LoadLocal,
            Istore | Lstore | Fstore | Dstore | Astore => OpcodeClass::StoreLocal,
            Getstatic => OpcodeClass::StaticFieldRead,
            Invokevirtual | Invokespecial | Invokestatic | Invokeinterface | Invokedynamic => {
                OpcodeClass::InvokeMethod
            }
            Ireturn | Lreturn | Freturn | Dreturn | Areturn | Return => OpcodeClass::Return,
            _ => OpcodeClass::Other,
        }
    }

    /// True for the opcodes that push a numeric zero of any primitive width.
    pub fn is_zero_constant(self) -> bool {
        matches!(self, Opcode::Iconst0 | Opcode::Lconst0 | Opcode::Fconst0 | Opcode::Dconst0)
    }
}

/// Value loaded by an `LDC` instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Constant {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    /// Class literal, as an internal name.
    Type(String),
}

/// Owner, name and descriptor of a field or method reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberRef {
    pub owner: String,
    pub name: String,
    pub desc: String,
}

impl MemberRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, desc: impl Into<String>) -> Self {
        Self { owner: owner.into(), name: name.into(), desc: desc.into() }
    }

    /// Number of declared parameters, read from a method descriptor such as `(I[JLjava/lang/String;)V`.
    /// Returns `None` for anything that is not a well-formed method descriptor.
    pub fn argument_count(&self) -> Option<usize> {
        let params = self.desc.strip_prefix('(')?;
        let end = params.find(')')?;
        let mut chars = params[..end].chars();
        let mut count = 0;
        while let Some(c) = chars.next() {
            let mut c = c;
            while c == '[' {
                c = chars.next()?;
            }
            match c {
                'B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z' => {}
                'L' => {
                    // skip to the end of the class name
                    chars.by_ref().find(|&c| c == ';')?;
                }
                _ => return None,
            }
            count += 1;
        }
        Some(count)
    }
}

/// A single token in a method body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Instruction {
    /// Zero-operand instruction.
    Insn(Opcode),
    /// `BIPUSH` / `SIPUSH`.
    IntPush { opcode: Opcode, operand: i32 },
    /// Local variable load or store.
    Var { opcode: Opcode, var: usize },
    /// Field access.
    Field { opcode: Opcode, field: MemberRef },
    /// Method invocation.
    Method { opcode: Opcode, call: MemberRef },
    /// `LDC`.
    Ldc(Constant),
    /// Conditional or unconditional jump.
    Jump { opcode: Opcode, target: LabelId },
    /// `NEW` / `CHECKCAST` with an internal type name.
    Type { opcode: Opcode, desc: String },
    /// Jump target marker.
    Label(LabelId),
    /// Source line annotation.
    LineNumber { line: u32, start: LabelId },
    /// Stack map frame.
    Frame,
}

impl Instruction {
    /// The opcode, or `None` for markers.
    pub fn opcode(&self) -> Option<Opcode> {
        match self {
            Instruction::Insn(op) => Some(*op),
            Instruction::IntPush { opcode, .. }
            | Instruction::Var { opcode, .. }
            | Instruction::Field { opcode, .. }
            | Instruction::Method { opcode, .. }
            | Instruction::Jump { opcode, .. }
            | Instruction::Type { opcode, .. } => Some(*opcode),
            Instruction::Ldc(_) => Some(Opcode::Ldc),
            Instruction::Label(_) | Instruction::LineNumber { .. } | Instruction::Frame => None,
        }
    }

    pub fn class(&self) -> OpcodeClass {
        self.opcode().map_or(OpcodeClass::Marker, Opcode::class)
    }

    /// Labels, line numbers and frames do not execute.
    pub fn is_marker(&self) -> bool {
        self.opcode().is_none()
    }

    pub fn is_label(&self) -> bool {
        matches!(self, Instruction::Label(_))
    }

    /// Variable index for loads and stores.
    pub fn var(&self) -> Option<usize> {
        match self {
            Instruction::Var { var, .. } => Some(*var),
            _ => None,
        }
    }

    /// Call target for invocations.
    pub fn call(&self) -> Option<&MemberRef> {
        match self {
            Instruction::Method { call, .. } => Some(call),
            _ => None,
        }
    }

    pub fn field(&self) -> Option<&MemberRef> {
        match self {
            Instruction::Field { field, .. } => Some(field),
            _ => None,
        }
    }

    pub fn constant(&self) -> Option<&Constant> {
        match self {
            Instruction::Ldc(c) => Some(c),
            _ => None,
        }
    }

    // Shorthands used when assembling method bodies by hand.

    pub fn op(opcode: Opcode) -> Self {
        Instruction::Insn(opcode)
    }

    pub fn load(opcode: Opcode, var: usize) -> Self {
        debug_assert_eq!(opcode.class(), OpcodeClass::LoadLocal, "{:?} is not a load", opcode);
        Instruction::Var { opcode, var }
    }

    pub fn store(opcode: Opcode, var: usize) -> Self {
        debug_assert_eq!(opcode.class(), OpcodeClass::StoreLocal, "{:?} is not a store", opcode);
        Instruction::Var { opcode, var }
    }

    pub fn invoke(opcode: Opcode, owner: &str, name: &str, desc: &str) -> Self {
        Instruction::Method { opcode, call: MemberRef::new(owner, name, desc) }
    }

    pub fn invoke_static(owner: &str, name: &str, desc: &str) -> Self {
        Self::invoke(Opcode::Invokestatic, owner, name, desc)
    }

    pub fn get_static(owner: &str, name: &str, desc: &str) -> Self {
        Instruction::Field { opcode: Opcode::Getstatic, field: MemberRef::new(owner, name, desc) }
    }

    pub fn ldc(constant: Constant) -> Self {
        Instruction::Ldc(constant)
    }
}

/// Ordered instruction tokens for one method body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstructionStream {
    insns: Vec<InsnRef>,
}

impl InstructionStream {
    pub fn new(insns: Vec<Instruction>) -> Self {
        Self { insns: insns.into_iter().map(Arc::new).collect() }
    }

    pub fn len(&self) -> usize {
        self.insns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insns.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&InsnRef> {
        self.insns.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InsnRef> {
        self.insns.iter()
    }

    /// Nearest instruction before `index` that is not a marker. `index` may be one past
    /// the end; anything further is out of range.
    pub fn real_instruction_before(&self, index: usize) -> Option<&InsnRef> {
        self.insns.get(..index)?.iter().rev().find(|insn| !insn.is_marker())
    }
}

impl Index<usize> for InstructionStream {
    type Output = InsnRef;

    fn index(&self, index: usize) -> &InsnRef {
        &self.insns[index]
    }
}

impl FromIterator<Instruction> for InstructionStream {
    fn from_iter<I: IntoIterator<Item = Instruction>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a InstructionStream {
    type Item = &'a InsnRef;
    type IntoIter = std::slice::Iter<'a, InsnRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.insns.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_classes() {
        assert_eq!(Opcode::Iconst0.class(), OpcodeClass::PushConstant);
        assert_eq!(Opcode::AconstNull.class(), OpcodeClass::PushConstant);
        assert_eq!(Opcode::Aload.class(), OpcodeClass::LoadLocal);
        assert_eq!(Opcode::Astore.class(), OpcodeClass::StoreLocal);
        assert_eq!(Opcode::Getstatic.class(), OpcodeClass::StaticFieldRead);
        assert_eq!(Opcode::Invokeinterface.class(), OpcodeClass::InvokeMethod);
        assert_eq!(Opcode::Ldc.class(), OpcodeClass::LoadConstantObject);
        assert_eq!(Opcode::Areturn.class(), OpcodeClass::Return);
        assert_eq!(Opcode::Iadd.class(), OpcodeClass::Other);
        assert_eq!(Instruction::Label(3).class(), OpcodeClass::Marker);
    }

    #[test]
    fn test_zero_constants() {
        for op in [Opcode::Iconst0, Opcode::Lconst0, Opcode::Fconst0, Opcode::Dconst0] {
            assert!(op.is_zero_constant());
        }
        assert!(!Opcode::Iconst1.is_zero_constant());
        assert!(!Opcode::AconstNull.is_zero_constant());
    }

    #[test]
    fn test_argument_count() {
        assert_eq!(MemberRef::new("a", "b", "()V").argument_count(), Some(0));
        assert_eq!(MemberRef::new("a", "b", "(I)Ljava/lang/Integer;").argument_count(), Some(1));
        assert_eq!(
            MemberRef::new("a", "b", "([[JLjava/lang/String;Z[Ljava/lang/Object;)V").argument_count(),
            Some(4)
        );
        assert_eq!(MemberRef::new("a", "b", "garbage").argument_count(), None);
        assert_eq!(MemberRef::new("a", "b", "(Ljava/lang/String").argument_count(), None);
    }

    #[test]
    fn test_real_instruction_before_skips_markers() {
        let stream = InstructionStream::new(vec![
            Instruction::op(Opcode::Iconst0),
            Instruction::Label(1),
            Instruction::LineNumber { line: 12, start: 1 },
            Instruction::Frame,
            Instruction::op(Opcode::Ireturn),
        ]);
        let before = stream.real_instruction_before(4).unwrap();
        assert!(Arc::ptr_eq(before, &stream[0]));
        assert!(stream.real_instruction_before(0).is_none());
        assert!(stream.real_instruction_before(1).is_some());
        assert!(Arc::ptr_eq(stream.real_instruction_before(5).unwrap(), &stream[4]));
        assert!(stream.real_instruction_before(6).is_none());
        assert!(stream.real_instruction_before(99).is_none());
    }

    #[test]
    fn test_identity_is_not_structural_equality() {
        let stream = InstructionStream::new(vec![
            Instruction::op(Opcode::Areturn),
            Instruction::op(Opcode::Areturn),
        ]);
        assert_eq!(*stream[0], *stream[1]);
        assert!(!Arc::ptr_eq(&stream[0], &stream[1]));
    }

    #[test]
    fn test_serialization_deserialization() {
        let stream = InstructionStream::new(vec![
            Instruction::ldc(Constant::String(String::new())),
            Instruction::get_static("java/lang/Boolean", "TRUE", "Ljava/lang/Boolean;"),
            Instruction::load(Opcode::Aload, 2),
            Instruction::op(Opcode::Areturn),
        ]);
        let json = serde_json::to_string(&stream).unwrap();
        let deser: InstructionStream = serde_json::from_str(&json).unwrap();
        assert_eq!(deser.len(), 4);
        for (a, b) in stream.iter().zip(deser.iter()) {
            assert_eq!(**a, **b);
        }
    }

    #[test]
    fn test_local_variable_shorthands() {
        assert_eq!(Instruction::load(Opcode::Aload, 3).class(), OpcodeClass::LoadLocal);
        assert_eq!(Instruction::store(Opcode::Istore, 3).class(), OpcodeClass::StoreLocal);
        assert_eq!(Instruction::store(Opcode::Astore, 3).var(), Some(3));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "is not a load")]
    fn test_load_rejects_store_opcode() {
        let _ = Instruction::load(Opcode::Astore, 1);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "is not a store")]
    fn test_store_rejects_load_opcode() {
        let _ = Instruction::store(Opcode::Iload, 1);
    }
}
