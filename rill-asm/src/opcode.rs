use crate::instruction::{Instruction, JArgs, KArgs, TArgs};
use crate::{Immediate16, Immediate24, RegisterId, OPCODE_MASK};

use strum::{EnumCount, FromRepr};

/// Raw opcode identifier, without operands.
///
/// The discriminants are the 6-bit values stored in the low bits of every
/// instruction word; they fit the opcode space with room to spare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, EnumCount)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum OpcodeRepr {
    Noop = 0x00,
    Jump = 0x01,
    ExtraArg = 0x02,
    Trap = 0x03,
    CJump = 0x04,
    LoadConstant = 0x05,
    LoadBool = 0x06,
    LoadInlineInteger = 0x07,
    LoadInlineString = 0x08,
    GetModuleVar = 0x09,
    SetModuleVar = 0x0a,
    DeferCall = 0x0b,
    Move = 0x0c,
    GetUpvalue = 0x0d,
    SetUpvalue = 0x0e,
    CloseUpvalues = 0x0f,
    Add = 0x10,
    Subtract = 0x11,
    Multiply = 0x12,
    Divide = 0x13,
    FloorDivide = 0x14,
    Modulo = 0x15,
    Power = 0x16,
    Negate = 0x17,
    Gt = 0x18,
    Ge = 0x19,
    Eq = 0x1a,
    Neq = 0x1b,
    Lt = 0x1c,
    Le = 0x1d,
    BitwiseAnd = 0x1e,
    BitwiseOr = 0x1f,
    BitwiseXor = 0x20,
    BitwiseLShift = 0x21,
    BitwiseRShift = 0x22,
    BitwiseInvert = 0x23,
    BoolNot = 0x24,
    MakeRange = 0x25,
    IterNext = 0x26,
    GetAttr = 0x27,
    SetAttr = 0x28,
    GetItem = 0x29,
    SetItem = 0x2a,
    DelItem = 0x2b,
    Contain = 0x2c,
    NewCollection = 0x2d,
    AppendList = 0x2e,
    AppendMap = 0x2f,
    Call = 0x30,
    Return = 0x31,
    CheckType = 0x32,
}

/// Operand layout of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    /// No operands.
    None,
    /// `A:8 | B:8 | C:8 | kb | kc`: three registers, two inline-constant flags.
    Ternary,
    /// `A:8 | K:16 | i | s`: register, 16-bit payload, two flag bits.
    Constant,
    /// `J:24 | s`: jump magnitude and direction.
    Jump,
}

impl OpcodeRepr {
    /// Extract the opcode from a raw instruction word, if valid.
    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::from_repr((raw & OPCODE_MASK) as u8)
    }

    /// Operand layout of this opcode.
    pub const fn layout(self) -> Layout {
        use OpcodeRepr::*;

        match self {
            Noop => Layout::None,
            Jump | ExtraArg => Layout::Jump,
            Trap | CJump | LoadConstant | LoadBool | LoadInlineInteger | LoadInlineString
            | GetModuleVar | SetModuleVar | DeferCall => Layout::Constant,
            _ => Layout::Ternary,
        }
    }
}

/// Instruction representation with decoded operands.
///
/// Every variant carries the full operand set of its layout, so converting
/// to and from the raw word is lossless for every meaningful bit.
///
/// Operand conventions used in the per-opcode documentation:
///
/// * `R[X]`: register `X` of the current frame.
/// * `RK(X, k)`: register `X` when `k` is unset, otherwise the inline
///   integer `X - 128`.
/// * `uRK(X, k)`: register `X` when `k` is unset, otherwise the inline
///   unsigned integer `X`.
/// * `K[X]`: constant-pool entry `X` of the current frame's module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Opcode {
    /// No effect.
    Noop,

    /// Unconditional relative jump.
    ///
    /// | Operation | `pc += s ? J : -J` (no-op when `J == 0`) |
    /// | Layout    | J |
    Jump(Immediate24, bool),

    /// Operand extension prefix for the following instruction.
    ///
    /// | Operation | if `s` then `ext := 0`; `ext := (ext << 24) + J` |
    /// | Layout    | J |
    ///
    /// The compiler in this repository never emits it; the VM accepts it
    /// so that larger-than-encodable operands remain expressible.
    ExtraArg(Immediate24, bool),

    /// Halt the dispatch loop with exit/error code `K`.
    ///
    /// | Operation | `vm.error := K`; stop |
    /// | Layout    | K |
    Trap(RegisterId, Immediate16, bool, bool),

    /// Conditional relative jump on the truthiness of `R[A]`.
    ///
    /// | Operation | if `bool(R[A]) == i` and `K != 0` then `pc += s ? K : -K` |
    /// | Layout    | K |
    CJump(RegisterId, Immediate16, bool, bool),

    /// Load from a constant pool or variable table.
    ///
    /// | Operation | `R[A] := i ? vm.globals[K] : (s ? module.exports[K] : K[K])` |
    /// | Layout    | K |
    ///
    /// Loading a function prototype that carries upvalue descriptors
    /// materializes a closure over the current frame (see `Call`).
    LoadConstant(RegisterId, Immediate16, bool, bool),

    /// Load a boolean, optionally jumping forward.
    ///
    /// | Operation | `R[A] := bool(i)`; if `K != 0` then `pc += s ? K : -K` |
    /// | Layout    | K |
    LoadBool(RegisterId, Immediate16, bool, bool),

    /// Load a small integer literal.
    ///
    /// | Operation | `R[A] := s ? K : -K` |
    /// | Layout    | K |
    LoadInlineInteger(RegisterId, Immediate16, bool, bool),

    /// Load a string of at most two bytes without touching the pool.
    ///
    /// | Operation | `R[A] := string(K as 2 bytes, len = i*2 + s)` |
    /// | Layout    | K |
    ///
    /// The payload bytes sit in `K` (first byte in the low half); the
    /// length rides in the flag pair since the word has no other room.
    LoadInlineString(RegisterId, Immediate16, bool, bool),

    /// Read a module variable.
    ///
    /// | Operation | `R[A] := s ? module.exports[K] : module.globals[K]` |
    /// | Layout    | K |
    GetModuleVar(RegisterId, Immediate16, bool, bool),

    /// Write a module variable.
    ///
    /// | Operation | `(s ? module.exports : module.globals)[K] := R[A]` |
    /// | Layout    | K |
    SetModuleVar(RegisterId, Immediate16, bool, bool),

    /// Register `K[K]` (a zero-arity prototype) on the current frame's
    /// deferred-call list. Deferred closures run LIFO when the frame
    /// returns normally.
    ///
    /// | Layout | K |
    DeferCall(RegisterId, Immediate16, bool, bool),

    /// Register copy, with an optional fused relative jump.
    ///
    /// | Operation | `R[A] := R[B]`; if `C != 0` then `pc += kc ? C : -C` |
    /// | Layout    | T |
    Move(RegisterId, RegisterId, RegisterId, bool, bool),

    /// `R[A] := *upvalue[B]`
    GetUpvalue(RegisterId, RegisterId, RegisterId, bool, bool),

    /// `*upvalue[A] := R[B]`
    SetUpvalue(RegisterId, RegisterId, RegisterId, bool, bool),

    /// Close every open upvalue at or above the stack slot of `R[A]`.
    CloseUpvalues(RegisterId, RegisterId, RegisterId, bool, bool),

    /// `R[A] := RK(B, kb) + RK(C, kc)` via numeric dispatch.
    Add(RegisterId, RegisterId, RegisterId, bool, bool),
    /// `R[A] := RK(B, kb) - RK(C, kc)`
    Subtract(RegisterId, RegisterId, RegisterId, bool, bool),
    /// `R[A] := RK(B, kb) * RK(C, kc)`
    Multiply(RegisterId, RegisterId, RegisterId, bool, bool),
    /// `R[A] := RK(B, kb) / RK(C, kc)`
    Divide(RegisterId, RegisterId, RegisterId, bool, bool),
    /// `R[A] := RK(B, kb) // RK(C, kc)` (floor division)
    FloorDivide(RegisterId, RegisterId, RegisterId, bool, bool),
    /// `R[A] := RK(B, kb) % RK(C, kc)`
    Modulo(RegisterId, RegisterId, RegisterId, bool, bool),
    /// `R[A] := RK(B, kb) ** RK(C, kc)`
    Power(RegisterId, RegisterId, RegisterId, bool, bool),
    /// `R[A] := -R[B]`
    Negate(RegisterId, RegisterId, RegisterId, bool, bool),

    /// `R[A] := RK(B, kb) > RK(C, kc)` via comparison dispatch.
    Gt(RegisterId, RegisterId, RegisterId, bool, bool),
    /// `R[A] := RK(B, kb) >= RK(C, kc)`
    Ge(RegisterId, RegisterId, RegisterId, bool, bool),
    /// `R[A] := RK(B, kb) == RK(C, kc)`
    Eq(RegisterId, RegisterId, RegisterId, bool, bool),
    /// `R[A] := RK(B, kb) != RK(C, kc)`
    Neq(RegisterId, RegisterId, RegisterId, bool, bool),
    /// `R[A] := RK(B, kb) < RK(C, kc)`
    Lt(RegisterId, RegisterId, RegisterId, bool, bool),
    /// `R[A] := RK(B, kb) <= RK(C, kc)`
    Le(RegisterId, RegisterId, RegisterId, bool, bool),

    /// `R[A] := RK(B, kb) & RK(C, kc)` (integers only)
    BitwiseAnd(RegisterId, RegisterId, RegisterId, bool, bool),
    /// `R[A] := RK(B, kb) | RK(C, kc)`
    BitwiseOr(RegisterId, RegisterId, RegisterId, bool, bool),
    /// `R[A] := RK(B, kb) ^ RK(C, kc)`
    BitwiseXor(RegisterId, RegisterId, RegisterId, bool, bool),
    /// `R[A] := RK(B, kb) << RK(C, kc)`
    BitwiseLShift(RegisterId, RegisterId, RegisterId, bool, bool),
    /// `R[A] := RK(B, kb) >> RK(C, kc)`
    BitwiseRShift(RegisterId, RegisterId, RegisterId, bool, bool),
    /// `R[A] := ~R[B]`
    BitwiseInvert(RegisterId, RegisterId, RegisterId, bool, bool),

    /// `R[A] := !truthy(R[B])`
    BoolNot(RegisterId, RegisterId, RegisterId, bool, bool),

    /// Build a range in place.
    ///
    /// | Operation | `R[A] := range(R[A], RK(B, kb), RK(C, kc))` |
    /// | Layout    | T |
    ///
    /// `R[A]` holds the start on entry. The result is the inline form iff
    /// all three components are integers fitting 32 bits and the step is 1.
    MakeRange(RegisterId, RegisterId, RegisterId, bool, bool),

    /// Advance the iterator in `R[C]`.
    ///
    /// | Operation | `R[B], R[A] := next(R[C])` |
    /// | Layout    | T |
    ///
    /// On a produced value: `R[B] := value`; when `A != 255`, `R[A]`
    /// receives the running iteration index (incremented when it already
    /// holds an integer, zeroed otherwise); execution then skips the
    /// following instruction (`pc := here + 2`). On exhaustion: upvalues
    /// at or above `R[B]` are closed and execution falls through to the
    /// next instruction, which the compiler guarantees is a forward
    /// `Jump` to the loop exit. That trailing-jump pairing is a binding
    /// contract between compiler and VM; neither side may emit or skip
    /// differently.
    IterNext(RegisterId, RegisterId, RegisterId, bool, bool),

    /// `R[A] := attribute uRK(C, kc) of R[B]`
    GetAttr(RegisterId, RegisterId, RegisterId, bool, bool),
    /// `attribute uRK(B, kb) of R[A] := R[C]`
    SetAttr(RegisterId, RegisterId, RegisterId, bool, bool),
    /// `R[A] := R[B][RK(C, kc)]`
    GetItem(RegisterId, RegisterId, RegisterId, bool, bool),
    /// `R[A][uRK(B, kb)] := R[C]`
    SetItem(RegisterId, RegisterId, RegisterId, bool, bool),
    /// `R[A] := delete R[B][uRK(C, kc)]`
    DelItem(RegisterId, RegisterId, RegisterId, bool, bool),
    /// `R[A] := RK(B, kb) in R[C]`
    Contain(RegisterId, RegisterId, RegisterId, bool, bool),

    /// Construct an empty collection.
    ///
    /// | Operation | `R[A] := new collection of base type uRK(B, kb), capacity hint C` |
    /// | Layout    | T |
    ///
    /// A hint of 255 requests the default capacity. Only lists and dicts
    /// are constructible.
    NewCollection(RegisterId, RegisterId, RegisterId, bool, bool),

    /// Append `B` values from `R[C]..R[C+B]` to the list in `R[A]`.
    AppendList(RegisterId, RegisterId, RegisterId, bool, bool),

    /// Insert `B` key/value pairs from `R[C]..R[C+2B]` (interleaved) into
    /// the dict in `R[A]`.
    AppendMap(RegisterId, RegisterId, RegisterId, bool, bool),

    /// Call the callable in `R[A]` with `C` arguments at `R[B]..R[B+C]`.
    ///
    /// | Layout | T |
    ///
    /// The compiler always emits `B = A + 1`; the callee frame is based
    /// at the caller slot of `R[B]`, so arguments become the callee's
    /// first registers and `R[A]` is reused for the return value.
    Call(RegisterId, RegisterId, RegisterId, bool, bool),

    /// Return from the current function.
    ///
    /// | Layout | T |
    ///
    /// Runs the frame's deferred closures LIFO, closes upvalues at or
    /// above the frame base, and, when `A != 255`, hands `R[A]` to the
    /// caller.
    Return(RegisterId, RegisterId, RegisterId, bool, bool),

    /// `R[A] := base_type(R[B]) == uRK(C, kc)`
    CheckType(RegisterId, RegisterId, RegisterId, bool, bool),
}

impl Opcode {
    /// Raw opcode identifier of this instruction.
    pub const fn repr(&self) -> OpcodeRepr {
        use Opcode::*;

        match self {
            Noop => OpcodeRepr::Noop,
            Jump(..) => OpcodeRepr::Jump,
            ExtraArg(..) => OpcodeRepr::ExtraArg,
            Trap(..) => OpcodeRepr::Trap,
            CJump(..) => OpcodeRepr::CJump,
            LoadConstant(..) => OpcodeRepr::LoadConstant,
            LoadBool(..) => OpcodeRepr::LoadBool,
            LoadInlineInteger(..) => OpcodeRepr::LoadInlineInteger,
            LoadInlineString(..) => OpcodeRepr::LoadInlineString,
            GetModuleVar(..) => OpcodeRepr::GetModuleVar,
            SetModuleVar(..) => OpcodeRepr::SetModuleVar,
            DeferCall(..) => OpcodeRepr::DeferCall,
            Move(..) => OpcodeRepr::Move,
            GetUpvalue(..) => OpcodeRepr::GetUpvalue,
            SetUpvalue(..) => OpcodeRepr::SetUpvalue,
            CloseUpvalues(..) => OpcodeRepr::CloseUpvalues,
            Add(..) => OpcodeRepr::Add,
            Subtract(..) => OpcodeRepr::Subtract,
            Multiply(..) => OpcodeRepr::Multiply,
            Divide(..) => OpcodeRepr::Divide,
            FloorDivide(..) => OpcodeRepr::FloorDivide,
            Modulo(..) => OpcodeRepr::Modulo,
            Power(..) => OpcodeRepr::Power,
            Negate(..) => OpcodeRepr::Negate,
            Gt(..) => OpcodeRepr::Gt,
            Ge(..) => OpcodeRepr::Ge,
            Eq(..) => OpcodeRepr::Eq,
            Neq(..) => OpcodeRepr::Neq,
            Lt(..) => OpcodeRepr::Lt,
            Le(..) => OpcodeRepr::Le,
            BitwiseAnd(..) => OpcodeRepr::BitwiseAnd,
            BitwiseOr(..) => OpcodeRepr::BitwiseOr,
            BitwiseXor(..) => OpcodeRepr::BitwiseXor,
            BitwiseLShift(..) => OpcodeRepr::BitwiseLShift,
            BitwiseRShift(..) => OpcodeRepr::BitwiseRShift,
            BitwiseInvert(..) => OpcodeRepr::BitwiseInvert,
            BoolNot(..) => OpcodeRepr::BoolNot,
            MakeRange(..) => OpcodeRepr::MakeRange,
            IterNext(..) => OpcodeRepr::IterNext,
            GetAttr(..) => OpcodeRepr::GetAttr,
            SetAttr(..) => OpcodeRepr::SetAttr,
            GetItem(..) => OpcodeRepr::GetItem,
            SetItem(..) => OpcodeRepr::SetItem,
            DelItem(..) => OpcodeRepr::DelItem,
            Contain(..) => OpcodeRepr::Contain,
            NewCollection(..) => OpcodeRepr::NewCollection,
            AppendList(..) => OpcodeRepr::AppendList,
            AppendMap(..) => OpcodeRepr::AppendMap,
            Call(..) => OpcodeRepr::Call,
            Return(..) => OpcodeRepr::Return,
            CheckType(..) => OpcodeRepr::CheckType,
        }
    }

    /// Decode an instruction word into its typed representation.
    ///
    /// Returns `None` when the opcode bits do not name a valid opcode.
    pub fn decode(instruction: Instruction) -> Option<Self> {
        use Opcode::*;

        let repr = OpcodeRepr::from_repr(instruction.op())?;
        let TArgs { a, b, c, kb, kc } = instruction.t_args();
        let KArgs { k, i, s, .. } = instruction.k_args();
        let JArgs { j, s: js } = instruction.j_args();

        let op = match repr {
            OpcodeRepr::Noop => Noop,
            OpcodeRepr::Jump => Jump(j, js),
            OpcodeRepr::ExtraArg => ExtraArg(j, js),
            OpcodeRepr::Trap => Trap(a, k, i, s),
            OpcodeRepr::CJump => CJump(a, k, i, s),
            OpcodeRepr::LoadConstant => LoadConstant(a, k, i, s),
            OpcodeRepr::LoadBool => LoadBool(a, k, i, s),
            OpcodeRepr::LoadInlineInteger => LoadInlineInteger(a, k, i, s),
            OpcodeRepr::LoadInlineString => LoadInlineString(a, k, i, s),
            OpcodeRepr::GetModuleVar => GetModuleVar(a, k, i, s),
            OpcodeRepr::SetModuleVar => SetModuleVar(a, k, i, s),
            OpcodeRepr::DeferCall => DeferCall(a, k, i, s),
            OpcodeRepr::Move => Move(a, b, c, kb, kc),
            OpcodeRepr::GetUpvalue => GetUpvalue(a, b, c, kb, kc),
            OpcodeRepr::SetUpvalue => SetUpvalue(a, b, c, kb, kc),
            OpcodeRepr::CloseUpvalues => CloseUpvalues(a, b, c, kb, kc),
            OpcodeRepr::Add => Add(a, b, c, kb, kc),
            OpcodeRepr::Subtract => Subtract(a, b, c, kb, kc),
            OpcodeRepr::Multiply => Multiply(a, b, c, kb, kc),
            OpcodeRepr::Divide => Divide(a, b, c, kb, kc),
            OpcodeRepr::FloorDivide => FloorDivide(a, b, c, kb, kc),
            OpcodeRepr::Modulo => Modulo(a, b, c, kb, kc),
            OpcodeRepr::Power => Power(a, b, c, kb, kc),
            OpcodeRepr::Negate => Negate(a, b, c, kb, kc),
            OpcodeRepr::Gt => Gt(a, b, c, kb, kc),
            OpcodeRepr::Ge => Ge(a, b, c, kb, kc),
            OpcodeRepr::Eq => Eq(a, b, c, kb, kc),
            OpcodeRepr::Neq => Neq(a, b, c, kb, kc),
            OpcodeRepr::Lt => Lt(a, b, c, kb, kc),
            OpcodeRepr::Le => Le(a, b, c, kb, kc),
            OpcodeRepr::BitwiseAnd => BitwiseAnd(a, b, c, kb, kc),
            OpcodeRepr::BitwiseOr => BitwiseOr(a, b, c, kb, kc),
            OpcodeRepr::BitwiseXor => BitwiseXor(a, b, c, kb, kc),
            OpcodeRepr::BitwiseLShift => BitwiseLShift(a, b, c, kb, kc),
            OpcodeRepr::BitwiseRShift => BitwiseRShift(a, b, c, kb, kc),
            OpcodeRepr::BitwiseInvert => BitwiseInvert(a, b, c, kb, kc),
            OpcodeRepr::BoolNot => BoolNot(a, b, c, kb, kc),
            OpcodeRepr::MakeRange => MakeRange(a, b, c, kb, kc),
            OpcodeRepr::IterNext => IterNext(a, b, c, kb, kc),
            OpcodeRepr::GetAttr => GetAttr(a, b, c, kb, kc),
            OpcodeRepr::SetAttr => SetAttr(a, b, c, kb, kc),
            OpcodeRepr::GetItem => GetItem(a, b, c, kb, kc),
            OpcodeRepr::SetItem => SetItem(a, b, c, kb, kc),
            OpcodeRepr::DelItem => DelItem(a, b, c, kb, kc),
            OpcodeRepr::Contain => Contain(a, b, c, kb, kc),
            OpcodeRepr::NewCollection => NewCollection(a, b, c, kb, kc),
            OpcodeRepr::AppendList => AppendList(a, b, c, kb, kc),
            OpcodeRepr::AppendMap => AppendMap(a, b, c, kb, kc),
            OpcodeRepr::Call => Call(a, b, c, kb, kc),
            OpcodeRepr::Return => Return(a, b, c, kb, kc),
            OpcodeRepr::CheckType => CheckType(a, b, c, kb, kc),
        };

        Some(op)
    }
}

impl From<Opcode> for u32 {
    fn from(op: Opcode) -> u32 {
        use Opcode::*;

        match op {
            Noop => Instruction::pack_t(OpcodeRepr::Noop, 0, 0, 0, false, false),
            Jump(j, s) => Instruction::pack_j(OpcodeRepr::Jump, j, s),
            ExtraArg(j, s) => Instruction::pack_j(OpcodeRepr::ExtraArg, j, s),
            Trap(a, k, i, s) => Instruction::pack_k(OpcodeRepr::Trap, a, k, i, s),
            CJump(a, k, i, s) => Instruction::pack_k(OpcodeRepr::CJump, a, k, i, s),
            LoadConstant(a, k, i, s) => Instruction::pack_k(OpcodeRepr::LoadConstant, a, k, i, s),
            LoadBool(a, k, i, s) => Instruction::pack_k(OpcodeRepr::LoadBool, a, k, i, s),
            LoadInlineInteger(a, k, i, s) => {
                Instruction::pack_k(OpcodeRepr::LoadInlineInteger, a, k, i, s)
            }
            LoadInlineString(a, k, i, s) => {
                Instruction::pack_k(OpcodeRepr::LoadInlineString, a, k, i, s)
            }
            GetModuleVar(a, k, i, s) => Instruction::pack_k(OpcodeRepr::GetModuleVar, a, k, i, s),
            SetModuleVar(a, k, i, s) => Instruction::pack_k(OpcodeRepr::SetModuleVar, a, k, i, s),
            DeferCall(a, k, i, s) => Instruction::pack_k(OpcodeRepr::DeferCall, a, k, i, s),
            Move(a, b, c, kb, kc) => Instruction::pack_t(OpcodeRepr::Move, a, b, c, kb, kc),
            GetUpvalue(a, b, c, kb, kc) => {
                Instruction::pack_t(OpcodeRepr::GetUpvalue, a, b, c, kb, kc)
            }
            SetUpvalue(a, b, c, kb, kc) => {
                Instruction::pack_t(OpcodeRepr::SetUpvalue, a, b, c, kb, kc)
            }
            CloseUpvalues(a, b, c, kb, kc) => {
                Instruction::pack_t(OpcodeRepr::CloseUpvalues, a, b, c, kb, kc)
            }
            Add(a, b, c, kb, kc) => Instruction::pack_t(OpcodeRepr::Add, a, b, c, kb, kc),
            Subtract(a, b, c, kb, kc) => Instruction::pack_t(OpcodeRepr::Subtract, a, b, c, kb, kc),
            Multiply(a, b, c, kb, kc) => Instruction::pack_t(OpcodeRepr::Multiply, a, b, c, kb, kc),
            Divide(a, b, c, kb, kc) => Instruction::pack_t(OpcodeRepr::Divide, a, b, c, kb, kc),
            FloorDivide(a, b, c, kb, kc) => {
                Instruction::pack_t(OpcodeRepr::FloorDivide, a, b, c, kb, kc)
            }
            Modulo(a, b, c, kb, kc) => Instruction::pack_t(OpcodeRepr::Modulo, a, b, c, kb, kc),
            Power(a, b, c, kb, kc) => Instruction::pack_t(OpcodeRepr::Power, a, b, c, kb, kc),
            Negate(a, b, c, kb, kc) => Instruction::pack_t(OpcodeRepr::Negate, a, b, c, kb, kc),
            Gt(a, b, c, kb, kc) => Instruction::pack_t(OpcodeRepr::Gt, a, b, c, kb, kc),
            Ge(a, b, c, kb, kc) => Instruction::pack_t(OpcodeRepr::Ge, a, b, c, kb, kc),
            Eq(a, b, c, kb, kc) => Instruction::pack_t(OpcodeRepr::Eq, a, b, c, kb, kc),
            Neq(a, b, c, kb, kc) => Instruction::pack_t(OpcodeRepr::Neq, a, b, c, kb, kc),
            Lt(a, b, c, kb, kc) => Instruction::pack_t(OpcodeRepr::Lt, a, b, c, kb, kc),
            Le(a, b, c, kb, kc) => Instruction::pack_t(OpcodeRepr::Le, a, b, c, kb, kc),
            BitwiseAnd(a, b, c, kb, kc) => {
                Instruction::pack_t(OpcodeRepr::BitwiseAnd, a, b, c, kb, kc)
            }
            BitwiseOr(a, b, c, kb, kc) => {
                Instruction::pack_t(OpcodeRepr::BitwiseOr, a, b, c, kb, kc)
            }
            BitwiseXor(a, b, c, kb, kc) => {
                Instruction::pack_t(OpcodeRepr::BitwiseXor, a, b, c, kb, kc)
            }
            BitwiseLShift(a, b, c, kb, kc) => {
                Instruction::pack_t(OpcodeRepr::BitwiseLShift, a, b, c, kb, kc)
            }
            BitwiseRShift(a, b, c, kb, kc) => {
                Instruction::pack_t(OpcodeRepr::BitwiseRShift, a, b, c, kb, kc)
            }
            BitwiseInvert(a, b, c, kb, kc) => {
                Instruction::pack_t(OpcodeRepr::BitwiseInvert, a, b, c, kb, kc)
            }
            BoolNot(a, b, c, kb, kc) => Instruction::pack_t(OpcodeRepr::BoolNot, a, b, c, kb, kc),
            MakeRange(a, b, c, kb, kc) => {
                Instruction::pack_t(OpcodeRepr::MakeRange, a, b, c, kb, kc)
            }
            IterNext(a, b, c, kb, kc) => Instruction::pack_t(OpcodeRepr::IterNext, a, b, c, kb, kc),
            GetAttr(a, b, c, kb, kc) => Instruction::pack_t(OpcodeRepr::GetAttr, a, b, c, kb, kc),
            SetAttr(a, b, c, kb, kc) => Instruction::pack_t(OpcodeRepr::SetAttr, a, b, c, kb, kc),
            GetItem(a, b, c, kb, kc) => Instruction::pack_t(OpcodeRepr::GetItem, a, b, c, kb, kc),
            SetItem(a, b, c, kb, kc) => Instruction::pack_t(OpcodeRepr::SetItem, a, b, c, kb, kc),
            DelItem(a, b, c, kb, kc) => Instruction::pack_t(OpcodeRepr::DelItem, a, b, c, kb, kc),
            Contain(a, b, c, kb, kc) => Instruction::pack_t(OpcodeRepr::Contain, a, b, c, kb, kc),
            NewCollection(a, b, c, kb, kc) => {
                Instruction::pack_t(OpcodeRepr::NewCollection, a, b, c, kb, kc)
            }
            AppendList(a, b, c, kb, kc) => {
                Instruction::pack_t(OpcodeRepr::AppendList, a, b, c, kb, kc)
            }
            AppendMap(a, b, c, kb, kc) => {
                Instruction::pack_t(OpcodeRepr::AppendMap, a, b, c, kb, kc)
            }
            Call(a, b, c, kb, kc) => Instruction::pack_t(OpcodeRepr::Call, a, b, c, kb, kc),
            Return(a, b, c, kb, kc) => Instruction::pack_t(OpcodeRepr::Return, a, b, c, kb, kc),
            CheckType(a, b, c, kb, kc) => {
                Instruction::pack_t(OpcodeRepr::CheckType, a, b, c, kb, kc)
            }
        }
    }
}

impl From<Opcode> for Instruction {
    fn from(op: Opcode) -> Self {
        Instruction::from(u32::from(op))
    }
}
