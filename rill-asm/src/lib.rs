//! Instruction set and wire format of the Rill virtual machine.
//!
//! Every Rill instruction is one little-endian 32-bit word with the opcode
//! in its low 6 bits. The remaining 26 bits are interpreted under one of
//! three operand layouts:
//!
//! ```text
//!   3 3 2 2 2 2 2 2 2 2 2 2 1 1 1 1 1 1 1 1 1 1 0 0 0 0 0 0 0 0 0 0
//!   1 0 9 8 7 6 5 4 3 2 1 0 9 8 7 6 5 4 3 2 1 0 9 8 7 6 5 4 3 2 1 0
//!  |      A(8)     |      B(8)     |      C(8)     |k|k|   Op(6)   |   T (ternary)
//!  |      A(8)     |              K(16)            |i|s|   Op(6)   |   K (constant)
//!  |                     J(24)                     |s| |   Op(6)   |   J (jump)
//! ```
//!
//! Jump distances are measured in instructions and are relative to the
//! index of the jump instruction itself, stored as an unsigned magnitude
//! with an explicit direction bit. Because nothing in the encoding is an
//! absolute address, independently assembled chunks can be concatenated
//! without rewriting their jumps.

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

mod instruction;
mod opcode;

pub use instruction::{Instruction, JArgs, KArgs, TArgs};
pub use opcode::{Layout, Opcode, OpcodeRepr};


/// Register identifier inside one call frame.
pub type RegisterId = u8;

/// 16-bit immediate operand of a K-layout instruction.
pub type Immediate16 = u16;

/// 24-bit immediate operand of a J-layout instruction.
pub type Immediate24 = u32;

/// Number of bits reserved for the opcode.
pub const OPCODE_BITS: u32 = 6;

/// Mask extracting the opcode from a raw instruction word.
pub const OPCODE_MASK: u32 = (1 << OPCODE_BITS) - 1;

/// Largest encodable K operand.
pub const MAX_OPERAND_K: u32 = u16::MAX as u32;

/// Largest encodable jump magnitude, in instructions.
pub const MAX_OPERAND_J: u32 = (1 << 24) - 1;

/// Bias applied to T-layout operands flagged as inline constants: an
/// operand byte `x` with its `k` flag set denotes the integer `x - 128`.
pub const INLINE_OPERAND_BIAS: i64 = 128;

/// Register operand value meaning "no register" (e.g. `RETURN` without a
/// value, `ITER_NEXT` without an index variable).
pub const NO_REGISTER: RegisterId = u8::MAX;
