//! Rill: a small dynamic-language runtime.
//!
//! The crate contains the three tightly coupled subsystems of the core:
//! the value model with its per-base-type primitive dispatch tables, the
//! single-pass compiler (lexer + Pratt parser emitting bytecode
//! directly), and the register-based interpreter executing the
//! instruction set defined by the `rill-asm` crate.
//!
//! ```
//! use rill_vm::prelude::*;
//!
//! let mut vm = Vm::new();
//! let source = ModuleSource {
//!     name: "demo",
//!     source: b"x := 2 + 3",
//! };
//!
//! let mut module = vm.compile(&source).unwrap();
//! let state = vm.run_module(&mut module).unwrap();
//! assert_eq!(state, ProgramState::Finished);
//! ```

pub mod compiler;
pub mod constants;
pub mod consts;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod module;
pub mod primitives;
pub mod state;
pub mod symbol;
pub mod value;

pub mod prelude {
    //! Common imports for embedders.

    pub use rill_asm::{Instruction, Opcode, OpcodeRepr};

    pub use crate::compiler::compile_module;
    pub use crate::constants::{ConstantIndex, ConstantTable};
    pub use crate::error::{CompileError, ErrorKind, RuntimeError, VmError};
    pub use crate::interpreter::{Globals, NativeFn, Vm};
    pub use crate::lexer::{Lexer, Token};
    pub use crate::module::{Module, ModuleId, ModuleSource, ModuleVariableId};
    pub use crate::state::ProgramState;
    pub use crate::symbol::{IdentifierId, SymbolTable};
    pub use crate::value::{BaseType, Value};
}
