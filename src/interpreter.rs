//! The register-based bytecode interpreter.
//!
//! One [`Vm`] owns the register file, the call-frame stack, the
//! open-upvalue list, the identifier interner, and host-registered
//! globals. Executing a module means wrapping its module-init prototype
//! in a closure and running the dispatch loop until the root frame
//! returns, a `Trap` fires, or a runtime error latches.

mod executors;
mod flow;

use std::rc::Rc;

use tracing::trace;

use crate::consts::INITIAL_REGISTER_CAPACITY;
use crate::error::{ErrorKind, RuntimeError, VmError};
use crate::module::{Module, ModuleId, ModuleSource};
use crate::state::ProgramState;
use crate::symbol::SymbolTable;
use crate::value::{Closure, DictObject, Upvalue, Value};

use std::cell::RefCell;

/// Host-provided native function.
///
/// Receives the VM and a read-only argument window; returns the call's
/// result value or an error kind.
pub type NativeFn = fn(&mut Vm, &[Value]) -> Result<Value, ErrorKind>;

/// Host-registered global variables, readable from every module.
#[derive(Debug, Default)]
pub struct Globals {
    names: DictObject,
    values: Vec<Value>,
}

impl Globals {
    /// Register a global under an interned identifier id.
    pub fn define(&mut self, id: crate::symbol::IdentifierId, value: Value) -> Result<u16, ErrorKind> {
        if self.names.has(&Value::Int(id.into()))? {
            return Err(ErrorKind::VariableAlreadyDefined);
        }

        let index = self.values.len();
        if index > usize::from(u16::MAX) {
            return Err(ErrorKind::MemoryAllocationFailure);
        }

        self.names
            .insert(Value::Int(id.into()), Value::Int(index as i64))?;
        self.values.push(value);
        Ok(index as u16)
    }

    /// Index of a registered global.
    pub fn lookup(&self, id: crate::symbol::IdentifierId) -> Option<u16> {
        match self.names.get(&Value::Int(id.into())) {
            Ok(Some(Value::Int(index))) => u16::try_from(index).ok(),
            _ => None,
        }
    }

    /// Value at a global index.
    pub fn value(&self, index: u16) -> Option<&Value> {
        self.values.get(usize::from(index))
    }
}

/// One activation record.
#[derive(Debug)]
pub(crate) struct CallFrame {
    /// The executing closure.
    pub closure: Rc<Closure>,
    /// Index of the next instruction in the closure's chunk.
    pub pc: usize,
    /// First register-file slot of this frame's window.
    pub base: usize,
    /// Deferred closures, run LIFO on normal return.
    pub defers: Vec<Rc<Closure>>,
}

/// A Rill virtual machine.
pub struct Vm {
    pub(crate) symbols: SymbolTable,
    pub(crate) globals: Globals,
    pub(crate) values: Vec<Value>,
    pub(crate) frames: Vec<CallFrame>,
    /// Open upvalues, sorted by descending register-file slot.
    pub(crate) open_upvalues: Vec<Rc<RefCell<Upvalue>>>,
    pub(crate) error: Option<RuntimeError>,
    /// Pending `ExtraArg` operand extension; cleared by the next
    /// non-extension instruction.
    pub(crate) extra_arg: u64,
    next_module_id: ModuleId,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    /// A fresh VM with the built-in type names pre-interned.
    pub fn new() -> Self {
        Self {
            symbols: SymbolTable::new(),
            globals: Globals::default(),
            values: vec![Value::Invalid; INITIAL_REGISTER_CAPACITY],
            frames: Vec::new(),
            open_upvalues: Vec::new(),
            error: None,
            extra_arg: 0,
            next_module_id: 0,
        }
    }

    /// Register a `(name, value)` pair the compiler and VM resolve as a
    /// global. Host names always intern above the reserved id range.
    pub fn register_global(&mut self, name: &str, value: Value) -> Result<(), ErrorKind> {
        let id = self
            .symbols
            .intern(name)
            .ok_or(ErrorKind::InternalError)?;
        self.globals.define(id, value)?;
        Ok(())
    }

    /// Compile a module against this VM's interner and globals.
    pub fn compile(&mut self, source: &ModuleSource<'_>) -> Result<Module, VmError> {
        let id = self.next_module_id;
        self.next_module_id = self.next_module_id.wrapping_add(1);

        let module = crate::compiler::compile_module(&mut self.symbols, &self.globals, source, id)?;
        Ok(module)
    }

    /// Execute a module's top-level code.
    ///
    /// On a runtime error the frame stack is left where it stopped, the
    /// error latches (see [`Vm::error`]), and deferred calls do not run.
    pub fn run_module(&mut self, module: &mut Module) -> Result<ProgramState, VmError> {
        let proto = module
            .module_init
            .clone()
            .ok_or_else(|| RuntimeError::new(ErrorKind::InternalError, 0))
            .map_err(VmError::Runtime)?;

        self.frames.clear();
        self.open_upvalues.clear();
        self.error = None;
        self.extra_arg = 0;

        let closure = Rc::new(Closure::plain(proto));
        self.push_frame(closure, 0)
            .map_err(|kind| self.latch(kind))?;

        trace!(module = module.id, "module execution start");
        let state = self.run_until(module, 0)?;
        trace!(module = module.id, ?state, "module execution end");

        Ok(state)
    }

    /// The latched runtime error, if the last run aborted.
    pub const fn error(&self) -> Option<RuntimeError> {
        self.error
    }

    /// Read a register-file slot; test and debugging aid.
    pub fn register(&self, slot: usize) -> Option<&Value> {
        self.values.get(slot)
    }

    /// Number of currently open upvalues.
    pub fn open_upvalue_count(&self) -> usize {
        self.open_upvalues.len()
    }

    /// The identifier interner.
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// The identifier interner, mutably.
    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    pub(crate) fn latch(&mut self, kind: ErrorKind) -> VmError {
        let pc = self
            .frames
            .last()
            .map(|frame| frame.pc.saturating_sub(1) as u32)
            .unwrap_or(0);

        let error = RuntimeError::new(kind, pc);
        self.error = Some(error);
        VmError::Runtime(error)
    }
}
