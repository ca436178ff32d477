//! Compiled module records.

use std::rc::Rc;

use rill_asm::Immediate16;

use crate::constants::ConstantTable;
use crate::error::ErrorKind;
use crate::symbol::IdentifierId;
use crate::value::{DictObject, FunctionProto, Value};

/// Identifier of a module within one VM.
pub type ModuleId = u16;

/// Index of a module-level variable; an entry slot in the module's
/// globals or exports dict.
pub type ModuleVariableId = Immediate16;

/// Source text handed to the compiler.
#[derive(Debug, Clone, Copy)]
pub struct ModuleSource<'a> {
    /// Module name, used for registration and diagnostics.
    pub name: &'a str,
    /// The source bytes; validated as UTF-8 by the lexer.
    pub source: &'a [u8],
}

/// A compiled module at rest: constant pool, variable tables, named
/// types, and the prototype holding its top-level code.
#[derive(Debug)]
pub struct Module {
    /// This module's id.
    pub id: ModuleId,
    /// Deduplicated compile-time constants.
    pub constants: ConstantTable,
    /// Module-private variables: identifier id → value.
    pub globals: DictObject,
    /// Exported variables: identifier id → value.
    pub exports: DictObject,
    /// Named types declared with `struct`: identifier id → class.
    pub types: DictObject,
    /// Top-level code; `None` until compilation finishes.
    pub module_init: Option<Rc<FunctionProto>>,
}

impl Module {
    /// An empty module shell.
    pub fn new(id: ModuleId) -> Self {
        Self {
            id,
            constants: ConstantTable::new(),
            globals: DictObject::new(),
            exports: DictObject::new(),
            types: DictObject::new(),
            module_init: None,
        }
    }

    /// Declare a module variable, returning its slot. The slot is the
    /// dict entry's tuple id, stable because module tables never delete.
    pub fn declare_variable(
        &mut self,
        id: IdentifierId,
        export: bool,
    ) -> Result<ModuleVariableId, ErrorKind> {
        let table = if export {
            &mut self.exports
        } else {
            &mut self.globals
        };

        let tid = table.insert(Value::Int(id.into()), Value::Invalid)?;
        ModuleVariableId::try_from(tid).map_err(|_| ErrorKind::MemoryAllocationFailure)
    }

    /// Slot of a previously declared variable.
    pub fn lookup_variable(&self, id: IdentifierId, export: bool) -> Option<ModuleVariableId> {
        let table = if export { &self.exports } else { &self.globals };

        table
            .find_tid(&Value::Int(id.into()))
            .ok()
            .flatten()
            .and_then(|tid| ModuleVariableId::try_from(tid).ok())
    }

    /// Read a module variable by slot.
    pub fn variable(&self, slot: ModuleVariableId, export: bool) -> Option<Value> {
        let table = if export { &self.exports } else { &self.globals };
        table.entry_value(slot.into()).cloned()
    }

    /// Write a module variable by slot.
    pub fn set_variable(&mut self, slot: ModuleVariableId, export: bool, value: Value) -> bool {
        let table = if export {
            &mut self.exports
        } else {
            &mut self.globals
        };
        table.set_entry_value(slot.into(), value)
    }
}
