//! Function scopes, block scopes, register allocation, and upvalue
//! resolution.

use rill_asm::Instruction;

use crate::consts::MAX_LOCAL_REGISTER;
use crate::error::{CompileError, ErrorKind};
use crate::module::{ModuleId, ModuleVariableId};
use crate::symbol::IdentifierId;
use crate::value::{FunctionProto, UpvalueDescriptor};

use super::Compiler;

/// One entry of the compiler's flat variable table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Variable {
    pub id: IdentifierId,
    pub register: u8,
}

/// A block scope: the half-open range of the variable table it owns and
/// the register watermark to restore on exit.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockScope {
    pub var_start: usize,
    pub register_floor: u16,
}

/// A loop being compiled: where its `IterNext` sits and the forward
/// jumps its `break`s emitted, to be patched at loop end.
#[derive(Debug)]
pub(crate) struct LoopContext {
    pub iter_pos: usize,
    pub breaks: Vec<usize>,
}

/// Per-function compilation state.
#[derive(Debug)]
pub(crate) struct FunctionScope {
    pub chunk: Vec<Instruction>,
    pub arity: u8,
    /// Return coarity once the first `return` fixes it.
    pub coarity: Option<u8>,
    /// Next free register; temporaries above `locals_floor` are
    /// released at every statement boundary.
    pub next_register: u16,
    /// Registers holding live locals.
    pub locals_floor: u16,
    /// High-water mark of `next_register`; becomes `max_stack_size`.
    pub max_used: u16,
    pub upvalues: Vec<UpvalueDescriptor>,
    pub blocks: Vec<BlockScope>,
    /// Index into the compiler's variable table where this function's
    /// variables start.
    pub var_base: usize,
    pub loops: Vec<LoopContext>,
    /// Whether this scope is a `defer` block body.
    pub is_defer: bool,
}

impl FunctionScope {
    pub fn root() -> Self {
        Self::nested(0, 0, false)
    }

    pub fn nested(arity: u8, var_base: usize, is_defer: bool) -> Self {
        Self {
            chunk: Vec::new(),
            arity,
            coarity: None,
            next_register: arity.into(),
            locals_floor: arity.into(),
            max_used: arity.into(),
            upvalues: Vec::new(),
            blocks: Vec::new(),
            var_base,
            loops: Vec::new(),
            is_defer,
        }
    }

    /// Convert the finished scope into an immutable prototype.
    pub fn into_proto(self, module_id: ModuleId, arity: u8, coarity: u8) -> FunctionProto {
        FunctionProto {
            chunk: self.chunk,
            module_id,
            arity,
            coarity,
            max_stack_size: self.max_used.min(u16::from(u8::MAX)) as u8,
            upvalues: self.upvalues,
        }
    }
}

/// How an identifier resolves at a use site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Binding {
    /// A local of the current function.
    Local(u8),
    /// A captured variable of an enclosing function.
    Upvalue(u8),
    /// A host-registered global, read through `LoadConstant i=1`.
    HostGlobal(u16),
    /// A module-level variable.
    ModuleVar { slot: ModuleVariableId, export: bool },
}

impl<'a> Compiler<'a> {
    /* Registers */

    /// Reserve the next free register as a temporary.
    pub(crate) fn alloc_register(&mut self) -> Result<u8, CompileError> {
        let line = self.lexer.line();
        let scope = self.current_fn_mut();
        let register = scope.next_register;
        if register > MAX_LOCAL_REGISTER.into() {
            return Err(CompileError::new(ErrorKind::InternalError, line));
        }

        scope.next_register += 1;
        scope.max_used = scope.max_used.max(scope.next_register);
        Ok(register as u8)
    }

    /// Release every temporary, keeping live locals.
    pub(crate) fn reset_temps(&mut self) {
        let scope = self.current_fn_mut();
        scope.next_register = scope.locals_floor;
    }

    /// Promote the register to a local so statement boundaries keep it.
    pub(crate) fn promote_to_local(&mut self, register: u8) {
        let scope = self.current_fn_mut();
        debug_assert_eq!(u16::from(register), scope.locals_floor);
        scope.locals_floor = u16::from(register) + 1;
        scope.next_register = scope.next_register.max(scope.locals_floor);
    }

    /* Blocks */

    pub(crate) fn enter_block(&mut self) {
        let var_start = self.variables.len();
        let scope = self.current_fn_mut();
        scope.blocks.push(BlockScope {
            var_start,
            register_floor: scope.locals_floor,
        });
    }

    /// Leave a block: drop its variables and release their registers.
    pub(crate) fn exit_block(&mut self) {
        let block = self
            .current_fn_mut()
            .blocks
            .pop()
            .expect("exit_block pairs with enter_block");

        self.variables.truncate(block.var_start);
        let scope = self.current_fn_mut();
        scope.locals_floor = block.register_floor;
        scope.next_register = block.register_floor;
    }

    /* Variables */

    /// Bind a new local in the current block.
    pub(crate) fn bind_local(&mut self, id: IdentifierId, register: u8) {
        self.variables.push(Variable { id, register });
    }

    /// Locals of the function at `index` visible right now, innermost
    /// first.
    fn local_in(&self, function_index: usize, id: IdentifierId) -> Option<u8> {
        let start = self.functions[function_index].var_base;
        let end = self
            .functions
            .get(function_index + 1)
            .map(|f| f.var_base)
            .unwrap_or(self.variables.len());

        self.variables[start..end]
            .iter()
            .rev()
            .find(|v| v.id == id)
            .map(|v| v.register)
    }

    /// Resolve an identifier at a use site: locals, then captures up the
    /// static chain, then host globals, then module exports, then
    /// module globals.
    pub(crate) fn resolve(&mut self, id: IdentifierId) -> Result<Option<Binding>, CompileError> {
        let current = self.functions.len() - 1;

        if let Some(register) = self.local_in(current, id) {
            return Ok(Some(Binding::Local(register)));
        }

        if let Some(index) = self.resolve_upvalue(current, id)? {
            return Ok(Some(Binding::Upvalue(index)));
        }

        if let Some(index) = self.host.lookup(id) {
            return Ok(Some(Binding::HostGlobal(index)));
        }

        if let Some(slot) = self.module.lookup_variable(id, true) {
            return Ok(Some(Binding::ModuleVar { slot, export: true }));
        }

        if let Some(slot) = self.module.lookup_variable(id, false) {
            return Ok(Some(Binding::ModuleVar {
                slot,
                export: false,
            }));
        }

        Ok(None)
    }

    /// Walk the function scope stack outward looking for `id`; record
    /// the capture chain on the way back down.
    fn resolve_upvalue(
        &mut self,
        function_index: usize,
        id: IdentifierId,
    ) -> Result<Option<u8>, CompileError> {
        if function_index == 0 {
            return Ok(None);
        }

        if let Some(register) = self.local_in(function_index - 1, id) {
            let index = self.add_upvalue(function_index, register, true)?;
            return Ok(Some(index));
        }

        if let Some(forwarded) = self.resolve_upvalue(function_index - 1, id)? {
            let index = self.add_upvalue(function_index, forwarded, false)?;
            return Ok(Some(index));
        }

        Ok(None)
    }

    /// Record an upvalue descriptor, deduplicated per function.
    fn add_upvalue(
        &mut self,
        function_index: usize,
        index: u8,
        is_local: bool,
    ) -> Result<u8, CompileError> {
        let line = self.lexer.line();
        let descriptors = &mut self.functions[function_index].upvalues;

        for (i, existing) in descriptors.iter().enumerate() {
            if existing.index == index && existing.is_local == is_local {
                return Ok(i as u8);
            }
        }

        if descriptors.len() >= usize::from(u8::MAX) {
            return Err(CompileError::new(ErrorKind::InternalError, line));
        }

        descriptors.push(UpvalueDescriptor { index, is_local });
        Ok((descriptors.len() - 1) as u8)
    }

    /// Whether `id` is already bound anywhere a declaration here could
    /// collide with: any visible local of any enclosing function, a host
    /// global, a module export, or a module global.
    pub(crate) fn is_bound_anywhere(&self, id: IdentifierId) -> bool {
        for function_index in (0..self.functions.len()).rev() {
            if self.local_in(function_index, id).is_some() {
                return true;
            }
        }

        self.host.lookup(id).is_some()
            || self.module.lookup_variable(id, true).is_some()
            || self.module.lookup_variable(id, false).is_some()
    }
}
