//! Call protocol, upvalue lifecycle, and deferred-call execution.

use std::cell::RefCell;
use std::rc::Rc;

use rill_asm::NO_REGISTER;
use tracing::trace;

use crate::error::ErrorKind;
use crate::module::Module;
use crate::state::ProgramState;
use crate::value::{Closure, FunctionProto, Upvalue, Value};

use super::{CallFrame, Vm};

impl Vm {
    /// Push an activation record, growing the register file by doubling
    /// when the new frame's window exceeds its capacity.
    pub(crate) fn push_frame(&mut self, closure: Rc<Closure>, base: usize) -> Result<(), ErrorKind> {
        let needed = base + usize::from(closure.proto.max_stack_size);
        if needed > self.values.len() {
            let mut capacity = self.values.len().max(1);
            while capacity < needed {
                capacity *= 2;
            }
            self.values.resize(capacity, Value::Invalid);
        }

        self.frames.push(CallFrame {
            closure,
            pc: 0,
            base,
            defers: Vec::new(),
        });
        trace!(depth = self.frames.len(), base, "frame push");

        Ok(())
    }

    /// `Call A B C`: invoke the callable in `R[A]` with `C` arguments at
    /// `R[B]..`. Compiled callees get a frame based at the caller slot
    /// of `R[B]`; native callees run to completion synchronously with
    /// their result written back into `R[A]`.
    pub(crate) fn do_call(&mut self, a: u8, b: u8, c: u8) -> Result<(), ErrorKind> {
        let base = self
            .frames
            .last()
            .ok_or(ErrorKind::InternalError)?
            .base;
        let callee = self.values[base + usize::from(a)].clone();

        match callee {
            Value::Closure(closure) => {
                if closure.proto.arity != c {
                    return Err(ErrorKind::ArgsCountMismatch);
                }
                self.push_frame(closure, base + usize::from(b))
            }
            Value::Proto(proto) => {
                // A bare prototype is callable only when it captures
                // nothing; capturing prototypes become closures at load.
                if !proto.upvalues.is_empty() {
                    return Err(ErrorKind::InternalError);
                }
                if proto.arity != c {
                    return Err(ErrorKind::ArgsCountMismatch);
                }
                self.push_frame(Rc::new(Closure::plain(proto)), base + usize::from(b))
            }
            Value::Native(function) => {
                let window = base + usize::from(b)..base + usize::from(b) + usize::from(c);
                let args = self.values[window].to_vec();
                let result = function(self, &args)?;
                self.values[base + usize::from(a)] = result;
                Ok(())
            }
            _ => Err(ErrorKind::UnexpectedType),
        }
    }

    /// `Return A`: run the frame's deferred closures LIFO, close the
    /// frame's upvalues, hand the return value to the caller's callee
    /// slot, and pop. Returns the final program state once the frame at
    /// `floor` has popped.
    pub(crate) fn do_return(
        &mut self,
        module: &mut Module,
        register: Option<u8>,
        floor: usize,
    ) -> Result<Option<ProgramState>, crate::error::VmError> {
        let Some(frame) = self.frames.last() else {
            return Err(self.latch(ErrorKind::InternalError));
        };
        let (base, coarity) = (frame.base, frame.closure.proto.coarity);

        if register.is_none() && coarity > 0 {
            return Err(self.latch(ErrorKind::MissingReturnValue));
        }

        // Deferred closures run as nested zero-argument calls in the
        // scratch area above the frame, newest first. Errors inside a
        // defer abort like any other runtime error; a trap ends the
        // whole program.
        loop {
            let (deferred, scratch_base) = {
                let Some(frame) = self.frames.last_mut() else {
                    break;
                };
                let scratch = frame.base + usize::from(frame.closure.proto.max_stack_size);
                match frame.defers.pop() {
                    Some(deferred) => (deferred, scratch),
                    None => break,
                }
            };

            trace!("running deferred call");
            self.push_frame(deferred, scratch_base)
                .map_err(|kind| self.latch(kind))?;

            let state = self.run_until(module, self.frames.len() - 1)?;
            if let ProgramState::Trapped(code) = state {
                return Ok(Some(ProgramState::Trapped(code)));
            }
        }

        self.close_upvalues(base);

        if let Some(register) = register {
            let value = self.values[base + usize::from(register)].clone();
            if base > 0 {
                self.values[base - 1] = value;
            }
        }

        self.frames.pop();
        trace!(depth = self.frames.len(), "frame pop");

        if self.frames.len() == floor {
            return Ok(Some(ProgramState::Finished));
        }

        Ok(None)
    }

    /// Materialize a closure over the current frame for a prototype with
    /// upvalue descriptors. `isLocal` descriptors capture the enclosing
    /// frame's register, reusing an already-open upvalue for the same
    /// slot; the rest forward the enclosing closure's upvalues.
    pub(crate) fn capture_closure(
        &mut self,
        proto: Rc<FunctionProto>,
    ) -> Result<Rc<Closure>, ErrorKind> {
        let (base, enclosing) = {
            let frame = self.frames.last().ok_or(ErrorKind::InternalError)?;
            (frame.base, frame.closure.clone())
        };

        let mut upvalues = Vec::with_capacity(proto.upvalues.len());
        for descriptor in &proto.upvalues {
            let upvalue = if descriptor.is_local {
                self.find_or_create_upvalue(base + usize::from(descriptor.index))
            } else {
                enclosing
                    .upvalues
                    .get(usize::from(descriptor.index))
                    .cloned()
                    .ok_or(ErrorKind::InternalError)?
            };
            upvalues.push(upvalue);
        }

        Ok(Rc::new(Closure { proto, upvalues }))
    }

    /// At most one open upvalue references any register slot; reuse it
    /// or splice a fresh one into the descending-sorted list.
    fn find_or_create_upvalue(&mut self, slot: usize) -> Rc<RefCell<Upvalue>> {
        let position = self
            .open_upvalues
            .partition_point(|u| u.borrow().open_slot().is_some_and(|s| s > slot));

        if let Some(existing) = self.open_upvalues.get(position) {
            if existing.borrow().open_slot() == Some(slot) {
                return existing.clone();
            }
        }

        let created = Rc::new(RefCell::new(Upvalue::Open(slot)));
        self.open_upvalues.insert(position, created.clone());
        self.assert_open_list_sorted();
        created
    }

    /// Close every open upvalue at or above `min_slot`: copy the live
    /// register into the upvalue's own cell and unlink it. The list is
    /// sorted by descending slot, so this is a prefix walk.
    pub(crate) fn close_upvalues(&mut self, min_slot: usize) {
        let count = self
            .open_upvalues
            .iter()
            .take_while(|u| u.borrow().open_slot().is_some_and(|s| s >= min_slot))
            .count();

        let closing: Vec<_> = self.open_upvalues.drain(..count).collect();
        for upvalue in closing {
            let slot = upvalue
                .borrow()
                .open_slot()
                .expect("only open upvalues live in the list");
            let value = self.values[slot].clone();
            *upvalue.borrow_mut() = Upvalue::Closed(value);
            trace!(slot, "upvalue closed");
        }

        self.assert_open_list_sorted();
    }

    pub(crate) fn assert_open_list_sorted(&self) {
        debug_assert!(
            self.open_upvalues.windows(2).all(|pair| {
                let a = pair[0].borrow().open_slot();
                let b = pair[1].borrow().open_slot();
                matches!((a, b), (Some(a), Some(b)) if a > b)
            }),
            "open-upvalue list must be strictly descending by slot"
        );
    }

    /// Read through an upvalue.
    pub(crate) fn upvalue_get(&self, upvalue: &Rc<RefCell<Upvalue>>) -> Value {
        match &*upvalue.borrow() {
            Upvalue::Open(slot) => self.values[*slot].clone(),
            Upvalue::Closed(value) => value.clone(),
        }
    }

    /// Write through an upvalue.
    pub(crate) fn upvalue_set(&mut self, upvalue: &Rc<RefCell<Upvalue>>, value: Value) {
        let slot = upvalue.borrow().open_slot();
        match slot {
            Some(slot) => self.values[slot] = value,
            None => *upvalue.borrow_mut() = Upvalue::Closed(value),
        }
    }
}

/// Register operand carrying "no register".
pub(crate) const fn optional_register(register: u8) -> Option<u8> {
    if register == NO_REGISTER {
        None
    } else {
        Some(register)
    }
}
