//! The instruction dispatch loop.

use std::cell::RefCell;
use std::rc::Rc;

use rill_asm::{Opcode, INLINE_OPERAND_BIAS, NO_REGISTER};

use crate::consts::DEFAULT_COLLECTION_CAPACITY;
use crate::error::{ErrorKind, VmError};
use crate::module::Module;
use crate::primitives::{methods_for, truthy};
use crate::state::{ExecuteState, ProgramState};
use crate::value::{BaseType, DictObject, ListObject, Value};

use super::flow::optional_register;
use super::Vm;

impl Vm {
    /// Execute instructions until the frame at depth `floor` pops, a
    /// trap fires, or an error latches.
    pub(crate) fn run_until(
        &mut self,
        module: &mut Module,
        floor: usize,
    ) -> Result<ProgramState, VmError> {
        loop {
            let (word, pc) = {
                let Some(frame) = self.frames.last_mut() else {
                    return Err(self.latch(ErrorKind::InternalError));
                };
                let pc = frame.pc;
                let Some(word) = frame.closure.proto.chunk.get(pc).copied() else {
                    // Falling off a chunk means a malformed jump or a
                    // missing return; both are compiler bugs.
                    return Err(self.latch(ErrorKind::InternalError));
                };
                frame.pc = pc + 1;
                (word, pc)
            };

            let Some(op) = Opcode::decode(word) else {
                return Err(self.latch(ErrorKind::InternalError));
            };

            if let Opcode::ExtraArg(j, s) = op {
                if s {
                    self.extra_arg = 0;
                }
                self.extra_arg = (self.extra_arg << 24) + u64::from(j);
                continue;
            }

            let state = match self.execute(module, op, pc) {
                Ok(state) => state,
                Err(kind) => return Err(self.latch(kind)),
            };
            self.extra_arg = 0;

            match state {
                ExecuteState::Proceed => {}
                ExecuteState::Trap(code) => return Ok(ProgramState::Trapped(code)),
                ExecuteState::Return(register) => {
                    if let Some(state) = self.do_return(module, register, floor)? {
                        return Ok(state);
                    }
                }
            }
        }
    }

    /// Execute one decoded instruction. `pc` is the instruction's own
    /// index; every jump distance is relative to it.
    fn execute(
        &mut self,
        module: &mut Module,
        op: Opcode,
        pc: usize,
    ) -> Result<ExecuteState, ErrorKind> {
        let base = self.frames.last().ok_or(ErrorKind::InternalError)?.base;

        match op {
            Opcode::Noop => {}
            Opcode::ExtraArg(..) => {} // handled by the fetch loop

            Opcode::Jump(j, s) => {
                if j != 0 {
                    self.jump(pc, j as usize, s)?;
                }
            }

            Opcode::Trap(_, code, _, _) => return Ok(ExecuteState::Trap(code)),

            Opcode::CJump(a, k, i, s) => {
                let condition = truthy(&self.values[base + usize::from(a)])?;
                if condition == i && k != 0 {
                    self.jump(pc, usize::from(k), s)?;
                }
            }

            Opcode::LoadConstant(a, k, i, s) => {
                let value = self.load_constant(module, k, i, s)?;
                self.values[base + usize::from(a)] = value;
            }

            Opcode::LoadBool(a, k, i, s) => {
                self.values[base + usize::from(a)] = Value::Bool(i);
                if k != 0 {
                    self.jump(pc, usize::from(k), s)?;
                }
            }

            Opcode::LoadInlineInteger(a, k, _, s) => {
                let magnitude = i64::from(k);
                self.values[base + usize::from(a)] =
                    Value::Int(if s { magnitude } else { -magnitude });
            }

            Opcode::LoadInlineString(a, k, i, s) => {
                let len = u8::from(i) * 2 + u8::from(s);
                self.values[base + usize::from(a)] =
                    Value::InlineString(crate::value::InlineString::from_wire(k, len));
            }

            Opcode::GetModuleVar(a, k, _, s) => {
                let value = module
                    .variable(k, s)
                    .ok_or(ErrorKind::InternalError)?;
                self.values[base + usize::from(a)] = value;
            }

            Opcode::SetModuleVar(a, k, _, s) => {
                let value = self.values[base + usize::from(a)].clone();
                if !module.set_variable(k, s, value) {
                    return Err(ErrorKind::InternalError);
                }
            }

            Opcode::DeferCall(_, k, _, _) => {
                let Some(Value::Proto(proto)) = module.constants.get(k).cloned() else {
                    return Err(ErrorKind::UnexpectedType);
                };
                let closure = self.capture_closure(proto)?;
                self.frames
                    .last_mut()
                    .ok_or(ErrorKind::InternalError)?
                    .defers
                    .push(closure);
            }

            Opcode::Move(a, b, c, _, kc) => {
                self.values[base + usize::from(a)] = self.values[base + usize::from(b)].clone();
                if c != 0 {
                    self.jump(pc, usize::from(c), kc)?;
                }
            }

            Opcode::GetUpvalue(a, b, _, _, _) => {
                let upvalue = self.frame_upvalue(b)?;
                self.values[base + usize::from(a)] = self.upvalue_get(&upvalue);
            }

            Opcode::SetUpvalue(a, b, _, _, _) => {
                let upvalue = self.frame_upvalue(a)?;
                let value = self.values[base + usize::from(b)].clone();
                self.upvalue_set(&upvalue, value);
            }

            Opcode::CloseUpvalues(a, _, _, _, _) => {
                self.close_upvalues(base + usize::from(a));
            }

            Opcode::Add(a, b, c, kb, kc) => self.numeric(base, a, b, c, kb, kc, |n| n.add)?,
            Opcode::Subtract(a, b, c, kb, kc) => {
                self.numeric(base, a, b, c, kb, kc, |n| n.subtract)?
            }
            Opcode::Multiply(a, b, c, kb, kc) => {
                self.numeric(base, a, b, c, kb, kc, |n| n.multiply)?
            }
            Opcode::Divide(a, b, c, kb, kc) => self.numeric(base, a, b, c, kb, kc, |n| n.divide)?,
            Opcode::FloorDivide(a, b, c, kb, kc) => {
                self.numeric(base, a, b, c, kb, kc, |n| n.floor_divide)?
            }
            Opcode::Modulo(a, b, c, kb, kc) => self.numeric(base, a, b, c, kb, kc, |n| n.modulo)?,
            Opcode::Power(a, b, c, kb, kc) => self.numeric(base, a, b, c, kb, kc, |n| n.power)?,
            Opcode::BitwiseAnd(a, b, c, kb, kc) => {
                self.numeric(base, a, b, c, kb, kc, |n| n.bitwise_and)?
            }
            Opcode::BitwiseOr(a, b, c, kb, kc) => {
                self.numeric(base, a, b, c, kb, kc, |n| n.bitwise_or)?
            }
            Opcode::BitwiseXor(a, b, c, kb, kc) => {
                self.numeric(base, a, b, c, kb, kc, |n| n.bitwise_xor)?
            }
            Opcode::BitwiseLShift(a, b, c, kb, kc) => {
                self.numeric(base, a, b, c, kb, kc, |n| n.bitwise_l_shift)?
            }
            Opcode::BitwiseRShift(a, b, c, kb, kc) => {
                self.numeric(base, a, b, c, kb, kc, |n| n.bitwise_r_shift)?
            }

            Opcode::Negate(a, b, _, _, _) => {
                let operand = self.values[base + usize::from(b)].clone();
                let result = (methods_for(operand.base_type()).numeric.negate)(&operand)?;
                self.values[base + usize::from(a)] = result;
            }

            Opcode::BitwiseInvert(a, b, _, _, _) => {
                let operand = self.values[base + usize::from(b)].clone();
                let result = (methods_for(operand.base_type()).numeric.bitwise_invert)(&operand)?;
                self.values[base + usize::from(a)] = result;
            }

            Opcode::BoolNot(a, b, _, _, _) => {
                let result = !truthy(&self.values[base + usize::from(b)])?;
                self.values[base + usize::from(a)] = Value::Bool(result);
            }

            Opcode::Gt(a, b, c, kb, kc) => self.comparison(base, a, b, c, kb, kc, |m| m.gt)?,
            Opcode::Ge(a, b, c, kb, kc) => self.comparison(base, a, b, c, kb, kc, |m| m.gte)?,
            Opcode::Eq(a, b, c, kb, kc) => self.comparison(base, a, b, c, kb, kc, |m| m.eq)?,
            Opcode::Neq(a, b, c, kb, kc) => self.comparison(base, a, b, c, kb, kc, |m| m.neq)?,
            Opcode::Lt(a, b, c, kb, kc) => self.comparison(base, a, b, c, kb, kc, |m| m.lt)?,
            Opcode::Le(a, b, c, kb, kc) => self.comparison(base, a, b, c, kb, kc, |m| m.lte)?,

            Opcode::MakeRange(a, b, c, kb, kc) => {
                let start = self.values[base + usize::from(a)].clone();
                let end = self.rk(base, b, kb);
                let step = self.rk(base, c, kc);
                self.values[base + usize::from(a)] = Value::range(start, end, step)?;
            }

            Opcode::IterNext(a, b, c, _, _) => {
                let iterator_slot = base + usize::from(c);
                let next = methods_for(self.values[iterator_slot].base_type()).next;
                let produced = next(&mut self.values[iterator_slot])?;

                if produced.is_invalid() {
                    // Exhausted: close the induction registers and fall
                    // through to the forward jump the compiler emits
                    // right after this instruction.
                    self.close_upvalues(base + usize::from(b));
                } else {
                    self.values[base + usize::from(b)] = produced;
                    if a != NO_REGISTER {
                        let index_slot = base + usize::from(a);
                        let next_index = match &self.values[index_slot] {
                            Value::Int(i) => i + 1,
                            _ => 0,
                        };
                        self.values[index_slot] = Value::Int(next_index);
                    }

                    let frame = self.frames.last_mut().ok_or(ErrorKind::InternalError)?;
                    frame.pc = pc + 2;
                }
            }

            Opcode::GetAttr(a, b, c, _, kc) => {
                let object = self.values[base + usize::from(b)].clone();
                let key = self.unsigned_rk(base, c, kc)?;
                let result =
                    (methods_for(object.base_type()).collection.get_item)(&object, &key)?;
                self.values[base + usize::from(a)] = result;
            }

            Opcode::SetAttr(a, b, c, kb, _) => {
                let object = self.values[base + usize::from(a)].clone();
                let key = self.unsigned_rk(base, b, kb)?;
                let value = self.values[base + usize::from(c)].clone();
                (methods_for(object.base_type()).collection.set_item)(&object, &key, &value)?;
            }

            Opcode::GetItem(a, b, c, _, kc) => {
                let object = self.values[base + usize::from(b)].clone();
                let key = self.rk(base, c, kc);
                let result =
                    (methods_for(object.base_type()).collection.get_item)(&object, &key)?;
                self.values[base + usize::from(a)] = result;
            }

            Opcode::SetItem(a, b, c, kb, _) => {
                let object = self.values[base + usize::from(a)].clone();
                let key = self.unsigned_rk(base, b, kb)?;
                let value = self.values[base + usize::from(c)].clone();
                (methods_for(object.base_type()).collection.set_item)(&object, &key, &value)?;
            }

            Opcode::DelItem(a, b, c, _, kc) => {
                let object = self.values[base + usize::from(b)].clone();
                let key = self.unsigned_rk(base, c, kc)?;
                let removed =
                    (methods_for(object.base_type()).collection.del_item)(&object, &key)?;
                self.values[base + usize::from(a)] = removed;
            }

            Opcode::Contain(a, b, c, kb, _) => {
                let item = self.rk(base, b, kb);
                let collection = self.values[base + usize::from(c)].clone();
                let result = (methods_for(collection.base_type()).collection.contain)(
                    &item,
                    &collection,
                )?;
                self.values[base + usize::from(a)] = result;
            }

            Opcode::NewCollection(a, b, c, kb, _) => {
                let tag = if kb {
                    i64::from(b)
                } else {
                    self.values[base + usize::from(b)]
                        .as_int()
                        .ok_or(ErrorKind::UnexpectedType)?
                };

                let capacity = if c == NO_REGISTER {
                    DEFAULT_COLLECTION_CAPACITY
                } else {
                    usize::from(c)
                };

                let collection = match u16::try_from(tag).ok().and_then(BaseType::from_tag) {
                    Some(BaseType::List) => Value::List(Rc::new(RefCell::new(
                        ListObject::with_capacity(capacity),
                    ))),
                    Some(BaseType::Dict) => {
                        Value::Dict(Rc::new(RefCell::new(DictObject::new())))
                    }
                    _ => return Err(ErrorKind::UnimplementedFeature),
                };
                self.values[base + usize::from(a)] = collection;
            }

            Opcode::AppendList(a, b, c, _, _) => {
                let Value::List(list) = self.values[base + usize::from(a)].clone() else {
                    return Err(ErrorKind::UnexpectedType);
                };
                let mut list = list.borrow_mut();
                for i in 0..usize::from(b) {
                    list.push(self.values[base + usize::from(c) + i].clone());
                }
            }

            Opcode::AppendMap(a, b, c, _, _) => {
                let Value::Dict(dict) = self.values[base + usize::from(a)].clone() else {
                    return Err(ErrorKind::UnexpectedType);
                };
                let mut dict = dict.borrow_mut();
                for i in 0..usize::from(b) {
                    let key = self.values[base + usize::from(c) + 2 * i].clone();
                    let value = self.values[base + usize::from(c) + 2 * i + 1].clone();
                    dict.insert(key, value)?;
                }
            }

            Opcode::Call(a, b, c, _, _) => self.do_call(a, b, c)?,

            Opcode::Return(a, _, _, _, _) => {
                return Ok(ExecuteState::Return(optional_register(a)));
            }

            Opcode::CheckType(a, b, c, _, kc) => {
                let expected = if kc {
                    u16::from(c)
                } else {
                    let raw = self.values[base + usize::from(c)]
                        .as_int()
                        .ok_or(ErrorKind::UnexpectedType)?;
                    u16::try_from(raw).map_err(|_| ErrorKind::UnexpectedType)?
                };

                let actual = self.values[base + usize::from(b)].base_type() as u16;
                self.values[base + usize::from(a)] = Value::Bool(actual == expected);
            }
        }

        Ok(ExecuteState::Proceed)
    }

    /// Relative jump anchored at the instruction's own index.
    fn jump(&mut self, pc: usize, distance: usize, forward: bool) -> Result<(), ErrorKind> {
        let target = if forward {
            pc.checked_add(distance)
        } else {
            pc.checked_sub(distance)
        }
        .ok_or(ErrorKind::InternalError)?;

        self.frames
            .last_mut()
            .ok_or(ErrorKind::InternalError)?
            .pc = target;
        Ok(())
    }

    /// Decode an RK operand: register value, or biased inline integer.
    fn rk(&self, base: usize, operand: u8, inline: bool) -> Value {
        if inline {
            Value::Int(i64::from(operand) - INLINE_OPERAND_BIAS)
        } else {
            self.values[base + usize::from(operand)].clone()
        }
    }

    /// Decode an unsigned RK operand (item/attr store keys).
    fn unsigned_rk(&self, base: usize, operand: u8, inline: bool) -> Result<Value, ErrorKind> {
        if inline {
            Ok(Value::Int(i64::from(operand)))
        } else {
            Ok(self.values[base + usize::from(operand)].clone())
        }
    }

    fn numeric(
        &mut self,
        base: usize,
        a: u8,
        b: u8,
        c: u8,
        kb: bool,
        kc: bool,
        select: fn(&'static crate::primitives::NumericMethods) -> crate::primitives::BinaryMethod,
    ) -> Result<(), ErrorKind> {
        let left = self.rk(base, b, kb);
        let right = self.rk(base, c, kc);
        let method = select(methods_for(left.base_type()).numeric);
        self.values[base + usize::from(a)] = method(&left, &right)?;
        Ok(())
    }

    fn comparison(
        &mut self,
        base: usize,
        a: u8,
        b: u8,
        c: u8,
        kb: bool,
        kc: bool,
        select: fn(&'static crate::primitives::ComparisonMethods) -> crate::primitives::BinaryMethod,
    ) -> Result<(), ErrorKind> {
        let left = self.rk(base, b, kb);
        let right = self.rk(base, c, kc);
        let method = select(methods_for(left.base_type()).comparison);
        self.values[base + usize::from(a)] = method(&left, &right)?;
        Ok(())
    }

    /// `LoadConstant`: host global (`i`), module export (`s`), or
    /// constant-pool entry. Prototypes that capture variables
    /// materialize as closures over the current frame; heap ranges are
    /// copied so iteration cannot consume the pooled original.
    fn load_constant(
        &mut self,
        module: &Module,
        k: u16,
        host: bool,
        export: bool,
    ) -> Result<Value, ErrorKind> {
        if host {
            return self
                .globals
                .value(k)
                .cloned()
                .ok_or(ErrorKind::InternalError);
        }
        if export {
            return module.variable(k, true).ok_or(ErrorKind::InternalError);
        }

        let value = module
            .constants
            .get(k)
            .cloned()
            .ok_or(ErrorKind::InternalError)?;

        match value {
            Value::Proto(proto) if !proto.upvalues.is_empty() => {
                Ok(Value::Closure(self.capture_closure(proto)?))
            }
            Value::Range(range) => {
                let copy = range.borrow().clone();
                Ok(Value::Range(Rc::new(RefCell::new(copy))))
            }
            other => Ok(other),
        }
    }

    /// The executing closure's upvalue at `index`.
    fn frame_upvalue(
        &self,
        index: u8,
    ) -> Result<Rc<RefCell<crate::value::Upvalue>>, ErrorKind> {
        self.frames
            .last()
            .ok_or(ErrorKind::InternalError)?
            .closure
            .upvalues
            .get(usize::from(index))
            .cloned()
            .ok_or(ErrorKind::InternalError)
    }
}
