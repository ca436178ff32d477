//! Statement lowering: declarations, assignments, control flow,
//! functions, and defer blocks.

use std::cell::RefCell;
use std::rc::Rc;

use rill_asm::{Opcode, NO_REGISTER};
use tracing::debug;

use crate::error::{CompileError, ErrorKind};
use crate::lexer::Token;
use crate::symbol::IdentifierId;
use crate::value::{ClassObject, DictObject, Value};

use super::expr::{led_precedence, prec};
use super::scope::{FunctionScope, LoopContext};
use super::{Binding, Compiler, PrattExpr, PrattState};

/// A pending assignable location discovered while parsing a statement's
/// leading postfix chain.
enum Place {
    None,
    Item {
        object: u8,
        key: PrattExpr,
        key_temp: u8,
    },
    Attr {
        object: u8,
        key: IdentifierId,
    },
}

impl<'a> Compiler<'a> {
    pub(crate) fn parse_statement(&mut self) -> Result<(), CompileError> {
        match self.token {
            Token::If => self.if_statement(),
            Token::For => self.for_statement(),
            Token::Defer => self.defer_statement(),
            Token::Fn => self.fn_statement(false),
            Token::Export => self.export_statement(),
            Token::Return => self.return_statement(),
            Token::Break => self.break_statement(),
            Token::Continue => self.continue_statement(),
            Token::Struct => self.struct_statement(),
            Token::Import | Token::Raise => {
                self.advance()?;
                Err(self.err(ErrorKind::UnimplementedFeature))
            }
            Token::OpenBrace => self.block_statement(),
            _ => self.assign_or_expr_statement(),
        }
    }

    /// Statements of a `{ ... }` body; the opening brace is already
    /// consumed and the closing brace is consumed here.
    fn parse_block_body(&mut self) -> Result<(), CompileError> {
        loop {
            while matches!(self.token, Token::Separator | Token::Semicolon) {
                self.advance()?;
            }
            if matches!(self.token, Token::CloseBrace | Token::Eof) {
                break;
            }

            self.parse_statement()?;

            match self.token {
                Token::Separator | Token::Semicolon => self.advance()?,
                Token::CloseBrace | Token::Eof => {}
                _ => return Err(self.err(ErrorKind::UnexpectedToken)),
            }
        }

        self.expect(&Token::CloseBrace)
    }

    /// A bare `{ ... }` block scopes its variables and nothing else.
    fn block_statement(&mut self) -> Result<(), CompileError> {
        self.advance()?;
        self.enter_block();
        let result = self.parse_block_body();
        self.exit_block();
        result
    }

    /* Declarations and assignments */

    fn declaration(&mut self, id: IdentifierId, export: bool) -> Result<(), CompileError> {
        if self.at_module_scope() {
            if self.host.lookup(id).is_some()
                || self.module.lookup_variable(id, true).is_some()
                || self.module.lookup_variable(id, false).is_some()
            {
                return Err(self.err(ErrorKind::VariableAlreadyDefined));
            }

            let temp = self.alloc_register()?;
            let value = self.parse_expression(PrattState {
                rbp: prec::NONE,
                target: temp,
            })?;
            self.discharge(value, temp)?;

            let slot = self
                .module_mut()
                .declare_variable(id, export)
                .map_err(|kind| self.err(kind))?;
            self.emit(Opcode::SetModuleVar(temp, slot, false, export));
            self.reset_temps();
            return Ok(());
        }

        if export {
            return Err(self.err(ErrorKind::UnexpectedToken));
        }
        if self.is_bound_anywhere(id) {
            return Err(self.err(ErrorKind::VariableAlreadyDefined));
        }

        let register = self.alloc_register()?;
        let value = self.parse_expression(PrattState {
            rbp: prec::NONE,
            target: register,
        })?;
        self.discharge(value, register)?;

        self.bind_local(id, register);
        self.promote_to_local(register);
        self.reset_temps();
        Ok(())
    }

    fn simple_assign(&mut self, id: IdentifierId) -> Result<(), CompileError> {
        match self.resolve(id)? {
            Some(Binding::Local(register)) => {
                let value = self.parse_expression(PrattState {
                    rbp: prec::NONE,
                    target: register,
                })?;
                self.discharge(value, register)?;
            }
            Some(Binding::Upvalue(index)) => {
                let temp = self.alloc_register()?;
                let value = self.parse_expression(PrattState {
                    rbp: prec::NONE,
                    target: temp,
                })?;
                let register = self.operand_register(value, temp)?;
                self.emit(Opcode::SetUpvalue(index, register, 0, false, false));
            }
            Some(Binding::ModuleVar { slot, export }) => {
                let temp = self.alloc_register()?;
                let value = self.parse_expression(PrattState {
                    rbp: prec::NONE,
                    target: temp,
                })?;
                let register = self.discharge(value, temp)?;
                self.emit(Opcode::SetModuleVar(register, slot, false, export));
            }
            Some(Binding::HostGlobal(_)) | None => {
                return Err(self.err(ErrorKind::BindingError));
            }
        }

        self.reset_temps();
        Ok(())
    }

    /// An expression statement, which may turn out to be an assignment
    /// through an index or attribute place (`xs[0] = v`, `obj.f = v`).
    fn assign_or_expr_statement(&mut self) -> Result<(), CompileError> {
        if let Token::Identifier(id) = self.token {
            match self.peek()? {
                Token::Declare => {
                    self.advance()?;
                    self.advance()?;
                    return self.declaration(id, false);
                }
                Token::Assign => {
                    self.advance()?;
                    self.advance()?;
                    return self.simple_assign(id);
                }
                _ => {}
            }
        }

        let target = self.alloc_register()?;
        let mut expr = self.parse_nud(target)?;
        let mut place = Place::None;

        loop {
            match self.token {
                Token::OpenBracket => {
                    if matches!(expr, PrattExpr::Type(_)) {
                        expr = self.parse_led(expr, target)?;
                        continue;
                    }

                    self.advance()?;
                    self.open_bracket()?;
                    expr = self.realize_place(std::mem::replace(&mut place, Place::None), expr, target)?;

                    let object = self.operand_register(expr.clone(), target)?;
                    let key_temp = self.alloc_register()?;
                    let key = self.parse_expression(PrattState {
                        rbp: prec::NONE,
                        target: key_temp,
                    })?;
                    self.expect(&Token::CloseBracket)?;
                    self.close_bracket();

                    place = Place::Item {
                        object,
                        key,
                        key_temp,
                    };
                }
                Token::Dot => {
                    self.advance()?;
                    let Token::Identifier(attr) = self.token.clone() else {
                        return Err(self.err(ErrorKind::UnexpectedToken));
                    };
                    self.advance()?;

                    expr = self.realize_place(std::mem::replace(&mut place, Place::None), expr, target)?;
                    let object = self.operand_register(expr.clone(), target)?;
                    place = Place::Attr { object, key: attr };
                }
                Token::OpenParen => {
                    expr = self.realize_place(std::mem::replace(&mut place, Place::None), expr, target)?;
                    expr = self.parse_led(expr, target)?;
                }
                _ => break,
            }
        }

        if self.token == Token::Assign {
            self.advance()?;

            let value_temp = self.alloc_register()?;
            let value = self.parse_expression(PrattState {
                rbp: prec::NONE,
                target: value_temp,
            })?;
            let value_register = self.operand_register(value, value_temp)?;

            match place {
                Place::None => return Err(self.err(ErrorKind::ExpectLvalue)),
                Place::Item {
                    object,
                    key,
                    key_temp,
                } => {
                    let (b, kb) = self.rk_unsigned(key, key_temp)?;
                    self.emit(Opcode::SetItem(object, b, value_register, kb, false));
                }
                Place::Attr { object, key } => {
                    let (b, kb) = self.attr_key_operand(key)?;
                    self.emit(Opcode::SetAttr(object, b, value_register, kb, false));
                }
            }

            self.reset_temps();
            return Ok(());
        }

        let mut expr = self.realize_place(place, expr, target)?;
        while led_precedence(&self.token) > prec::NONE {
            expr = self.parse_led(expr, target)?;
        }
        let _ = expr;

        self.reset_temps();
        Ok(())
    }

    /// Emit the read for a pending place so the chain can continue.
    fn realize_place(
        &mut self,
        place: Place,
        expr: PrattExpr,
        target: u8,
    ) -> Result<PrattExpr, CompileError> {
        match place {
            Place::None => Ok(expr),
            Place::Item {
                object,
                key,
                key_temp,
            } => {
                let (c, kc) = self.rk_signed(key, key_temp)?;
                self.emit(Opcode::GetItem(target, object, c, false, kc));
                Ok(PrattExpr::Reg(target))
            }
            Place::Attr { object, key } => {
                let (c, kc) = self.attr_key_operand(key)?;
                self.emit(Opcode::GetAttr(target, object, c, false, kc));
                Ok(PrattExpr::Reg(target))
            }
        }
    }

    /* Control flow */

    /// `if`/`elif`/`else`. Per arm: condition into a scratch register,
    /// a conditional jump over the arm (plus its trailing exit jump when
    /// more arms follow), the arm body, and a forward jump to the end.
    /// One `CloseUpvalues` at the statement's register watermark closes
    /// the whole structure. Statement-position conditions are never
    /// folded: a constant still loads into the scratch register.
    fn if_statement(&mut self) -> Result<(), CompileError> {
        let watermark = self.current_fn().locals_floor as u8;
        let mut end_jumps = Vec::new();

        loop {
            self.advance()?; // `if` / `elif`

            let saved = self.current_fn().next_register;
            let cond_target = self.alloc_register()?;
            let condition = self.parse_expression(PrattState {
                rbp: prec::NONE,
                target: cond_target,
            })?;
            let cond_register = self.operand_register(condition, cond_target)?;

            let cjump = self.emit(Opcode::CJump(cond_register, 0, false, true));
            self.current_fn_mut().next_register = saved;

            self.expect(&Token::OpenBrace)?;
            self.enter_block();
            let body = self.parse_block_body();
            self.exit_block();
            body?;

            match self.token {
                Token::Elif => {
                    end_jumps.push(self.emit(Opcode::Jump(0, true)));
                    self.patch_jump_to_here(cjump)?;
                }
                Token::Else => {
                    end_jumps.push(self.emit(Opcode::Jump(0, true)));
                    self.patch_jump_to_here(cjump)?;

                    self.advance()?;
                    self.expect(&Token::OpenBrace)?;
                    self.enter_block();
                    let body = self.parse_block_body();
                    self.exit_block();
                    body?;
                    break;
                }
                _ => {
                    self.patch_jump_to_here(cjump)?;
                    break;
                }
            }
        }

        for jump in end_jumps {
            self.patch_jump_to_here(jump)?;
        }

        self.emit(Opcode::CloseUpvalues(watermark, 0, 0, false, false));
        Ok(())
    }

    /// `for x (, y)? in iterable (step s)? { ... }`.
    fn for_statement(&mut self) -> Result<(), CompileError> {
        self.advance()?; // `for`

        let Token::Identifier(first) = self.token.clone() else {
            return Err(self.err(ErrorKind::UnexpectedToken));
        };
        self.advance()?;

        let second = if self.eat(&Token::Comma)? {
            let Token::Identifier(second) = self.token.clone() else {
                return Err(self.err(ErrorKind::UnexpectedToken));
            };
            self.advance()?;
            if self.token == Token::Comma {
                return Err(self.err(ErrorKind::UnexpectedToken));
            }
            if second == first {
                return Err(self.err(ErrorKind::VariableAlreadyDefined));
            }
            Some(second)
        } else {
            None
        };

        for &name in [Some(first), second].iter().flatten() {
            if self.is_bound_anywhere(name) {
                return Err(self.err(ErrorKind::VariableAlreadyDefined));
            }
        }

        self.expect(&Token::In)?;

        let watermark = self.current_fn().locals_floor as u8;
        self.enter_block();

        let iter_register = self.alloc_register()?;
        self.lower_iterable(iter_register)?;

        // The induction registers sit directly above the iterator.
        self.current_fn_mut().next_register = u16::from(iter_register) + 1;
        let value_register = self.alloc_register()?;
        let index_register = if second.is_some() {
            self.alloc_register()?
        } else {
            NO_REGISTER
        };

        match second {
            // One name: it binds the value. Two names: index, value.
            None => self.bind_local(first, value_register),
            Some(second) => {
                self.bind_local(first, index_register);
                self.bind_local(second, value_register);
            }
        }
        let floor = self.current_fn().next_register;
        self.current_fn_mut().locals_floor = floor;

        let iter_pos = self.emit(Opcode::IterNext(
            index_register,
            value_register,
            iter_register,
            false,
            false,
        ));
        let exit_jump = self.emit(Opcode::Jump(0, true));
        self.current_fn_mut().loops.push(LoopContext {
            iter_pos,
            breaks: Vec::new(),
        });

        self.expect(&Token::OpenBrace)?;
        let body = self.parse_block_body();

        let context = self
            .current_fn_mut()
            .loops
            .pop()
            .expect("loop context pushed above");
        body?;

        let back = self.here() - iter_pos;
        self.emit(Opcode::Jump(back as u32, false));

        self.patch_jump_to_here(exit_jump)?;
        for break_jump in context.breaks {
            self.patch_jump_to_here(break_jump)?;
        }

        self.exit_block();
        self.emit(Opcode::CloseUpvalues(watermark, 0, 0, false, false));
        Ok(())
    }

    /// Materialize the loop iterable into `iter_register`. Constant
    /// range literals go through the constant pool; variable-bearing
    /// ranges through `MakeRange`.
    fn lower_iterable(&mut self, iter_register: u8) -> Result<(), CompileError> {
        let start = self.parse_expression(PrattState {
            rbp: prec::RANGE,
            target: iter_register,
        })?;

        if !self.eat(&Token::DotDot)? {
            return match start {
                PrattExpr::Constant(value) => self.load_constant_pooled(iter_register, value),
                other => {
                    self.discharge(other, iter_register)?;
                    Ok(())
                }
            };
        }

        let end_temp = self.alloc_register()?;
        let end = self.parse_expression(PrattState {
            rbp: prec::RANGE,
            target: end_temp,
        })?;

        let step = if self.eat(&Token::Step)? {
            let step_temp = self.alloc_register()?;
            let step = self.parse_expression(PrattState {
                rbp: prec::RANGE,
                target: step_temp,
            })?;
            Some((step, step_temp))
        } else {
            None
        };

        let all_constant = matches!(&start, PrattExpr::Constant(_))
            && matches!(&end, PrattExpr::Constant(_))
            && matches!(&step, None | Some((PrattExpr::Constant(_), _)));

        if all_constant {
            let (PrattExpr::Constant(start), PrattExpr::Constant(end)) = (start, end) else {
                return Err(self.err(ErrorKind::InternalError));
            };
            let step = match step {
                Some((PrattExpr::Constant(step), _)) => step,
                None => Value::Int(1),
                _ => return Err(self.err(ErrorKind::InternalError)),
            };

            let range = Value::range(start, end, step).map_err(|kind| self.err(kind))?;
            return self.load_constant_pooled(iter_register, range);
        }

        self.discharge(start, iter_register)?;
        let (b, kb) = self.rk_signed(end, end_temp)?;
        let (c, kc) = match step {
            Some((step, step_temp)) => self.rk_signed(step, step_temp)?,
            None => ((1 + rill_asm::INLINE_OPERAND_BIAS) as u8, true),
        };
        self.emit(Opcode::MakeRange(iter_register, b, c, kb, kc));
        Ok(())
    }

    fn load_constant_pooled(&mut self, register: u8, value: Value) -> Result<(), CompileError> {
        let index = self
            .module_mut()
            .constants
            .insert(value)
            .map_err(|kind| self.err(kind))?;
        self.emit(Opcode::LoadConstant(register, index, false, false));
        Ok(())
    }

    fn break_statement(&mut self) -> Result<(), CompileError> {
        self.advance()?;
        if self.current_fn().loops.is_empty() {
            return Err(self.err(ErrorKind::UnexpectedToken));
        }

        let jump = self.emit(Opcode::Jump(0, true));
        self.current_fn_mut()
            .loops
            .last_mut()
            .expect("checked above")
            .breaks
            .push(jump);
        Ok(())
    }

    fn continue_statement(&mut self) -> Result<(), CompileError> {
        self.advance()?;
        let Some(context) = self.current_fn().loops.last() else {
            return Err(self.err(ErrorKind::UnexpectedToken));
        };

        let distance = self.here() - context.iter_pos;
        self.emit(Opcode::Jump(distance as u32, false));
        Ok(())
    }

    /* Functions, defer, return */

    /// `defer { ... }` compiles the block as an anonymous zero-arity,
    /// zero-coarity prototype in the constant pool and registers it with
    /// `DeferCall`.
    fn defer_statement(&mut self) -> Result<(), CompileError> {
        self.advance()?;
        if self.current_fn().is_defer {
            return Err(self.err(ErrorKind::NestedDefer));
        }

        self.expect(&Token::OpenBrace)?;
        self.functions
            .push(FunctionScope::nested(0, self.variables.len(), true));
        self.enter_block();
        let body = self.parse_block_body();
        self.exit_block();

        self.emit(Opcode::Return(NO_REGISTER, 0, 0, false, false));
        let scope = self.functions.pop().expect("defer scope pushed above");
        body?;

        let proto = scope.into_proto(self.module.id, 0, 0);
        let index = self
            .module_mut()
            .constants
            .insert(Value::Proto(Rc::new(proto)))
            .map_err(|kind| self.err(kind))?;

        self.emit(Opcode::DeferCall(0, index, false, false));
        Ok(())
    }

    fn export_statement(&mut self) -> Result<(), CompileError> {
        self.advance()?;

        match self.token {
            Token::Fn => self.fn_statement(true),
            Token::Identifier(id) => {
                if self.peek()? != Token::Declare {
                    return Err(self.err(ErrorKind::UnexpectedToken));
                }
                self.advance()?;
                self.advance()?;
                self.declaration(id, true)
            }
            _ => Err(self.err(ErrorKind::UnexpectedToken)),
        }
    }

    fn fn_statement(&mut self, export: bool) -> Result<(), CompileError> {
        self.advance()?; // `fn`

        let Token::Identifier(name) = self.token.clone() else {
            return Err(self.err(ErrorKind::UnexpectedToken));
        };
        self.advance()?;

        // Parameter list.
        self.expect(&Token::OpenParen)?;
        self.open_bracket()?;
        let mut params = Vec::new();
        while self.token != Token::CloseParen {
            let Token::Identifier(param) = self.token.clone() else {
                return Err(self.err(ErrorKind::UnexpectedToken));
            };
            if params.contains(&param) {
                return Err(self.err(ErrorKind::VariableAlreadyDefined));
            }
            params.push(param);
            self.advance()?;

            if !self.eat(&Token::Comma)? {
                break;
            }
        }
        self.expect(&Token::CloseParen)?;
        self.close_bracket();

        if params.len() > usize::from(u8::MAX) {
            return Err(self.err(ErrorKind::ArgsCountMismatch));
        }
        let arity = params.len() as u8;

        // Bind the name before the body so recursion resolves.
        let module_scope = self.at_module_scope();
        let mut module_slot = None;
        let mut local_register = None;

        if module_scope {
            if self.host.lookup(name).is_some()
                || self.module.lookup_variable(name, true).is_some()
                || self.module.lookup_variable(name, false).is_some()
            {
                return Err(self.err(ErrorKind::VariableAlreadyDefined));
            }
            module_slot = Some(
                self.module_mut()
                    .declare_variable(name, export)
                    .map_err(|kind| self.err(kind))?,
            );
        } else {
            if export {
                return Err(self.err(ErrorKind::UnexpectedToken));
            }
            if self.is_bound_anywhere(name) {
                return Err(self.err(ErrorKind::VariableAlreadyDefined));
            }
            let register = self.alloc_register()?;
            self.bind_local(name, register);
            self.promote_to_local(register);
            local_register = Some(register);
        }

        // Compile the body in its own function scope.
        self.functions
            .push(FunctionScope::nested(arity, self.variables.len(), false));
        self.enter_block();
        for (i, &param) in params.iter().enumerate() {
            self.bind_local(param, i as u8);
        }

        self.expect(&Token::OpenBrace)?;
        let body = self.parse_block_body();
        self.exit_block();

        self.emit(Opcode::Return(NO_REGISTER, 0, 0, false, false));
        let scope = self.functions.pop().expect("function scope pushed above");
        body?;

        let coarity = scope.coarity.unwrap_or(0);
        let proto = scope.into_proto(self.module.id, arity, coarity);
        debug!(
            name = self.symbols.name(name).unwrap_or("?"),
            arity,
            coarity,
            instructions = proto.chunk.len(),
            "function compiled"
        );

        let index = self
            .module_mut()
            .constants
            .insert(Value::Proto(Rc::new(proto)))
            .map_err(|kind| self.err(kind))?;

        match (module_slot, local_register) {
            (Some(slot), _) => {
                let temp = self.alloc_register()?;
                self.emit(Opcode::LoadConstant(temp, index, false, false));
                self.emit(Opcode::SetModuleVar(temp, slot, false, export));
                self.reset_temps();
            }
            (_, Some(register)) => {
                self.emit(Opcode::LoadConstant(register, index, false, false));
            }
            _ => return Err(self.err(ErrorKind::InternalError)),
        }

        Ok(())
    }

    fn return_statement(&mut self) -> Result<(), CompileError> {
        self.advance()?;

        if self.functions.len() == 1 {
            return Err(self.err(ErrorKind::UnexpectedToken));
        }

        let bare = matches!(
            self.token,
            Token::Separator | Token::Semicolon | Token::CloseBrace | Token::Eof
        );

        if bare {
            self.set_coarity(0)?;
            self.emit(Opcode::Return(NO_REGISTER, 0, 0, false, false));
            return Ok(());
        }

        if self.current_fn().is_defer {
            return Err(self.err(ErrorKind::ReturnValueInDefer));
        }

        let temp = self.alloc_register()?;
        let value = self.parse_expression(PrattState {
            rbp: prec::NONE,
            target: temp,
        })?;
        let register = self.operand_register(value, temp)?;

        self.set_coarity(1)?;
        self.emit(Opcode::Return(register, 0, 0, false, false));
        self.reset_temps();
        Ok(())
    }

    /// Every `return` in one function must agree on whether it carries a
    /// value.
    fn set_coarity(&mut self, coarity: u8) -> Result<(), CompileError> {
        let line = self.lexer.line();
        let scope = self.current_fn_mut();

        match scope.coarity {
            None => {
                scope.coarity = Some(coarity);
                Ok(())
            }
            Some(existing) if existing == coarity => Ok(()),
            Some(_) => Err(CompileError::new(
                ErrorKind::InconsistentReturnCount,
                line,
            )),
        }
    }

    /// `struct Name { field* }` records a named type in the module's
    /// types map; no code is generated and instantiation stays a
    /// reserved feature.
    fn struct_statement(&mut self) -> Result<(), CompileError> {
        self.advance()?;

        if !self.at_module_scope() {
            return Err(self.err(ErrorKind::UnexpectedToken));
        }

        let Token::TypeIdentifier(name) = self.token.clone() else {
            return Err(self.err(ErrorKind::UnexpectedToken));
        };
        self.advance()?;

        let already = self
            .module
            .types
            .has(&Value::Int(name.into()))
            .map_err(|kind| self.err(kind))?;
        if already {
            return Err(self.err(ErrorKind::VariableAlreadyDefined));
        }

        self.expect(&Token::OpenBrace)?;

        let mut fields = DictObject::new();
        let mut next_field = 0i64;
        loop {
            while matches!(self.token, Token::Separator | Token::Semicolon | Token::Comma) {
                self.advance()?;
            }
            if self.token == Token::CloseBrace {
                break;
            }

            let Token::Identifier(field) = self.token.clone() else {
                return Err(self.err(ErrorKind::UnexpectedToken));
            };
            self.advance()?;

            let duplicate = fields
                .has(&Value::Int(field.into()))
                .map_err(|kind| self.err(kind))?;
            if duplicate {
                return Err(self.err(ErrorKind::VariableAlreadyDefined));
            }

            fields
                .insert(Value::Int(field.into()), Value::Int(next_field))
                .map_err(|kind| self.err(kind))?;
            next_field += 1;
        }

        self.expect(&Token::CloseBrace)?;

        let class = ClassObject {
            name,
            fields: RefCell::new(fields),
        };
        self.module_mut()
            .types
            .insert(Value::Int(name.into()), Value::Class(Rc::new(class)))
            .map_err(|kind| self.err(kind))?;

        Ok(())
    }
}
