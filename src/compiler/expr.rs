//! Expression lowering: the Pratt loop, constant folding, RK operand
//! selection, and the led handlers for every operator.

use rill_asm::Opcode;

use crate::consts::{LIST_APPEND_BATCH, MAP_APPEND_BATCH};
use crate::error::{CompileError, ErrorKind};
use crate::lexer::Token;
use crate::primitives::{methods_for, truthy};
use crate::value::{BaseType, Value};

use super::{Compiler, PrattExpr, PrattState};

/// Operator precedence levels, low to high.
pub(crate) mod prec {
    pub const NONE: u8 = 0;
    pub const TERNARY: u8 = 2;
    pub const OR: u8 = 3;
    pub const AND: u8 = 4;
    pub const EQUALITY: u8 = 5;
    pub const COMPARISON: u8 = 6;
    pub const RANGE: u8 = 7;
    pub const BIT_OR: u8 = 8;
    pub const BIT_XOR: u8 = 9;
    pub const BIT_AND: u8 = 10;
    pub const SHIFT: u8 = 11;
    pub const ADDITIVE: u8 = 12;
    pub const MULTIPLICATIVE: u8 = 13;
    pub const EXPONENT: u8 = 14;
    pub const UNARY: u8 = 15;
    pub const POSTFIX: u8 = 16;
}

/// Left binding power of a token in infix/postfix position; `NONE` for
/// tokens that cannot continue an expression.
pub(crate) fn led_precedence(token: &Token) -> u8 {
    match token {
        Token::Question => prec::TERNARY,
        Token::Or => prec::OR,
        Token::And => prec::AND,
        Token::EqEq | Token::NotEq => prec::EQUALITY,
        Token::Lt | Token::Le | Token::Gt | Token::Ge | Token::In | Token::Is => prec::COMPARISON,
        Token::DotDot => prec::RANGE,
        Token::VerticalBar => prec::BIT_OR,
        Token::Caret => prec::BIT_XOR,
        Token::Ampersand => prec::BIT_AND,
        Token::Shl | Token::Shr => prec::SHIFT,
        Token::Plus | Token::Minus => prec::ADDITIVE,
        Token::Star | Token::Slash | Token::DoubleSlash | Token::Percent => prec::MULTIPLICATIVE,
        Token::DoubleStar => prec::EXPONENT,
        Token::OpenParen | Token::OpenBracket | Token::Dot | Token::QuestionDot => prec::POSTFIX,
        _ => prec::NONE,
    }
}

impl<'a> Compiler<'a> {
    /// The Pratt loop: one null denotation, then led handlers while the
    /// next operator binds tighter than `state.rbp`.
    pub(crate) fn parse_expression(
        &mut self,
        state: PrattState,
    ) -> Result<PrattExpr, CompileError> {
        let mut left = self.parse_nud(state.target)?;

        while led_precedence(&self.token) > state.rbp {
            left = self.parse_led(left, state.target)?;
        }

        Ok(left)
    }

    pub(crate) fn parse_nud(&mut self, target: u8) -> Result<PrattExpr, CompileError> {
        match self.token.clone() {
            Token::Integer(value) => {
                self.advance()?;
                Ok(PrattExpr::Constant(Value::Int(value)))
            }
            Token::Float(value) => {
                self.advance()?;
                Ok(PrattExpr::Constant(Value::Float(value)))
            }
            Token::True => {
                self.advance()?;
                Ok(PrattExpr::Constant(Value::Bool(true)))
            }
            Token::False => {
                self.advance()?;
                Ok(PrattExpr::Constant(Value::Bool(false)))
            }
            Token::Str(content) => {
                self.advance()?;
                Ok(PrattExpr::Constant(Value::string(content.as_bytes())))
            }
            Token::Identifier(id) => {
                self.advance()?;
                match self.resolve(id)? {
                    Some(super::Binding::Local(register)) => Ok(PrattExpr::Reg(register)),
                    Some(super::Binding::Upvalue(index)) => {
                        self.emit(Opcode::GetUpvalue(target, index, 0, false, false));
                        Ok(PrattExpr::Reg(target))
                    }
                    Some(super::Binding::HostGlobal(index)) => {
                        self.emit(Opcode::LoadConstant(target, index, true, false));
                        Ok(PrattExpr::Reg(target))
                    }
                    Some(super::Binding::ModuleVar { slot, export }) => {
                        self.emit(Opcode::GetModuleVar(target, slot, false, export));
                        Ok(PrattExpr::Reg(target))
                    }
                    None => Err(self.err(ErrorKind::UninitializedVariable)),
                }
            }
            Token::TypeIdentifier(id) => {
                self.advance()?;
                self.resolve_type(id)
            }
            Token::OpenParen => {
                self.advance()?;
                self.open_bracket()?;
                let inner = self.parse_expression(PrattState {
                    rbp: prec::NONE,
                    target,
                })?;
                self.expect(&Token::CloseParen)?;
                self.close_bracket();
                Ok(inner)
            }
            Token::Minus | Token::Bang | Token::Tilde => {
                let op = self.token.clone();
                self.advance()?;
                self.unary_nud(&op, target)
            }
            Token::Eof => Err(self.err(ErrorKind::UnexpectedEndOfFile)),
            _ => Err(self.err(ErrorKind::UnexpectedToken)),
        }
    }

    /// Resolve a type identifier to a type tag: built-in base types at
    /// their reserved ids, declared struct types above them.
    fn resolve_type(&mut self, id: crate::symbol::IdentifierId) -> Result<PrattExpr, CompileError> {
        if id <= crate::consts::MAX_RESERVED_IDENTIFIER_ID {
            return Ok(PrattExpr::Type(id as u16));
        }

        let tid = self
            .module
            .types
            .find_tid(&Value::Int(id.into()))
            .map_err(|kind| self.err(kind))?;

        match tid {
            Some(tid) => Ok(PrattExpr::Type(BaseType::ALL.len() as u16 + tid as u16)),
            None => Err(self.err(ErrorKind::UninitializedVariable)),
        }
    }

    fn unary_nud(&mut self, op: &Token, target: u8) -> Result<PrattExpr, CompileError> {
        let operand = self.parse_expression(PrattState {
            rbp: prec::UNARY,
            target,
        })?;

        if let PrattExpr::Constant(value) = &operand {
            let folded = match op {
                Token::Minus => (methods_for(value.base_type()).numeric.negate)(value),
                Token::Tilde => (methods_for(value.base_type()).numeric.bitwise_invert)(value),
                Token::Bang => truthy(value).map(|t| Value::Bool(!t)),
                _ => Err(ErrorKind::InternalError),
            };
            return folded
                .map(PrattExpr::Constant)
                .map_err(|kind| self.err(kind));
        }

        let source = self.discharge(operand, target)?;
        let opcode = match op {
            Token::Minus => Opcode::Negate(target, source, 0, false, false),
            Token::Tilde => Opcode::BitwiseInvert(target, source, 0, false, false),
            Token::Bang => Opcode::BoolNot(target, source, 0, false, false),
            _ => return Err(self.err(ErrorKind::InternalError)),
        };
        self.emit(opcode);

        Ok(PrattExpr::Reg(target))
    }

    pub(crate) fn parse_led(&mut self, left: PrattExpr, target: u8) -> Result<PrattExpr, CompileError> {
        match self.token.clone() {
            Token::Plus
            | Token::Minus
            | Token::Star
            | Token::Slash
            | Token::DoubleSlash
            | Token::Percent
            | Token::DoubleStar
            | Token::Ampersand
            | Token::VerticalBar
            | Token::Caret
            | Token::Shl
            | Token::Shr
            | Token::EqEq
            | Token::NotEq
            | Token::Lt
            | Token::Le
            | Token::Gt
            | Token::Ge => {
                let op = self.token.clone();
                self.advance()?;
                self.binary_led(&op, left, target)
            }
            Token::And | Token::Or => {
                let op = self.token.clone();
                self.advance()?;
                self.boolean_led(&op, left, target)
            }
            Token::Question => {
                self.advance()?;
                self.ternary_led(left, target)
            }
            Token::DotDot => {
                self.advance()?;
                self.range_led(left, target)
            }
            Token::In => {
                self.advance()?;
                self.contain_led(left, target)
            }
            Token::Is => {
                self.advance()?;
                self.check_type_led(left, target)
            }
            Token::OpenParen => {
                self.advance()?;
                self.call_led(left, target)
            }
            Token::OpenBracket => {
                self.advance()?;
                match left {
                    PrattExpr::Type(tag) => self.initializer_led(tag, target),
                    left => self.index_led(left, target),
                }
            }
            Token::Dot => {
                self.advance()?;
                self.attr_led(left, target)
            }
            Token::QuestionDot => Err(self.err(ErrorKind::UnimplementedFeature)),
            _ => Err(self.err(ErrorKind::UnexpectedToken)),
        }
    }

    fn binary_led(
        &mut self,
        op: &Token,
        left: PrattExpr,
        target: u8,
    ) -> Result<PrattExpr, CompileError> {
        // Exponentiation associates right; everything else left.
        let rbp = if *op == Token::DoubleStar {
            prec::EXPONENT - 1
        } else {
            led_precedence(op)
        };

        let saved = self.current_fn().next_register;
        let temp = self.alloc_register()?;
        let right = self.parse_expression(PrattState { rbp, target: temp })?;

        if let (PrattExpr::Constant(l), PrattExpr::Constant(r)) = (&left, &right) {
            let folded = fold_binary(op, l, r).map_err(|kind| self.err(kind))?;
            self.current_fn_mut().next_register = saved;
            return Ok(PrattExpr::Constant(folded));
        }

        let (b, kb) = self.rk_signed(left, target)?;
        let (c, kc) = self.rk_signed(right, temp)?;
        self.emit(binary_opcode(op, target, b, c, kb, kc));
        self.current_fn_mut().next_register = saved;

        Ok(PrattExpr::Reg(target))
    }

    /// Short-circuit `and`/`or`.
    ///
    /// A constant left side decides statically which operand is the
    /// result; the dead side's code (if it emitted any) is rolled back.
    /// Otherwise the left value is moved into the target, a conditional
    /// jump skips the right side, and the right side is lowered into the
    /// same target.
    fn boolean_led(
        &mut self,
        op: &Token,
        left: PrattExpr,
        target: u8,
    ) -> Result<PrattExpr, CompileError> {
        let rbp = led_precedence(op);

        if let PrattExpr::Constant(value) = &left {
            let left_truthy = truthy(value).map_err(|kind| self.err(kind))?;
            let keep_right = match op {
                Token::And => left_truthy,
                _ => !left_truthy,
            };

            let mark = self.here();
            let right = self.parse_expression(PrattState { rbp, target })?;

            if keep_right {
                return Ok(right);
            }

            self.current_fn_mut().chunk.truncate(mark);
            return Ok(left);
        }

        let register = self.discharge(left, target)?;
        let skip_on = *op == Token::Or;
        let jump = self.emit(Opcode::CJump(register, 0, skip_on, true));

        let right = self.parse_expression(PrattState { rbp, target })?;
        self.discharge(right, target)?;
        self.patch_jump_to_here(jump)?;

        Ok(PrattExpr::Reg(target))
    }

    /// `cond ? then : else`. A constant condition folds to the chosen
    /// branch; the unchosen branch still parses but its code is removed.
    fn ternary_led(&mut self, cond: PrattExpr, target: u8) -> Result<PrattExpr, CompileError> {
        let branch_rbp = prec::TERNARY - 1;

        if let PrattExpr::Constant(value) = &cond {
            let cond_truthy = truthy(value).map_err(|kind| self.err(kind))?;

            let then_mark = self.here();
            let then_expr = self.parse_expression(PrattState {
                rbp: branch_rbp,
                target,
            })?;
            self.expect(&Token::Colon)?;
            let else_mark = self.here();
            let else_expr = self.parse_expression(PrattState {
                rbp: branch_rbp,
                target,
            })?;

            let chunk = &mut self.current_fn_mut().chunk;
            if cond_truthy {
                chunk.truncate(else_mark);
                return Ok(then_expr);
            }
            // Dropping the dead then-branch shifts the else code left,
            // which is safe because jump distances are relative.
            chunk.drain(then_mark..else_mark);
            return Ok(else_expr);
        }

        let cond_register = self.operand_register(cond, target)?;
        let to_else = self.emit(Opcode::CJump(cond_register, 0, false, true));

        let then_expr = self.parse_expression(PrattState {
            rbp: branch_rbp,
            target,
        })?;
        self.discharge(then_expr, target)?;
        self.expect(&Token::Colon)?;

        let to_end = self.emit(Opcode::Jump(0, true));
        self.patch_jump_to_here(to_else)?;

        let else_expr = self.parse_expression(PrattState {
            rbp: branch_rbp,
            target,
        })?;
        self.discharge(else_expr, target)?;
        self.patch_jump_to_here(to_end)?;

        Ok(PrattExpr::Reg(target))
    }

    /// `start .. end`; the step is always 1 in expression position.
    fn range_led(&mut self, left: PrattExpr, target: u8) -> Result<PrattExpr, CompileError> {
        let saved = self.current_fn().next_register;
        let temp = self.alloc_register()?;
        let right = self.parse_expression(PrattState {
            rbp: prec::RANGE,
            target: temp,
        })?;

        if let (PrattExpr::Constant(l), PrattExpr::Constant(r)) = (&left, &right) {
            let folded = Value::range(l.clone(), r.clone(), Value::Int(1))
                .map_err(|kind| self.err(kind))?;
            self.current_fn_mut().next_register = saved;
            return Ok(PrattExpr::Constant(folded));
        }

        self.discharge(left, target)?;
        let (b, kb) = self.rk_signed(right, temp)?;
        self.emit(Opcode::MakeRange(target, b, rk_one(), kb, true));
        self.current_fn_mut().next_register = saved;

        Ok(PrattExpr::Reg(target))
    }

    /// `item in collection` lowers to `Contain`.
    fn contain_led(&mut self, left: PrattExpr, target: u8) -> Result<PrattExpr, CompileError> {
        let saved = self.current_fn().next_register;
        let item_temp = self.alloc_register()?;
        let coll_temp = self.alloc_register()?;

        let collection = self.parse_expression(PrattState {
            rbp: prec::COMPARISON,
            target: coll_temp,
        })?;

        let (b, kb) = self.rk_signed(left, item_temp)?;
        let c = self.operand_register(collection, coll_temp)?;
        self.emit(Opcode::Contain(target, b, c, kb, false));
        self.current_fn_mut().next_register = saved;

        Ok(PrattExpr::Reg(target))
    }

    /// `value is Type` lowers to `CheckType`; folds when the value is a
    /// compile-time constant.
    fn check_type_led(&mut self, left: PrattExpr, target: u8) -> Result<PrattExpr, CompileError> {
        let saved = self.current_fn().next_register;
        let temp = self.alloc_register()?;
        let rhs = self.parse_expression(PrattState {
            rbp: prec::COMPARISON,
            target: temp,
        })?;

        let PrattExpr::Type(tag) = rhs else {
            return Err(self.err(ErrorKind::UnexpectedToken));
        };

        if let PrattExpr::Constant(value) = &left {
            self.current_fn_mut().next_register = saved;
            return Ok(PrattExpr::Constant(Value::Bool(
                value.base_type() as u16 == tag,
            )));
        }

        let b = self.operand_register(left, target)?;
        let (c, kc) = if tag <= u8::MAX.into() {
            (tag as u8, true)
        } else {
            self.emit(Opcode::LoadInlineInteger(temp, tag, true, true));
            (temp, false)
        };
        self.emit(Opcode::CheckType(target, b, c, false, kc));
        self.current_fn_mut().next_register = saved;

        Ok(PrattExpr::Reg(target))
    }

    /// Function call: callee moved into the target, arguments lowered
    /// into the registers right above it, result returned in the target.
    fn call_led(&mut self, left: PrattExpr, target: u8) -> Result<PrattExpr, CompileError> {
        let callee = self.discharge(left, target)?;
        self.open_bracket()?;

        // Everything above the callee slot is dead or owned by this
        // expression; claim it for the argument window.
        self.current_fn_mut().next_register = u16::from(target) + 1;

        let mut argc: u16 = 0;
        if self.token != Token::CloseParen {
            loop {
                let arg_register = self.alloc_register()?;
                debug_assert_eq!(u16::from(arg_register), u16::from(target) + 1 + argc);

                let argument = self.parse_expression(PrattState {
                    rbp: prec::NONE,
                    target: arg_register,
                })?;
                self.discharge(argument, arg_register)?;
                argc += 1;

                if !self.eat(&Token::Comma)? {
                    break;
                }
                if self.token == Token::CloseParen {
                    break;
                }
            }
        }

        self.expect(&Token::CloseParen)?;
        self.close_bracket();

        if argc > u8::MAX.into() {
            return Err(self.err(ErrorKind::ArgsCountMismatch));
        }

        self.emit(Opcode::Call(callee, callee + 1, argc as u8, false, false));
        self.current_fn_mut().next_register = u16::from(target) + 1;

        Ok(PrattExpr::Reg(target))
    }

    fn index_led(&mut self, left: PrattExpr, target: u8) -> Result<PrattExpr, CompileError> {
        self.open_bracket()?;

        let saved = self.current_fn().next_register;
        let obj = self.operand_register(left, target)?;
        let key_temp = self.alloc_register()?;
        let key = self.parse_expression(PrattState {
            rbp: prec::NONE,
            target: key_temp,
        })?;

        self.expect(&Token::CloseBracket)?;
        self.close_bracket();

        let (c, kc) = self.rk_signed(key, key_temp)?;
        self.emit(Opcode::GetItem(target, obj, c, false, kc));
        self.current_fn_mut().next_register = saved;

        Ok(PrattExpr::Reg(target))
    }

    fn attr_led(&mut self, left: PrattExpr, target: u8) -> Result<PrattExpr, CompileError> {
        let Token::Identifier(id) = self.token.clone() else {
            return Err(self.err(ErrorKind::UnexpectedToken));
        };
        self.advance()?;

        let saved = self.current_fn().next_register;
        let obj = self.operand_register(left, target)?;
        let (c, kc) = self.attr_key_operand(id)?;
        self.emit(Opcode::GetAttr(target, obj, c, false, kc));
        self.current_fn_mut().next_register = saved;

        Ok(PrattExpr::Reg(target))
    }

    /// Encode an attribute name id: inline when it fits the unsigned RK
    /// byte, otherwise materialized into a scratch register.
    pub(crate) fn attr_key_operand(
        &mut self,
        id: crate::symbol::IdentifierId,
    ) -> Result<(u8, bool), CompileError> {
        if id <= u8::MAX.into() {
            return Ok((id as u8, true));
        }
        if id > u16::MAX.into() {
            return Err(self.err(ErrorKind::InternalError));
        }

        let temp = self.alloc_register()?;
        self.emit(Opcode::LoadInlineInteger(temp, id as u16, true, true));
        Ok((temp, false))
    }

    /// `List[...]` / `Dict[...]` collection initializers. Elements are
    /// batched through the scratch registers right above the target,
    /// reusing the same registers for every batch.
    fn initializer_led(&mut self, tag: u16, target: u8) -> Result<PrattExpr, CompileError> {
        let base = match Compiler::builtin_type(tag) {
            Some(base @ (BaseType::List | BaseType::Dict)) => base,
            _ => return Err(self.err(ErrorKind::UnexpectedToken)),
        };
        let is_dict = base == BaseType::Dict;

        self.open_bracket()?;
        let new_pos = self.emit(Opcode::NewCollection(target, base as u16 as u8, 0, true, false));
        self.current_fn_mut().next_register = u16::from(target) + 1;

        let batch_limit = if is_dict {
            MAP_APPEND_BATCH
        } else {
            LIST_APPEND_BATCH
        };
        let mut batch = 0usize;
        let mut total = 0usize;

        while self.token != Token::CloseBracket {
            let register = self.alloc_register()?;
            let element = self.parse_expression(PrattState {
                rbp: prec::NONE,
                target: register,
            })?;
            self.discharge(element, register)?;

            if is_dict {
                self.expect(&Token::Colon)?;
                let value_register = self.alloc_register()?;
                let value = self.parse_expression(PrattState {
                    rbp: prec::NONE,
                    target: value_register,
                })?;
                self.discharge(value, value_register)?;
            } else if self.token == Token::Colon {
                return Err(self.err(ErrorKind::UnexpectedToken));
            }

            batch += 1;
            total += 1;

            if batch == batch_limit {
                self.flush_batch(target, batch, is_dict);
                batch = 0;
            }

            if !self.eat(&Token::Comma)? {
                break;
            }
        }

        self.expect(&Token::CloseBracket)?;
        self.close_bracket();

        if batch > 0 {
            self.flush_batch(target, batch, is_dict);
        }

        self.patch_collection_hint(new_pos, total);
        self.current_fn_mut().next_register = u16::from(target) + 1;

        Ok(PrattExpr::Reg(target))
    }

    fn flush_batch(&mut self, target: u8, count: usize, is_dict: bool) {
        let op = if is_dict {
            Opcode::AppendMap(target, count as u8, target + 1, false, false)
        } else {
            Opcode::AppendList(target, count as u8, target + 1, false, false)
        };
        self.emit(op);
        self.current_fn_mut().next_register = u16::from(target) + 1;
    }

    /* Operand helpers */

    /// Materialize an expression into `register` unless it already lives
    /// there; returns the register actually holding the value.
    pub(crate) fn discharge(
        &mut self,
        expr: PrattExpr,
        register: u8,
    ) -> Result<u8, CompileError> {
        match expr {
            PrattExpr::Reg(r) if r == register => Ok(register),
            PrattExpr::Reg(r) => {
                self.emit(Opcode::Move(register, r, 0, false, false));
                Ok(register)
            }
            PrattExpr::Constant(value) => {
                self.load_constant_value(register, &value)?;
                Ok(register)
            }
            PrattExpr::Type(_) | PrattExpr::Unset => Err(self.err(ErrorKind::UnexpectedToken)),
        }
    }

    /// The register already holding the expression, or `fallback` after
    /// materialization.
    pub(crate) fn operand_register(
        &mut self,
        expr: PrattExpr,
        fallback: u8,
    ) -> Result<u8, CompileError> {
        match expr {
            PrattExpr::Reg(r) => Ok(r),
            other => self.discharge(other, fallback),
        }
    }

    /// Signed RK encoding: a register as-is, a small integer constant
    /// inline (biased by 128), anything else materialized into
    /// `fallback`.
    pub(crate) fn rk_signed(
        &mut self,
        expr: PrattExpr,
        fallback: u8,
    ) -> Result<(u8, bool), CompileError> {
        match expr {
            PrattExpr::Reg(r) => Ok((r, false)),
            PrattExpr::Constant(Value::Int(v)) if (-128..=127).contains(&v) => {
                Ok(((v + 128) as u8, true))
            }
            other => {
                let register = self.discharge(other, fallback)?;
                Ok((register, false))
            }
        }
    }

    /// Unsigned RK encoding, used by the store-side item/attr operands.
    pub(crate) fn rk_unsigned(
        &mut self,
        expr: PrattExpr,
        fallback: u8,
    ) -> Result<(u8, bool), CompileError> {
        match expr {
            PrattExpr::Reg(r) => Ok((r, false)),
            PrattExpr::Constant(Value::Int(v)) if (0..=255).contains(&v) => Ok((v as u8, true)),
            other => {
                let register = self.discharge(other, fallback)?;
                Ok((register, false))
            }
        }
    }

    /// Emit the load for a compile-time value into `register`.
    pub(crate) fn load_constant_value(
        &mut self,
        register: u8,
        value: &Value,
    ) -> Result<(), CompileError> {
        match value {
            Value::Bool(b) => {
                self.emit(Opcode::LoadBool(register, 0, *b, false));
            }
            Value::Int(i) if (0..=0xffff).contains(i) => {
                self.emit(Opcode::LoadInlineInteger(register, *i as u16, true, true));
            }
            Value::Int(i) if (-0xffff..0).contains(i) => {
                self.emit(Opcode::LoadInlineInteger(register, (-*i) as u16, true, false));
            }
            Value::InlineString(s) => {
                let (k, len) = s.to_wire();
                self.emit(Opcode::LoadInlineString(register, k, len >= 2, len == 1));
            }
            _ => {
                let index = self
                    .module
                    .constants
                    .insert(value.clone())
                    .map_err(|kind| self.err(kind))?;
                self.emit(Opcode::LoadConstant(register, index, false, false));
            }
        }

        Ok(())
    }
}

/// Inline RK encoding of the integer 1.
const fn rk_one() -> u8 {
    (1 + rill_asm::INLINE_OPERAND_BIAS) as u8
}

fn binary_opcode(op: &Token, a: u8, b: u8, c: u8, kb: bool, kc: bool) -> Opcode {
    match op {
        Token::Plus => Opcode::Add(a, b, c, kb, kc),
        Token::Minus => Opcode::Subtract(a, b, c, kb, kc),
        Token::Star => Opcode::Multiply(a, b, c, kb, kc),
        Token::Slash => Opcode::Divide(a, b, c, kb, kc),
        Token::DoubleSlash => Opcode::FloorDivide(a, b, c, kb, kc),
        Token::Percent => Opcode::Modulo(a, b, c, kb, kc),
        Token::DoubleStar => Opcode::Power(a, b, c, kb, kc),
        Token::Ampersand => Opcode::BitwiseAnd(a, b, c, kb, kc),
        Token::VerticalBar => Opcode::BitwiseOr(a, b, c, kb, kc),
        Token::Caret => Opcode::BitwiseXor(a, b, c, kb, kc),
        Token::Shl => Opcode::BitwiseLShift(a, b, c, kb, kc),
        Token::Shr => Opcode::BitwiseRShift(a, b, c, kb, kc),
        Token::EqEq => Opcode::Eq(a, b, c, kb, kc),
        Token::NotEq => Opcode::Neq(a, b, c, kb, kc),
        Token::Lt => Opcode::Lt(a, b, c, kb, kc),
        Token::Le => Opcode::Le(a, b, c, kb, kc),
        Token::Gt => Opcode::Gt(a, b, c, kb, kc),
        Token::Ge => Opcode::Ge(a, b, c, kb, kc),
        _ => Opcode::Noop,
    }
}

/// Fold a binary operation over two constants through the same dispatch
/// tables the VM uses.
fn fold_binary(op: &Token, left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    let table = methods_for(left.base_type());

    match op {
        Token::Plus => (table.numeric.add)(left, right),
        Token::Minus => (table.numeric.subtract)(left, right),
        Token::Star => (table.numeric.multiply)(left, right),
        Token::Slash => (table.numeric.divide)(left, right),
        Token::DoubleSlash => (table.numeric.floor_divide)(left, right),
        Token::Percent => (table.numeric.modulo)(left, right),
        Token::DoubleStar => (table.numeric.power)(left, right),
        Token::Ampersand => (table.numeric.bitwise_and)(left, right),
        Token::VerticalBar => (table.numeric.bitwise_or)(left, right),
        Token::Caret => (table.numeric.bitwise_xor)(left, right),
        Token::Shl => (table.numeric.bitwise_l_shift)(left, right),
        Token::Shr => (table.numeric.bitwise_r_shift)(left, right),
        Token::EqEq => (table.comparison.eq)(left, right),
        Token::NotEq => (table.comparison.neq)(left, right),
        Token::Lt => (table.comparison.lt)(left, right),
        Token::Le => (table.comparison.lte)(left, right),
        Token::Gt => (table.comparison.gt)(left, right),
        Token::Ge => (table.comparison.gte)(left, right),
        _ => Err(ErrorKind::InternalError),
    }
}
