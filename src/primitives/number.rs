//! Numeric methods shared by `Int` and `Float`.
//!
//! Promotion rule: any float operand promotes the result to float;
//! otherwise the result stays an integer. Integer overflow wraps.

use crate::consts::FLOAT_EQ_EPSILON;
use crate::error::ErrorKind;
use crate::primitives::{invalid_unary, ComparisonMethods, ConversionMethods, NumericMethods};
use crate::value::{hash_u64, FloatValue, IntValue, Value, ValueHash};

pub(super) static NUMERIC: NumericMethods = NumericMethods {
    add,
    subtract,
    multiply,
    divide,
    floor_divide,
    modulo,
    power,
    negate,
    bitwise_and,
    bitwise_or,
    bitwise_xor,
    bitwise_l_shift,
    bitwise_r_shift,
    bitwise_invert,
};

pub(super) static COMPARISON: ComparisonMethods = ComparisonMethods {
    gt,
    gte,
    lt,
    lte,
    eq,
    neq,
};

pub(super) static CONVERSION: ConversionMethods = ConversionMethods {
    to_int,
    to_bool,
    to_float,
    to_string: super::unimplemented_unary,
    to_type: super::unimplemented_binary,
    inverse: invalid_unary,
};

pub(super) fn hash(operand: &Value) -> Result<ValueHash, ErrorKind> {
    match operand {
        Value::Int(i) => Ok(hash_u64(*i as u64)),
        Value::Float(f) => Ok(hash_u64(f.to_bits())),
        _ => Err(ErrorKind::UnexpectedType),
    }
}

fn both(left: &Value, right: &Value) -> Result<(FloatValue, FloatValue), ErrorKind> {
    match (left.as_number(), right.as_number()) {
        (Some(l), Some(r)) => Ok((l, r)),
        _ => Err(ErrorKind::UnexpectedType),
    }
}

fn add(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => Ok(Value::Int(l.wrapping_add(*r))),
        _ => both(left, right).map(|(l, r)| Value::Float(l + r)),
    }
}

fn subtract(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => Ok(Value::Int(l.wrapping_sub(*r))),
        _ => both(left, right).map(|(l, r)| Value::Float(l - r)),
    }
}

fn multiply(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => Ok(Value::Int(l.wrapping_mul(*r))),
        _ => both(left, right).map(|(l, r)| Value::Float(l * r)),
    }
}

fn divide(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => {
            if *r == 0 {
                Err(ErrorKind::DivideByZero)
            } else {
                Ok(Value::Int(l.wrapping_div(*r)))
            }
        }
        _ => {
            let (l, r) = both(left, right)?;
            if r == 0.0 {
                Err(ErrorKind::DivideByZero)
            } else {
                Ok(Value::Float(l / r))
            }
        }
    }
}

fn floor_divide(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => {
            if *r == 0 {
                Err(ErrorKind::DivideByZero)
            } else {
                Ok(Value::Int(l.wrapping_div(*r)))
            }
        }
        _ => {
            let (l, r) = both(left, right)?;
            if r == 0.0 {
                Err(ErrorKind::DivideByZero)
            } else {
                Ok(Value::Float((l / r).floor()))
            }
        }
    }
}

fn modulo(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => {
            if *r == 0 {
                Err(ErrorKind::DivideByZero)
            } else {
                Ok(Value::Int(l.wrapping_rem(*r)))
            }
        }
        _ => {
            let (l, r) = both(left, right)?;
            if r == 0.0 {
                Err(ErrorKind::DivideByZero)
            } else {
                Ok(Value::Float(l % r))
            }
        }
    }
}

/// Exponentiation by squaring; wraps on overflow like the other integer
/// arithmetic.
fn int_power(base: IntValue, mut exponent: IntValue) -> IntValue {
    let mut result: IntValue = 1;
    let mut current = base;

    while exponent > 0 {
        if exponent & 1 == 1 {
            result = result.wrapping_mul(current);
        }
        current = current.wrapping_mul(current);
        exponent >>= 1;
    }

    result
}

fn power(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) if *r >= 0 => Ok(Value::Int(int_power(*l, *r))),
        _ => both(left, right).map(|(l, r)| Value::Float(l.powf(r))),
    }
}

fn negate(operand: &Value) -> Result<Value, ErrorKind> {
    match operand {
        Value::Int(i) => Ok(Value::Int(i.wrapping_neg())),
        Value::Float(f) => Ok(Value::Float(-f)),
        _ => Err(ErrorKind::UnexpectedType),
    }
}

fn both_ints(left: &Value, right: &Value) -> Result<(IntValue, IntValue), ErrorKind> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => Ok((*l, *r)),
        _ => Err(ErrorKind::UnexpectedType),
    }
}

fn bitwise_and(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    both_ints(left, right).map(|(l, r)| Value::Int(l & r))
}

fn bitwise_or(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    both_ints(left, right).map(|(l, r)| Value::Int(l | r))
}

fn bitwise_xor(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    both_ints(left, right).map(|(l, r)| Value::Int(l ^ r))
}

fn bitwise_l_shift(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    both_ints(left, right).map(|(l, r)| Value::Int(l.wrapping_shl(r as u32)))
}

fn bitwise_r_shift(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    both_ints(left, right).map(|(l, r)| Value::Int(l.wrapping_shr(r as u32)))
}

fn bitwise_invert(operand: &Value) -> Result<Value, ErrorKind> {
    match operand {
        Value::Int(i) => Ok(Value::Int(!i)),
        _ => Err(ErrorKind::UnexpectedType),
    }
}

fn gt(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => Ok(Value::Bool(l > r)),
        _ => both(left, right).map(|(l, r)| Value::Bool(l > r)),
    }
}

fn gte(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => Ok(Value::Bool(l >= r)),
        _ => both(left, right).map(|(l, r)| Value::Bool(l >= r)),
    }
}

fn lt(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => Ok(Value::Bool(l < r)),
        _ => both(left, right).map(|(l, r)| Value::Bool(l < r)),
    }
}

fn lte(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => Ok(Value::Bool(l <= r)),
        _ => both(left, right).map(|(l, r)| Value::Bool(l <= r)),
    }
}

/// Equality is epsilon-tolerant once a float is involved; inequality
/// compares exactly. The asymmetry is long-standing, observable behavior.
fn eq(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => Ok(Value::Bool(l == r)),
        _ => both(left, right).map(|(l, r)| Value::Bool((l - r).abs() < FLOAT_EQ_EPSILON)),
    }
}

fn neq(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => Ok(Value::Bool(l != r)),
        _ => both(left, right).map(|(l, r)| Value::Bool(l != r)),
    }
}

fn to_int(operand: &Value) -> Result<Value, ErrorKind> {
    match operand {
        Value::Int(_) => Ok(operand.clone()),
        Value::Float(f) => Ok(Value::Int(*f as IntValue)),
        _ => Err(ErrorKind::UnexpectedType),
    }
}

fn to_bool(operand: &Value) -> Result<Value, ErrorKind> {
    match operand {
        Value::Int(i) => Ok(Value::Bool(*i != 0)),
        Value::Float(f) => Ok(Value::Bool(*f != 0.0)),
        _ => Err(ErrorKind::UnexpectedType),
    }
}

fn to_float(operand: &Value) -> Result<Value, ErrorKind> {
    match operand {
        Value::Int(i) => Ok(Value::Float(*i as FloatValue)),
        Value::Float(_) => Ok(operand.clone()),
        _ => Err(ErrorKind::UnexpectedType),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_arithmetic_promotes_to_float() {
        let sum = add(&Value::Int(1), &Value::Float(0.5)).unwrap();
        assert!(matches!(sum, Value::Float(f) if (f - 1.5).abs() < 1e-12));

        let product = multiply(&Value::Int(3), &Value::Int(4)).unwrap();
        assert!(matches!(product, Value::Int(12)));
    }

    #[test]
    fn integer_overflow_wraps() {
        let wrapped = add(&Value::Int(IntValue::MAX), &Value::Int(1)).unwrap();
        assert!(matches!(wrapped, Value::Int(IntValue::MIN)));
    }

    #[test]
    fn division_by_zero_is_reported() {
        assert_eq!(
            divide(&Value::Int(1), &Value::Int(0)).unwrap_err(),
            ErrorKind::DivideByZero
        );
        assert_eq!(
            modulo(&Value::Float(1.0), &Value::Float(0.0)).unwrap_err(),
            ErrorKind::DivideByZero
        );
    }

    #[test]
    fn integer_power_is_exact_for_nonnegative_exponents() {
        assert!(matches!(
            power(&Value::Int(2), &Value::Int(10)).unwrap(),
            Value::Int(1024)
        ));
        assert!(matches!(
            power(&Value::Int(2), &Value::Int(-1)).unwrap(),
            Value::Float(f) if (f - 0.5).abs() < 1e-12
        ));
    }

    #[test]
    fn floor_division_floors_mixed_operands() {
        assert!(matches!(
            floor_divide(&Value::Int(17), &Value::Int(3)).unwrap(),
            Value::Int(5)
        ));
        assert!(matches!(
            floor_divide(&Value::Float(-7.0), &Value::Int(2)).unwrap(),
            Value::Float(f) if f == -4.0
        ));
    }

    #[test]
    fn bitwise_ops_reject_floats() {
        assert_eq!(
            bitwise_and(&Value::Int(1), &Value::Float(1.0)).unwrap_err(),
            ErrorKind::UnexpectedType
        );
    }

    #[test]
    fn equality_is_tolerant_inequality_is_exact() {
        assert!(matches!(
            eq(&Value::Float(1.0), &Value::Float(1.0 + 1e-9)).unwrap(),
            Value::Bool(true)
        ));
        assert!(matches!(
            neq(&Value::Float(1.0), &Value::Float(1.0 + 1e-9)).unwrap(),
            Value::Bool(true)
        ));
    }
}
