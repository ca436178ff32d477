//! Boolean methods.
//!
//! Booleans only support equality among the comparisons, and comparing a
//! boolean against a value of another type yields `false` rather than an
//! error.

use crate::error::ErrorKind;
use crate::primitives::{invalid_binary, invalid_unary, ComparisonMethods, ConversionMethods};
use crate::value::{Value, ValueHash};

pub(super) static COMPARISON: ComparisonMethods = ComparisonMethods {
    gt: invalid_binary,
    gte: invalid_binary,
    lt: invalid_binary,
    lte: invalid_binary,
    eq,
    neq,
};

pub(super) static CONVERSION: ConversionMethods = ConversionMethods {
    to_int: invalid_unary,
    to_bool,
    to_float: invalid_unary,
    to_string: super::unimplemented_unary,
    to_type: invalid_binary,
    inverse: invalid_unary,
};

pub(super) fn hash(operand: &Value) -> Result<ValueHash, ErrorKind> {
    match operand {
        Value::Bool(b) => Ok(*b as ValueHash),
        _ => Err(ErrorKind::UnexpectedType),
    }
}

fn eq(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    match (left, right) {
        (Value::Bool(l), Value::Bool(r)) => Ok(Value::Bool(l == r)),
        (Value::Bool(_), _) => Ok(Value::Bool(false)),
        _ => Err(ErrorKind::UnexpectedType),
    }
}

fn neq(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    match (left, right) {
        (Value::Bool(l), Value::Bool(r)) => Ok(Value::Bool(l != r)),
        (Value::Bool(_), _) => Ok(Value::Bool(false)),
        _ => Err(ErrorKind::UnexpectedType),
    }
}

fn to_bool(operand: &Value) -> Result<Value, ErrorKind> {
    match operand {
        Value::Bool(_) => Ok(operand.clone()),
        _ => Err(ErrorKind::UnexpectedType),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_type_equality_is_false_not_an_error() {
        assert!(matches!(
            eq(&Value::Bool(true), &Value::Int(1)).unwrap(),
            Value::Bool(false)
        ));
        assert!(matches!(
            neq(&Value::Bool(true), &Value::Int(1)).unwrap(),
            Value::Bool(false)
        ));
    }

    #[test]
    fn hash_is_zero_or_one() {
        assert_eq!(hash(&Value::Bool(false)).unwrap(), 0);
        assert_eq!(hash(&Value::Bool(true)).unwrap(), 1);
    }
}
