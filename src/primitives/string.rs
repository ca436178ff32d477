//! String methods for both the inline and heap forms.
//!
//! All methods treat strings as byte sequences; ordering compares the
//! common prefix bytewise with ties broken by length.

use std::rc::Rc;

use crate::error::ErrorKind;
use crate::primitives::{
    invalid_append, invalid_binary, invalid_set_item, invalid_unary, CollectionMethods,
    ComparisonMethods, ConversionMethods, NumericMethods,
};
use crate::value::{StringObject, Value, ValueHash};

pub(super) static NUMERIC: NumericMethods = NumericMethods {
    add,
    subtract: invalid_binary,
    multiply: invalid_binary,
    divide: invalid_binary,
    floor_divide: invalid_binary,
    modulo: invalid_binary,
    power: invalid_binary,
    negate: invalid_unary,
    bitwise_and: invalid_binary,
    bitwise_or: invalid_binary,
    bitwise_xor: invalid_binary,
    bitwise_l_shift: invalid_binary,
    bitwise_r_shift: invalid_binary,
    bitwise_invert: invalid_unary,
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
    to_int: invalid_unary,
    to_bool,
    to_float: invalid_unary,
    to_string,
    to_type: invalid_binary,
    inverse: invalid_unary,
};

pub(super) static COLLECTION: CollectionMethods = CollectionMethods {
    iter: super::unimplemented_unary,
    contain,
    len,
    get_item,
    set_item: invalid_set_item,
    del_item: invalid_binary,
    append: invalid_append,
    extend: invalid_append,
    pop: invalid_unary,
};

pub(super) fn hash(operand: &Value) -> Result<ValueHash, ErrorKind> {
    match operand {
        Value::InlineString(s) => Ok(crate::value::hash_bytes(s.as_bytes())),
        Value::String(s) => Ok(s.hash()),
        _ => Err(ErrorKind::UnexpectedType),
    }
}

fn bytes(value: &Value) -> Result<&[u8], ErrorKind> {
    value.as_str_bytes().ok_or(ErrorKind::UnexpectedType)
}

fn add(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    let (l, r) = (bytes(left)?, bytes(right)?);

    if u32::MAX as usize - l.len() < r.len() {
        return Err(ErrorKind::StringTooLong);
    }

    let mut joined = Vec::with_capacity(l.len() + r.len());
    joined.extend_from_slice(l);
    joined.extend_from_slice(r);

    Ok(Value::String(Rc::new(StringObject::new(&joined))))
}

fn gt(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    let (l, r) = (bytes(left)?, bytes(right)?);
    let shared = l.len().min(r.len());

    let ordering = l[..shared].cmp(&r[..shared]).then(l.len().cmp(&r.len()));
    Ok(Value::Bool(ordering.is_gt()))
}

fn gte(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    match gt(left, right)? {
        Value::Bool(true) => Ok(Value::Bool(true)),
        _ => eq(left, right),
    }
}

fn lt(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    let (l, r) = (bytes(left)?, bytes(right)?);
    let shared = l.len().min(r.len());

    let ordering = l[..shared].cmp(&r[..shared]).then(l.len().cmp(&r.len()));
    Ok(Value::Bool(ordering.is_lt()))
}

fn lte(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    match lt(left, right)? {
        Value::Bool(true) => Ok(Value::Bool(true)),
        _ => eq(left, right),
    }
}

fn eq(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    let (l, r) = (bytes(left)?, bytes(right)?);
    Ok(Value::Bool(l.len() == r.len() && l == r))
}

fn neq(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    match eq(left, right)? {
        Value::Bool(b) => Ok(Value::Bool(!b)),
        _ => Err(ErrorKind::InternalError),
    }
}

fn to_bool(operand: &Value) -> Result<Value, ErrorKind> {
    Ok(Value::Bool(!bytes(operand)?.is_empty()))
}

fn to_string(operand: &Value) -> Result<Value, ErrorKind> {
    Ok(operand.clone())
}

/// Naive substring scan; a zero-length item matches any string.
fn contain(item: &Value, collection: &Value) -> Result<Value, ErrorKind> {
    let (needle, haystack) = (bytes(item)?, bytes(collection)?);

    if needle.is_empty() {
        return Ok(Value::Bool(true));
    }
    if haystack.len() < needle.len() {
        return Ok(Value::Bool(false));
    }

    let found = haystack
        .windows(needle.len())
        .any(|window| window == needle);

    Ok(Value::Bool(found))
}

fn len(collection: &Value) -> Result<Value, ErrorKind> {
    Ok(Value::Int(bytes(collection)?.len() as i64))
}

fn get_item(collection: &Value, key: &Value) -> Result<Value, ErrorKind> {
    let content = bytes(collection)?;
    let index = key.as_int().ok_or(ErrorKind::UnexpectedType)?;

    let index = if index < 0 {
        index + content.len() as i64
    } else {
        index
    };

    if index < 0 || index as usize >= content.len() {
        return Err(ErrorKind::IndexOob);
    }

    Ok(Value::string(&content[index as usize..index as usize + 1]))
}
