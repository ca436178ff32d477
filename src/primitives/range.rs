//! Range methods: structural equality and in-place iteration.

use crate::error::ErrorKind;
use crate::primitives::{invalid_binary, ComparisonMethods};
use crate::value::{ranges_equal, BaseType, Value};

pub(super) static COMPARISON: ComparisonMethods = ComparisonMethods {
    gt: invalid_binary,
    gte: invalid_binary,
    lt: invalid_binary,
    lte: invalid_binary,
    eq,
    neq,
};

/// Advance the range, mutating its `start` in place.
///
/// The inline form bumps its 32-bit endpoint; the heap form reassigns
/// `start` through numeric addition by `step`. Ascending ranges yield
/// while `start < end`, descending ones (negative step) while
/// `start > end`; exhaustion returns `Invalid` rather than an error.
pub(super) fn next(iterator: &mut Value) -> Result<Value, ErrorKind> {
    match iterator {
        Value::InlineRange(range) => {
            if range.start >= range.end {
                return Ok(Value::Invalid);
            }

            let produced = Value::Int(range.start.into());
            range.start += 1;
            Ok(produced)
        }
        Value::Range(object) => {
            let mut range = object.borrow_mut();

            let descending = range.step.as_number().map_or(false, |s| s < 0.0);
            let (start, end) = match (range.start.as_number(), range.end.as_number()) {
                (Some(s), Some(e)) => (s, e),
                _ => return Err(ErrorKind::UnexpectedType),
            };

            let exhausted = if descending { start <= end } else { start >= end };
            if exhausted {
                return Ok(Value::Invalid);
            }

            let produced = range.start.clone();
            range.start = match (&range.start, &range.step) {
                (Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_add(*b)),
                (Value::Float(a), Value::Float(b)) => Value::Float(a + b),
                _ => return Err(ErrorKind::UnexpectedType),
            };

            Ok(produced)
        }
        _ => Err(ErrorKind::UnexpectedType),
    }
}

fn eq(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    if left.base_type() != BaseType::Range || right.base_type() != BaseType::Range {
        return Err(ErrorKind::UnexpectedType);
    }

    Ok(Value::Bool(ranges_equal(left, right)))
}

fn neq(left: &Value, right: &Value) -> Result<Value, ErrorKind> {
    match eq(left, right)? {
        Value::Bool(equal) => Ok(Value::Bool(!equal)),
        _ => Err(ErrorKind::InternalError),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{InlineRange, RangeObject};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn heap_range(start: i64, end: i64, step: i64) -> Value {
        Value::Range(Rc::new(RefCell::new(
            RangeObject::new(Value::Int(start), Value::Int(end), Value::Int(step)).unwrap(),
        )))
    }

    #[test]
    fn inline_range_yields_and_exhausts() {
        let mut range = Value::InlineRange(InlineRange { start: 1, end: 4 });
        let mut produced = Vec::new();

        loop {
            match next(&mut range).unwrap() {
                Value::Invalid => break,
                value => produced.push(value.as_int().unwrap()),
            }
        }

        assert_eq!(produced, vec![1, 2, 3]);
        assert!(matches!(next(&mut range).unwrap(), Value::Invalid));
    }

    #[test]
    fn heap_range_honors_step() {
        let mut range = heap_range(0, 10, 3);
        let mut produced = Vec::new();

        loop {
            let value = next(&mut range).unwrap();
            if value.is_invalid() {
                break;
            }
            produced.push(value.as_int().unwrap());
        }

        assert_eq!(produced, vec![0, 3, 6, 9]);
    }

    #[test]
    fn descending_range_iterates_with_negative_step() {
        let mut range = heap_range(3, 0, -1);
        let mut produced = Vec::new();

        loop {
            let value = next(&mut range).unwrap();
            if value.is_invalid() {
                break;
            }
            produced.push(value.as_int().unwrap());
        }

        assert_eq!(produced, vec![3, 2, 1]);
    }

    #[test]
    fn empty_and_reversed_ranges_yield_nothing() {
        let mut empty = Value::InlineRange(InlineRange { start: 5, end: 5 });
        assert!(matches!(next(&mut empty).unwrap(), Value::Invalid));

        let mut reversed = Value::InlineRange(InlineRange { start: 9, end: 1 });
        assert!(matches!(next(&mut reversed).unwrap(), Value::Invalid));
    }

    #[test]
    fn equality_is_structural() {
        let inline = Value::InlineRange(InlineRange { start: 0, end: 5 });
        let heap = heap_range(0, 5, 1);

        assert!(matches!(eq(&inline, &heap).unwrap(), Value::Bool(true)));
        assert!(matches!(
            neq(&inline, &heap_range(0, 5, 2)).unwrap(),
            Value::Bool(true)
        ));
    }
}
