use crate::error::ErrorKind;
use crate::value::{builtin_equals, Value};

/// An integer range `[start, end)` with implicit step 1, stored directly
/// in the value cell. Iteration mutates `start` in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InlineRange {
    /// Inclusive lower endpoint; advanced during iteration.
    pub start: i32,
    /// Exclusive upper endpoint.
    pub end: i32,
}

/// A heap range with arbitrary numeric endpoints and step.
///
/// The components are homogeneous: all integers or all floats. `is_int`
/// caches which. Iteration reassigns `start` through numeric addition.
#[derive(Debug, Clone)]
pub struct RangeObject {
    /// Inclusive lower endpoint; advanced during iteration.
    pub start: Value,
    /// Exclusive upper endpoint.
    pub end: Value,
    /// Per-iteration increment; never implicitly zero-checked.
    pub step: Value,
    /// Whether all three components are integers.
    pub is_int: bool,
}

impl RangeObject {
    /// Build a heap range. The components must be all-int or all-float.
    pub fn new(start: Value, end: Value, step: Value) -> Result<Self, ErrorKind> {
        let is_int = matches!(
            (&start, &end, &step),
            (Value::Int(_), Value::Int(_), Value::Int(_))
        );
        let is_float = matches!(
            (&start, &end, &step),
            (Value::Float(_), Value::Float(_), Value::Float(_))
        );

        if !is_int && !is_float {
            return Err(ErrorKind::UnexpectedType);
        }

        Ok(Self {
            start,
            end,
            step,
            is_int,
        })
    }
}

/// Structural range equality across both forms: equal start, end, and
/// step under numeric equality.
pub(crate) fn ranges_equal(a: &Value, b: &Value) -> bool {
    let parts = |v: &Value| -> Option<(Value, Value, Value)> {
        match v {
            Value::InlineRange(r) => Some((
                Value::Int(r.start.into()),
                Value::Int(r.end.into()),
                Value::Int(1),
            )),
            Value::Range(r) => {
                let r = r.borrow();
                Some((r.start.clone(), r.end.clone(), r.step.clone()))
            }
            _ => None,
        }
    };

    match (parts(a), parts(b)) {
        (Some((s1, e1, t1)), Some((s2, e2, t2))) => {
            builtin_equals(&s1, &s2) && builtin_equals(&e1, &e2) && builtin_equals(&t1, &t2)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_component_types_are_rejected() {
        let err = RangeObject::new(Value::Int(0), Value::Float(1.0), Value::Int(1));
        assert!(err.is_err());
    }

    #[test]
    fn inline_equals_heap_with_same_shape() {
        let inline = Value::InlineRange(InlineRange { start: 2, end: 7 });
        let heap = Value::Range(std::rc::Rc::new(std::cell::RefCell::new(
            RangeObject::new(Value::Int(2), Value::Int(7), Value::Int(1)).unwrap(),
        )));

        assert!(ranges_equal(&inline, &heap));
        assert!(ranges_equal(&heap, &inline));
    }

    #[test]
    fn differing_steps_are_unequal() {
        let a = Value::Range(std::rc::Rc::new(std::cell::RefCell::new(
            RangeObject::new(Value::Int(0), Value::Int(9), Value::Int(1)).unwrap(),
        )));
        let b = Value::Range(std::rc::Rc::new(std::cell::RefCell::new(
            RangeObject::new(Value::Int(0), Value::Int(9), Value::Int(3)).unwrap(),
        )));

        assert!(!ranges_equal(&a, &b));
    }
}
