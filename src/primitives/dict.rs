//! Dict collection methods.

use crate::error::ErrorKind;
use crate::primitives::{invalid_append, invalid_unary, CollectionMethods};
use crate::value::{DictObject, Value};

pub(super) static COLLECTION: CollectionMethods = CollectionMethods {
    iter: super::unimplemented_unary,
    contain,
    len,
    get_item,
    set_item,
    del_item,
    append: invalid_append,
    extend: super::unimplemented_append,
    pop: invalid_unary,
};

fn with_dict<T>(
    collection: &Value,
    f: impl FnOnce(&DictObject) -> Result<T, ErrorKind>,
) -> Result<T, ErrorKind> {
    match collection {
        Value::Dict(dict) => f(&dict.borrow()),
        _ => Err(ErrorKind::UnexpectedType),
    }
}

fn contain(item: &Value, collection: &Value) -> Result<Value, ErrorKind> {
    with_dict(collection, |dict| Ok(Value::Bool(dict.has(item)?)))
}

fn len(collection: &Value) -> Result<Value, ErrorKind> {
    with_dict(collection, |dict| Ok(Value::Int(dict.len() as i64)))
}

fn get_item(collection: &Value, key: &Value) -> Result<Value, ErrorKind> {
    with_dict(collection, |dict| {
        dict.get(key)?.ok_or(ErrorKind::KeyNotFound)
    })
}

fn set_item(collection: &Value, key: &Value, value: &Value) -> Result<(), ErrorKind> {
    match collection {
        Value::Dict(dict) => {
            dict.borrow_mut().insert(key.clone(), value.clone())?;
            Ok(())
        }
        _ => Err(ErrorKind::UnexpectedType),
    }
}

fn del_item(collection: &Value, key: &Value) -> Result<Value, ErrorKind> {
    match collection {
        Value::Dict(dict) => dict
            .borrow_mut()
            .delete(key)?
            .ok_or(ErrorKind::KeyNotFound),
        _ => Err(ErrorKind::UnexpectedType),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::builtin_equals;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn empty_dict() -> Value {
        Value::Dict(Rc::new(RefCell::new(DictObject::new())))
    }

    #[test]
    fn missing_keys_are_reported() {
        let dict = empty_dict();

        assert_eq!(
            get_item(&dict, &Value::Int(1)).unwrap_err(),
            ErrorKind::KeyNotFound
        );
        assert_eq!(
            del_item(&dict, &Value::Int(1)).unwrap_err(),
            ErrorKind::KeyNotFound
        );
    }

    #[test]
    fn set_then_get_then_delete() {
        let dict = empty_dict();

        set_item(&dict, &Value::string(b"k"), &Value::Int(5)).unwrap();
        assert!(matches!(len(&dict).unwrap(), Value::Int(1)));
        assert!(matches!(
            contain(&Value::string(b"k"), &dict).unwrap(),
            Value::Bool(true)
        ));

        let got = get_item(&dict, &Value::string(b"k")).unwrap();
        assert!(builtin_equals(&got, &Value::Int(5)));

        let removed = del_item(&dict, &Value::string(b"k")).unwrap();
        assert!(builtin_equals(&removed, &Value::Int(5)));
        assert!(matches!(len(&dict).unwrap(), Value::Int(0)));
    }

    #[test]
    fn append_is_not_a_dict_operation() {
        let dict = empty_dict();
        assert_eq!(
            (COLLECTION.append)(&dict, &Value::Int(1)).unwrap_err(),
            ErrorKind::UnexpectedType
        );
    }
}
