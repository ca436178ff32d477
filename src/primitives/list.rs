//! List collection methods.

use crate::error::ErrorKind;
use crate::primitives::CollectionMethods;
use crate::value::{ListObject, Value};

pub(super) static COLLECTION: CollectionMethods = CollectionMethods {
    iter: super::unimplemented_unary,
    contain,
    len,
    get_item,
    set_item,
    del_item,
    append,
    extend: super::unimplemented_append,
    pop,
};

fn with_list<T>(
    collection: &Value,
    f: impl FnOnce(&ListObject) -> Result<T, ErrorKind>,
) -> Result<T, ErrorKind> {
    match collection {
        Value::List(list) => f(&list.borrow()),
        _ => Err(ErrorKind::UnexpectedType),
    }
}

fn with_list_mut<T>(
    collection: &Value,
    f: impl FnOnce(&mut ListObject) -> Result<T, ErrorKind>,
) -> Result<T, ErrorKind> {
    match collection {
        Value::List(list) => f(&mut list.borrow_mut()),
        _ => Err(ErrorKind::UnexpectedType),
    }
}

fn resolve(list: &ListObject, key: &Value) -> Result<usize, ErrorKind> {
    let index = key.as_int().ok_or(ErrorKind::UnexpectedType)?;
    list.resolve_index(index).ok_or(ErrorKind::IndexOob)
}

fn contain(item: &Value, collection: &Value) -> Result<Value, ErrorKind> {
    with_list(collection, |list| Ok(Value::Bool(list.contains(item))))
}

fn len(collection: &Value) -> Result<Value, ErrorKind> {
    with_list(collection, |list| Ok(Value::Int(list.len() as i64)))
}

fn get_item(collection: &Value, key: &Value) -> Result<Value, ErrorKind> {
    with_list(collection, |list| {
        let index = resolve(list, key)?;
        Ok(list.get(index).cloned().unwrap_or_default())
    })
}

fn set_item(collection: &Value, key: &Value, value: &Value) -> Result<(), ErrorKind> {
    with_list_mut(collection, |list| {
        let index = resolve(list, key)?;
        match list.get_mut(index) {
            Some(slot) => {
                *slot = value.clone();
                Ok(())
            }
            None => Err(ErrorKind::IndexOob),
        }
    })
}

fn del_item(collection: &Value, key: &Value) -> Result<Value, ErrorKind> {
    with_list_mut(collection, |list| {
        let index = resolve(list, key)?;
        Ok(list.remove(index))
    })
}

fn append(collection: &Value, item: &Value) -> Result<(), ErrorKind> {
    with_list_mut(collection, |list| {
        list.push(item.clone());
        Ok(())
    })
}

fn pop(collection: &Value) -> Result<Value, ErrorKind> {
    with_list_mut(collection, |list| list.pop().ok_or(ErrorKind::IndexOob))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::builtin_equals;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn list_of(values: &[i64]) -> Value {
        let mut list = ListObject::default();
        for &v in values {
            list.push(Value::Int(v));
        }
        Value::List(Rc::new(RefCell::new(list)))
    }

    #[test]
    fn get_set_del_share_index_resolution() {
        let list = list_of(&[10, 20, 30]);

        let got = get_item(&list, &Value::Int(-1)).unwrap();
        assert!(builtin_equals(&got, &Value::Int(30)));

        set_item(&list, &Value::Int(0), &Value::Int(99)).unwrap();
        let got = get_item(&list, &Value::Int(0)).unwrap();
        assert!(builtin_equals(&got, &Value::Int(99)));

        let removed = del_item(&list, &Value::Int(1)).unwrap();
        assert!(builtin_equals(&removed, &Value::Int(20)));
        assert!(matches!(len(&list).unwrap(), Value::Int(2)));
    }

    #[test]
    fn pop_on_empty_is_out_of_bounds() {
        let list = list_of(&[1]);

        pop(&list).unwrap();
        assert_eq!(pop(&list).unwrap_err(), ErrorKind::IndexOob);
    }

    #[test]
    fn non_integer_keys_are_type_errors() {
        let list = list_of(&[1, 2]);
        assert_eq!(
            get_item(&list, &Value::string(b"0")).unwrap_err(),
            ErrorKind::UnexpectedType
        );
    }
}
