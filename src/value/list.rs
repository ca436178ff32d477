use crate::value::{builtin_equals, Value};

/// A dense, growable vector of values.
#[derive(Debug, Default)]
pub struct ListObject {
    values: Vec<Value>,
}

impl ListObject {
    /// An empty list with room for `capacity` values.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the list has no elements.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Current allocated capacity.
    pub fn capacity(&self) -> usize {
        self.values.capacity()
    }

    /// Append one value.
    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    /// Remove and return the last value.
    pub fn pop(&mut self) -> Option<Value> {
        self.values.pop()
    }

    /// Element at a non-negative index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Mutable element at a non-negative index.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Value> {
        self.values.get_mut(index)
    }

    /// Remove the element at `index`, shifting the tail left.
    pub fn remove(&mut self, index: usize) -> Value {
        self.values.remove(index)
    }

    /// Whether any element equals `value` under built-in equality.
    pub fn contains(&self, value: &Value) -> bool {
        self.values.iter().any(|v| builtin_equals(v, value))
    }

    /// Resolve a possibly negative index against the current length.
    ///
    /// Negative indices wrap once from the end; anything still out of
    /// range is `None`.
    pub fn resolve_index(&self, index: i64) -> Option<usize> {
        let len = self.values.len() as i64;
        let index = if index < 0 { index + len } else { index };

        (0..len).contains(&index).then_some(index as usize)
    }

    /// The elements as a slice.
    pub fn as_slice(&self) -> &[Value] {
        &self.values
    }
}
