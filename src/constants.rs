//! Per-module constant pool.

use rill_asm::Immediate16;

use crate::error::ErrorKind;
use crate::value::{DictObject, Value};

/// Index into a module's constant pool.
pub type ConstantIndex = Immediate16;

/// Ordered, deduplicated pool of compile-time constants.
///
/// Keys are the constants themselves, deduplicated under the language's
/// structural equality (booleans, numbers, strings, ranges, and function
/// prototypes by identity); the dict's stable tuple ids double as the
/// pool indices. Entries live for the module's lifetime.
#[derive(Debug, Default)]
pub struct ConstantTable {
    map: DictObject,
}

impl ConstantTable {
    /// An empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a constant, returning its index. Inserting a value equal
    /// to an existing entry returns the existing index and adds nothing.
    pub fn insert(&mut self, value: Value) -> Result<ConstantIndex, ErrorKind> {
        if let Some(existing) = self.map.get(&value)? {
            if let Value::Int(index) = existing {
                return Ok(index as ConstantIndex);
            }
            return Err(ErrorKind::InternalError);
        }

        let index = self.map.len();
        if index > ConstantIndex::MAX as usize {
            return Err(ErrorKind::MemoryAllocationFailure);
        }

        self.map.insert(value, Value::Int(index as i64))?;
        Ok(index as ConstantIndex)
    }

    /// The constant at `index`.
    pub fn get(&self, index: ConstantIndex) -> Option<&Value> {
        self.map.entry_key(index as i64)
    }

    /// Number of pooled constants.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
