//! Per-base-type primitive dispatch.
//!
//! Every base type owns one constant [`MagicMethods`] table grouping its
//! numeric, comparison, conversion, collection, hash, and iterator-next
//! methods. The VM indexes the table by the operand's downcast tag and
//! calls through function pointers; unsupported entries all route to
//! shared stubs that report [`ErrorKind::UnexpectedType`]. The compiler
//! reuses the same functions for constant folding, so folded arithmetic
//! and evaluated arithmetic cannot drift apart.

mod boolean;
mod dict;
mod list;
mod number;
mod range;
mod string;

use crate::error::ErrorKind;
use crate::value::{BaseType, Value, ValueHash};

/// Hash a single value.
pub type HashMethod = fn(&Value) -> Result<ValueHash, ErrorKind>;

/// One-operand method producing a value.
pub type UnaryMethod = fn(&Value) -> Result<Value, ErrorKind>;

/// Two-operand method producing a value.
pub type BinaryMethod = fn(&Value, &Value) -> Result<Value, ErrorKind>;

/// `(collection, item)` method mutating the collection in place.
pub type AppendMethod = fn(&Value, &Value) -> Result<(), ErrorKind>;

/// `(collection, key, value)` method mutating the collection in place.
pub type SetItemMethod = fn(&Value, &Value, &Value) -> Result<(), ErrorKind>;

/// One-shot iterator advance. Mutates the iterator value in place and
/// returns the produced value, or `Invalid` on exhaustion.
pub type NextMethod = fn(&mut Value) -> Result<Value, ErrorKind>;

/// Arithmetic and bitwise methods.
pub struct NumericMethods {
    pub add: BinaryMethod,
    pub subtract: BinaryMethod,
    pub multiply: BinaryMethod,
    pub divide: BinaryMethod,
    pub floor_divide: BinaryMethod,
    pub modulo: BinaryMethod,
    pub power: BinaryMethod,
    pub negate: UnaryMethod,
    pub bitwise_and: BinaryMethod,
    pub bitwise_or: BinaryMethod,
    pub bitwise_xor: BinaryMethod,
    pub bitwise_l_shift: BinaryMethod,
    pub bitwise_r_shift: BinaryMethod,
    pub bitwise_invert: UnaryMethod,
}

/// Ordering and equality methods; every entry returns a `Bool`.
pub struct ComparisonMethods {
    pub gt: BinaryMethod,
    pub gte: BinaryMethod,
    pub lt: BinaryMethod,
    pub lte: BinaryMethod,
    pub eq: BinaryMethod,
    pub neq: BinaryMethod,
}

/// Conversion methods. `to_type` takes `(type, operand)`.
pub struct ConversionMethods {
    pub to_int: UnaryMethod,
    pub to_bool: UnaryMethod,
    pub to_float: UnaryMethod,
    pub to_string: UnaryMethod,
    pub to_type: BinaryMethod,
    pub inverse: UnaryMethod,
}

/// Collection methods. `contain` takes `(item, collection)`; the rest
/// take the collection first.
pub struct CollectionMethods {
    pub iter: UnaryMethod,
    pub contain: BinaryMethod,
    pub len: UnaryMethod,
    pub get_item: BinaryMethod,
    pub set_item: SetItemMethod,
    pub del_item: BinaryMethod,
    pub append: AppendMethod,
    pub extend: AppendMethod,
    pub pop: UnaryMethod,
}

/// The full method table of one base type.
pub struct MagicMethods {
    pub hash: HashMethod,
    pub numeric: &'static NumericMethods,
    pub comparison: &'static ComparisonMethods,
    pub conversion: &'static ConversionMethods,
    pub collection: &'static CollectionMethods,
    pub next: NextMethod,
}

/// The method table for a base type.
pub fn methods_for(tag: BaseType) -> &'static MagicMethods {
    TABLES[tag as usize]
}

/// Truthiness through the conversion table of the operand's type.
pub fn truthy(value: &Value) -> Result<bool, ErrorKind> {
    match (methods_for(value.base_type()).conversion.to_bool)(value)? {
        Value::Bool(b) => Ok(b),
        _ => Err(ErrorKind::InternalError),
    }
}

fn invalid_hash(_: &Value) -> Result<ValueHash, ErrorKind> {
    Err(ErrorKind::UnexpectedType)
}

fn invalid_unary(_: &Value) -> Result<Value, ErrorKind> {
    Err(ErrorKind::UnexpectedType)
}

fn invalid_binary(_: &Value, _: &Value) -> Result<Value, ErrorKind> {
    Err(ErrorKind::UnexpectedType)
}

fn invalid_append(_: &Value, _: &Value) -> Result<(), ErrorKind> {
    Err(ErrorKind::UnexpectedType)
}

fn invalid_set_item(_: &Value, _: &Value, _: &Value) -> Result<(), ErrorKind> {
    Err(ErrorKind::UnexpectedType)
}

fn invalid_next(_: &mut Value) -> Result<Value, ErrorKind> {
    Err(ErrorKind::UnexpectedType)
}

fn unimplemented_unary(_: &Value) -> Result<Value, ErrorKind> {
    Err(ErrorKind::UnimplementedFeature)
}

fn unimplemented_binary(_: &Value, _: &Value) -> Result<Value, ErrorKind> {
    Err(ErrorKind::UnimplementedFeature)
}

fn unimplemented_append(_: &Value, _: &Value) -> Result<(), ErrorKind> {
    Err(ErrorKind::UnimplementedFeature)
}

static INVALID_NUMERIC: NumericMethods = NumericMethods {
    add: invalid_binary,
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

static INVALID_COMPARISON: ComparisonMethods = ComparisonMethods {
    gt: invalid_binary,
    gte: invalid_binary,
    lt: invalid_binary,
    lte: invalid_binary,
    eq: invalid_binary,
    neq: invalid_binary,
};

static INVALID_CONVERSION: ConversionMethods = ConversionMethods {
    to_int: invalid_unary,
    to_bool: invalid_unary,
    to_float: invalid_unary,
    to_string: invalid_unary,
    to_type: invalid_binary,
    inverse: invalid_unary,
};

static INVALID_COLLECTION: CollectionMethods = CollectionMethods {
    iter: invalid_unary,
    contain: invalid_binary,
    len: invalid_unary,
    get_item: invalid_binary,
    set_item: invalid_set_item,
    del_item: invalid_binary,
    append: invalid_append,
    extend: invalid_append,
    pop: invalid_unary,
};

static INVALID_TABLE: MagicMethods = MagicMethods {
    hash: invalid_hash,
    numeric: &INVALID_NUMERIC,
    comparison: &INVALID_COMPARISON,
    conversion: &INVALID_CONVERSION,
    collection: &INVALID_COLLECTION,
    next: invalid_next,
};

static BOOL_TABLE: MagicMethods = MagicMethods {
    hash: boolean::hash,
    numeric: &INVALID_NUMERIC,
    comparison: &boolean::COMPARISON,
    conversion: &boolean::CONVERSION,
    collection: &INVALID_COLLECTION,
    next: invalid_next,
};

static NUMBER_TABLE: MagicMethods = MagicMethods {
    hash: number::hash,
    numeric: &number::NUMERIC,
    comparison: &number::COMPARISON,
    conversion: &number::CONVERSION,
    collection: &INVALID_COLLECTION,
    next: invalid_next,
};

static STRING_TABLE: MagicMethods = MagicMethods {
    hash: string::hash,
    numeric: &string::NUMERIC,
    comparison: &string::COMPARISON,
    conversion: &string::CONVERSION,
    collection: &string::COLLECTION,
    next: invalid_next,
};

static RANGE_TABLE: MagicMethods = MagicMethods {
    hash: invalid_hash,
    numeric: &INVALID_NUMERIC,
    comparison: &range::COMPARISON,
    conversion: &INVALID_CONVERSION,
    collection: &INVALID_COLLECTION,
    next: range::next,
};

static LIST_TABLE: MagicMethods = MagicMethods {
    hash: invalid_hash,
    numeric: &INVALID_NUMERIC,
    comparison: &INVALID_COMPARISON,
    conversion: &INVALID_CONVERSION,
    collection: &list::COLLECTION,
    next: invalid_next,
};

static DICT_TABLE: MagicMethods = MagicMethods {
    hash: invalid_hash,
    numeric: &INVALID_NUMERIC,
    comparison: &INVALID_COMPARISON,
    conversion: &INVALID_CONVERSION,
    collection: &dict::COLLECTION,
    next: invalid_next,
};

/// Tables indexed by `BaseType as usize`. Int and Float share the
/// number table; functions, prototypes, upvalues and classes expose no
/// primitive behavior and fall back to the invalid table.
static TABLES: [&MagicMethods; 12] = [
    &INVALID_TABLE, // Invalid
    &BOOL_TABLE,    // Bool
    &NUMBER_TABLE,  // Int
    &NUMBER_TABLE,  // Float
    &STRING_TABLE,  // String
    &RANGE_TABLE,   // Range
    &LIST_TABLE,    // List
    &DICT_TABLE,    // Dict
    &INVALID_TABLE, // Upvalue
    &INVALID_TABLE, // Function
    &INVALID_TABLE, // FunctionProto
    &INVALID_TABLE, // Class
];
