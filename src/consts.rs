//! Core limits and tuning parameters.

/// Largest usable register index within one call frame; 255 is reserved
/// as the "no register" operand.
pub const MAX_LOCAL_REGISTER: u8 = u8::MAX - 1;

/// Byte length cap for identifiers.
pub const MAX_IDENTIFIER_LENGTH: usize = 255;

/// Maximum nesting depth of brackets (`(`, `[`, `{`) inside expressions.
pub const MAX_BRACKET_DEPTH: u8 = 127;

/// Values appended per `AppendList` instruction.
pub const LIST_APPEND_BATCH: usize = 16;

/// Key/value pairs inserted per `AppendMap` instruction.
pub const MAP_APPEND_BATCH: usize = 8;

/// Smallest dict index size; always a power of two.
pub const DICT_MIN_INDEX_SIZE: usize = 8;

/// A dict resizes when `used * DICT_LOAD_DEN > index_size * DICT_LOAD_NUM`.
pub const DICT_LOAD_NUM: usize = 2;
/// See [`DICT_LOAD_NUM`].
pub const DICT_LOAD_DEN: usize = 3;

/// Default capacity for collections built without a usable hint.
pub const DEFAULT_COLLECTION_CAPACITY: usize = 8;

/// Absolute epsilon for float equality.
pub const FLOAT_EQ_EPSILON: f64 = 1e-6;

/// Initial size of the VM register file, in value slots.
pub const INITIAL_REGISTER_CAPACITY: usize = 256;

/// Identifier ids at or below this value are reserved for the built-in
/// type names; host-registered globals always intern above it.
pub const MAX_RESERVED_IDENTIFIER_ID: u32 = 11;
