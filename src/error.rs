//! Error types shared by the lexer, compiler, and interpreter.

use thiserror::Error;

/// Flat namespace of every failure the core can report.
///
/// Symbolic names are stable across versions; discriminant values are not.
/// The `Stirng`/`Maxmum` spellings are inherited and intentionally kept;
/// they are part of the published symbol set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorKind {
    // Lexical
    /// Source bytes are not well-formed UTF-8.
    #[error("source is not well-formed UTF-8")]
    InvalidUtf8,
    /// A string literal runs into a newline, NUL, or the end of input.
    #[error("unclosed string literal")]
    UnclosedString,
    /// The input ends in the middle of a string escape.
    #[error("incomplete string escape")]
    IncompleteStirngEscape,
    /// A string escape names no known escape character.
    #[error("unknown string escape")]
    UnknownStirngEscape,
    /// A malformed number literal.
    #[error("invalid number literal")]
    InvalidNumberLiteral,
    /// An identifier longer than 255 bytes.
    #[error("identifier too long")]
    IdentifierTooLong,

    // Parse
    /// A token that cannot start or continue the current construct.
    #[error("unexpected token")]
    UnexpectedToken,
    /// Input ended where more tokens were required.
    #[error("unexpected end of file")]
    UnexpectedEndOfFile,
    /// The left-hand side of an assignment is not assignable.
    #[error("expression is not an lvalue")]
    ExpectLvalue,
    /// Bracket nesting exceeded the depth limit.
    #[error("maximum bracket depth reached")]
    MaxmumBracketReached,

    // Semantic
    /// A declaration shadows a name visible in an enclosing scope.
    #[error("variable is already defined")]
    VariableAlreadyDefined,
    /// A name was read before any binding of it exists.
    #[error("variable is not initialized")]
    UninitializedVariable,
    /// Assignment to a name with no binding in scope.
    #[error("no binding for assignment target")]
    BindingError,
    /// A `defer` block lexically inside another `defer` block.
    #[error("nested defer block")]
    NestedDefer,
    /// `return <expr>` inside a `defer` block.
    #[error("defer block cannot return a value")]
    ReturnValueInDefer,
    /// Returns within one function disagree on whether they carry a value.
    #[error("inconsistent return value count")]
    InconsistentReturnCount,

    // Runtime
    /// An operation received a value of an unsupported base type.
    #[error("unexpected operand type")]
    UnexpectedType,
    /// Division or modulo by zero.
    #[error("division by zero")]
    DivideByZero,
    /// A sequence index outside the valid range.
    #[error("index out of bounds")]
    IndexOob,
    /// A dict lookup with no matching key.
    #[error("key not found")]
    KeyNotFound,
    /// A call whose argument count disagrees with the callee's arity.
    #[error("argument count mismatch")]
    ArgsCountMismatch,
    /// A function with declared results returned without producing one.
    #[error("missing return value")]
    MissingReturnValue,
    /// A string operation would exceed the representable length.
    #[error("string too long")]
    StringTooLong,
    /// An index space (constant pool, module variables) is exhausted.
    #[error("allocation failure")]
    MemoryAllocationFailure,
    /// A reserved construct that the core does not implement.
    #[error("unimplemented feature")]
    UnimplementedFeature,
    /// An internal invariant was violated; always a bug.
    #[error("internal error")]
    InternalError,
}

/// A compilation failure, positioned by source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("compile error at line {line}: {kind}")]
pub struct CompileError {
    /// What went wrong.
    pub kind: ErrorKind,
    /// 1-based source line the lexer was on when the error surfaced.
    pub line: u32,
}

impl CompileError {
    pub(crate) const fn new(kind: ErrorKind, line: u32) -> Self {
        Self { kind, line }
    }
}

/// An execution failure, positioned by program counter.
///
/// Latched into the VM when the dispatch loop aborts; the frame is not
/// unwound past the faulting instruction and deferred calls do not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("runtime error at pc {pc}: {kind}")]
pub struct RuntimeError {
    /// What went wrong.
    pub kind: ErrorKind,
    /// Index of the faulting instruction in its function's chunk.
    pub pc: u32,
}

impl RuntimeError {
    pub(crate) const fn new(kind: ErrorKind, pc: u32) -> Self {
        Self { kind, pc }
    }
}

/// Top-level error surface observed by an embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VmError {
    /// The module failed to compile.
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// The module failed during execution.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl VmError {
    /// The error kind, independent of the phase that produced it.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Compile(e) => e.kind,
            Self::Runtime(e) => e.kind,
        }
    }
}
