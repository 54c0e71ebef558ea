use thiserror::Error;

/// Errors raised while turning source text into tokens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("line {line}: unexpected character '{ch}'")]
    UnexpectedChar { line: u32, ch: char },
    #[error("line {line}: unterminated string literal")]
    UnterminatedString { line: u32 },
    #[error("line {line}: unterminated character literal")]
    UnterminatedChar { line: u32 },
    #[error("line {line}: empty character literal")]
    EmptyChar { line: u32 },
    #[error("line {line}: unknown escape sequence '\\{ch}'")]
    BadEscape { line: u32, ch: char },
}

/// Errors raised while building the AST from a token stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line}: {message}")]
    Expected { line: u32, message: String },
    #[error("line {line}: invalid assignment target")]
    InvalidAssignmentTarget { line: u32 },
    #[error(
        "line {line}: variable size ({size}) does not match initializer list size ({initializers})"
    )]
    InitializerSizeMismatch {
        line: u32,
        size: u32,
        initializers: u32,
    },
    #[error("line {line}: 'print' must be called with exactly one argument")]
    PrintArity { line: u32 },
}

/// Errors raised by the tape allocator (C1).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    #[error("name '{0}' is already defined in this scope")]
    DuplicateName(String),
    #[error("undefined name '{0}'")]
    UndefinedName(String),
    #[error("tried to remove cell {0}, which is not allocated")]
    DoubleFree(i64),
}

/// Errors raised by the emitter (C2) — these indicate a generator bug,
/// not a user program defect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmitError {
    #[error("generator emitted non-Brainfuck text: {0:?}")]
    NonBfCharacter(String),
    #[error("comment contains a Brainfuck instruction character: {0:?}")]
    CommentHasBfCharacter(String),
}

/// Errors raised by the function table (C4).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FunctionError {
    #[error("function '{0}' is already defined")]
    DuplicateFunction(String),
    #[error("undefined function '{name}'")]
    UndefinedFunction { name: String },
    #[error("function '{name}' expects {expected} argument(s), got {actual}")]
    ArityMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("'print' is a reserved function name")]
    ReservedName,
}

/// Top-level compilation error, composing every stage's error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Scope(#[from] ScopeError),
    #[error(transparent)]
    Emit(#[from] EmitError),
    #[error(transparent)]
    Function(#[from] FunctionError),
}

/// Errors raised while executing emitted Brainfuck (the test oracle).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InterpretError {
    #[error("unmatched ']' at offset {0}")]
    UnmatchedClose(usize),
    #[error("unmatched '[' at offset {0}")]
    UnmatchedOpen(usize),
    #[error("maximum step count ({0}) exceeded")]
    StepLimitExceeded(u64),
    #[error("',' read past end of input")]
    ReadPastEof,
    #[error("I/O error: {0}")]
    Io(String),
}
