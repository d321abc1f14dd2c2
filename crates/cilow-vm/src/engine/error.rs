//! Runtime errors.

/// Why execution stopped abnormally.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    /// Execution fuel exhausted (too many instructions).
    #[error("execution limit of {0} instructions exceeded")]
    ExecFuelExhausted(u32),

    /// Custom events nested too deeply.
    #[error("event nesting limit of {0} exceeded")]
    RecursionLimitExceeded(u32),

    #[error("stack underflow at 0x{0:08X}")]
    StackUnderflow(u32),

    #[error("no instruction at address 0x{0:08X}")]
    BadAddress(u32),

    #[error("unknown variable `{0}`")]
    UnknownVariable(String),

    #[error("unknown entry point `{0}`")]
    UnknownEntry(String),

    #[error("extern `{0}` is not available")]
    UnknownExtern(String),

    #[error("null reference in `{0}`")]
    NullReference(String),

    #[error("index {index} is outside an array of length {len}")]
    IndexOutOfRange { index: i128, len: usize },

    #[error("division by zero")]
    DivideByZero,

    #[error("expected {expected}, found {found}")]
    TypeError { expected: &'static str, found: String },

    #[error("instruction at 0x{0:08X} is malformed")]
    Malformed(u32),
}
