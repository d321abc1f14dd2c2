//! Errors raised while compiling a method.

use crate::il::DecodeError;
use crate::metadata::MetadataError;
use crate::types::Type;

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// No registered handler claimed the instruction.
    #[error("unsupported instruction `{opcode}`")]
    UnsupportedInstruction { opcode: &'static str },

    #[error("unsupported construct: {0}")]
    Unsupported(String),

    #[error("evaluation stack underflow")]
    StackUnderflow,

    #[error("stack depth {found} at branch to IL_{target:04x} does not match {expected}")]
    StackMismatch {
        target: u32,
        expected: usize,
        found: usize,
    },

    #[error("extern `{0}` is not available on the target")]
    UnknownExtern(String),

    #[error("cannot convert `{found}` to `{expected}`")]
    TypeMismatch { expected: Type, found: Type },

    #[error("call to unknown method `{0}`")]
    UnknownMethod(String),

    #[error("label {0} was never applied")]
    LabelNotApplied(u32),

    #[error("label {0} applied twice")]
    LabelAppliedTwice(u32),

    #[error("variable `{0}` used after release")]
    StaleVariable(String),

    #[error("variable `{name}` has {pending} unconsumed uses at method end")]
    LifetimeImbalance { name: String, pending: i64 },

    #[error("temporary `{0}` is still reserved at method end")]
    ReservedAtEnd(String),

    #[error("variable `{0}` declared twice with different types")]
    DuplicateName(String),
}

pub type CompileResult<T> = std::result::Result<T, CompileError>;
