//! cilow compiler: lowers CIL method bodies to heap-and-stack VM assembly.
//!
//! The pipeline for one unit:
//! - `il` - decodes raw IL bytes into operations, resolving metadata tokens
//! - `compile` - symbolic per-method compilation driven by a handler registry
//! - `variables` - named heap slots, pooled temporaries and their lifetimes
//! - `emit` - symbolic instructions with two-pass label resolution
//! - `codegen` - reusable lowering for loops, jump tables and delegates
//! - linking into a `cilow_asm::Program`

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod codegen;
pub mod compile;
pub mod config;
pub mod constant;
pub mod emit;
pub mod error;
pub mod externs;
pub mod il;
pub mod metadata;
pub mod ops;
pub mod types;
pub mod variables;

#[cfg(test)]
mod test_utils;

pub use compile::{Registry, UnitCompiler};
pub use config::CompileConfig;
pub use constant::Constant;
pub use error::{CompileError, CompileResult};
pub use externs::{ExternRegistry, ExternSignature, ExternTable, SignatureNaming};
pub use metadata::{
    FieldDef, FieldRef, LocalDef, Member, MetadataResolver, MethodBody, MethodRef, TokenTable,
    UnitDef,
};
pub use types::Type;

use cilow_asm::{Program, ProgramError};

use crate::il::DecodeError;

/// Errors that abort compilation of a unit.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A method failed to compile; `offset` is the IL offset being lowered.
    #[error("{method}{}: {source}", .offset.map(|o| format!(" at IL_{o:04x}")).unwrap_or_default())]
    Method {
        method: String,
        offset: Option<u32>,
        source: CompileError,
    },

    #[error("method `{0}` is defined twice")]
    DuplicateMethod(String),

    #[error("data entry `{0}` is declared twice")]
    DuplicateName(String),

    #[error("{method}: {source}")]
    Decode { method: String, source: DecodeError },

    #[error(transparent)]
    Program(#[from] ProgramError),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

impl Error {
    /// The underlying method-level error, if any.
    pub fn compile_error(&self) -> Option<&CompileError> {
        match self {
            Error::Method { source, .. } | Error::Compile(source) => Some(source),
            _ => None,
        }
    }
}

/// Result type for unit compilation.
pub type Result<T> = std::result::Result<T, Error>;

/// Compile `unit` with the standard handlers.
pub fn compile_unit(
    unit: &UnitDef,
    resolver: &dyn MetadataResolver,
    externs: &dyn ExternTable,
    config: CompileConfig,
) -> Result<Program> {
    UnitCompiler::new(unit, resolver, externs)
        .config(config)
        .compile()
}
