//! Symbolic emission of target instructions.

mod emitter;
mod label;
mod pools;

#[cfg(test)]
mod emitter_tests;

pub use emitter::{Access, EmittedOp, EmittedOperand, Emitter, Target};
pub use label::{Label, Labels};
pub use pools::{NamePool, Pools};
