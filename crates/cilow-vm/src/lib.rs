//! Reference interpreter for programs produced by the cilow compiler.
//!
//! This crate runs an assembled [`cilow_asm::Program`] the way the target
//! heap-and-stack VM would, which makes lowered code testable end to end.

#![allow(clippy::comparison_chain)]

pub mod engine;

pub use engine::{
    ArrayRef, ExternLibrary, FuelLimits, HostFn, NumTy, RuntimeError, Signature, VM, VMBuilder,
    Value,
};
