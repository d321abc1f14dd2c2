//! Runtime engine for compiled cilow programs.
//!
//! Every value lives in a heap slot named by the data section; the operand
//! stack holds slot indices. Externs the compiler relies on are built in,
//! host APIs are registered through [`ExternLibrary`].

mod error;
mod externs;
mod value;
mod vm;

#[cfg(test)]
mod engine_tests;
#[cfg(test)]
mod externs_tests;

pub use error::RuntimeError;
pub use externs::{ExternLibrary, HostFn, Signature};
pub use value::{ArrayRef, BEHAVIOUR_TYPE, NumTy, Value, full_name};
pub use vm::{FuelLimits, VM, VMBuilder};
