//! Target assembly format for cilow.
//!
//! This crate contains:
//! - The fixed opcode vocabulary of the heap-and-stack VM and its byte sizes
//! - Resolved instructions, data section entries and literals
//! - `Program`: the serialized unit (data + code + entry points)
//! - Plain assembly text output and a colored dump for humans

#![allow(clippy::comparison_chain)]

pub mod data;
pub mod dump;
pub mod instruction;
pub mod opcode;
pub mod program;

#[cfg(test)]
mod opcode_tests;
#[cfg(test)]
mod program_tests;

pub use data::{DataEntry, Literal, SyncMode};
pub use dump::dump;
pub use instruction::{Instruction, Operand};
pub use opcode::{HALT_ADDRESS, Opcode};
pub use program::{EntryPoint, Program, ProgramError};
