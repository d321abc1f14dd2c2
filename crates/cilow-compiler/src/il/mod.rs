//! CIL instruction decoding.

mod opcode;
mod reader;

#[cfg(test)]
mod reader_tests;

pub use opcode::{Implied, OpCode, OperandShape};
pub use reader::{DecodeError, Operand, Operation, Reader, Slot, read_all};
