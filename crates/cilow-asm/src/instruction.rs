//! Resolved target instructions.

use std::fmt;

use super::opcode::Opcode;

/// Resolved operand: every label has become an address by now.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Operand {
    /// Absolute code address.
    Address(u32),
    /// Heap variable, by data section name.
    Variable(String),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Address(addr) => write!(f, "0x{addr:08X}"),
            Operand::Variable(name) => f.write_str(name),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operand: Option<Operand>,
}

impl Instruction {
    pub fn bare(opcode: Opcode) -> Self {
        debug_assert!(!opcode.has_operand(), "{opcode} requires an operand");
        Self {
            opcode,
            operand: None,
        }
    }

    pub fn with_address(opcode: Opcode, address: u32) -> Self {
        Self {
            opcode,
            operand: Some(Operand::Address(address)),
        }
    }

    pub fn with_variable(opcode: Opcode, name: impl Into<String>) -> Self {
        Self {
            opcode,
            operand: Some(Operand::Variable(name.into())),
        }
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.opcode.size()
    }

    pub fn variable(&self) -> Option<&str> {
        match &self.operand {
            Some(Operand::Variable(name)) => Some(name),
            _ => None,
        }
    }

    pub fn address(&self) -> Option<u32> {
        match self.operand {
            Some(Operand::Address(addr)) => Some(addr),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Some(operand) => write!(f, "{}, {}", self.opcode, operand),
            None => write!(f, "{}", self.opcode),
        }
    }
}
