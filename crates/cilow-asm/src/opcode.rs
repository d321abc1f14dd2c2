//! Target VM opcode vocabulary.
//!
//! Nine opcodes, two shapes: no operand (4 bytes) and one address-or-variable
//! operand (8 bytes). Addresses are byte offsets into the code section, so the
//! size table is what turns an instruction index into an address.

use std::fmt;

/// Address the VM treats as "return to host". Jumping here ends execution.
pub const HALT_ADDRESS: u32 = 0xFFFF_FFFC;

/// Target VM opcode.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Opcode {
    Nop,
    Push,
    Pop,
    JumpIfFalse,
    Jump,
    Extern,
    Annotation,
    JumpIndirect,
    Copy,
}

impl Opcode {
    pub const ALL: [Opcode; 9] = [
        Opcode::Nop,
        Opcode::Push,
        Opcode::Pop,
        Opcode::JumpIfFalse,
        Opcode::Jump,
        Opcode::Extern,
        Opcode::Annotation,
        Opcode::JumpIndirect,
        Opcode::Copy,
    ];

    /// Encoded size in bytes.
    #[inline]
    pub fn size(self) -> u32 {
        if self.has_operand() { 8 } else { 4 }
    }

    /// Whether the instruction carries its single operand.
    #[inline]
    pub fn has_operand(self) -> bool {
        !matches!(self, Opcode::Nop | Opcode::Pop | Opcode::Copy)
    }

    /// Whether the operand is a code address (as opposed to a heap variable).
    #[inline]
    pub fn takes_address(self) -> bool {
        matches!(self, Opcode::Jump | Opcode::JumpIfFalse)
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Nop => "NOP",
            Opcode::Push => "PUSH",
            Opcode::Pop => "POP",
            Opcode::JumpIfFalse => "JUMP_IF_FALSE",
            Opcode::Jump => "JUMP",
            Opcode::Extern => "EXTERN",
            Opcode::Annotation => "ANNOTATION",
            Opcode::JumpIndirect => "JUMP_INDIRECT",
            Opcode::Copy => "COPY",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.mnemonic() == s)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
