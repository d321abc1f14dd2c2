//! Assembled program: data section, code section and entry points.
//!
//! Text format:
//! ```text
//! .data_start
//!     .export count
//!     count: %SystemInt32, 0
//! .data_end
//! .code_start
//!     .export Add
//!     Add:
//!         PUSH, __Add_a
//!         JUMP_INDIRECT, __return_address
//! .code_end
//! ```
//! Private entry points are marked with a `# Name` comment instead of a label.

use std::collections::HashSet;
use std::fmt::Write as _;

use super::data::DataEntry;
use super::instruction::{Instruction, Operand};
use super::opcode::{HALT_ADDRESS, Opcode};

/// Named code position, one per compiled method.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EntryPoint {
    pub name: String,
    pub address: u32,
    pub exported: bool,
}

/// Structural problems found by [`Program::validate`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProgramError {
    #[error("duplicate data entry `{0}`")]
    DuplicateName(String),

    #[error("instruction at 0x{address:08X} references unknown variable `{name}`")]
    UnknownVariable { address: u32, name: String },

    #[error("instruction at 0x{address:08X} jumps to 0x{target:08X}, which is not an instruction")]
    BadJumpTarget { address: u32, target: u32 },

    #[error("instruction at 0x{address:08X} has a malformed operand")]
    MalformedOperand { address: u32 },

    #[error("entry point `{name}` points at 0x{address:08X}, outside the code section")]
    BadEntryPoint { name: String, address: u32 },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    pub data: Vec<DataEntry>,
    pub code: Vec<Instruction>,
    pub entries: Vec<EntryPoint>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data_index(&self, name: &str) -> Option<usize> {
        self.data.iter().position(|d| d.name == name)
    }

    pub fn data_entry(&self, name: &str) -> Option<&DataEntry> {
        self.data.iter().find(|d| d.name == name)
    }

    pub fn entry(&self, name: &str) -> Option<&EntryPoint> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Total code size in bytes.
    pub fn code_size(&self) -> u32 {
        self.code.iter().map(Instruction::size).sum()
    }

    /// Byte address of every instruction, in order.
    pub fn addresses(&self) -> Vec<u32> {
        let mut addr = 0u32;
        self.code
            .iter()
            .map(|instr| {
                let here = addr;
                addr += instr.size();
                here
            })
            .collect()
    }

    /// Instruction index for a byte address, if one starts exactly there.
    pub fn instruction_at(&self, address: u32) -> Option<usize> {
        self.addresses().binary_search(&address).ok()
    }

    /// Check operand shapes, variable references and static jump targets.
    pub fn validate(&self) -> Result<(), ProgramError> {
        let mut names = HashSet::new();
        for entry in &self.data {
            if !names.insert(entry.name.as_str()) {
                return Err(ProgramError::DuplicateName(entry.name.clone()));
            }
        }

        let addresses = self.addresses();
        let code_size = self.code_size();
        for (instr, &address) in self.code.iter().zip(&addresses) {
            match (&instr.operand, instr.opcode.has_operand()) {
                (None, false) => {}
                (Some(Operand::Address(target)), true) if instr.opcode.takes_address() => {
                    let lands = *target == HALT_ADDRESS
                        || *target == code_size
                        || addresses.binary_search(target).is_ok();
                    if !lands {
                        return Err(ProgramError::BadJumpTarget {
                            address,
                            target: *target,
                        });
                    }
                }
                (Some(Operand::Variable(name)), true) if !instr.opcode.takes_address() => {
                    if !names.contains(name.as_str()) {
                        return Err(ProgramError::UnknownVariable {
                            address,
                            name: name.clone(),
                        });
                    }
                }
                _ => return Err(ProgramError::MalformedOperand { address }),
            }
        }

        for entry in &self.entries {
            if entry.address > code_size {
                return Err(ProgramError::BadEntryPoint {
                    name: entry.name.clone(),
                    address: entry.address,
                });
            }
        }
        Ok(())
    }

    /// Serialize to assembly text.
    pub fn to_assembly(&self) -> String {
        let mut out = String::new();

        out.push_str(".data_start\n");
        for entry in &self.data {
            if entry.export {
                writeln!(out, "    .export {}", entry.name).unwrap();
            }
            if let Some(sync) = entry.sync {
                writeln!(out, "    .sync {}, {}", entry.name, sync).unwrap();
            }
            writeln!(
                out,
                "    {}: %{}, {}",
                entry.name, entry.type_name, entry.init
            )
            .unwrap();
        }
        out.push_str(".data_end\n");

        out.push_str(".code_start\n");
        let addresses = self.addresses();
        for (instr, &address) in self.code.iter().zip(&addresses) {
            write_entries_at(&mut out, &self.entries, address);
            writeln!(out, "        {instr}").unwrap();
        }
        write_entries_at(&mut out, &self.entries, self.code_size());
        out.push_str(".code_end\n");
        out
    }

    /// Count instructions with the given opcode.
    pub fn count(&self, opcode: Opcode) -> usize {
        self.code.iter().filter(|i| i.opcode == opcode).count()
    }
}

fn write_entries_at(out: &mut String, entries: &[EntryPoint], address: u32) {
    for entry in entries.iter().filter(|e| e.address == address) {
        if entry.exported {
            writeln!(out, "    .export {}", entry.name).unwrap();
            writeln!(out, "    {}:", entry.name).unwrap();
        } else {
            writeln!(out, "    # {}", entry.name).unwrap();
        }
    }
}
