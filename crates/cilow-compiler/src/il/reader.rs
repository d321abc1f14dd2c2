//! Decoding raw IL bytes into [`Operation`]s.

use std::fmt;

use crate::metadata::{Member, MetadataError, MetadataResolver};

use super::opcode::{Implied, OpCode, OperandShape};

/// A local, argument or the instance pointer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Slot {
    Local(u16),
    /// Declared parameter index, excluding the instance.
    Argument(u16),
    This,
}

#[derive(Clone, PartialEq, Debug)]
pub enum Operand {
    None,
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    /// Absolute IL offset of a branch target.
    Target(u32),
    Targets(Vec<u32>),
    Slot(Slot),
    Member(Member),
    String(String),
    Byte(u8),
}

/// One decoded IL instruction.
#[derive(Clone, PartialEq, Debug)]
pub struct Operation {
    pub offset: u32,
    pub opcode: OpCode,
    pub operand: Operand,
}

impl Operation {
    pub fn slot(&self) -> Option<Slot> {
        match self.operand {
            Operand::Slot(slot) => Some(slot),
            _ => None,
        }
    }

    pub fn target(&self) -> Option<u32> {
        match self.operand {
            Operand::Target(t) => Some(t),
            _ => None,
        }
    }

    pub fn int(&self) -> Option<i32> {
        match self.operand {
            Operand::Int32(v) => Some(v),
            _ => None,
        }
    }

    pub fn member(&self) -> Option<&Member> {
        match &self.operand {
            Operand::Member(m) => Some(m),
            _ => None,
        }
    }

    /// Offsets this instruction may transfer control to.
    pub fn branch_targets(&self) -> Vec<u32> {
        match &self.operand {
            Operand::Target(t) => vec![*t],
            Operand::Targets(ts) => ts.clone(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL_{:04x}: {}", self.offset, self.opcode.name())?;
        match &self.operand {
            Operand::None => Ok(()),
            Operand::Int32(v) => write!(f, " {v}"),
            Operand::Int64(v) => write!(f, " {v}"),
            Operand::Float32(v) => write!(f, " {v}"),
            Operand::Float64(v) => write!(f, " {v}"),
            Operand::Target(t) => write!(f, " IL_{t:04x}"),
            Operand::Targets(ts) => {
                f.write_str(" (")?;
                for (i, t) in ts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "IL_{t:04x}")?;
                }
                f.write_str(")")
            }
            Operand::Slot(Slot::Local(i)) => write!(f, " V_{i}"),
            Operand::Slot(Slot::Argument(i)) => write!(f, " A_{i}"),
            Operand::Slot(Slot::This) => f.write_str(" this"),
            Operand::Member(m) => write!(f, " <{}>", m.kind()),
            Operand::String(s) => write!(f, " {s:?}"),
            Operand::Byte(b) => write!(f, " {b}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("IL truncated at offset {offset:#06x}")]
    Truncated { offset: u32 },
    #[error("unknown opcode {prefix}{byte:#04x} at offset {offset:#06x}")]
    UnknownOpcode {
        offset: u32,
        byte: u8,
        prefix: &'static str,
    },
    #[error("{kind} index {index} out of range at offset {offset:#06x}")]
    BadSlot {
        offset: u32,
        kind: &'static str,
        index: u32,
    },
    #[error("at offset {offset:#06x}: {source}")]
    Metadata {
        offset: u32,
        #[source]
        source: MetadataError,
    },
}

/// Lazy decoder over a method's IL stream.
///
/// Yields operations in offset order and stops after the first error.
pub struct Reader<'a, R: MetadataResolver + ?Sized> {
    code: &'a [u8],
    pos: usize,
    resolver: &'a R,
    is_static: bool,
    params: Option<usize>,
    locals: Option<usize>,
    failed: bool,
}

impl<'a, R: MetadataResolver + ?Sized> Reader<'a, R> {
    pub fn new(code: &'a [u8], is_static: bool, resolver: &'a R) -> Self {
        Self {
            code,
            pos: 0,
            resolver,
            is_static,
            params: None,
            locals: None,
            failed: false,
        }
    }

    /// Check slot indices against declared counts.
    pub fn with_slots(mut self, params: usize, locals: usize) -> Self {
        self.params = Some(params);
        self.locals = Some(locals);
        self
    }

    fn take(&mut self, n: usize, offset: u32) -> Result<&'a [u8], DecodeError> {
        let end = self.pos + n;
        if end > self.code.len() {
            return Err(DecodeError::Truncated { offset });
        }
        let bytes = &self.code[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self, offset: u32) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, offset)?);
        Ok(out)
    }

    fn u8(&mut self, offset: u32) -> Result<u8, DecodeError> {
        Ok(self.take(1, offset)?[0])
    }

    fn i32(&mut self, offset: u32) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.take_array(offset)?))
    }

    fn u32(&mut self, offset: u32) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.take_array(offset)?))
    }

    fn u16(&mut self, offset: u32) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.take_array(offset)?))
    }

    fn argument(&self, raw: u16, offset: u32) -> Result<Slot, DecodeError> {
        let slot = if self.is_static {
            Slot::Argument(raw)
        } else if raw == 0 {
            Slot::This
        } else {
            Slot::Argument(raw - 1)
        };
        if let (Slot::Argument(index), Some(count)) = (slot, self.params)
            && index as usize >= count
        {
            return Err(DecodeError::BadSlot {
                offset,
                kind: "argument",
                index: raw as u32,
            });
        }
        Ok(slot)
    }

    fn local(&self, index: u16, offset: u32) -> Result<Slot, DecodeError> {
        if let Some(count) = self.locals
            && index as usize >= count
        {
            return Err(DecodeError::BadSlot {
                offset,
                kind: "local",
                index: index as u32,
            });
        }
        Ok(Slot::Local(index))
    }

    fn member(&self, token: u32, offset: u32) -> Result<Member, DecodeError> {
        self.resolver
            .resolve(token)
            .map_err(|source| DecodeError::Metadata { offset, source })
    }

    fn relative(&self, delta: i64) -> u32 {
        (self.pos as i64 + delta) as u32
    }

    fn decode(&mut self) -> Result<Operation, DecodeError> {
        let offset = self.pos as u32;
        let first = self.u8(offset)?;
        let opcode = if OpCode::is_prefix_byte(first) {
            let second = self.u8(offset)?;
            OpCode::from_extended(second).ok_or(DecodeError::UnknownOpcode {
                offset,
                byte: second,
                prefix: "0xfe ",
            })?
        } else {
            OpCode::from_byte(first).ok_or(DecodeError::UnknownOpcode {
                offset,
                byte: first,
                prefix: "",
            })?
        };

        let operand = match opcode.shape() {
            OperandShape::None => match opcode.implied() {
                Some(Implied::Arg(i)) => Operand::Slot(self.argument(i, offset)?),
                Some(Implied::Local(i)) => Operand::Slot(self.local(i, offset)?),
                Some(Implied::Int(v)) => Operand::Int32(v),
                None => Operand::None,
            },
            OperandShape::ShortInt => Operand::Int32(self.u8(offset)? as i8 as i32),
            OperandShape::Int32 => Operand::Int32(self.i32(offset)?),
            OperandShape::Int64 => Operand::Int64(i64::from_le_bytes(self.take_array(offset)?)),
            OperandShape::Float32 => Operand::Float32(f32::from_le_bytes(self.take_array(offset)?)),
            OperandShape::Float64 => Operand::Float64(f64::from_le_bytes(self.take_array(offset)?)),
            OperandShape::ShortBranch => {
                let delta = self.u8(offset)? as i8 as i64;
                Operand::Target(self.relative(delta))
            }
            OperandShape::Branch => {
                let delta = self.i32(offset)? as i64;
                Operand::Target(self.relative(delta))
            }
            OperandShape::Switch => {
                let count = self.u32(offset)? as usize;
                let deltas = (0..count)
                    .map(|_| self.i32(offset))
                    .collect::<Result<Vec<_>, _>>()?;
                // Targets are relative to the end of the whole instruction.
                let targets = deltas
                    .into_iter()
                    .map(|d| self.relative(d as i64))
                    .collect();
                Operand::Targets(targets)
            }
            OperandShape::Token => {
                let token = self.u32(offset)?;
                Operand::Member(self.member(token, offset)?)
            }
            OperandShape::StringToken => {
                let token = self.u32(offset)?;
                match self.member(token, offset)? {
                    Member::String { value } => Operand::String(value),
                    other => {
                        return Err(DecodeError::Metadata {
                            offset,
                            source: MetadataError::WrongKind {
                                token,
                                found: other.kind(),
                                expected: "string",
                            },
                        });
                    }
                }
            }
            OperandShape::ShortArg => {
                let raw = self.u8(offset)? as u16;
                Operand::Slot(self.argument(raw, offset)?)
            }
            OperandShape::Arg => {
                let raw = self.u16(offset)?;
                Operand::Slot(self.argument(raw, offset)?)
            }
            OperandShape::ShortLocal => {
                let index = self.u8(offset)? as u16;
                Operand::Slot(self.local(index, offset)?)
            }
            OperandShape::Local => {
                let index = self.u16(offset)?;
                Operand::Slot(self.local(index, offset)?)
            }
            OperandShape::Byte => Operand::Byte(self.u8(offset)?),
        };

        Ok(Operation {
            offset,
            opcode,
            operand,
        })
    }
}

impl<R: MetadataResolver + ?Sized> Iterator for Reader<'_, R> {
    type Item = Result<Operation, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.code.len() {
            return None;
        }
        let result = self.decode();
        self.failed = result.is_err();
        Some(result)
    }
}

/// Decode a whole method body.
pub fn read_all<R: MetadataResolver + ?Sized>(
    code: &[u8],
    is_static: bool,
    resolver: &R,
) -> Result<Vec<Operation>, DecodeError> {
    Reader::new(code, is_static, resolver).collect()
}
