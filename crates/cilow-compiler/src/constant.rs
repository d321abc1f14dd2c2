//! Compile-time constant values and folding.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use cilow_asm::Literal;

use crate::ops::{BinaryOp, CompareOp, UnaryOp};
use crate::types::Type;

/// A literal value known at compile time.
///
/// Floats compare and hash by bit pattern so constants can key a pool.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Constant {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(String),
    Char(char),
}

impl Constant {
    fn key(&self) -> (u8, u64, Option<&str>) {
        match self {
            Constant::Null => (0, 0, None),
            Constant::Bool(v) => (1, *v as u64, None),
            Constant::I32(v) => (2, *v as u64, None),
            Constant::I64(v) => (3, *v as u64, None),
            Constant::U32(v) => (4, *v as u64, None),
            Constant::U64(v) => (5, *v, None),
            Constant::F32(v) => (6, v.to_bits() as u64, None),
            Constant::F64(v) => (7, v.to_bits(), None),
            Constant::Char(v) => (8, *v as u64, None),
            Constant::Str(v) => (9, 0, Some(v)),
        }
    }

    pub fn natural_type(&self) -> Type {
        match self {
            Constant::Null => Type::Object,
            Constant::Bool(_) => Type::Boolean,
            Constant::I32(_) => Type::Int32,
            Constant::I64(_) => Type::Int64,
            Constant::U32(_) => Type::UInt32,
            Constant::U64(_) => Type::UInt64,
            Constant::F32(_) => Type::Single,
            Constant::F64(_) => Type::Double,
            Constant::Char(_) => Type::Char,
            Constant::Str(_) => Type::String,
        }
    }

    /// Zero value of a type, `None` when the type defaults to null.
    pub fn default_for(ty: &Type) -> Option<Constant> {
        let c = match ty.underlying() {
            Type::Boolean => Constant::Bool(false),
            Type::Char => Constant::Char('\0'),
            Type::SByte | Type::Int16 | Type::Int32 | Type::Byte | Type::UInt16 => {
                Constant::I32(0)
            }
            Type::UInt32 => Constant::U32(0),
            Type::Int64 => Constant::I64(0),
            Type::UInt64 => Constant::U64(0),
            Type::Single => Constant::F32(0.0),
            Type::Double => Constant::F64(0.0),
            _ => return None,
        };
        Some(c)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Constant::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Constant::Bool(v) => Some(*v as i64),
            Constant::I32(v) => Some(*v as i64),
            Constant::I64(v) => Some(*v),
            Constant::U32(v) => Some(*v as i64),
            Constant::U64(v) => Some(*v as i64),
            Constant::Char(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Constant::F32(v) => Some(*v as f64),
            Constant::F64(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    pub fn to_literal(&self) -> Literal {
        match self {
            Constant::Null => Literal::Null,
            Constant::Bool(v) => Literal::Bool(*v),
            Constant::I32(v) => Literal::Int(*v as i64),
            Constant::I64(v) => Literal::Int(*v),
            Constant::U32(v) => Literal::UInt(*v as u64),
            Constant::U64(v) => Literal::UInt(*v),
            Constant::F32(v) => Literal::Float(*v as f64),
            Constant::F64(v) => Literal::Float(*v),
            Constant::Char(v) => Literal::Char(*v),
            Constant::Str(v) => Literal::Str(v.clone()),
        }
    }

    /// Reinterpret this constant as a value of `ty`.
    ///
    /// Used where IL leaves the representation implicit, e.g. `ldc.i4.1`
    /// stored into a bool local. Returns `None` when no such reading exists.
    pub fn retype(&self, ty: &Type) -> Option<Constant> {
        if self.natural_type() == *ty {
            return Some(self.clone());
        }
        match (ty.underlying(), self) {
            (_, Constant::Null) if ty.is_reference() => Some(Constant::Null),
            (Type::Object, _) => Some(self.clone()),
            (Type::Boolean, c) => c.as_i64().map(|v| Constant::Bool(v != 0)),
            (Type::Char, c) => c
                .as_i64()
                .and_then(|v| u32::try_from(v).ok())
                .and_then(char::from_u32)
                .map(Constant::Char),
            (t, Constant::I32(_) | Constant::Bool(_) | Constant::Char(_)) if t.is_integral() => {
                self.convert(t)
            }
            _ => None,
        }
    }

    /// Numeric conversion with IL `conv.*` semantics: integers wrap, floats
    /// truncate toward zero.
    pub fn convert(&self, to: &Type) -> Option<Constant> {
        let to = to.underlying();
        if let Some(f) = self.as_float_value() {
            return match to {
                Type::Single => Some(Constant::F32(f as f32)),
                Type::Double => Some(Constant::F64(f)),
                t if t.is_integral() => Some(Constant::from_i64(f.trunc() as i64, t)),
                _ => None,
            };
        }
        let v = self.as_i64()?;
        match to {
            Type::Single => Some(Constant::F32(if self.is_unsigned() {
                v as u64 as f32
            } else {
                v as f32
            })),
            Type::Double => Some(Constant::F64(if self.is_unsigned() {
                v as u64 as f64
            } else {
                v as f64
            })),
            Type::Boolean => Some(Constant::Bool(v != 0)),
            t if t.is_integral() => Some(Constant::from_i64(v, t)),
            _ => None,
        }
    }

    fn as_float_value(&self) -> Option<f64> {
        match self {
            Constant::F32(v) => Some(*v as f64),
            Constant::F64(v) => Some(*v),
            _ => None,
        }
    }

    fn is_unsigned(&self) -> bool {
        matches!(self, Constant::U32(_) | Constant::U64(_))
    }

    fn from_i64(v: i64, ty: &Type) -> Constant {
        match ty {
            Type::SByte => Constant::I32(v as i8 as i32),
            Type::Byte => Constant::I32(v as u8 as i32),
            Type::Int16 => Constant::I32(v as i16 as i32),
            Type::UInt16 => Constant::I32(v as u16 as i32),
            Type::Char => Constant::Char(char::from_u32(v as u16 as u32).unwrap_or('\0')),
            Type::UInt32 => Constant::U32(v as u32),
            Type::Int64 => Constant::I64(v),
            Type::UInt64 => Constant::U64(v as u64),
            _ => Constant::I32(v as i32),
        }
    }

    /// Fold a binary operator over two constants of the promoted type.
    ///
    /// Returns `None` for anything that would fault or is not foldable,
    /// leaving the operation to run at runtime.
    pub fn binary(op: BinaryOp, a: &Constant, b: &Constant, ty: &Type) -> Option<Constant> {
        match ty {
            Type::Int32 => {
                let (x, y) = (a.as_i64()? as i32, b.as_i64()? as i32);
                int32(op, x, y).map(Constant::I32)
            }
            Type::UInt32 => {
                let (x, y) = (a.as_i64()? as u32, b.as_i64()? as u32);
                uint32(op, x, y).map(Constant::U32)
            }
            Type::Int64 => {
                let (x, y) = (a.as_i64()?, b.as_i64()?);
                int64(op, x, y).map(Constant::I64)
            }
            Type::UInt64 => {
                let (x, y) = (a.as_i64()? as u64, b.as_i64()? as u64);
                uint64(op, x, y).map(Constant::U64)
            }
            Type::Single => {
                let (x, y) = (a.as_f64()? as f32, b.as_f64()? as f32);
                float(op, x as f64, y as f64).map(|v| Constant::F32(v as f32))
            }
            Type::Double => float(op, a.as_f64()?, b.as_f64()?).map(Constant::F64),
            Type::Boolean => {
                let (x, y) = (a.as_i64()? != 0, b.as_i64()? != 0);
                match op {
                    BinaryOp::And => Some(Constant::Bool(x & y)),
                    BinaryOp::Or => Some(Constant::Bool(x | y)),
                    BinaryOp::Xor => Some(Constant::Bool(x ^ y)),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    pub fn unary(op: UnaryOp, a: &Constant, ty: &Type) -> Option<Constant> {
        match (op, ty) {
            (UnaryOp::Neg, Type::Int32) => Some(Constant::I32((a.as_i64()? as i32).wrapping_neg())),
            (UnaryOp::Neg, Type::Int64) => Some(Constant::I64(a.as_i64()?.wrapping_neg())),
            (UnaryOp::Neg, Type::Single) => Some(Constant::F32(-(a.as_f64()? as f32))),
            (UnaryOp::Neg, Type::Double) => Some(Constant::F64(-a.as_f64()?)),
            (UnaryOp::Not, Type::Boolean) => Some(Constant::Bool(a.as_i64()? == 0)),
            (UnaryOp::Not, Type::Int32) => Some(Constant::I32(!(a.as_i64()? as i32))),
            (UnaryOp::Not, Type::UInt32) => Some(Constant::U32(!(a.as_i64()? as u32))),
            (UnaryOp::Not, Type::Int64) => Some(Constant::I64(!a.as_i64()?)),
            (UnaryOp::Not, Type::UInt64) => Some(Constant::U64(!(a.as_i64()? as u64))),
            _ => None,
        }
    }

    pub fn compare(op: CompareOp, a: &Constant, b: &Constant, ty: &Type) -> Option<Constant> {
        let result = if ty.is_floating() {
            op.eval(a.as_f64()?, b.as_f64()?)
        } else if ty.is_unsigned() {
            op.eval(a.as_i64()? as u64, b.as_i64()? as u64)
        } else if ty.is_integral() || *ty == Type::Boolean {
            op.eval(a.as_i64()?, b.as_i64()?)
        } else {
            return None;
        };
        Some(Constant::Bool(result))
    }
}

fn int32(op: BinaryOp, x: i32, y: i32) -> Option<i32> {
    Some(match op {
        BinaryOp::Add => x.wrapping_add(y),
        BinaryOp::Sub => x.wrapping_sub(y),
        BinaryOp::Mul => x.wrapping_mul(y),
        BinaryOp::Div => x.checked_div(y)?,
        BinaryOp::Rem => x.checked_rem(y)?,
        BinaryOp::And => x & y,
        BinaryOp::Or => x | y,
        BinaryOp::Xor => x ^ y,
        BinaryOp::Shl => x.wrapping_shl(y as u32),
        BinaryOp::Shr => x.wrapping_shr(y as u32),
    })
}

fn uint32(op: BinaryOp, x: u32, y: u32) -> Option<u32> {
    Some(match op {
        BinaryOp::Add => x.wrapping_add(y),
        BinaryOp::Sub => x.wrapping_sub(y),
        BinaryOp::Mul => x.wrapping_mul(y),
        BinaryOp::Div => x.checked_div(y)?,
        BinaryOp::Rem => x.checked_rem(y)?,
        BinaryOp::And => x & y,
        BinaryOp::Or => x | y,
        BinaryOp::Xor => x ^ y,
        BinaryOp::Shl => x.wrapping_shl(y),
        BinaryOp::Shr => x.wrapping_shr(y),
    })
}

fn int64(op: BinaryOp, x: i64, y: i64) -> Option<i64> {
    Some(match op {
        BinaryOp::Add => x.wrapping_add(y),
        BinaryOp::Sub => x.wrapping_sub(y),
        BinaryOp::Mul => x.wrapping_mul(y),
        BinaryOp::Div => x.checked_div(y)?,
        BinaryOp::Rem => x.checked_rem(y)?,
        BinaryOp::And => x & y,
        BinaryOp::Or => x | y,
        BinaryOp::Xor => x ^ y,
        BinaryOp::Shl => x.wrapping_shl(y as u32),
        BinaryOp::Shr => x.wrapping_shr(y as u32),
    })
}

fn uint64(op: BinaryOp, x: u64, y: u64) -> Option<u64> {
    Some(match op {
        BinaryOp::Add => x.wrapping_add(y),
        BinaryOp::Sub => x.wrapping_sub(y),
        BinaryOp::Mul => x.wrapping_mul(y),
        BinaryOp::Div => x.checked_div(y)?,
        BinaryOp::Rem => x.checked_rem(y)?,
        BinaryOp::And => x & y,
        BinaryOp::Or => x | y,
        BinaryOp::Xor => x ^ y,
        BinaryOp::Shl => x.wrapping_shl(y as u32),
        BinaryOp::Shr => x.wrapping_shr(y as u32),
    })
}

fn float(op: BinaryOp, x: f64, y: f64) -> Option<f64> {
    Some(match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => x / y,
        BinaryOp::Rem => x % y,
        _ => return None,
    })
}

impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Constant {}

impl Hash for Constant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}
