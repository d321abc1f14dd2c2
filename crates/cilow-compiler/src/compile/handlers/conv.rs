//! `conv.*` numeric conversions.

use crate::compile::method::MethodCompiler;
use crate::compile::registry::Claim;
use crate::error::CompileResult;
use crate::il::{OpCode, Operation};
use crate::types::Type;

pub(super) const OPCODES: &[OpCode] = {
    use OpCode::*;
    &[
        ConvI1, ConvOvfI1, ConvOvfI1Un, ConvU1, ConvOvfU1, ConvOvfU1Un, ConvI2, ConvOvfI2,
        ConvOvfI2Un, ConvU2, ConvOvfU2, ConvOvfU2Un, ConvI4, ConvOvfI4, ConvOvfI4Un, ConvU4,
        ConvOvfU4, ConvOvfU4Un, ConvI8, ConvI, ConvOvfI8, ConvOvfI8Un, ConvOvfI, ConvOvfIUn, ConvU8,
        ConvU, ConvOvfU8, ConvOvfU8Un, ConvOvfU, ConvOvfUUn, ConvR4, ConvR8, ConvRUn,
    ]
};

pub(super) fn translate(c: &mut MethodCompiler<'_>, op: &Operation) -> CompileResult<Claim> {
    let Some(to) = target(op.opcode) else {
        return Ok(Claim::Declined);
    };
    let value = c.pop()?;
    let out = c.convert(value, &to)?;
    c.push(out)?;
    c.consume(out)?;
    Ok(Claim::Claimed)
}

fn target(opcode: OpCode) -> Option<Type> {
    use OpCode::*;
    Some(match opcode {
        ConvI1 | ConvOvfI1 | ConvOvfI1Un => Type::SByte,
        ConvU1 | ConvOvfU1 | ConvOvfU1Un => Type::Byte,
        ConvI2 | ConvOvfI2 | ConvOvfI2Un => Type::Int16,
        ConvU2 | ConvOvfU2 | ConvOvfU2Un => Type::UInt16,
        ConvI4 | ConvOvfI4 | ConvOvfI4Un => Type::Int32,
        ConvU4 | ConvOvfU4 | ConvOvfU4Un => Type::UInt32,
        ConvI8 | ConvI | ConvOvfI8 | ConvOvfI8Un | ConvOvfI | ConvOvfIUn => Type::Int64,
        ConvU8 | ConvU | ConvOvfU8 | ConvOvfU8Un | ConvOvfU | ConvOvfUUn => Type::UInt64,
        ConvR4 => Type::Single,
        ConvR8 | ConvRUn => Type::Double,
        _ => return None,
    })
}
