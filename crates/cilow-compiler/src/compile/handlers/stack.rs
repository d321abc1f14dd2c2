//! Constants, `dup`, `pop` and instructions that lower to nothing.

use crate::compile::method::MethodCompiler;
use crate::compile::registry::Claim;
use crate::constant::Constant;
use crate::error::CompileResult;
use crate::il::{OpCode, Operand, Operation};
use crate::types::Type;

pub(super) const OPCODES: &[OpCode] = {
    use OpCode::*;
    &[
        Nop, Break, Volatile, Tail, Readonly, Unaligned, No, Constrained, Dup, Pop, Ldnull, Ldstr,
        LdcI4M1, LdcI40, LdcI41, LdcI42, LdcI43, LdcI44, LdcI45, LdcI46, LdcI47, LdcI48, LdcI4S,
        LdcI4, LdcI8, LdcR4, LdcR8,
    ]
};

pub(super) fn translate(c: &mut MethodCompiler<'_>, op: &Operation) -> CompileResult<Claim> {
    match op.opcode {
        OpCode::Nop
        | OpCode::Break
        | OpCode::Volatile
        | OpCode::Tail
        | OpCode::Readonly
        | OpCode::Unaligned
        | OpCode::No
        | OpCode::Constrained => {}
        OpCode::Dup => {
            let top = c.peek(0)?;
            c.push(top)?;
        }
        OpCode::Pop => {
            let top = c.pop()?;
            c.consume(top)?;
        }
        OpCode::Ldnull => {
            let null = c.null(&Type::Object)?;
            c.push(null)?;
        }
        OpCode::Ldstr => {
            let Operand::String(s) = &op.operand else {
                return Ok(Claim::Declined);
            };
            let var = c.const_str(s)?;
            c.push(var)?;
        }
        _ => {
            let Some((value, ty)) = literal(op) else {
                return Ok(Claim::Declined);
            };
            let var = c.constant(value, &ty)?;
            c.push(var)?;
        }
    }
    Ok(Claim::Claimed)
}

fn literal(op: &Operation) -> Option<(Constant, Type)> {
    let is_ldc = matches!(
        op.opcode,
        OpCode::LdcI4M1
            | OpCode::LdcI40
            | OpCode::LdcI41
            | OpCode::LdcI42
            | OpCode::LdcI43
            | OpCode::LdcI44
            | OpCode::LdcI45
            | OpCode::LdcI46
            | OpCode::LdcI47
            | OpCode::LdcI48
            | OpCode::LdcI4S
            | OpCode::LdcI4
            | OpCode::LdcI8
            | OpCode::LdcR4
            | OpCode::LdcR8
    );
    if !is_ldc {
        return None;
    }
    match op.operand {
        Operand::Int32(v) => Some((Constant::I32(v), Type::Int32)),
        Operand::Int64(v) => Some((Constant::I64(v), Type::Int64)),
        Operand::Float32(v) => Some((Constant::F32(v), Type::Single)),
        Operand::Float64(v) => Some((Constant::F64(v), Type::Double)),
        _ => None,
    }
}
