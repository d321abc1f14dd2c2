//! Arithmetic, bitwise and unary operators.

use crate::compile::method::MethodCompiler;
use crate::compile::registry::Claim;
use crate::constant::Constant;
use crate::error::{CompileError, CompileResult};
use crate::externs::well_known;
use crate::il::{OpCode, Operation};
use crate::ops::{BinaryOp, UnaryOp};
use crate::types::Type;
use crate::variables::Var;

pub(super) const OPCODES: &[OpCode] = {
    use OpCode::*;
    &[
        Add, AddOvf, AddOvfUn, Sub, SubOvf, SubOvfUn, Mul, MulOvf, MulOvfUn, Div, DivUn, Rem, RemUn,
        And, Or, Xor, Shl, Shr, ShrUn, Neg, Not,
    ]
};

pub(super) fn translate(c: &mut MethodCompiler<'_>, op: &Operation) -> CompileResult<Claim> {
    if let Some((bin, unsigned)) = binary_op(op.opcode) {
        binary(c, bin, unsigned)?;
        return Ok(Claim::Claimed);
    }
    match op.opcode {
        OpCode::Neg => negate(c)?,
        OpCode::Not => complement(c)?,
        _ => return Ok(Claim::Declined),
    }
    Ok(Claim::Claimed)
}

/// Operator and whether operands are treated as unsigned. Overflow-checked
/// forms lower like their unchecked counterparts.
fn binary_op(opcode: OpCode) -> Option<(BinaryOp, bool)> {
    use OpCode::*;
    Some(match opcode {
        Add | AddOvf => (BinaryOp::Add, false),
        AddOvfUn => (BinaryOp::Add, true),
        Sub | SubOvf => (BinaryOp::Sub, false),
        SubOvfUn => (BinaryOp::Sub, true),
        Mul | MulOvf => (BinaryOp::Mul, false),
        MulOvfUn => (BinaryOp::Mul, true),
        Div => (BinaryOp::Div, false),
        DivUn => (BinaryOp::Div, true),
        Rem => (BinaryOp::Rem, false),
        RemUn => (BinaryOp::Rem, true),
        And => (BinaryOp::And, false),
        Or => (BinaryOp::Or, false),
        Xor => (BinaryOp::Xor, false),
        Shl => (BinaryOp::Shl, false),
        Shr => (BinaryOp::Shr, false),
        ShrUn => (BinaryOp::Shr, true),
        _ => return None,
    })
}

fn result_type(op: BinaryOp, a: &Type, b: &Type) -> CompileResult<Type> {
    let mismatch = || CompileError::TypeMismatch {
        expected: a.clone(),
        found: b.clone(),
    };
    if op.is_bitwise() && *a.underlying() == Type::Boolean && *b.underlying() == Type::Boolean {
        return Ok(Type::Boolean);
    }
    if op.is_shift() {
        let ty = a.stack_type();
        return if ty.is_integral() && b.stack_type().is_integral() {
            Ok(ty)
        } else {
            Err(mismatch())
        };
    }
    let ty = Type::promote(a, b).ok_or_else(mismatch)?;
    if op.is_bitwise() && !ty.is_integral() {
        return Err(mismatch());
    }
    Ok(ty)
}

fn binary(c: &mut MethodCompiler<'_>, op: BinaryOp, unsigned: bool) -> CompileResult<()> {
    let b = c.pop()?;
    let a = c.pop()?;
    let mut ty = result_type(op, &c.ty(a), &c.ty(b))?;
    if unsigned && ty.is_integral() {
        ty = ty.unsigned_counterpart();
    }

    if c.config().constant_folding
        && let (Some(x), Some(y)) = (c.constant_of(a), c.constant_of(b))
        && let Some(value) = Constant::binary(op, &x, &y, &ty)
    {
        c.consume(a)?;
        c.consume(b)?;
        let folded = c.constant(value, &ty)?;
        return c.push(folded);
    }

    let rhs_ty = if op.is_shift() { Type::Int32 } else { ty.clone() };
    let a = c.coerce(a, &ty)?;
    let b = c.coerce(b, &rhs_ty)?;
    let out = c.out_var(&ty)?;
    c.call(&well_known::binary(op, &ty), &[a, b], Some(out))?;
    c.consume(a)?;
    c.consume(b)
}

fn negate(c: &mut MethodCompiler<'_>) -> CompileResult<()> {
    let a = c.pop()?;
    let from = c.ty(a);
    let ty = from.stack_type();
    if !ty.is_numeric() {
        return Err(CompileError::TypeMismatch {
            expected: Type::Int32,
            found: from,
        });
    }
    unary(c, UnaryOp::Neg, a, &ty)
}

/// Logical negation for booleans, xor with all ones for integers.
fn complement(c: &mut MethodCompiler<'_>) -> CompileResult<()> {
    let a = c.pop()?;
    let from = c.ty(a);
    if *from.underlying() == Type::Boolean {
        return unary(c, UnaryOp::Not, a, &Type::Boolean);
    }
    let ty = from.stack_type();
    let ones = match ty {
        Type::Int32 => Constant::I32(-1),
        Type::UInt32 => Constant::U32(u32::MAX),
        Type::Int64 => Constant::I64(-1),
        Type::UInt64 => Constant::U64(u64::MAX),
        _ => {
            return Err(CompileError::TypeMismatch {
                expected: Type::Int32,
                found: from,
            });
        }
    };
    if c.config().constant_folding
        && let Some(x) = c.constant_of(a)
        && let Some(value) = Constant::unary(UnaryOp::Not, &x, &ty)
    {
        c.consume(a)?;
        let folded = c.constant(value, &ty)?;
        return c.push(folded);
    }
    let mask = c.constant(ones, &ty)?;
    let a = c.coerce(a, &ty)?;
    let out = c.out_var(&ty)?;
    c.call(&well_known::binary(BinaryOp::Xor, &ty), &[a, mask], Some(out))?;
    c.consume(a)
}

fn unary(c: &mut MethodCompiler<'_>, op: UnaryOp, a: Var, ty: &Type) -> CompileResult<()> {
    if c.config().constant_folding
        && let Some(x) = c.constant_of(a)
        && let Some(value) = Constant::unary(op, &x, ty)
    {
        c.consume(a)?;
        let folded = c.constant(value, ty)?;
        return c.push(folded);
    }
    let a = c.coerce(a, ty)?;
    let out = c.out_var(ty)?;
    c.call(&well_known::unary(op, ty), &[a], Some(out))?;
    c.consume(a)
}
