//! Unconditional, boolean and two-operand branches, and `ret`.

use crate::compile::method::MethodCompiler;
use crate::compile::registry::Claim;
use crate::constant::Constant;
use crate::error::{CompileError, CompileResult};
use crate::il::{OpCode, Operation};
use crate::ops::CompareOp;
use crate::types::Type;

use super::compare::compare_and_branch;

pub(super) const OPCODES: &[OpCode] = {
    use OpCode::*;
    &[
        Ret, Br, BrS, Brtrue, BrtrueS, Brfalse, BrfalseS, Beq, BeqS, BneUn, BneUnS, Bge, BgeS,
        BgeUn, BgeUnS, Bgt, BgtS, BgtUn, BgtUnS, Ble, BleS, BleUn, BleUnS, Blt, BltS, BltUn, BltUnS,
    ]
};

pub(super) fn translate(c: &mut MethodCompiler<'_>, op: &Operation) -> CompileResult<Claim> {
    use OpCode::*;
    if op.opcode == Ret {
        c.emit_return()?;
        return Ok(Claim::Claimed);
    }
    let Some(target) = op.target() else {
        return Ok(Claim::Declined);
    };
    match op.opcode {
        Br | BrS => c.branch(target)?,
        Brtrue | BrtrueS => truthiness(c, target, true)?,
        Brfalse | BrfalseS => truthiness(c, target, false)?,
        _ => {
            let Some((cmp, unordered)) = two_operand(op.opcode) else {
                return Ok(Claim::Declined);
            };
            let b = c.pop()?;
            let a = c.pop()?;
            compare_and_branch(c, cmp, unordered, a, b, target, true)?;
        }
    }
    Ok(Claim::Claimed)
}

fn two_operand(opcode: OpCode) -> Option<(CompareOp, bool)> {
    use OpCode::*;
    Some(match opcode {
        Beq | BeqS => (CompareOp::Eq, false),
        BneUn | BneUnS => (CompareOp::Ne, true),
        Bge | BgeS => (CompareOp::Ge, false),
        BgeUn | BgeUnS => (CompareOp::Ge, true),
        Bgt | BgtS => (CompareOp::Gt, false),
        BgtUn | BgtUnS => (CompareOp::Gt, true),
        Ble | BleS => (CompareOp::Le, false),
        BleUn | BleUnS => (CompareOp::Le, true),
        Blt | BltS => (CompareOp::Lt, false),
        BltUn | BltUnS => (CompareOp::Lt, true),
        _ => return None,
    })
}

/// `brtrue`/`brfalse`: booleans branch on themselves, integers against
/// zero, references against null.
fn truthiness(c: &mut MethodCompiler<'_>, target: u32, when_true: bool) -> CompileResult<()> {
    let value = c.pop()?;
    let ty = c.ty(value);

    if *ty.underlying() == Type::Boolean {
        if c.config().constant_folding
            && let Some(Constant::Bool(v)) = c.constant_of(value)
        {
            c.consume(value)?;
            if v == when_true {
                c.branch(target)?;
            }
            return Ok(());
        }
        return if when_true {
            c.branch_if(value, target)
        } else {
            c.branch_unless(value, target)
        };
    }

    let zero = if ty.is_reference() {
        c.null(&Type::Object)?
    } else if ty.stack_type().is_integral() {
        let stack_ty = ty.stack_type();
        let zero = Constant::I32(0).convert(&stack_ty).unwrap_or(Constant::I32(0));
        c.constant(zero, &stack_ty)?
    } else {
        return Err(CompileError::TypeMismatch {
            expected: Type::Boolean,
            found: ty,
        });
    };
    compare_and_branch(c, CompareOp::Ne, false, value, zero, target, when_true)
}
