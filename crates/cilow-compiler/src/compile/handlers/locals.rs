//! Locals, arguments and indirect access through their addresses.
//!
//! The address of a slot is the slot itself: `ldloca` pushes the same
//! handle as `ldloc`, and `ldind`/`stind` read and write through it.

use crate::compile::method::MethodCompiler;
use crate::compile::registry::Claim;
use crate::error::CompileResult;
use crate::il::{OpCode, Operation};
use crate::variables::Var;

pub(super) const OPCODES: &[OpCode] = {
    use OpCode::*;
    &[
        Ldloc0, Ldloc1, Ldloc2, Ldloc3, LdlocS, Ldloc, Ldarg0, Ldarg1, Ldarg2, Ldarg3, LdargS,
        Ldarg, LdlocaS, Ldloca, LdargaS, Ldarga, Stloc0, Stloc1, Stloc2, Stloc3, StlocS, Stloc,
        StargS, Starg, LdindI1, LdindU1, LdindI2, LdindU2, LdindI4, LdindU4, LdindI8, LdindI,
        LdindR4, LdindR8, LdindRef, Ldobj, StindRef, StindI1, StindI2, StindI4, StindI8, StindR4,
        StindR8, StindI, Stobj,
    ]
};

pub(super) fn translate(c: &mut MethodCompiler<'_>, op: &Operation) -> CompileResult<Claim> {
    use OpCode::*;
    match op.opcode {
        Ldloc0 | Ldloc1 | Ldloc2 | Ldloc3 | LdlocS | Ldloc | Ldarg0 | Ldarg1 | Ldarg2 | Ldarg3
        | LdargS | Ldarg | LdlocaS | Ldloca | LdargaS | Ldarga => {
            let Some(slot) = op.slot() else {
                return Ok(Claim::Declined);
            };
            let var = c.slot_var(slot)?;
            c.push(var)?;
        }
        Stloc0 | Stloc1 | Stloc2 | Stloc3 | StlocS | Stloc | StargS | Starg => {
            let Some(slot) = op.slot() else {
                return Ok(Claim::Declined);
            };
            let value = c.pop()?;
            let dst = c.slot_var(slot)?;
            store(c, value, dst)?;
        }
        LdindI1 | LdindU1 | LdindI2 | LdindU2 | LdindI4 | LdindU4 | LdindI8 | LdindI
        | LdindR4 | LdindR8 | LdindRef | Ldobj => {
            c.peek(0)?;
        }
        StindRef | StindI1 | StindI2 | StindI4 | StindI8 | StindR4 | StindR8 | StindI | Stobj => {
            let value = c.pop()?;
            let address = c.pop()?;
            store(c, value, address)?;
            c.consume(address)?;
        }
        _ => return Ok(Claim::Declined),
    }
    Ok(Claim::Claimed)
}

/// `dst = value`, consuming `value`.
pub(super) fn store(c: &mut MethodCompiler<'_>, value: Var, dst: Var) -> CompileResult<()> {
    c.protect_stack(dst)?;
    let ty = c.ty(dst);
    let value = c.coerce(value, &ty)?;
    c.copy(value, dst)?;
    c.consume(value)
}
