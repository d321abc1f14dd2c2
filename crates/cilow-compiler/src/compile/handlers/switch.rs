//! `switch`.

use crate::codegen::switch::emit_jump_table;
use crate::compile::method::MethodCompiler;
use crate::compile::registry::Claim;
use crate::error::CompileResult;
use crate::il::{OpCode, Operand, Operation};
use crate::types::Type;

pub(super) const OPCODES: &[OpCode] = {
    use OpCode::*;
    &[
        Switch,
    ]
};

pub(super) fn translate(c: &mut MethodCompiler<'_>, op: &Operation) -> CompileResult<Claim> {
    let (OpCode::Switch, Operand::Targets(targets)) = (op.opcode, &op.operand) else {
        return Ok(Claim::Declined);
    };
    let value = c.pop()?;
    let value = c.coerce(value, &Type::Int32)?;

    if c.config().constant_folding
        && let Some(k) = c.constant_of(value).and_then(|k| k.as_i64())
    {
        c.consume(value)?;
        if let Some(&target) = usize::try_from(k).ok().and_then(|i| targets.get(i)) {
            c.branch(target)?;
        }
        return Ok(Claim::Claimed);
    }

    let mut cases = Vec::with_capacity(targets.len());
    for &target in targets {
        c.flow_to(target, true)?;
        cases.push(c.label_at(target));
    }
    emit_jump_table(c, value, &cases)?;
    c.consume(value)?;
    Ok(Claim::Claimed)
}
