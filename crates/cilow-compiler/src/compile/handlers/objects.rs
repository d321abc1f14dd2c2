//! Object creation, casts, boxing and exceptions.

use crate::compile::method::MethodCompiler;
use crate::compile::registry::Claim;
use crate::constant::Constant;
use crate::error::{CompileError, CompileResult};
use crate::externs::{ExternSignature, well_known};
use crate::il::{OpCode, Operation};
use crate::metadata::{Member, MethodRef};
use crate::types::Type;
use crate::variables::{Var, VarKind};

use super::locals::store;

fn type_operand(op: &Operation) -> Option<Type> {
    match op.member() {
        Some(Member::Type { ty }) => Some(ty.clone()),
        _ => None,
    }
}

pub(super) const OPCODES: &[OpCode] = {
    use OpCode::*;
    &[
        Newobj, Castclass, Isinst, Box, Unbox, UnboxAny, Initobj, Throw, Rethrow,
    ]
};

pub(super) fn translate(c: &mut MethodCompiler<'_>, op: &Operation) -> CompileResult<Claim> {
    match op.opcode {
        OpCode::Newobj => {
            let Some(Member::Method(ctor)) = op.member() else {
                return Ok(Claim::Declined);
            };
            if ctor.declaring.is_delegate() {
                return Ok(Claim::Declined);
            }
            let ctor = ctor.clone();
            new_object(c, &ctor)?;
        }
        OpCode::Castclass | OpCode::Isinst => {
            let Some(target) = type_operand(op) else {
                return Ok(Claim::Declined);
            };
            cast(c, &target, op.opcode == OpCode::Castclass)?;
        }
        OpCode::Box => {
            let value = c.pop()?;
            if c.is_constant(value) || matches!(c.kind(value), VarKind::Temporary(_)) {
                let boxed = c.recast(value, &Type::Object)?;
                c.push(boxed)?;
                c.consume(boxed)?;
            } else {
                // Boxing snapshots the value; later stores to the slot must
                // not show through.
                let boxed = c.fresh(&Type::Object)?;
                c.copy(value, boxed)?;
                c.consume(value)?;
            }
        }
        OpCode::Unbox | OpCode::UnboxAny => {
            let Some(target) = type_operand(op) else {
                return Ok(Claim::Declined);
            };
            if target.is_value_type() {
                let value = c.pop()?;
                let unboxed = c.recast(value, &target)?;
                c.push(unboxed)?;
                c.consume(unboxed)?;
            } else {
                cast(c, &target, true)?;
            }
        }
        OpCode::Initobj => {
            let Some(ty) = type_operand(op) else {
                return Ok(Claim::Declined);
            };
            init_object(c, &ty)?;
        }
        OpCode::Throw => {
            let exception = c.pop()?;
            c.consume(exception)?;
            c.emit_fault("exception thrown")?;
            c.end_block()?;
        }
        OpCode::Rethrow => {
            c.emit_fault("exception rethrown")?;
            c.end_block()?;
        }
        _ => return Ok(Claim::Declined),
    }
    Ok(Claim::Claimed)
}

fn new_object(c: &mut MethodCompiler<'_>, ctor: &MethodRef) -> CompileResult<()> {
    let ty = &ctor.declaring;
    if matches!(ty, Type::Behaviour(_)) || c.ctx().unit.is_self_type(ty) {
        return Err(CompileError::Unsupported(format!(
            "behaviour `{ty}` cannot be instantiated"
        )));
    }
    let args = c.pop_n(ctor.params.len())?;
    let mut coerced = Vec::with_capacity(args.len());
    for (&arg, param) in args.iter().zip(&ctor.params) {
        coerced.push(c.coerce(arg, param)?);
    }
    let out = c.out_var(ty)?;
    c.call(&ExternSignature::from_method(ctor), &coerced, Some(out))?;
    c.consume_all(&coerced)
}

/// Whether a cast to `target` needs no runtime check.
fn is_static_cast(c: &MethodCompiler<'_>, value: Var, target: &Type) -> bool {
    let from = c.ty(value);
    target.is_delegate()
        || *target == Type::Object
        || target.is_assignable_from(&from)
        || c.constant_of(value).is_some_and(|v| v.is_null())
        || matches!(target, Type::Behaviour(_))
        || c.ctx().unit.is_self_type(target)
}

/// `castclass` faults on a mismatch; `isinst` yields null instead.
fn cast(c: &mut MethodCompiler<'_>, target: &Type, strict: bool) -> CompileResult<()> {
    let value = c.pop()?;
    if is_static_cast(c, value, target) {
        let cast = c.recast(value, target)?;
        c.push(cast)?;
        return c.consume(cast);
    }

    let matched = c.new_label();
    let check = c.new_label();
    let result = if strict {
        None
    } else {
        let result = c.fresh(target)?;
        let null = c.null(target)?;
        c.copy(null, result)?;
        Some(result)
    };

    let null = c.null(&Type::Object)?;
    let is_null = c.eval(&well_known::reference_equals(), &[value, null], &Type::Boolean)?;
    c.jump_unless(is_null, check)?;
    c.jump(matched);

    c.place(check)?;
    let runtime = c.eval(&well_known::get_type(), &[value], &Type::SystemType)?;
    let name = c.eval(&well_known::type_full_name(), &[runtime], &Type::String)?;
    c.consume(runtime)?;
    let expected = c.const_str(&target.full_name())?;
    let same = c.eval(&well_known::string_equals(), &[name, expected], &Type::Boolean)?;
    c.consume(name)?;

    match result {
        None => {
            let fail = c.new_label();
            c.jump_unless(same, fail)?;
            c.jump(matched);
            c.place(fail)?;
            c.emit_fault(&format!("invalid cast to `{target}`"))?;
            c.place(matched)?;
            let cast = c.recast(value, target)?;
            c.push(cast)?;
            c.consume(cast)
        }
        Some(result) => {
            c.jump_unless(same, matched)?;
            c.copy(value, result)?;
            c.place(matched)?;
            c.consume(value)
        }
    }
}

/// `*addr = default(T)`.
fn init_object(c: &mut MethodCompiler<'_>, ty: &Type) -> CompileResult<()> {
    let address = c.pop()?;
    if let Some(zero) = Constant::default_for(ty) {
        let value = c.constant(zero, ty)?;
        store(c, value, address)?;
    } else if !ty.is_value_type() {
        let value = c.null(ty)?;
        store(c, value, address)?;
    } else {
        c.protect_stack(address)?;
        let sig = ExternSignature::new(ty, "ctor", &[], ty, true);
        c.call(&sig, &[], Some(address))?;
    }
    c.consume(address)
}
