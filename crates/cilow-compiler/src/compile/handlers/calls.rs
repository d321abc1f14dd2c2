//! `call` and `callvirt`.
//!
//! Several translators share these opcodes and are tried in priority order:
//! the instance's own transform and game object, methods of this unit,
//! methods of other behaviours, and finally plain extern calls.

use crate::codegen::events::{EventCall, send_event};
use crate::compile::method::MethodCompiler;
use crate::compile::registry::Claim;
use crate::emit::Access;
use crate::error::{CompileError, CompileResult};
use crate::externs::ExternSignature;
use crate::il::{OpCode, Operation};
use crate::metadata::{Member, MethodRef};
use crate::types::Type;
use crate::variables::{Var, naming};

fn called(op: &Operation) -> Option<MethodRef> {
    if !matches!(op.opcode, OpCode::Call | OpCode::Callvirt) {
        return None;
    }
    match op.member() {
        Some(Member::Method(m)) => Some(m.clone()),
        _ => None,
    }
}

/// The instance operand below the arguments, without popping anything.
fn peek_instance(c: &MethodCompiler<'_>, method: &MethodRef) -> CompileResult<Option<Var>> {
    if method.is_static {
        return Ok(None);
    }
    c.peek(method.params.len()).map(Some)
}

/// Pop arguments and instance; arguments come back in declaration order.
fn pop_call(c: &mut MethodCompiler<'_>, method: &MethodRef) -> CompileResult<(Option<Var>, Vec<Var>)> {
    let args = c.pop_n(method.params.len())?;
    let instance = if method.is_static { None } else { Some(c.pop()?) };
    Ok((instance, args))
}

fn consume_call(c: &mut MethodCompiler<'_>, instance: Option<Var>, args: &[Var]) -> CompileResult<()> {
    c.consume_all(args)?;
    if let Some(obj) = instance {
        c.consume(obj)?;
    }
    Ok(())
}

const SELF_POINTING_OWNERS: [&str; 3] = [
    "UnityEngine.Component",
    "UnityEngine.Behaviour",
    "UnityEngine.MonoBehaviour",
];

pub(super) const OPCODES: &[OpCode] = {
    use OpCode::*;
    &[
        Call, Callvirt,
    ]
};

/// `this.transform` and `this.gameObject` are fixed for the lifetime of the
/// instance and are read from dedicated variables.
pub(super) fn self_pointing(c: &mut MethodCompiler<'_>, op: &Operation) -> CompileResult<Claim> {
    let Some(method) = called(op) else {
        return Ok(Claim::Declined);
    };
    let owner = method.declaring.full_name();
    let ret = method.ret.full_name();
    let matches = matches!(method.name.as_str(), "get_transform" | "get_gameObject")
        && method.params.is_empty()
        && !method.is_static
        && (SELF_POINTING_OWNERS.contains(&owner.as_str())
            || c.ctx().unit.is_self_type(&method.declaring))
        && matches!(ret.as_str(), "UnityEngine.Transform" | "UnityEngine.GameObject");
    if !matches {
        return Ok(Claim::Declined);
    }
    let instance = c.peek(0)?;
    if !c.is_this(instance) {
        return Ok(Claim::Declined);
    }
    c.pop()?;
    c.consume(instance)?;
    let var = c.self_pointing(&method.ret)?;
    c.push(var)?;
    Ok(Claim::Claimed)
}

/// Calls to methods compiled in this unit.
pub(super) fn internal(c: &mut MethodCompiler<'_>, op: &Operation) -> CompileResult<Claim> {
    let Some(method) = called(op) else {
        return Ok(Claim::Declined);
    };
    if method.is_ctor()
        || !c.ctx().unit.is_self_type(&method.declaring)
        || !c.ctx().has_method(&method.name)
    {
        return Ok(Claim::Declined);
    }
    if let Some(obj) = peek_instance(c, &method)?
        && !c.is_this(obj)
    {
        return Ok(Claim::Declined);
    }
    let (instance, args) = pop_call(c, &method)?;
    c.spill_fields()?;
    let result = c.emit_internal_call(&method.name, &method.params, &args, &method.ret)?;
    if let Some(obj) = instance {
        c.consume(obj)?;
    }
    if let Some(slot) = result {
        let out = c.out_var(&method.ret)?;
        c.copy(slot, out)?;
    }
    Ok(Claim::Claimed)
}

/// Methods of other behaviour instances, called as custom events.
pub(super) fn behaviour_event(c: &mut MethodCompiler<'_>, op: &Operation) -> CompileResult<Claim> {
    let Some(method) = called(op) else {
        return Ok(Claim::Declined);
    };
    let unit = c.ctx().unit;
    let behaviour = matches!(method.declaring, Type::Behaviour(_)) || unit.is_self_type(&method.declaring);
    if !behaviour || method.is_static || method.is_ctor() {
        return Ok(Claim::Declined);
    }
    if unit.is_self_type(&method.declaring) && !c.ctx().has_method(&method.name) {
        return Err(CompileError::UnknownMethod(method.name.clone()));
    }

    let (instance, args) = pop_call(c, &method)?;
    let Some(target) = instance else {
        return Err(CompileError::StackUnderflow);
    };
    c.spill_fields()?;

    let mut pairs = Vec::with_capacity(args.len());
    let mut coerced = Vec::with_capacity(args.len());
    for (i, (&arg, ty)) in args.iter().zip(&method.params).enumerate() {
        let value = c.coerce(arg, ty)?;
        let name = c.const_str(&naming::argument(&method.name, i as u16))?;
        pairs.push((name, value));
        coerced.push(value);
    }
    let event = c.const_str(&method.name)?;
    let ret = if method.has_return() {
        let name = c.const_str(&naming::return_slot(&method.name))?;
        let out = c.out_var(&method.ret)?;
        Some((name, out))
    } else {
        None
    };
    send_event(
        c,
        &EventCall {
            target,
            event,
            args: &pairs,
            ret,
        },
    )?;
    consume_call(c, Some(target), &coerced)?;
    Ok(Claim::Claimed)
}

/// Anything else is an extern call on the declaring type.
pub(super) fn extern_call(c: &mut MethodCompiler<'_>, op: &Operation) -> CompileResult<Claim> {
    let Some(method) = called(op) else {
        return Ok(Claim::Declined);
    };

    // Base constructor chained from an instance constructor.
    if op.opcode == OpCode::Call && method.is_ctor() && !method.is_static {
        let (instance, args) = pop_call(c, &method)?;
        let Some(obj) = instance else {
            return Err(CompileError::StackUnderflow);
        };
        if c.is_this(obj) {
            consume_call(c, instance, &args)?;
            return Ok(Claim::Claimed);
        }
        if !method.declaring.is_value_type() {
            return Err(CompileError::Unsupported(format!(
                "constructor call on an existing `{}`",
                method.declaring
            )));
        }
        // Struct initialised in place through its address.
        let mut coerced = Vec::with_capacity(args.len());
        for (&arg, ty) in args.iter().zip(&method.params) {
            coerced.push(c.coerce(arg, ty)?);
        }
        c.protect_stack(obj)?;
        c.call(&ExternSignature::from_method(&method), &coerced, Some(obj))?;
        consume_call(c, instance, &coerced)?;
        return Ok(Claim::Claimed);
    }

    let sig = ExternSignature::from_method(&method);
    let (instance, args) = pop_call(c, &method)?;
    let mut inputs = Vec::with_capacity(args.len() + 1);
    if let Some(obj) = instance {
        // Struct instances are modified in place and written back.
        let access = if c.ty(obj).is_value_type() {
            Access::ReadWrite
        } else {
            Access::Read
        };
        inputs.push((obj, access));
    }
    let mut coerced = Vec::with_capacity(args.len());
    for (&arg, ty) in args.iter().zip(&method.params) {
        let value = c.coerce(arg, ty)?;
        inputs.push((value, Access::Read));
        coerced.push(value);
    }
    let out = if method.has_return() {
        Some(c.out_var(&method.ret)?)
    } else {
        None
    };
    c.call_with(&sig, &inputs, out)?;
    consume_call(c, instance, &coerced)?;
    Ok(Claim::Claimed)
}
