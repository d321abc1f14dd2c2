//! Method pointers, delegate construction and the `System.Delegate` API.

use crate::codegen::delegates;
use crate::compile::method::MethodCompiler;
use crate::compile::registry::Claim;
use crate::error::{CompileError, CompileResult};
use crate::il::{OpCode, Operation};
use crate::metadata::{Member, MethodRef};
use crate::types::Type;
use crate::variables::{Var, VarKind};

fn method_operand(op: &Operation) -> Option<MethodRef> {
    match op.member() {
        Some(Member::Method(m)) => Some(m.clone()),
        _ => None,
    }
}

fn is_delegate_api(method: &MethodRef) -> bool {
    matches!(&method.declaring, Type::Class(name) if name == "System.Delegate")
        && method.is_static
        && matches!(method.name.as_str(), "Combine" | "Remove" | "RemoveAll")
}

pub(super) const OPCODES: &[OpCode] = {
    use OpCode::*;
    &[
        Ldftn, Ldvirtftn, Newobj, Call, Callvirt,
    ]
};

pub(super) fn translate(c: &mut MethodCompiler<'_>, op: &Operation) -> CompileResult<Claim> {
    let Some(method) = method_operand(op) else {
        return Ok(Claim::Declined);
    };
    match op.opcode {
        OpCode::Ldftn => {
            let ptr = c.method_pointer(method);
            c.push(ptr)?;
        }
        OpCode::Ldvirtftn => {
            let instance = c.pop()?;
            c.consume(instance)?;
            let ptr = c.method_pointer(method);
            c.push(ptr)?;
        }
        OpCode::Newobj if method.declaring.is_delegate() => construct(c, &method)?,
        OpCode::Call | OpCode::Callvirt if is_delegate_api(&method) => api(c, &method)?,
        OpCode::Call | OpCode::Callvirt
            if method.declaring.is_delegate() && method.name == "Invoke" && !method.is_static =>
        {
            invoke(c, &method)?
        }
        _ => return Ok(Claim::Declined),
    }
    Ok(Claim::Claimed)
}

/// `new D(target, &method)`.
fn construct(c: &mut MethodCompiler<'_>, ctor: &MethodRef) -> CompileResult<()> {
    if ctor.params.len() != 2 {
        return Err(CompileError::Unsupported(format!(
            "delegate constructor `{ctor}`"
        )));
    }
    let ptr = c.pop()?;
    let target = c.pop()?;
    let VarKind::MethodPointer(method) = c.kind(ptr).clone() else {
        return Err(CompileError::Unsupported(
            "delegate built from a computed method pointer".into(),
        ));
    };
    let out = c.out_var(&ctor.declaring)?;
    delegates::build(c, target, &method, out)?;
    c.consume(target)?;
    c.consume(ptr)
}

fn coerce_args(c: &mut MethodCompiler<'_>, args: &[Var], params: &[Type]) -> CompileResult<Vec<Var>> {
    args.iter()
        .zip(params)
        .map(|(&arg, ty)| c.coerce(arg, ty))
        .collect()
}

fn api(c: &mut MethodCompiler<'_>, method: &MethodRef) -> CompileResult<()> {
    let args = c.pop_n(method.params.len())?;
    let args = coerce_args(c, &args, &method.params)?;
    let out = c.fresh(&method.ret)?;
    match (method.name.as_str(), args.as_slice()) {
        ("Combine", &[a, b]) => delegates::combine_into(c, a, b, out)?,
        ("Combine", &[parts]) => delegates::combine_all(c, parts, out)?,
        ("Remove", &[source, value]) => delegates::remove(c, source, value, false, out)?,
        ("RemoveAll", &[source, value]) => delegates::remove(c, source, value, true, out)?,
        _ => {
            return Err(CompileError::Unsupported(format!("delegate call `{method}`")));
        }
    }
    c.consume_all(&args)
}

fn invoke(c: &mut MethodCompiler<'_>, method: &MethodRef) -> CompileResult<()> {
    let args = c.pop_n(method.params.len())?;
    let delegate = c.pop()?;
    c.spill_fields()?;
    let args = coerce_args(c, &args, &method.params)?;
    let ret = if method.has_return() {
        Some(c.fresh(&method.ret)?)
    } else {
        None
    };
    delegates::invoke(c, delegate, &args, ret)?;
    c.consume_all(&args)?;
    c.consume(delegate)
}
