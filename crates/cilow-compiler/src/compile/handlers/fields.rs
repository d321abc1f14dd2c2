//! Instance and static field access.
//!
//! Fields of the unit itself are data-section variables. Fields of other
//! behaviours go through the program-variable externs, and everything else
//! through the declaring type's `get_`/`set_` accessors.

use crate::compile::method::MethodCompiler;
use crate::compile::registry::Claim;
use crate::emit::Access;
use crate::error::{CompileError, CompileResult};
use crate::externs::{ExternSignature, well_known};
use crate::il::{OpCode, Operation};
use crate::metadata::{FieldRef, Member};
use crate::types::Type;
use crate::variables::{ReferenceVar, Var, naming};

use super::locals::store;

/// Where a field lives relative to the compiling unit.
enum Home {
    /// A variable of this unit.
    Own,
    /// A variable of another behaviour instance.
    Behaviour,
    /// A property of an external type.
    Extern,
}

fn home(c: &MethodCompiler<'_>, field: &FieldRef, instance: Option<Var>) -> Home {
    let unit = c.ctx().unit;
    if unit.is_self_type(&field.declaring) && unit.field(&field.name).is_some() {
        return match instance {
            Some(obj) if !c.is_this(obj) => Home::Behaviour,
            _ => Home::Own,
        };
    }
    if unit.is_self_type(&field.declaring) || matches!(field.declaring, Type::Behaviour(_)) {
        return Home::Behaviour;
    }
    Home::Extern
}

fn getter(field: &FieldRef) -> ExternSignature {
    ExternSignature::new(
        &field.declaring,
        &format!("get_{}", field.name),
        &[],
        &field.ty,
        field.is_static,
    )
}

fn setter(field: &FieldRef) -> ExternSignature {
    ExternSignature::new(
        &field.declaring,
        &format!("set_{}", field.name),
        &[field.ty.clone()],
        &Type::Void,
        field.is_static,
    )
}

pub(super) const OPCODES: &[OpCode] = {
    use OpCode::*;
    &[
        Ldfld, Stfld, Ldflda, Ldsfld, Stsfld, Ldsflda,
    ]
};

pub(super) fn translate(c: &mut MethodCompiler<'_>, op: &Operation) -> CompileResult<Claim> {
    let Some(Member::Field(field)) = op.member() else {
        return Ok(Claim::Declined);
    };
    let field = field.clone();
    match op.opcode {
        OpCode::Ldfld => load(c, &field)?,
        OpCode::Stfld => store_field(c, &field)?,
        OpCode::Ldflda => address(c, &field)?,
        OpCode::Ldsfld => load_static(c, &field)?,
        OpCode::Stsfld => store_static(c, &field)?,
        OpCode::Ldsflda => {
            if !c.ctx().unit.is_self_type(&field.declaring) {
                return Err(CompileError::Unsupported(format!(
                    "address of external static field `{}`",
                    field.name
                )));
            }
            let var = c.field_var(&field)?;
            c.push(var)?;
        }
        _ => return Ok(Claim::Declined),
    }
    Ok(Claim::Claimed)
}

fn load(c: &mut MethodCompiler<'_>, field: &FieldRef) -> CompileResult<()> {
    let obj = c.pop()?;
    match home(c, field, Some(obj)) {
        Home::Own => {
            let var = c.field_var(field)?;
            c.push(var)?;
        }
        Home::Behaviour => {
            let name = c.const_str(&naming::field(&field.name))?;
            let out = c.out_var(&field.ty)?;
            c.call(&well_known::get_program_variable(), &[obj, name], Some(out))?;
        }
        Home::Extern => {
            let out = c.out_var(&field.ty)?;
            c.call(&getter(field), &[obj], Some(out))?;
        }
    }
    c.consume(obj)
}

fn store_field(c: &mut MethodCompiler<'_>, field: &FieldRef) -> CompileResult<()> {
    let value = c.pop()?;
    let obj = c.pop()?;
    match home(c, field, Some(obj)) {
        Home::Own => {
            let dst = c.field_var(field)?;
            store(c, value, dst)?;
        }
        Home::Behaviour => {
            let value = c.coerce(value, &field.ty)?;
            let name = c.const_str(&naming::field(&field.name))?;
            c.call(&well_known::set_program_variable(), &[obj, name, value], None)?;
            c.consume(value)?;
        }
        Home::Extern => {
            let value = c.coerce(value, &field.ty)?;
            // Struct instances are modified in place and written back.
            let access = if c.ty(obj).is_value_type() {
                Access::ReadWrite
            } else {
                Access::Read
            };
            c.call_with(&setter(field), &[(obj, access), (value, Access::Read)], None)?;
            c.consume(value)?;
        }
    }
    c.consume(obj)
}

fn address(c: &mut MethodCompiler<'_>, field: &FieldRef) -> CompileResult<()> {
    let obj = c.pop()?;
    match home(c, field, Some(obj)) {
        Home::Own => {
            let var = c.field_var(field)?;
            c.push(var)?;
        }
        Home::Behaviour => {
            return Err(CompileError::Unsupported(format!(
                "address of field `{}` on another behaviour",
                field.name
            )));
        }
        Home::Extern => {
            let backing = c.tmp(&field.ty);
            let getter = c.extern_var(&getter(field))?;
            let setter = c.extern_var(&setter(field))?;
            let reference = c.reference(
                &field.ty,
                ReferenceVar {
                    backing,
                    location: vec![obj],
                    getter,
                    setter,
                },
            );
            c.push(reference)?;
        }
    }
    c.consume(obj)
}

fn load_static(c: &mut MethodCompiler<'_>, field: &FieldRef) -> CompileResult<()> {
    if c.ctx().unit.is_self_type(&field.declaring) {
        let var = c.field_var(field)?;
        return c.push(var);
    }
    let out = c.out_var(&field.ty)?;
    c.call(&getter(field), &[], Some(out))
}

fn store_static(c: &mut MethodCompiler<'_>, field: &FieldRef) -> CompileResult<()> {
    let value = c.pop()?;
    if c.ctx().unit.is_self_type(&field.declaring) {
        let dst = c.field_var(field)?;
        return store(c, value, dst);
    }
    let value = c.coerce(value, &field.ty)?;
    c.call(&setter(field), &[value], None)?;
    c.consume(value)
}
