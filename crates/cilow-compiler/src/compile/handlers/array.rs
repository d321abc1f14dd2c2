//! Array creation, length and element access.

use crate::compile::method::MethodCompiler;
use crate::compile::registry::Claim;
use crate::error::{CompileError, CompileResult};
use crate::externs::well_known;
use crate::il::{OpCode, Operation};
use crate::metadata::Member;
use crate::types::Type;
use crate::variables::{ReferenceVar, Var};

pub(super) const OPCODES: &[OpCode] = {
    use OpCode::*;
    &[
        Newarr, Ldlen, Ldelema, LdelemI1, LdelemU1, LdelemI2, LdelemU2, LdelemI4, LdelemU4,
        LdelemI8, LdelemI, LdelemR4, LdelemR8, LdelemRef, Ldelem, StelemI1, StelemI2, StelemI4,
        StelemI8, StelemI, StelemR4, StelemR8, StelemRef, Stelem,
    ]
};

pub(super) fn translate(c: &mut MethodCompiler<'_>, op: &Operation) -> CompileResult<Claim> {
    use OpCode::*;
    match op.opcode {
        Newarr => {
            let Some(Member::Type { ty }) = op.member() else {
                return Ok(Claim::Declined);
            };
            let array = Type::array_of(ty.clone());
            let len = c.pop()?;
            let len = c.coerce(len, &Type::Int32)?;
            let out = c.out_var(&array)?;
            c.call(&well_known::array_ctor(&array), &[len], Some(out))?;
            c.consume(len)?;
        }
        Ldlen => {
            let array = c.pop()?;
            let ty = array_type(c, array, None)?;
            let out = c.out_var(&Type::Int32)?;
            c.call(&well_known::array_length(&ty), &[array], Some(out))?;
            c.consume(array)?;
        }
        Ldelema => {
            let hint = element_hint(op);
            let (array, index, ty) = pop_element(c, hint)?;
            let elem = ty.element().cloned().unwrap_or(Type::Object);
            let backing = c.tmp(&elem);
            let getter = c.extern_var(&well_known::array_get(&ty))?;
            let setter = c.extern_var(&well_known::array_set(&ty))?;
            let reference = c.reference(
                &elem,
                ReferenceVar {
                    backing,
                    location: vec![array, index],
                    getter,
                    setter,
                },
            );
            c.push(reference)?;
            c.consume(array)?;
            c.consume(index)?;
        }
        _ => {
            if let Some(hint) = load_element(op) {
                let (array, index, ty) = pop_element(c, hint)?;
                let elem = ty.element().cloned().unwrap_or(Type::Object);
                let out = c.out_var(&elem)?;
                c.call(&well_known::array_get(&ty), &[array, index], Some(out))?;
                c.consume(array)?;
                c.consume(index)?;
            } else if let Some(hint) = store_element(op) {
                let value = c.pop()?;
                let (array, index, ty) = pop_element(c, hint)?;
                let elem = ty.element().cloned().unwrap_or(Type::Object);
                let value = c.coerce(value, &elem)?;
                c.call(&well_known::array_set(&ty), &[array, index, value], None)?;
                c.consume(value)?;
                c.consume(array)?;
                c.consume(index)?;
            } else {
                return Ok(Claim::Declined);
            }
        }
    }
    Ok(Claim::Claimed)
}

/// Pop `array, index`, with the index as `Int32`.
fn pop_element(c: &mut MethodCompiler<'_>, hint: Option<Type>) -> CompileResult<(Var, Var, Type)> {
    let index = c.pop()?;
    let array = c.pop()?;
    let index = c.coerce(index, &Type::Int32)?;
    let ty = array_type(c, array, hint)?;
    Ok((array, index, ty))
}

/// The static array type, falling back to the element type the opcode
/// names when the operand is only known as an object.
fn array_type(c: &MethodCompiler<'_>, array: Var, hint: Option<Type>) -> CompileResult<Type> {
    let ty = c.ty(array);
    if ty.element().is_some() {
        return Ok(ty);
    }
    match hint {
        Some(elem) => Ok(Type::array_of(elem)),
        None => Err(CompileError::TypeMismatch {
            expected: Type::object_array(),
            found: ty,
        }),
    }
}

fn element_hint(op: &Operation) -> Option<Type> {
    match op.member() {
        Some(Member::Type { ty }) => Some(ty.clone()),
        _ => None,
    }
}

/// Element type named by an `ldelem` form; the outer `None` means the
/// opcode is not an element load.
fn load_element(op: &Operation) -> Option<Option<Type>> {
    use OpCode::*;
    let ty = match op.opcode {
        LdelemI1 => Type::SByte,
        LdelemU1 => Type::Byte,
        LdelemI2 => Type::Int16,
        LdelemU2 => Type::UInt16,
        LdelemI4 => Type::Int32,
        LdelemU4 => Type::UInt32,
        LdelemI8 | LdelemI => Type::Int64,
        LdelemR4 => Type::Single,
        LdelemR8 => Type::Double,
        LdelemRef => Type::Object,
        Ldelem => return Some(element_hint(op)),
        _ => return None,
    };
    Some(Some(ty))
}

fn store_element(op: &Operation) -> Option<Option<Type>> {
    use OpCode::*;
    let ty = match op.opcode {
        StelemI1 => Type::SByte,
        StelemI2 => Type::Int16,
        StelemI4 => Type::Int32,
        StelemI8 | StelemI => Type::Int64,
        StelemR4 => Type::Single,
        StelemR8 => Type::Double,
        StelemRef => Type::Object,
        Stelem => return Some(element_hint(op)),
        _ => return None,
    };
    Some(Some(ty))
}
