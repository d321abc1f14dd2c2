//! Delegates as invocation lists.
//!
//! A delegate value is an `object[]` of entries, and each entry is an
//! `object[]` laid out as
//!
//! ```text
//! [target, name, kind, arg names..., return name?]
//! ```
//!
//! For behaviour events `name` is the method name and the argument and
//! return slots hold the callee's variable names. For externs `name` is the
//! extern identifier and the slots are null; invocation pushes the caller's
//! values and calls through a runtime-assigned extern slot.

use crate::compile::MethodCompiler;
use crate::constant::Constant;
use crate::error::{CompileError, CompileResult};
use crate::externs::{ExternSignature, well_known};
use crate::metadata::MethodRef;
use crate::ops::{BinaryOp, CompareOp};
use crate::types::Type;
use crate::variables::{Var, naming};

use super::events::{EventCall, send_event};
use super::loops::{LoopCtx, for_loop, reverse_for_loop};
use super::switch;

const TARGET: i32 = 0;
const NAME: i32 = 1;
const KIND: i32 = 2;
const ARGS: i32 = 3;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(i32)]
pub enum EntryKind {
    BehaviourEvent = 0,
    ExternInstance = 1,
    ExternStatic = 2,
}

/// How a bound method is reached, decided at construction time.
struct Binding {
    kind: EntryKind,
    name: String,
    /// Argument variable names; `None` for externs.
    args: Vec<Option<String>>,
    ret: Option<Option<String>>,
}

fn binding(c: &MethodCompiler<'_>, method: &MethodRef) -> CompileResult<Binding> {
    let unit = c.ctx().unit;
    let own = unit.is_self_type(&method.declaring);
    if own && unit.method(&method.name).is_none() {
        return Err(CompileError::UnknownMethod(method.name.clone()));
    }
    if own || matches!(method.declaring, Type::Behaviour(_)) {
        let args = (0..method.params.len())
            .map(|i| Some(naming::argument(&method.name, i as u16)))
            .collect();
        return Ok(Binding {
            kind: EntryKind::BehaviourEvent,
            name: method.name.clone(),
            args,
            ret: method
                .has_return()
                .then(|| Some(naming::return_slot(&method.name))),
        });
    }
    let sig = ExternSignature::from_method(method);
    let id = c
        .ctx()
        .externs
        .resolve(&sig)
        .ok_or_else(|| CompileError::UnknownExtern(sig.identifier()))?;
    Ok(Binding {
        kind: if method.is_static {
            EntryKind::ExternStatic
        } else {
            EntryKind::ExternInstance
        },
        name: id,
        args: vec![None; method.params.len()],
        ret: method.has_return().then_some(None),
    })
}

fn entries_type() -> Type {
    Type::object_array()
}

fn set(c: &mut MethodCompiler<'_>, array: Var, index: Var, value: Var) -> CompileResult<()> {
    c.call(&well_known::array_set(&entries_type()), &[array, index, value], None)
}

fn set_const(c: &mut MethodCompiler<'_>, array: Var, index: i32, value: Var) -> CompileResult<()> {
    let index = c.const_i32(index)?;
    set(c, array, index, value)
}

fn get(c: &mut MethodCompiler<'_>, array: Var, index: Var, out: Var) -> CompileResult<()> {
    c.call(&well_known::array_get(&entries_type()), &[array, index], Some(out))
}

fn get_const(c: &mut MethodCompiler<'_>, array: Var, index: i32, out: Var) -> CompileResult<()> {
    let index = c.const_i32(index)?;
    get(c, array, index, out)
}

fn length(c: &mut MethodCompiler<'_>, array: Var) -> CompileResult<Var> {
    let out = c.pinned(&Type::Int32)?;
    c.call(&well_known::array_length(&entries_type()), &[array], Some(out))?;
    Ok(out)
}

fn new_array(c: &mut MethodCompiler<'_>, len: Var, out: Var) -> CompileResult<()> {
    c.call(&well_known::array_ctor(&entries_type()), &[len], Some(out))
}

fn is_null(c: &mut MethodCompiler<'_>, value: Var) -> CompileResult<Var> {
    let null = c.null(&Type::Object)?;
    c.compare(CompareOp::Eq, value, null, &Type::Object)
}

fn arith(c: &mut MethodCompiler<'_>, op: BinaryOp, a: Var, b: Var, out: Var) -> CompileResult<()> {
    c.call(&well_known::binary(op, &Type::Int32), &[a, b], Some(out))
}

fn unpin_all(c: &mut MethodCompiler<'_>, vars: &[Var]) -> CompileResult<()> {
    vars.iter().try_for_each(|&v| c.unpin(v))
}

/// Build a one-entry delegate bound to `method` on `target` into `out`.
pub fn build(c: &mut MethodCompiler<'_>, target: Var, method: &MethodRef, out: Var) -> CompileResult<()> {
    let binding = binding(c, method)?;
    let target = if binding.kind == EntryKind::BehaviourEvent && method.is_static {
        c.this_var()?
    } else {
        target
    };
    let len = ARGS as usize + binding.args.len() + usize::from(binding.ret.is_some());

    let entry = c.pinned(&entries_type())?;
    let len = c.const_i32(len as i32)?;
    new_array(c, len, entry)?;
    set_const(c, entry, TARGET, target)?;
    let name = c.const_str(&binding.name)?;
    set_const(c, entry, NAME, name)?;
    let kind = c.const_i32(binding.kind as i32)?;
    set_const(c, entry, KIND, kind)?;

    let slots = binding.args.iter().chain(binding.ret.iter());
    for (i, slot) in slots.enumerate() {
        let value = match slot {
            Some(name) => c.const_str(name)?,
            None => c.null(&Type::Object)?,
        };
        set_const(c, entry, ARGS + i as i32, value)?;
    }

    let one = c.const_i32(1)?;
    new_array(c, one, out)?;
    set_const(c, out, 0, entry)?;
    c.unpin(entry)
}

/// `dst[dst_start + i] = src[src_start + i]` for `i` in `0..count`.
fn copy_range(
    c: &mut MethodCompiler<'_>,
    src: Var,
    src_start: Var,
    dst: Var,
    dst_start: Var,
    count: Var,
) -> CompileResult<()> {
    let item = c.pinned(&Type::Object)?;
    let from = c.pinned(&Type::Int32)?;
    let to = c.pinned(&Type::Int32)?;
    let zero = c.const_i32(0)?;
    for_loop(c, zero, count, |c, l| {
        arith(c, BinaryOp::Add, src_start, l.index, from)?;
        arith(c, BinaryOp::Add, dst_start, l.index, to)?;
        get(c, src, from, item)?;
        set(c, dst, to, item)
    })?;
    unpin_all(c, &[item, from, to])
}

/// `out = Delegate.Combine(a, b)`: the entries of `a` followed by those of
/// `b`, or whichever side is not null.
pub fn combine_into(c: &mut MethodCompiler<'_>, a: Var, b: Var, out: Var) -> CompileResult<()> {
    let check_b = c.new_label();
    let both = c.new_label();
    let done = c.new_label();

    let a_null = is_null(c, a)?;
    c.jump_unless(a_null, check_b)?;
    c.copy(b, out)?;
    c.jump(done);

    c.place(check_b)?;
    let b_null = is_null(c, b)?;
    c.jump_unless(b_null, both)?;
    c.copy(a, out)?;
    c.jump(done);

    c.place(both)?;
    let la = length(c, a)?;
    let lb = length(c, b)?;
    let total = c.pinned(&Type::Int32)?;
    arith(c, BinaryOp::Add, la, lb, total)?;
    let result = c.pinned(&entries_type())?;
    new_array(c, total, result)?;
    let zero = c.const_i32(0)?;
    copy_range(c, a, zero, result, zero, la)?;
    copy_range(c, b, zero, result, la, lb)?;
    c.copy(result, out)?;
    unpin_all(c, &[la, lb, total, result])?;

    c.place(done)
}

/// `out = Delegate.Combine(parts)` over an array of delegates.
///
/// Null parts are skipped; the result is null when every part is.
pub fn combine_all(c: &mut MethodCompiler<'_>, parts: Var, out: Var) -> CompileResult<()> {
    let any = c.new_label();
    let done = c.new_label();

    let part = c.pinned(&entries_type())?;
    let total = c.pinned(&Type::Int32)?;
    let offset = c.pinned(&Type::Int32)?;
    let count = length(c, parts)?;
    let zero = c.const_i32(0)?;
    c.copy(zero, total)?;
    for_loop(c, zero, count, |c, l| {
        next_part(c, parts, l, part)?;
        let len = length(c, part)?;
        arith(c, BinaryOp::Add, total, len, total)?;
        c.unpin(len)
    })?;

    let empty = c.compare(CompareOp::Eq, total, zero, &Type::Int32)?;
    c.jump_unless(empty, any)?;
    let null = c.null(&entries_type())?;
    c.copy(null, out)?;
    c.jump(done);

    c.place(any)?;
    let result = c.pinned(&entries_type())?;
    new_array(c, total, result)?;
    c.copy(zero, offset)?;
    for_loop(c, zero, count, |c, l| {
        next_part(c, parts, l, part)?;
        let len = length(c, part)?;
        copy_range(c, part, zero, result, offset, len)?;
        arith(c, BinaryOp::Add, offset, len, offset)?;
        c.unpin(len)
    })?;
    c.copy(result, out)?;
    unpin_all(c, &[part, total, offset, count, result])?;

    c.place(done)
}

/// `part = parts[index]`, continuing the loop when it is null.
fn next_part(c: &mut MethodCompiler<'_>, parts: Var, l: &LoopCtx, part: Var) -> CompileResult<()> {
    get(c, parts, l.index, part)?;
    let null = c.null(&Type::Object)?;
    let present = c.compare(CompareOp::Ne, part, null, &Type::Object)?;
    c.jump_unless(present, l.next)
}

/// `out = Delegate.Remove(source, value)`, or `RemoveAll` when `all`.
///
/// Entries of `value` are taken last to first; each removes its last match
/// in `source` (every match with `all`). Two entries match when their
/// targets are the same object and their names are equal. The result is
/// `source` itself when nothing matched and null when nothing is left.
pub fn remove(
    c: &mut MethodCompiler<'_>,
    source: Var,
    value: Var,
    all: bool,
    out: Var,
) -> CompileResult<()> {
    let check_value = c.new_label();
    let scan = c.new_label();
    let keep = c.new_label();
    let nonempty = c.new_label();
    let done = c.new_label();

    let source_null = is_null(c, source)?;
    c.jump_unless(source_null, check_value)?;
    let null = c.null(&entries_type())?;
    c.copy(null, out)?;
    c.jump(done);

    c.place(check_value)?;
    let value_null = is_null(c, value)?;
    c.jump_unless(value_null, scan)?;
    c.copy(source, out)?;
    c.jump(done);

    c.place(scan)?;
    let count = length(c, source)?;
    let scratch = c.pinned(&entries_type())?;
    new_array(c, count, scratch)?;
    let zero = c.const_i32(0)?;
    let one = c.const_i32(1)?;
    copy_range(c, source, zero, scratch, zero, count)?;
    let removed = c.pinned(&Type::Boolean)?;
    let no = c.constant(Constant::Bool(false), &Type::Boolean)?;
    c.copy(no, removed)?;

    let wanted = c.pinned(&entries_type())?;
    let wanted_target = c.pinned(&Type::Object)?;
    let wanted_name = c.pinned(&Type::Object)?;
    let value_len = length(c, value)?;
    let last_value = c.pinned(&Type::Int32)?;
    arith(c, BinaryOp::Sub, value_len, one, last_value)?;
    let last_scratch = c.pinned(&Type::Int32)?;

    reverse_for_loop(c, last_value, |c, outer| {
        get(c, value, outer.index, wanted)?;
        get_const(c, wanted, TARGET, wanted_target)?;
        get_const(c, wanted, NAME, wanted_name)?;
        arith(c, BinaryOp::Sub, count, one, last_scratch)?;

        reverse_for_loop(c, last_scratch, |c, inner| {
            let entry = c.pinned(&entries_type())?;
            let field = c.pinned(&Type::Object)?;
            get(c, scratch, inner.index, entry)?;

            get_const(c, entry, TARGET, field)?;
            let same_target =
                c.eval(&well_known::reference_equals(), &[field, wanted_target], &Type::Boolean)?;
            c.jump_unless(same_target, inner.next)?;
            get_const(c, entry, NAME, field)?;
            let same_name =
                c.eval(&well_known::object_equals(), &[field, wanted_name], &Type::Boolean)?;
            c.jump_unless(same_name, inner.next)?;

            // Shift the tail down over the match.
            let last = c.pinned(&Type::Int32)?;
            let next = c.pinned(&Type::Int32)?;
            arith(c, BinaryOp::Sub, count, one, last)?;
            for_loop(c, inner.index, last, |c, l| {
                arith(c, BinaryOp::Add, l.index, one, next)?;
                get(c, scratch, next, entry)?;
                set(c, scratch, l.index, entry)
            })?;
            c.copy(last, count)?;
            let yes = c.constant(Constant::Bool(true), &Type::Boolean)?;
            c.copy(yes, removed)?;
            unpin_all(c, &[entry, field, last, next])?;
            if !all {
                c.jump(inner.exit);
            }
            Ok(())
        })
    })?;

    c.jump_unless_held(removed, keep)?;
    let empty = c.compare(CompareOp::Eq, count, zero, &Type::Int32)?;
    c.jump_unless(empty, nonempty)?;
    c.copy(null, out)?;
    c.jump(done);

    c.place(nonempty)?;
    let result = c.pinned(&entries_type())?;
    new_array(c, count, result)?;
    copy_range(c, scratch, zero, result, zero, count)?;
    c.copy(result, out)?;
    c.jump(done);

    c.place(keep)?;
    c.copy(source, out)?;
    unpin_all(
        c,
        &[
            count,
            scratch,
            removed,
            wanted,
            wanted_target,
            wanted_name,
            value_len,
            last_value,
            last_scratch,
            result,
        ],
    )?;
    c.place(done)
}

/// Call every entry of `delegate` in order; `ret` receives the last result.
pub fn invoke(
    c: &mut MethodCompiler<'_>,
    delegate: Var,
    args: &[Var],
    ret: Option<Var>,
) -> CompileResult<()> {
    let live = c.new_label();
    let missing = is_null(c, delegate)?;
    c.jump_unless(missing, live)?;
    c.emit_fault("invoked a null delegate")?;
    c.place(live)?;

    let entry = c.pinned(&entries_type())?;
    let target = c.pinned(&Type::Object)?;
    let name = c.pinned(&Type::Object)?;
    let kind = c.pinned(&Type::Int32)?;
    let mut slot_names = Vec::with_capacity(args.len() + 1);
    for _ in 0..args.len() + usize::from(ret.is_some()) {
        slot_names.push(c.pinned(&Type::String)?);
    }
    let dynamic = c.dynamic_extern_slot()?;
    let count = length(c, delegate)?;
    let zero = c.const_i32(0)?;

    for_loop(c, zero, count, |c, l| {
        get(c, delegate, l.index, entry)?;
        get_const(c, entry, TARGET, target)?;
        get_const(c, entry, NAME, name)?;
        get_const(c, entry, KIND, kind)?;

        let event = c.new_label();
        let instance = c.new_label();
        let static_ = c.new_label();
        switch::emit_jump_table(c, kind, &[event, instance, static_])?;
        c.jump(l.next);

        c.place(event)?;
        for (i, &slot) in slot_names.iter().enumerate() {
            get_const(c, entry, ARGS + i as i32, slot)?;
        }
        let pairs: Vec<(Var, Var)> = slot_names.iter().copied().zip(args.iter().copied()).collect();
        send_event(
            c,
            &EventCall {
                target,
                event: name,
                args: &pairs,
                ret: ret.map(|r| (slot_names[args.len()], r)),
            },
        )?;
        c.jump(l.next);

        c.place(instance)?;
        c.copy(name, dynamic)?;
        let mut inputs = vec![target];
        inputs.extend_from_slice(args);
        c.call_dynamic(dynamic, &inputs, ret)?;
        c.jump(l.next);

        c.place(static_)?;
        c.copy(name, dynamic)?;
        c.call_dynamic(dynamic, args, ret)
    })?;

    unpin_all(c, &[entry, target, name, kind, count])?;
    unpin_all(c, &slot_names)
}
