//! Counted loops over an `Int32` index.

use crate::compile::MethodCompiler;
use crate::emit::Label;
use crate::error::CompileResult;
use crate::externs::well_known;
use crate::ops::{BinaryOp, CompareOp};
use crate::types::Type;
use crate::variables::Var;

/// Labels and index of a loop under construction.
pub struct LoopCtx {
    pub index: Var,
    /// Jump here to continue with the next iteration.
    pub next: Label,
    /// Jump here to leave the loop.
    pub exit: Label,
}

/// `for (index = start; index < end; index++) body`.
///
/// `end` is re-read on every iteration, so the body may change it.
pub fn for_loop<'a>(
    c: &mut MethodCompiler<'a>,
    start: Var,
    end: Var,
    body: impl FnOnce(&mut MethodCompiler<'a>, &LoopCtx) -> CompileResult<()>,
) -> CompileResult<()> {
    let ctx = begin(c, start)?;
    let check = c.new_label();
    c.place(check)?;
    let cond = c.compare(CompareOp::Lt, ctx.index, end, &Type::Int32)?;
    c.jump_unless(cond, ctx.exit)?;

    body(c, &ctx)?;

    c.place(ctx.next)?;
    step(c, ctx.index, BinaryOp::Add)?;
    c.jump(check);
    c.place(ctx.exit)?;
    c.unpin(ctx.index)
}

/// `for (index = start; index >= 0; index--) body`.
pub fn reverse_for_loop<'a>(
    c: &mut MethodCompiler<'a>,
    start: Var,
    body: impl FnOnce(&mut MethodCompiler<'a>, &LoopCtx) -> CompileResult<()>,
) -> CompileResult<()> {
    let ctx = begin(c, start)?;
    let check = c.new_label();
    c.place(check)?;
    let zero = c.const_i32(0)?;
    let cond = c.compare(CompareOp::Ge, ctx.index, zero, &Type::Int32)?;
    c.jump_unless(cond, ctx.exit)?;

    body(c, &ctx)?;

    c.place(ctx.next)?;
    step(c, ctx.index, BinaryOp::Sub)?;
    c.jump(check);
    c.place(ctx.exit)?;
    c.unpin(ctx.index)
}

fn begin(c: &mut MethodCompiler<'_>, start: Var) -> CompileResult<LoopCtx> {
    let index = c.pinned(&Type::Int32)?;
    c.copy(start, index)?;
    Ok(LoopCtx {
        index,
        next: c.new_label(),
        exit: c.new_label(),
    })
}

fn step(c: &mut MethodCompiler<'_>, index: Var, op: BinaryOp) -> CompileResult<()> {
    let one = c.const_i32(1)?;
    c.call(&well_known::binary(op, &Type::Int32), &[index, one], Some(index))
}
