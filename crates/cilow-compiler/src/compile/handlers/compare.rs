//! `ceq`/`cgt`/`clt` and the compare-and-branch lowering shared with the
//! conditional branch instructions.
//!
//! A comparison followed by `ldc.i4.0; ceq` is folded into its complement,
//! and one followed by `brtrue`/`brfalse` becomes a single conditional
//! jump, so the boolean never materialises.

use crate::compile::method::MethodCompiler;
use crate::compile::registry::Claim;
use crate::constant::Constant;
use crate::error::{CompileError, CompileResult};
use crate::externs::well_known;
use crate::il::{OpCode, Operation};
use crate::ops::{CompareOp, UnaryOp};
use crate::types::Type;
use crate::variables::Var;

/// A comparison as lowered: `(a op b) != invert`.
///
/// `invert` only survives for floating-point operands, where the complement
/// of an ordered comparison is not another ordered comparison.
#[derive(Clone, Copy, Debug)]
pub(super) struct Comparison {
    op: CompareOp,
    invert: bool,
}

impl Comparison {
    fn negated(self, floating: bool) -> Self {
        if floating {
            Self {
                invert: !self.invert,
                ..self
            }
        } else {
            Self {
                op: self.op.negate(),
                ..self
            }
        }
    }
}

/// Type both operands are brought to before comparing.
struct Operands {
    ty: Type,
    floating: bool,
}

pub(super) const OPCODES: &[OpCode] = {
    use OpCode::*;
    &[
        Ceq, Cgt, CgtUn, Clt, CltUn,
    ]
};

pub(super) fn translate(c: &mut MethodCompiler<'_>, op: &Operation) -> CompileResult<Claim> {
    let (cmp, unordered) = match op.opcode {
        OpCode::Ceq => (CompareOp::Eq, false),
        OpCode::Cgt => (CompareOp::Gt, false),
        OpCode::CgtUn => (CompareOp::Gt, true),
        OpCode::Clt => (CompareOp::Lt, false),
        OpCode::CltUn => (CompareOp::Lt, true),
        _ => return Ok(Claim::Declined),
    };
    let b = c.pop()?;
    let a = c.pop()?;
    let (operands, mut comparison) = classify(c, cmp, unordered, a, b)?;

    if c.config().fuse_comparisons {
        while take_negation(c) {
            comparison = comparison.negated(operands.floating);
        }
        if let Some(next) = c.peek_op().cloned()
            && matches!(
                next.opcode,
                OpCode::Brtrue | OpCode::BrtrueS | OpCode::Brfalse | OpCode::BrfalseS
            )
            && let Some(target) = next.target()
        {
            c.advance();
            let when_true = matches!(next.opcode, OpCode::Brtrue | OpCode::BrtrueS);
            return emit_branch(c, comparison, &operands, a, b, target, when_true)
                .map(|()| Claim::Claimed);
        }
    }

    materialize(c, comparison, &operands, a, b)?;
    Ok(Claim::Claimed)
}

/// Take a following `ldc.i4.0; ceq`, leaving the stream untouched when the
/// zero is used for something else.
fn take_negation(c: &mut MethodCompiler<'_>) -> bool {
    if !c.peek_op().is_some_and(|op| op.opcode == OpCode::LdcI40) {
        return false;
    }
    c.mark();
    c.advance();
    if c.peek_op().is_some_and(|op| op.opcode == OpCode::Ceq) {
        c.advance();
        c.commit();
        true
    } else {
        c.rewind();
        false
    }
}

/// Decide the operand type and the comparison to emit.
///
/// `unordered` is the `.un` flag: unsigned for integers, unordered for
/// floats, and "not equal" for `cgt.un` on object references.
fn classify(
    c: &MethodCompiler<'_>,
    op: CompareOp,
    unordered: bool,
    a: Var,
    b: Var,
) -> CompileResult<(Operands, Comparison)> {
    let (ta, tb) = (c.ty(a), c.ty(b));
    let plain = Comparison { op, invert: false };

    if ta.is_reference() && tb.is_reference() {
        let op = match op {
            CompareOp::Eq | CompareOp::Ne => op,
            CompareOp::Gt | CompareOp::Lt if unordered => CompareOp::Ne,
            _ => {
                return Err(CompileError::Unsupported(format!(
                    "ordered comparison of references `{ta}` and `{tb}`"
                )));
            }
        };
        let operands = Operands {
            ty: Type::Object,
            floating: false,
        };
        return Ok((operands, Comparison { op, invert: false }));
    }

    if *ta.underlying() == Type::Boolean && *tb.underlying() == Type::Boolean {
        let operands = Operands {
            ty: Type::Boolean,
            floating: false,
        };
        return Ok((operands, plain));
    }

    let ty = Type::promote(&ta, &tb).ok_or_else(|| CompileError::TypeMismatch {
        expected: ta.clone(),
        found: tb.clone(),
    })?;
    if ty.is_floating() {
        // `cgt.un` is "greater or unordered", i.e. not less-or-equal.
        let comparison = if unordered {
            Comparison {
                op: op.negate(),
                invert: true,
            }
        } else {
            plain
        };
        let operands = Operands { ty, floating: true };
        return Ok((operands, comparison));
    }
    let ty = if unordered { ty.unsigned_counterpart() } else { ty };
    Ok((
        Operands {
            ty,
            floating: false,
        },
        plain,
    ))
}

fn fold(c: &MethodCompiler<'_>, cmp: Comparison, operands: &Operands, a: Var, b: Var) -> Option<bool> {
    if !c.config().constant_folding {
        return None;
    }
    let (x, y) = (c.constant_of(a)?, c.constant_of(b)?);
    match Constant::compare(cmp.op, &x, &y, &operands.ty)? {
        Constant::Bool(v) => Some(v != cmp.invert),
        _ => None,
    }
}

/// Push the comparison result as a boolean.
fn materialize(
    c: &mut MethodCompiler<'_>,
    cmp: Comparison,
    operands: &Operands,
    a: Var,
    b: Var,
) -> CompileResult<()> {
    if let Some(value) = fold(c, cmp, operands, a, b) {
        c.consume(a)?;
        c.consume(b)?;
        let folded = c.constant(Constant::Bool(value), &Type::Boolean)?;
        return c.push(folded);
    }
    let a = c.coerce(a, &operands.ty)?;
    let b = c.coerce(b, &operands.ty)?;
    if cmp.invert {
        let raw = c.compare(cmp.op, a, b, &operands.ty)?;
        let out = c.out_var(&Type::Boolean)?;
        c.call(&well_known::unary(UnaryOp::Not, &Type::Boolean), &[raw], Some(out))?;
        c.consume(raw)?;
    } else {
        let out = c.out_var(&Type::Boolean)?;
        c.call(&well_known::compare(cmp.op, &operands.ty), &[a, b], Some(out))?;
    }
    c.consume(a)?;
    c.consume(b)
}

/// Jump to `target` when the comparison of `a` and `b` equals `when_true`.
fn emit_branch(
    c: &mut MethodCompiler<'_>,
    cmp: Comparison,
    operands: &Operands,
    a: Var,
    b: Var,
    target: u32,
    when_true: bool,
) -> CompileResult<()> {
    if let Some(value) = fold(c, cmp, operands, a, b) {
        c.consume(a)?;
        c.consume(b)?;
        if value == when_true {
            c.branch(target)?;
        }
        return Ok(());
    }
    let a = c.coerce(a, &operands.ty)?;
    let b = c.coerce(b, &operands.ty)?;
    // Jump when `a op b` is `want`.
    let want = when_true != cmp.invert;
    if operands.floating {
        let cond = c.compare(cmp.op, a, b, &operands.ty)?;
        c.consume(a)?;
        c.consume(b)?;
        if want {
            c.branch_if(cond, target)
        } else {
            c.branch_unless(cond, target)
        }
    } else {
        let op = if want { cmp.op.negate() } else { cmp.op };
        let cond = c.compare(op, a, b, &operands.ty)?;
        c.consume(a)?;
        c.consume(b)?;
        c.branch_unless(cond, target)
    }
}

/// Conditional branch on two operands, as in `blt` or `bne.un`.
pub(super) fn compare_and_branch(
    c: &mut MethodCompiler<'_>,
    op: CompareOp,
    unordered: bool,
    a: Var,
    b: Var,
    target: u32,
    when_true: bool,
) -> CompileResult<()> {
    // `bne.un` is the plain inequality for every operand kind.
    let unordered = unordered && op != CompareOp::Ne;
    let (operands, comparison) = classify(c, op, unordered, a, b)?;
    emit_branch(c, comparison, &operands, a, b, target, when_true)
}
