//! Jump tables for `switch`.
//!
//! ```text
//!     value >= 0 && value < N, else fall
//!     JUMP_INDIRECT (table + value * 8)
//! table:
//!     JUMP case0
//!     JUMP case1
//!     ...
//! fall:
//! ```

use cilow_asm::Opcode;

use crate::compile::MethodCompiler;
use crate::emit::Label;
use crate::error::CompileResult;
use crate::externs::well_known;
use crate::ops::{BinaryOp, CompareOp};
use crate::types::Type;
use crate::variables::Var;

/// Dispatch on the `Int32` in `value` to `cases`; out-of-range values fall
/// through. Does not consume `value`.
pub fn emit_jump_table(c: &mut MethodCompiler<'_>, value: Var, cases: &[Label]) -> CompileResult<()> {
    let fall = c.new_label();
    let table = c.new_label();

    let zero = c.const_i32(0)?;
    let in_low = c.compare(CompareOp::Ge, value, zero, &Type::Int32)?;
    c.jump_unless(in_low, fall)?;
    let count = c.const_i32(cases.len() as i32)?;
    let in_high = c.compare(CompareOp::Lt, value, count, &Type::Int32)?;
    c.jump_unless(in_high, fall)?;

    let stride = c.const_i32(Opcode::Jump.size() as i32)?;
    let offset = c.eval(&well_known::binary(BinaryOp::Mul, &Type::Int32), &[value, stride], &Type::Int32)?;
    let base = c.address_of(table, &Type::Int32);
    let address = c.eval(&well_known::binary(BinaryOp::Add, &Type::Int32), &[offset, base], &Type::Int32)?;
    c.consume(offset)?;
    let target = c.eval(&well_known::convert(&Type::Int32, &Type::UInt32), &[address], &Type::UInt32)?;
    c.consume(address)?;
    c.jump_indirect(target)?;
    c.consume(target)?;

    c.place(table)?;
    for &case in cases {
        c.jump(case);
    }
    c.place(fall)
}
