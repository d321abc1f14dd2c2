//! Calling a method on a behaviour instance.
//!
//! Behaviours cannot be called directly. The caller writes each argument
//! into the callee's argument variable by name, sends the method name as a
//! custom event and reads the return variable back.

use crate::compile::MethodCompiler;
use crate::error::CompileResult;
use crate::externs::well_known;
use crate::variables::Var;

/// Variable names and values for one event call. Every name is a `String`
/// variable, constant or computed.
pub struct EventCall<'v> {
    pub target: Var,
    pub event: Var,
    /// `(argument variable name, value)` pairs.
    pub args: &'v [(Var, Var)],
    /// Return variable name and the slot it is read into.
    pub ret: Option<(Var, Var)>,
}

pub fn send_event(c: &mut MethodCompiler<'_>, call: &EventCall<'_>) -> CompileResult<()> {
    let set = well_known::set_program_variable();
    for &(name, value) in call.args {
        c.call(&set, &[call.target, name, value], None)?;
    }
    c.call(&well_known::send_custom_event(), &[call.target, call.event], None)?;
    if let Some((name, out)) = call.ret {
        c.call(&well_known::get_program_variable(), &[call.target, name], Some(out))?;
    }
    Ok(())
}
