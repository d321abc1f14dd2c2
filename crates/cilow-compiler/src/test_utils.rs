//! Hand-assembled units compiled and run on the reference VM.

use cilow_asm::Program;
use cilow_vm::{VM, Value};

use crate::variables::naming;
use crate::{
    CompileConfig, LocalDef, MethodBody, MethodRef, SignatureNaming, TokenTable, Type, UnitDef,
    compile_unit,
};

pub const UNIT: &str = "Demo";

/// The unit's own type as seen from metadata references.
pub fn own() -> Type {
    Type::Class(UNIT.into())
}

/// Little-endian bytes of a metadata token.
pub fn tok(token: u32) -> [u8; 4] {
    token.to_le_bytes()
}

/// IL bytes from pieces, so tokens can be spliced in.
pub fn il(parts: &[&[u8]]) -> Vec<u8> {
    parts.concat()
}

/// An exported method of the unit.
pub fn body(method: MethodRef, code: Vec<u8>) -> MethodBody {
    MethodBody {
        method,
        locals: Vec::new(),
        code,
        export: true,
    }
}

pub fn local(name: &str, ty: Type) -> LocalDef {
    LocalDef {
        name: Some(name.into()),
        ty,
    }
}

pub fn unit(methods: Vec<MethodBody>) -> UnitDef {
    let mut unit = UnitDef::new(UNIT);
    unit.methods = methods;
    unit
}

pub fn try_compile(unit: &UnitDef, tokens: &TokenTable, config: CompileConfig) -> crate::Result<Program> {
    compile_unit(unit, tokens, &SignatureNaming, config)
}

pub fn compile(unit: &UnitDef, tokens: &TokenTable) -> Program {
    try_compile(unit, tokens, CompileConfig::default()).unwrap()
}

/// Run `method` with `args` in its argument slots; returns its return slot.
pub fn call(program: &Program, method: &str, args: &[Value]) -> Value {
    let mut vm = VM::builder(program).build().unwrap();
    for (i, arg) in args.iter().enumerate() {
        vm.set(&naming::argument(method, i as u16), arg.clone())
            .unwrap();
    }
    vm.run(method).unwrap();
    assert_eq!(vm.stack_depth(), 0, "stack left behind by `{method}`");
    vm.get(&naming::return_slot(method))
        .cloned()
        .unwrap_or(Value::Null)
}
