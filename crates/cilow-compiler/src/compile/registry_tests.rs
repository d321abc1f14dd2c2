use cilow_vm::Value;

use crate::compile::{Claim, MethodCompiler, Registry, Translator, UnitCompiler};
use crate::error::CompileResult;
use crate::il::{OpCode, Operation};
use crate::metadata::{MethodRef, TokenTable};
use crate::test_utils::{body, call, own, unit};
use crate::types::Type;
use crate::SignatureNaming;

#[test]
fn standard_translators_in_priority_order() {
    let registry = Registry::standard();

    insta::assert_debug_snapshot!(registry.names(), @r#"
    [
        "delegates",
        "self-pointing",
        "internal-call",
        "stack",
        "locals",
        "arith",
        "conv",
        "compare",
        "branches",
        "switch",
        "array",
        "fields",
        "objects",
        "behaviour-event",
        "extern-call",
    ]
    "#);
}

#[test]
fn equal_priorities_keep_registration_order() {
    fn decline(_: &mut MethodCompiler<'_>, _: &Operation) -> CompileResult<Claim> {
        Ok(Claim::Declined)
    }
    let mut registry = Registry::new();
    registry.register_fn("b", 10, decline);
    registry.register_fn("a", 10, decline);
    registry.register_fn("first", -1, decline);

    assert_eq!(registry.names(), ["first", "b", "a"]);
}

#[test]
fn operations_reach_only_their_translators() {
    let mut registry = Registry::standard();
    registry.register(-100, PassFinite);

    let names = |opcode| {
        registry
            .translators_for(opcode)
            .map(|t| t.name())
            .collect::<Vec<_>>()
    };

    assert_eq!(names(OpCode::Ret), ["pass-finite", "branches"]);
    assert_eq!(names(OpCode::Ckfinite), ["pass-finite"]);
    assert_eq!(
        names(OpCode::Call),
        [
            "pass-finite",
            "delegates",
            "self-pointing",
            "internal-call",
            "behaviour-event",
            "extern-call",
        ]
    );
}

/// Treats `ckfinite` as a no-op on the value at the top of the stack.
struct PassFinite;

impl Translator for PassFinite {
    fn name(&self) -> &str {
        "pass-finite"
    }

    fn translate(&self, c: &mut MethodCompiler<'_>, op: &Operation) -> CompileResult<Claim> {
        if op.opcode != OpCode::Ckfinite {
            return Ok(Claim::Declined);
        }
        let value = c.pop()?;
        c.push(value)?;
        c.consume(value)?;
        Ok(Claim::Claimed)
    }
}

struct Never;

impl Translator for Never {
    fn name(&self) -> &str {
        "never"
    }

    fn translate(&self, _: &mut MethodCompiler<'_>, _: &Operation) -> CompileResult<Claim> {
        Ok(Claim::Declined)
    }
}

#[test]
fn custom_translator_extends_instruction_set() {
    // ldarg.0; ckfinite; ret
    let method = MethodRef::new(own(), "Finite")
        .params([Type::Double])
        .returns(Type::Double)
        .static_();
    let unit = unit(vec![body(method, vec![0x02, 0xC3, 0x2A])]);
    let tokens = TokenTable::new();

    let mut registry = Registry::standard();
    registry.register(-100, PassFinite);
    registry.register(-200, Never);
    let program = UnitCompiler::new(&unit, &tokens, &SignatureNaming)
        .registry(registry)
        .compile()
        .unwrap();

    assert_eq!(call(&program, "Finite", &[Value::Double(2.5)]), Value::Double(2.5));
}

#[test]
fn empty_registry_claims_nothing() {
    let unit = unit(vec![body(MethodRef::new(own(), "Stop").static_(), vec![0x2A])]);
    let tokens = TokenTable::new();

    let err = UnitCompiler::new(&unit, &tokens, &SignatureNaming)
        .registry(Registry::new())
        .compile()
        .unwrap_err();

    insta::assert_snapshot!(err, @"Stop at IL_0000: unsupported instruction `ret`");
}
