use std::cell::RefCell;
use std::rc::Rc;

use cilow_asm::{Literal, Opcode};
use cilow_vm::{ArrayRef, ExternLibrary, RuntimeError, VM, Value};
use indoc::indoc;

use crate::config::CompileConfig;
use crate::error::CompileError;
use crate::metadata::{FieldDef, FieldRef, Member, MethodRef, TokenTable};
use crate::test_utils::{body, call, compile, il, local, own, tok, try_compile, unit};
use crate::types::Type;
use crate::{Constant, Error};

const TWICE: u32 = 0x0A00_0001;
const QUAD: u32 = 0x0A00_0002;
const LOG: u32 = 0x0A00_0003;
const STRING_TYPE: u32 = 0x0200_0001;

fn tokens() -> TokenTable {
    TokenTable::new()
        .with(
            TWICE,
            Member::Method(
                MethodRef::new(own(), "Twice")
                    .params([Type::Int32])
                    .returns(Type::Int32)
                    .static_(),
            ),
        )
        .with(
            QUAD,
            Member::Method(
                MethodRef::new(own(), "Quad")
                    .params([Type::Int32])
                    .returns(Type::Int32)
                    .static_(),
            ),
        )
        .with(
            LOG,
            Member::Method(
                MethodRef::new(Type::Class("UnityEngine.Debug".into()), "Log")
                    .params([Type::Object])
                    .static_(),
            ),
        )
        .with(STRING_TYPE, Member::Type { ty: Type::String })
}

fn int_fn(name: &str, params: usize) -> MethodRef {
    MethodRef::new(own(), name)
        .params(vec![Type::Int32; params])
        .returns(Type::Int32)
        .static_()
}

#[test]
fn add_arguments() {
    // ldarg.0; ldarg.1; add; ret
    let unit = unit(vec![body(int_fn("Add", 2), vec![0x02, 0x03, 0x58, 0x2A])]);
    let program = compile(&unit, &tokens());

    let result = call(&program, "Add", &[Value::Int32(2), Value::Int32(40)]);

    assert_eq!(result, Value::Int32(42));
    assert_eq!(program.count(Opcode::Extern), 1);
}

#[test]
fn add_assembly_listing() {
    let unit = unit(vec![body(int_fn("Add", 2), vec![0x02, 0x03, 0x58, 0x2A])]);
    let program = compile(&unit, &tokens());

    insta::assert_snapshot!(program.to_assembly(), @r#"
    .data_start
        __const_SystemUInt32_0: %SystemUInt32, 4294967292
        __Add_arg0: %SystemInt32, 0
        __Add_arg1: %SystemInt32, 0
        __Add_tmp_SystemInt32_0: %SystemInt32, 0
        __extern_0: %SystemString, "SystemInt32.__op_Addition__SystemInt32_SystemInt32__SystemInt32"
        __Add__ret: %SystemInt32, 0
        __return_address: %SystemUInt32, 0
    .data_end
    .code_start
        .export Add
        Add:
            PUSH, __const_SystemUInt32_0
            PUSH, __Add_arg0
            PUSH, __Add_arg1
            PUSH, __Add_tmp_SystemInt32_0
            EXTERN, __extern_0
            PUSH, __Add_tmp_SystemInt32_0
            PUSH, __Add__ret
            COPY
            JUMP, 0x00000044
            PUSH, __return_address
            COPY
            JUMP_INDIRECT, __return_address
    .code_end
    "#);
}

#[test]
fn constant_arithmetic_folds() {
    // ldc.i4.2; ldc.i4.3; add; ret
    let code = vec![0x18, 0x19, 0x58, 0x2A];
    let unit = unit(vec![body(int_fn("Five", 0), code)]);

    let folded = compile(&unit, &tokens());
    let literal = try_compile(&unit, &tokens(), CompileConfig::literal()).unwrap();

    assert_eq!(folded.count(Opcode::Extern), 0);
    assert_eq!(literal.count(Opcode::Extern), 1);
    assert_eq!(call(&folded, "Five", &[]), Value::Int32(5));
    assert_eq!(call(&literal, "Five", &[]), Value::Int32(5));
}

#[test]
fn conditional_value_merges_at_join() {
    // ldarg.0; ldarg.1; bgt.s IL_0007; ldarg.1; br.s IL_0008;
    // IL_0007: ldarg.0; IL_0008: ret
    let code = vec![0x02, 0x03, 0x30, 0x03, 0x03, 0x2B, 0x01, 0x02, 0x2A];
    let unit = unit(vec![body(int_fn("Max", 2), code)]);
    let program = compile(&unit, &tokens());

    assert_eq!(call(&program, "Max", &[Value::Int32(3), Value::Int32(7)]), Value::Int32(7));
    assert_eq!(call(&program, "Max", &[Value::Int32(9), Value::Int32(2)]), Value::Int32(9));
    assert!(program.data_entry("__Max_stk_0008_0").is_some());
}

#[test]
fn array_sum_loop() {
    // s = 0; for (i = 0; i < xs.Length; i++) s += xs[i]; return s;
    let code = vec![
        0x16, 0x0A, // s = 0
        0x16, 0x0B, // i = 0
        0x2B, 0x0A, // br.s IL_0010
        0x06, 0x02, 0x07, 0x94, 0x58, 0x0A, // IL_0006: s = s + xs[i]
        0x07, 0x17, 0x58, 0x0B, // i = i + 1
        0x07, 0x02, 0x8E, 0x69, // IL_0010: i, (int)xs.Length
        0x32, 0xF0, // blt.s IL_0006
        0x06, 0x2A, // return s
    ];
    let method = MethodRef::new(own(), "Sum")
        .params([Type::array_of(Type::Int32)])
        .returns(Type::Int32)
        .static_();
    let mut sum = body(method, code);
    sum.locals = vec![local("s", Type::Int32), local("i", Type::Int32)];
    let program = compile(&unit(vec![sum]), &tokens());

    let xs = (1..=4).map(Value::Int32).collect();
    let result = call(&program, "Sum", &[Value::Array(ArrayRef::new("SystemInt32", xs))]);
    assert_eq!(result, Value::Int32(10));

    let empty = Value::Array(ArrayRef::new("SystemInt32", Vec::new()));
    assert_eq!(call(&program, "Sum", &[empty]), Value::Int32(0));
}

#[test]
fn switch_dispatches_and_falls_through() {
    let code = vec![
        0x02, // ldarg.0
        0x45, 0x03, 0x00, 0x00, 0x00, // switch (3 targets)
        0x02, 0x00, 0x00, 0x00, // IL_0014
        0x05, 0x00, 0x00, 0x00, // IL_0017
        0x08, 0x00, 0x00, 0x00, // IL_001a
        0x15, 0x2A, // IL_0012: return -1
        0x1F, 0x0A, 0x2A, // IL_0014: return 10
        0x1F, 0x14, 0x2A, // IL_0017: return 20
        0x1F, 0x1E, 0x2A, // IL_001a: return 30
    ];
    let program = compile(&unit(vec![body(int_fn("Pick", 1), code)]), &tokens());

    let results: Vec<Value> = [-1, 0, 1, 2, 3, 100]
        .into_iter()
        .map(|k| call(&program, "Pick", &[Value::Int32(k)]))
        .collect();
    assert_eq!(
        results,
        [-1, 10, 20, 30, -1, -1].map(Value::Int32).to_vec()
    );
}

#[test]
fn constant_switch_folds_to_branch() {
    // ldc.i4.1; switch (2 targets); return -1; IL_000e: return 10; IL_0011: return 20
    let code = vec![
        0x17, 0x45, 0x02, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00,
        0x15, 0x2A, 0x1F, 0x0A, 0x2A, 0x1F, 0x14, 0x2A,
    ];
    let program = compile(&unit(vec![body(int_fn("Fixed", 0), code)]), &tokens());

    assert_eq!(program.count(Opcode::JumpIndirect), 1);
    assert_eq!(call(&program, "Fixed", &[]), Value::Int32(20));
}

#[test]
fn double_to_int_truncates_toward_zero() {
    // ldarg.0; conv.i4; ret
    let method = MethodRef::new(own(), "Trunc")
        .params([Type::Double])
        .returns(Type::Int32)
        .static_();
    let program = compile(&unit(vec![body(method, vec![0x02, 0x69, 0x2A])]), &tokens());

    assert_eq!(call(&program, "Trunc", &[Value::Double(-2.7)]), Value::Int32(-2));
    assert_eq!(call(&program, "Trunc", &[Value::Double(3.9)]), Value::Int32(3));
}

#[test]
fn internal_calls_return_through_callee_slots() {
    let mut twice = body(int_fn("Twice", 1), vec![0x02, 0x02, 0x58, 0x2A]);
    twice.export = false;
    let quad_code = il(&[&[0x02, 0x28], &tok(TWICE), &[0x28], &tok(TWICE), &[0x2A]]);
    let quad = body(int_fn("Quad", 1), quad_code);
    let program = compile(&unit(vec![twice, quad]), &tokens());

    assert_eq!(call(&program, "Quad", &[Value::Int32(3)]), Value::Int32(12));
    assert!(!program.entry("Twice").unwrap().exported);
    assert_eq!(program.count(Opcode::JumpIndirect), 2);
}

#[test]
fn private_method_runs_from_host() {
    let mut twice = body(int_fn("Twice", 1), vec![0x02, 0x02, 0x58, 0x2A]);
    twice.export = false;
    let program = compile(&unit(vec![twice]), &tokens());

    assert_eq!(call(&program, "Twice", &[Value::Int32(21)]), Value::Int32(42));
}

#[test]
fn recursive_call_rejected() {
    let code = il(&[&[0x02, 0x28], &tok(QUAD), &[0x2A]]);
    let unit = unit(vec![body(int_fn("Quad", 1), code)]);

    let err = try_compile(&unit, &tokens(), CompileConfig::default()).unwrap_err();

    assert_eq!(
        err.to_string(),
        "Quad at IL_0001: unsupported construct: recursive call to `Quad`"
    );
}

#[test]
fn mutual_recursion_rejected() {
    const SUM: u32 = 0x0A00_0004;
    const STEP: u32 = 0x0A00_0005;
    let tokens = tokens()
        .with(SUM, Member::Method(int_fn("Sum", 1)))
        .with(STEP, Member::Method(int_fn("Step", 1)));
    // Sum(n) => n == 0 ? 0 : n + Step(n - 1)
    let sum_code = il(&[
        &[0x02, 0x2D, 0x02, 0x16, 0x2A],
        &[0x02, 0x02, 0x17, 0x59, 0x28],
        &tok(STEP),
        &[0x58, 0x2A],
    ]);
    // Step(n) => Sum(n)
    let step_code = il(&[&[0x02, 0x28], &tok(SUM), &[0x2A]]);
    let mut step = body(int_fn("Step", 1), step_code);
    step.export = false;
    let unit = unit(vec![body(int_fn("Sum", 1), sum_code), step]);

    let err = try_compile(&unit, &tokens, CompileConfig::default()).unwrap_err();

    insta::assert_snapshot!(err, @"Step at IL_0001: unsupported construct: recursive call to `Sum`");
}

#[test]
fn shared_callee_is_not_recursion() {
    // Outer(n) => Twice(n) + Quad(n), where Quad also calls Twice
    let mut twice = body(int_fn("Twice", 1), vec![0x02, 0x02, 0x58, 0x2A]);
    twice.export = false;
    let mut quad = body(
        int_fn("Quad", 1),
        il(&[&[0x02, 0x28], &tok(TWICE), &[0x28], &tok(TWICE), &[0x2A]]),
    );
    quad.export = false;
    let outer_code = il(&[&[0x02, 0x28], &tok(TWICE), &[0x02, 0x28], &tok(QUAD), &[0x58, 0x2A]]);
    let outer = body(int_fn("Outer", 1), outer_code);
    let program = compile(&unit(vec![outer, quad, twice]), &tokens());

    assert_eq!(call(&program, "Outer", &[Value::Int32(1)]), Value::Int32(6));
}

#[test]
fn duplicate_method_rejected() {
    let a = body(int_fn("Same", 0), vec![0x16, 0x2A]);
    let b = body(int_fn("Same", 0), vec![0x17, 0x2A]);

    let err = try_compile(&unit(vec![a, b]), &tokens(), CompileConfig::default()).unwrap_err();

    assert_eq!(err, Error::DuplicateMethod("Same".into()));
}

#[test]
fn unsupported_instruction_reports_offset() {
    // ldarg.0; ckfinite; pop; ret
    let method = MethodRef::new(own(), "Check").params([Type::Double]).static_();
    let unit = unit(vec![body(method, vec![0x02, 0xC3, 0x26, 0x2A])]);

    let err = try_compile(&unit, &tokens(), CompileConfig::default()).unwrap_err();

    insta::assert_snapshot!(err, @"Check at IL_0001: unsupported instruction `ckfinite`");
    assert_eq!(
        err.compile_error(),
        Some(&CompileError::UnsupportedInstruction { opcode: "ckfinite" })
    );
}

#[test]
fn backward_branch_with_values_on_stack_rejected() {
    // IL_0000: ldc.i4.0; br.s IL_0000
    let method = MethodRef::new(own(), "Spin").static_();
    let unit = unit(vec![body(method, vec![0x16, 0x2B, 0xFD])]);

    let err = try_compile(&unit, &tokens(), CompileConfig::default()).unwrap_err();

    assert_eq!(
        err.compile_error(),
        Some(&CompileError::StackMismatch {
            target: 0,
            expected: 0,
            found: 1,
        })
    );
}

#[test]
fn truncated_il_is_a_decode_error() {
    // ldc.i4 with only two operand bytes
    let unit = unit(vec![body(int_fn("Cut", 0), vec![0x20, 0x01, 0x02])]);

    let err = try_compile(&unit, &tokens(), CompileConfig::default()).unwrap_err();

    assert!(matches!(err, Error::Decode { ref method, .. } if method == "Cut"));
}

#[test]
fn host_extern_call() {
    // ldarg.0; call Debug.Log(object); ret
    let method = MethodRef::new(own(), "Say").params([Type::Object]).static_();
    let code = il(&[&[0x02, 0x28], &tok(LOG), &[0x2A]]);
    let program = compile(&unit(vec![body(method, code)]), &tokens());

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let externs = ExternLibrary::new().with(
        "UnityEngineDebug.__Log__SystemObject__SystemVoid",
        true,
        move |args| {
            sink.borrow_mut().push(args[0].clone());
            Ok(())
        },
    );
    let mut vm = VM::builder(&program).externs(externs).build().unwrap();
    vm.set("__Say_arg0", Value::str("hi")).unwrap();
    vm.run("Say").unwrap();

    assert_eq!(*seen.borrow(), vec![Value::str("hi")]);
}

#[test]
fn isinst_checks_runtime_type() {
    // ldarg.0; isinst string; ret
    let method = MethodRef::new(own(), "AsText")
        .params([Type::Object])
        .returns(Type::String)
        .static_();
    let code = il(&[&[0x02, 0x75], &tok(STRING_TYPE), &[0x2A]]);
    let program = compile(&unit(vec![body(method, code)]), &tokens());

    assert_eq!(call(&program, "AsText", &[Value::str("x")]), Value::str("x"));
    assert_eq!(call(&program, "AsText", &[Value::Int32(5)]), Value::Null);
    assert_eq!(call(&program, "AsText", &[Value::Null]), Value::Null);
}

#[test]
fn failed_castclass_faults() {
    // ldarg.0; castclass string; ret
    let method = MethodRef::new(own(), "ToText")
        .params([Type::Object])
        .returns(Type::String)
        .static_();
    let code = il(&[&[0x02, 0x74], &tok(STRING_TYPE), &[0x2A]]);
    let program = compile(&unit(vec![body(method, code)]), &tokens());

    assert_eq!(call(&program, "ToText", &[Value::str("ok")]), Value::str("ok"));

    let mut vm = VM::builder(&program).build().unwrap();
    vm.set("__ToText_arg0", Value::Int32(1)).unwrap();
    assert_eq!(
        vm.run("ToText"),
        Err(RuntimeError::NullReference(
            "SystemObject.__GetHashCode__SystemInt32".into()
        ))
    );
}

#[test]
fn fields_become_data_entries() {
    let mut unit = unit(vec![body(int_fn("Zero", 0), vec![0x16, 0x2A])]);
    unit.fields.push(FieldDef {
        name: "speed".into(),
        ty: Type::Single,
        init: Some(Constant::F32(1.5)),
        export: true,
        sync: None,
    });
    let program = compile(&unit, &tokens());

    let entry = program.data_entry("speed").unwrap();
    assert_eq!(entry.type_name, "SystemSingle");
    assert_eq!(entry.init, Literal::Float(1.5));
    assert!(entry.export);
}

#[test]
fn repeated_field_is_rejected() {
    let mut unit = unit(vec![body(int_fn("Zero", 0), vec![0x16, 0x2A])]);
    for _ in 0..2 {
        unit.fields.push(FieldDef {
            name: "x".into(),
            ty: Type::Int32,
            init: None,
            export: false,
            sync: None,
        });
    }

    let err = try_compile(&unit, &tokens(), CompileConfig::default()).unwrap_err();

    assert_eq!(err, Error::DuplicateName("x".into()));
    insta::assert_snapshot!(err, @"data entry `x` is declared twice");
}

#[test]
fn field_increment() {
    let counter = FieldRef {
        declaring: own(),
        name: "counter".into(),
        ty: Type::Int32,
        is_static: false,
    };
    let tokens = tokens().with(0x0400_0001, Member::Field(counter));
    // this.counter = this.counter + 1
    let code = il(&[
        &[0x02, 0x02, 0x7B],
        &tok(0x0400_0001),
        &[0x17, 0x58, 0x7D],
        &tok(0x0400_0001),
        &[0x2A],
    ]);
    let mut unit = unit(vec![body(MethodRef::new(own(), "Bump"), code)]);
    unit.fields.push(FieldDef {
        name: "counter".into(),
        ty: Type::Int32,
        init: None,
        export: false,
        sync: None,
    });
    let program = compile(&unit, &tokens);

    let mut vm = VM::builder(&program).build().unwrap();
    vm.run("Bump").unwrap();
    vm.run("Bump").unwrap();

    assert_eq!(vm.get("counter"), Some(&Value::Int32(2)));
    assert_eq!(
        program.data_entry("__this_VRCUdonUdonBehaviour").map(|e| &e.init),
        Some(&Literal::This)
    );
}

#[test]
fn config_rejects_unknown_keys() {
    let err = CompileConfig::from_json(indoc! {r#"
        { "constant_folding": false, "inline_everything": true }
    "#})
    .unwrap_err();

    assert!(err.to_string().contains("inline_everything"));
}
