use std::cell::RefCell;
use std::rc::Rc;

use cilow_asm::Opcode;
use cilow_vm::{ExternLibrary, RuntimeError, VM, Value};

use crate::config::CompileConfig;
use crate::externs::ExternSignature;
use crate::metadata::{FieldDef, FieldRef, Member, MethodBody, MethodRef, TokenTable};
use crate::test_utils::{body, call, compile, il, local, own, tok, try_compile, unit};
use crate::types::Type;

const BUMP: u32 = 0x0600_0001;
const ACTION_CTOR: u32 = 0x0A00_0010;
const COMBINE: u32 = 0x0A00_0011;
const REMOVE: u32 = 0x0A00_0012;
const REMOVE_ALL: u32 = 0x0A00_0013;
const INVOKE: u32 = 0x0A00_0014;
const ACTION: u32 = 0x0100_0001;
const COUNTER: u32 = 0x0400_0001;
const GET_TRANSFORM: u32 = 0x0A00_0020;

fn action() -> Type {
    Type::Delegate("System.Action".into())
}

fn delegate_api(name: &str) -> Member {
    let delegate = Type::Class("System.Delegate".into());
    Member::Method(
        MethodRef::new(delegate.clone(), name)
            .params([delegate.clone(), delegate.clone()])
            .returns(delegate)
            .static_(),
    )
}

fn delegate_tokens() -> TokenTable {
    TokenTable::new()
        .with(BUMP, Member::Method(MethodRef::new(own(), "Bump")))
        .with(
            ACTION_CTOR,
            Member::Method(
                MethodRef::new(action(), ".ctor")
                    .params([Type::Object, Type::Class("System.IntPtr".into())]),
            ),
        )
        .with(COMBINE, delegate_api("Combine"))
        .with(REMOVE, delegate_api("Remove"))
        .with(REMOVE_ALL, delegate_api("RemoveAll"))
        .with(INVOKE, Member::Method(MethodRef::new(action(), "Invoke")))
        .with(ACTION, Member::Type { ty: action() })
        .with(
            COUNTER,
            Member::Field(FieldRef {
                declaring: own(),
                name: "counter".into(),
                ty: Type::Int32,
                is_static: false,
            }),
        )
}

/// `Run` with delegate locals `a` and `b`, plus `Bump` which increments
/// `counter`.
fn delegate_unit(run: Vec<u8>) -> crate::UnitDef {
    let bump_code = il(&[
        &[0x02, 0x02, 0x7B],
        &tok(COUNTER),
        &[0x17, 0x58, 0x7D],
        &tok(COUNTER),
        &[0x2A],
    ]);
    let mut bump = body(MethodRef::new(own(), "Bump"), bump_code);
    bump.export = false;
    let mut run = body(MethodRef::new(own(), "Run"), run);
    run.locals = vec![local("a", action()), local("b", action())];

    let mut unit = unit(vec![bump, run]);
    unit.fields.push(FieldDef {
        name: "counter".into(),
        ty: Type::Int32,
        init: None,
        export: false,
        sync: None,
    });
    unit
}

const LDNULL: u8 = 0x14;
const LDLOC_A: u8 = 0x06;
const LDLOC_B: u8 = 0x07;

/// a = new Action(this.Bump);
fn bump_a() -> Vec<u8> {
    il(&[&[0x02, 0xFE, 0x06], &tok(BUMP), &[0x73], &tok(ACTION_CTOR), &[0x0A]])
}

/// b = (Action)api(x, y);
fn b_from(api: u32, x: u8, y: u8) -> Vec<u8> {
    il(&[&[x, y, 0x28], &tok(api), &[0x74], &tok(ACTION), &[0x0B]])
}

/// a = new Action(this.Bump); b = (Action)Delegate.Combine(a, a);
fn combined() -> Vec<u8> {
    il(&[&bump_a(), &b_from(COMBINE, LDLOC_A, LDLOC_A)])
}

/// b = (Action)api(b, a);
fn apply(api: u32) -> Vec<u8> {
    b_from(api, LDLOC_B, LDLOC_A)
}

/// b.Invoke(); return;
fn invoke_b() -> Vec<u8> {
    il(&[&[0x07, 0x6F], &tok(INVOKE), &[0x2A]])
}

/// Runs `Run` and reads back the named data entries.
fn run_delegates(code: Vec<u8>, read: &[&str]) -> Vec<Value> {
    let program = compile(&delegate_unit(code), &delegate_tokens());
    let mut vm = VM::builder(&program).build().unwrap();
    vm.run("Run").unwrap();
    assert_eq!(vm.stack_depth(), 0);
    read.iter()
        .map(|name| vm.get(name).cloned().unwrap())
        .collect()
}

#[test]
fn combined_delegate_invokes_each_entry() {
    let seen = run_delegates(il(&[&combined(), &invoke_b()]), &["counter"]);

    assert_eq!(seen, [Value::Int32(2)]);
}

#[test]
fn remove_drops_one_entry() {
    let seen = run_delegates(il(&[&combined(), &apply(REMOVE), &invoke_b()]), &["counter"]);

    assert_eq!(seen, [Value::Int32(1)]);
}

#[test]
fn remove_all_leaves_null() {
    let code = il(&[&combined(), &apply(REMOVE_ALL), &[0x2A]]);
    let seen = run_delegates(code, &["__Run_lcl_b", "counter"]);

    assert_eq!(seen, [Value::Null, Value::Int32(0)]);
}

#[test]
fn null_operand_yields_the_other_list() {
    for law in [
        b_from(COMBINE, LDNULL, LDLOC_A),
        b_from(COMBINE, LDLOC_A, LDNULL),
        b_from(REMOVE, LDLOC_A, LDNULL),
    ] {
        let code = il(&[&bump_a(), &law, &[0x2A]]);
        let seen = run_delegates(code, &["__Run_lcl_a", "__Run_lcl_b"]);

        assert!(matches!(seen[0], Value::Array(_)));
        assert_eq!(seen[1], seen[0]);
    }
}

#[test]
fn removing_a_list_from_itself_leaves_null() {
    let code = il(&[&bump_a(), &b_from(REMOVE, LDLOC_A, LDLOC_A), &[0x2A]]);
    let seen = run_delegates(code, &["__Run_lcl_b"]);

    assert_eq!(seen, [Value::Null]);
}

#[test]
fn removing_an_absent_entry_keeps_the_same_list() {
    const PING: u32 = 0x0A00_0030;
    let ping = MethodRef::new(Type::Class("Host".into()), "Ping").static_();
    let tokens = delegate_tokens().with(PING, Member::Method(ping));
    // a = new Action(this.Bump); b = new Action(null, Host.Ping); b = Remove(a, b);
    let code = il(&[
        &bump_a(),
        &[LDNULL, 0xFE, 0x06],
        &tok(PING),
        &[0x73],
        &tok(ACTION_CTOR),
        &[0x0B],
        &b_from(REMOVE, LDLOC_A, LDLOC_B),
        &[0x2A],
    ]);
    let program = compile(&delegate_unit(code), &tokens);
    let mut vm = VM::builder(&program).build().unwrap();
    vm.run("Run").unwrap();

    let a = vm.get("__Run_lcl_a").unwrap();
    assert!(matches!(a, Value::Array(_)));
    assert_eq!(vm.get("__Run_lcl_b"), Some(a));
}

#[test]
fn combine_over_array_skips_null_parts() {
    const DELEGATE: u32 = 0x0100_0002;
    const COMBINE_ARRAY: u32 = 0x0A00_0015;
    let delegate = Type::Class("System.Delegate".into());
    let combine = MethodRef::new(delegate.clone(), "Combine")
        .params([Type::array_of(delegate.clone())])
        .returns(delegate.clone())
        .static_();
    let tokens = delegate_tokens()
        .with(DELEGATE, Member::Type { ty: delegate })
        .with(COMBINE_ARRAY, Member::Method(combine));
    let combine_into_b = il(&[&[0x28], &tok(COMBINE_ARRAY), &[0x74], &tok(ACTION), &[0x0B]]);

    // b = Combine(new Delegate[] { a, null, a }); b.Invoke();
    let three = il(&[
        &bump_a(),
        &[0x19, 0x8D],
        &tok(DELEGATE),
        &[0x25, 0x16, LDLOC_A, 0xA2],
        &[0x25, 0x18, LDLOC_A, 0xA2],
        &combine_into_b,
        &invoke_b(),
    ]);
    // b = Combine(new Delegate[2]);
    let nulls = il(&[&[0x18, 0x8D], &tok(DELEGATE), &combine_into_b, &[0x2A]]);

    let run = |code| {
        let program = compile(&delegate_unit(code), &tokens);
        let mut vm = VM::builder(&program).build().unwrap();
        vm.run("Run").unwrap();
        ["counter", "__Run_lcl_b"].map(|name| vm.get(name).cloned().unwrap())
    };

    let [counter, _] = run(three);
    assert_eq!(counter, Value::Int32(2));
    assert_eq!(run(nulls), [Value::Int32(0), Value::Null]);
}

#[test]
fn extern_entries_are_called_through_the_host() {
    const PING: u32 = 0x0A00_0030;
    const POKE: u32 = 0x0A00_0031;
    let host = Type::Class("Host".into());
    let ping = MethodRef::new(host.clone(), "Ping").static_();
    let poke = MethodRef::new(host, "Poke");
    let ids = [&ping, &poke].map(|m| ExternSignature::from_method(m).identifier());
    let tokens = delegate_tokens()
        .with(PING, Member::Method(ping))
        .with(POKE, Member::Method(poke));
    // a = new Action(null, Host.Ping); b = new Action(this, Host.Poke);
    // b = Combine(Combine(a, b), new Action(this.Bump)); b.Invoke();
    let code = il(&[
        &[LDNULL, 0xFE, 0x06],
        &tok(PING),
        &[0x73],
        &tok(ACTION_CTOR),
        &[0x0A, 0x02, 0xFE, 0x06],
        &tok(POKE),
        &[0x73],
        &tok(ACTION_CTOR),
        &[0x0B],
        &b_from(COMBINE, LDLOC_A, LDLOC_B),
        &[LDLOC_B, 0x02, 0xFE, 0x06],
        &tok(BUMP),
        &[0x73],
        &tok(ACTION_CTOR),
        &[0x28],
        &tok(COMBINE),
        &[0x74],
        &tok(ACTION),
        &[0x0B],
        &invoke_b(),
    ]);
    let program = compile(&delegate_unit(code), &tokens);

    let log = Rc::new(RefCell::new(Vec::new()));
    let (on_ping, on_poke) = (Rc::clone(&log), Rc::clone(&log));
    let externs = ExternLibrary::new()
        .with(&ids[0], true, move |_| {
            on_ping.borrow_mut().push(Value::str("ping"));
            Ok(())
        })
        .with(&ids[1], false, move |args| {
            on_poke.borrow_mut().push(args[0].clone());
            Ok(())
        });
    let mut vm = VM::builder(&program).externs(externs).build().unwrap();
    vm.run("Run").unwrap();

    assert_eq!(*log.borrow(), [Value::str("ping"), Value::Behaviour]);
    assert_eq!(vm.get("counter"), Some(&Value::Int32(1)));
}

#[test]
fn invoking_null_delegate_faults() {
    let program = compile(&delegate_unit(invoke_b()), &delegate_tokens());
    let mut vm = VM::builder(&program).build().unwrap();

    assert_eq!(
        vm.run("Run"),
        Err(RuntimeError::NullReference(
            "SystemObject.__GetHashCode__SystemInt32".into()
        ))
    );
}

fn int_fn(name: &str, params: usize) -> MethodRef {
    MethodRef::new(own(), name)
        .params(vec![Type::Int32; params])
        .returns(Type::Int32)
        .static_()
}

#[test]
fn store_writes_result_in_place() {
    // x = a + 1; return x;
    let mut f = body(int_fn("F", 1), vec![0x02, 0x17, 0x58, 0x0A, 0x06, 0x2A]);
    f.locals = vec![local("x", Type::Int32)];
    let unit = unit(vec![f]);

    let elided = compile(&unit, &TokenTable::new());
    let literal = try_compile(&unit, &TokenTable::new(), CompileConfig::literal()).unwrap();

    let temps = |p: &cilow_asm::Program| p.data.iter().filter(|e| e.name.contains("_tmp_")).count();
    assert_eq!(temps(&elided), 0);
    assert!(temps(&literal) > 0);
    assert_eq!(call(&elided, "F", &[Value::Int32(4)]), Value::Int32(5));
    assert_eq!(call(&literal, "F", &[Value::Int32(4)]), Value::Int32(5));
}

#[test]
fn negated_comparison_fuses_into_one_extern() {
    // return !(a < b);
    let code = vec![0x02, 0x03, 0xFE, 0x04, 0x16, 0xFE, 0x01, 0x2A];
    let method = MethodRef::new(own(), "Ge")
        .params([Type::Int32, Type::Int32])
        .returns(Type::Boolean)
        .static_();
    let unit = unit(vec![body(method, code)]);

    let fused = compile(&unit, &TokenTable::new());
    let literal = try_compile(&unit, &TokenTable::new(), CompileConfig::literal()).unwrap();

    assert_eq!(fused.count(Opcode::Extern), 1);
    assert!(literal.count(Opcode::Extern) > 1);
    for program in [&fused, &literal] {
        let ge = |a, b| call(program, "Ge", &[Value::Int32(a), Value::Int32(b)]);
        assert_eq!(ge(3, 3), Value::Bool(true));
        assert_eq!(ge(1, 2), Value::Bool(false));
        assert_eq!(ge(5, -5), Value::Bool(true));
    }
}

#[test]
fn zero_after_comparison_without_ceq_is_left_alone() {
    // push (a < b); push 0; pop; return
    let code = vec![0x02, 0x03, 0xFE, 0x04, 0x16, 0x26, 0x2A];
    let method = MethodRef::new(own(), "Lt")
        .params([Type::Int32, Type::Int32])
        .returns(Type::Boolean)
        .static_();
    let program = compile(&unit(vec![body(method, code)]), &TokenTable::new());

    assert_eq!(program.count(Opcode::Extern), 1);
    let lt = |a, b| call(&program, "Lt", &[Value::Int32(a), Value::Int32(b)]);
    assert_eq!(lt(1, 2), Value::Bool(true));
    assert_eq!(lt(2, 1), Value::Bool(false));
}

#[test]
fn store_of_another_type_is_not_fused() {
    // long x = a + 1; return x;
    let method = MethodRef::new(own(), "Widen")
        .params([Type::Int32])
        .returns(Type::Int64)
        .static_();
    let mut f = body(method, vec![0x02, 0x17, 0x58, 0x0A, 0x06, 0x2A]);
    f.locals = vec![local("x", Type::Int64)];
    let program = compile(&unit(vec![f]), &TokenTable::new());

    assert!(program.data_entry("__Widen_tmp_SystemInt32_0").is_some());
    assert_eq!(call(&program, "Widen", &[Value::Int32(4)]), Value::Int64(5));
}

#[test]
fn self_pointing_getter_reads_this() {
    // return this.transform;
    let transform = Type::Class("UnityEngine.Transform".into());
    let getter = MethodRef::new(Type::Class("UnityEngine.Component".into()), "get_transform")
        .returns(transform.clone());
    let tokens = TokenTable::new().with(GET_TRANSFORM, Member::Method(getter));
    let method = MethodRef::new(own(), "Where").returns(transform);
    let code = il(&[&[0x02, 0x28], &tok(GET_TRANSFORM), &[0x2A]]);

    let program = compile(&unit(vec![body(method, code)]), &tokens);

    assert_eq!(program.count(Opcode::Extern), 0);
    assert!(program.data_entry("__this_UnityEngineTransform").is_some());
}

#[test]
fn unreachable_tail_after_return_compiles() {
    // return 1; return 2;
    let f = body(int_fn("One", 0), vec![0x17, 0x2A, 0x18, 0x2A]);
    let program = compile(&unit(vec![f]), &TokenTable::new());

    assert_eq!(call(&program, "One", &[]), Value::Int32(1));
}

#[test]
fn method_without_body_is_empty_entry() {
    let empty = MethodBody {
        method: MethodRef::new(own(), "Nothing").static_(),
        locals: Vec::new(),
        code: vec![0x2A],
        export: true,
    };
    let program = compile(&unit(vec![empty]), &TokenTable::new());

    assert_eq!(call(&program, "Nothing", &[]), Value::Null);
    assert_eq!(program.count(Opcode::JumpIndirect), 1);
}
