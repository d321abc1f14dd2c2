use std::cell::RefCell;
use std::rc::Rc;

use cilow_asm::{DataEntry, EntryPoint, HALT_ADDRESS, Instruction, Literal, Opcode, Program};

use super::*;

const ADD_I32: &str = "SystemInt32.__op_Addition__SystemInt32_SystemInt32__SystemInt32";
const SEND: &str = "VRCUdonCommonInterfacesIUdonEventReceiver.__SendCustomEvent__SystemString__SystemVoid";

fn var(name: &str, ty: &str, init: Literal) -> DataEntry {
    DataEntry::new(name, ty, init)
}

fn push(name: &str) -> Instruction {
    Instruction::with_variable(Opcode::Push, name)
}

fn main(data: Vec<DataEntry>, code: Vec<Instruction>) -> Program {
    Program {
        data,
        code,
        entries: vec![EntryPoint {
            name: "Main".into(),
            address: 0,
            exported: true,
        }],
    }
}

#[test]
fn extern_writes_result_slot() {
    let program = main(
        vec![
            var("a", "SystemInt32", Literal::Int(2)),
            var("b", "SystemInt32", Literal::Int(3)),
            var("r", "SystemInt32", Literal::Int(0)),
            var("add", "SystemString", Literal::Str(ADD_I32.into())),
        ],
        vec![
            push("a"),
            push("b"),
            push("r"),
            Instruction::with_variable(Opcode::Extern, "add"),
        ],
    );
    let mut vm = VM::builder(&program).build().unwrap();
    vm.run("Main").unwrap();

    assert_eq!(vm.get("r"), Some(&Value::Int32(5)));
    assert_eq!(vm.stack_depth(), 0);
}

#[test]
fn copy_pops_destination_then_source() {
    let program = main(
        vec![
            var("src", "SystemString", Literal::Str("hi".into())),
            var("dst", "SystemString", Literal::Null),
        ],
        vec![push("src"), push("dst"), Instruction::bare(Opcode::Copy)],
    );
    let mut vm = VM::builder(&program).build().unwrap();
    vm.run("Main").unwrap();

    assert_eq!(vm.get("dst"), Some(&Value::str("hi")));
}

#[test]
fn jump_if_false_takes_branch_on_false() {
    // 0: PUSH cond, 8: JUMP_IF_FALSE 36, 16: PUSH one, 24: PUSH out, 32: COPY, 36: NOP
    let program = main(
        vec![
            var("cond", "SystemBoolean", Literal::Bool(false)),
            var("one", "SystemInt32", Literal::Int(1)),
            var("out", "SystemInt32", Literal::Int(0)),
        ],
        vec![
            push("cond"),
            Instruction::with_address(Opcode::JumpIfFalse, 36),
            push("one"),
            push("out"),
            Instruction::bare(Opcode::Copy),
            Instruction::bare(Opcode::Nop),
        ],
    );
    let mut vm = VM::builder(&program).build().unwrap();
    vm.run("Main").unwrap();
    assert_eq!(vm.get("out"), Some(&Value::Int32(0)));

    vm.set("cond", Value::Bool(true)).unwrap();
    vm.run("Main").unwrap();
    assert_eq!(vm.get("out"), Some(&Value::Int32(1)));
}

#[test]
fn endless_loop_runs_out_of_fuel() {
    let program = main(vec![], vec![Instruction::with_address(Opcode::Jump, 0)]);
    let mut vm = VM::builder(&program).exec_fuel(100).build().unwrap();

    assert_eq!(vm.run("Main"), Err(RuntimeError::ExecFuelExhausted(100)));
}

#[test]
fn jump_to_halt_address_stops() {
    let program = main(
        vec![
            var("one", "SystemInt32", Literal::Int(1)),
            var("out", "SystemInt32", Literal::Int(0)),
        ],
        vec![
            Instruction::with_address(Opcode::Jump, HALT_ADDRESS),
            push("one"),
            push("out"),
            Instruction::bare(Opcode::Copy),
        ],
    );
    let mut vm = VM::builder(&program).build().unwrap();
    vm.run("Main").unwrap();

    assert_eq!(vm.get("out"), Some(&Value::Int32(0)));
}

#[test]
fn instance_extern_on_null_faults() {
    let id = "SystemObject.__GetHashCode__SystemInt32";
    let program = main(
        vec![
            var("obj", "SystemObject", Literal::Null),
            var("out", "SystemInt32", Literal::Int(0)),
            var("hash", "SystemString", Literal::Str(id.into())),
        ],
        vec![
            push("obj"),
            push("out"),
            Instruction::with_variable(Opcode::Extern, "hash"),
        ],
    );
    let mut vm = VM::builder(&program).build().unwrap();

    assert_eq!(vm.run("Main"), Err(RuntimeError::NullReference(id.into())));
}

#[test]
fn unknown_operand_variable_rejected_at_load() {
    let program = main(vec![], vec![push("missing")]);

    assert_eq!(
        VM::builder(&program).build().err(),
        Some(RuntimeError::UnknownVariable("missing".into()))
    );
}

#[test]
fn host_extern_receives_operands() {
    let id = "UnityEngineDebug.__Log__SystemObject__SystemVoid";
    let program = main(
        vec![
            var("msg", "SystemString", Literal::Str("hello".into())),
            var("log", "SystemString", Literal::Str(id.into())),
        ],
        vec![push("msg"), Instruction::with_variable(Opcode::Extern, "log")],
    );
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let externs = ExternLibrary::new().with(id, true, move |args| {
        sink.borrow_mut().push(args[0].to_string());
        Ok(())
    });
    let mut vm = VM::builder(&program).externs(externs).build().unwrap();
    vm.run("Main").unwrap();

    assert_eq!(*seen.borrow(), vec!["\"hello\"".to_string()]);
}

#[test]
fn custom_event_runs_private_method_and_returns() {
    let program = Program {
        data: vec![
            var("this", BEHAVIOUR_TYPE, Literal::This),
            var("name", "SystemString", Literal::Str("Event".into())),
            var("send", "SystemString", Literal::Str(SEND.into())),
            var("one", "SystemInt32", Literal::Int(1)),
            var("flag", "SystemInt32", Literal::Int(0)),
            var("__return_address", "SystemUInt32", Literal::Address(0)),
        ],
        code: vec![
            // Main @ 0
            push("this"),
            push("name"),
            Instruction::with_variable(Opcode::Extern, "send"),
            Instruction::with_address(Opcode::Jump, HALT_ADDRESS),
            // Event @ 32
            push("one"),
            push("flag"),
            Instruction::bare(Opcode::Copy),
            push("__return_address"),
            Instruction::bare(Opcode::Copy),
            Instruction::with_variable(Opcode::JumpIndirect, "__return_address"),
        ],
        entries: vec![
            EntryPoint {
                name: "Main".into(),
                address: 0,
                exported: true,
            },
            EntryPoint {
                name: "Event".into(),
                address: 32,
                exported: false,
            },
        ],
    };
    let mut vm = VM::builder(&program).build().unwrap();
    vm.run("Main").unwrap();

    assert_eq!(vm.get("flag"), Some(&Value::Int32(1)));
    assert_eq!(vm.stack_depth(), 0);
}

#[test]
fn self_sending_event_hits_recursion_limit() {
    let program = Program {
        data: vec![
            var("this", BEHAVIOUR_TYPE, Literal::This),
            var("name", "SystemString", Literal::Str("Loop".into())),
            var("send", "SystemString", Literal::Str(SEND.into())),
        ],
        code: vec![
            push("this"),
            push("name"),
            Instruction::with_variable(Opcode::Extern, "send"),
        ],
        entries: vec![EntryPoint {
            name: "Loop".into(),
            address: 0,
            exported: true,
        }],
    };
    let limits = FuelLimits::new().recursion_limit(4);
    let mut vm = VM::builder(&program).limits(limits).build().unwrap();

    assert_eq!(vm.run("Loop"), Err(RuntimeError::RecursionLimitExceeded(4)));
}

#[test]
fn address_literal_initializes_uint32() {
    let program = main(
        vec![var("ra", "SystemUInt32", Literal::Address(0x18))],
        vec![],
    );
    let vm = VM::builder(&program).build().unwrap();

    assert_eq!(vm.get("ra"), Some(&Value::UInt32(0x18)));
}
