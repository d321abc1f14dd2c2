use crate::metadata::{Member, MetadataError, MethodRef, TokenTable};
use crate::types::Type;

use super::*;

fn tokens() -> TokenTable {
    TokenTable::new()
        .with(
            0x0A00_0001,
            Member::Method(
                MethodRef::new(Type::Class("UnityEngine.Debug".into()), "Log")
                    .params([Type::Object])
                    .static_(),
            ),
        )
        .with(
            0x7000_0001,
            Member::String {
                value: "hello".into(),
            },
        )
}

fn read(code: &[u8], is_static: bool) -> Vec<Operation> {
    read_all(code, is_static, &tokens()).unwrap()
}

fn listing(ops: &[Operation]) -> String {
    ops.iter()
        .map(|op| op.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn static_arguments_start_at_zero() {
    let ops = read(&[0x02, 0x03, 0x58, 0x2A], true);

    assert_eq!(ops.len(), 4);
    assert_eq!(ops[0].slot(), Some(Slot::Argument(0)));
    assert_eq!(ops[1].slot(), Some(Slot::Argument(1)));
    assert_eq!(ops[2].opcode, OpCode::Add);
    assert_eq!(ops[3].offset, 3);
}

#[test]
fn instance_argument_zero_is_this() {
    let ops = read(&[0x02, 0x03, 0x0E, 0x02, 0x2A], false);

    assert_eq!(ops[0].slot(), Some(Slot::This));
    assert_eq!(ops[1].slot(), Some(Slot::Argument(0)));
    assert_eq!(ops[2].slot(), Some(Slot::Argument(1)));
}

#[test]
fn short_branch_is_relative_to_next_instruction() {
    // IL_0000: br.s +2 ; IL_0002: nop ; IL_0003: nop ; IL_0004: ret
    let ops = read(&[0x2B, 0x02, 0x00, 0x00, 0x2A], true);

    assert_eq!(ops[0].target(), Some(4));
}

#[test]
fn backward_long_branch() {
    // IL_0000: nop ; IL_0001: br -6 (back to 0)
    let ops = read(&[0x00, 0x38, 0xFA, 0xFF, 0xFF, 0xFF], true);

    assert_eq!(ops[1].target(), Some(0));
}

#[test]
fn switch_targets_are_relative_to_table_end() {
    let code = [
        0x45, 0x02, 0x00, 0x00, 0x00, // switch, 2 targets
        0x00, 0x00, 0x00, 0x00, // +0
        0x05, 0x00, 0x00, 0x00, // +5
        0x2A,
    ];
    let ops = read(&code, true);

    assert_eq!(ops[0].operand, Operand::Targets(vec![13, 18]));
    assert_eq!(ops[1].offset, 13);
}

#[test]
fn constants() {
    let mut code = vec![0x15, 0x1F, 0xFE, 0x20];
    code.extend(1000i32.to_le_bytes());
    code.push(0x21);
    code.extend((-5i64).to_le_bytes());
    code.push(0x22);
    code.extend(1.5f32.to_le_bytes());
    let ops = read(&code, true);

    assert_eq!(ops[0].operand, Operand::Int32(-1));
    assert_eq!(ops[1].operand, Operand::Int32(-2));
    assert_eq!(ops[2].operand, Operand::Int32(1000));
    assert_eq!(ops[3].operand, Operand::Int64(-5));
    assert_eq!(ops[4].operand, Operand::Float32(1.5));
}

#[test]
fn extended_opcodes() {
    let ops = read(&[0xFE, 0x01, 0xFE, 0x0C, 0x03, 0x00], true);

    assert_eq!(ops[0].opcode, OpCode::Ceq);
    assert_eq!(ops[1].opcode, OpCode::Ldloc);
    assert_eq!(ops[1].slot(), Some(Slot::Local(3)));
}

#[test]
fn tokens_resolve_to_members() {
    let ops = read(&[0x72, 0x01, 0x00, 0x00, 0x70, 0x28, 0x01, 0x00, 0x00, 0x0A], true);

    assert_eq!(ops[0].operand, Operand::String("hello".into()));
    assert!(matches!(ops[1].member(), Some(Member::Method(m)) if m.name == "Log"));
}

#[test]
fn listing_format() {
    let code = [
        0x16, 0x0A, 0x06, 0x17, 0x58, 0x0A, 0x2B, 0xF9, 0x72, 0x01, 0x00, 0x00, 0x70, 0x2A,
    ];
    let ops = read(&code, true);

    insta::assert_snapshot!(listing(&ops), @r#"
    IL_0000: ldc.i4.0 0
    IL_0001: stloc.0 V_0
    IL_0002: ldloc.0 V_0
    IL_0003: ldc.i4.1 1
    IL_0004: add
    IL_0005: stloc.0 V_0
    IL_0006: br.s IL_0001
    IL_0008: ldstr "hello"
    IL_000d: ret
    "#);
}

#[test]
fn unknown_opcode_stops_iteration() {
    let table = tokens();
    let mut reader = Reader::new(&[0x00, 0x24, 0x00], true, &table);

    assert!(matches!(reader.next(), Some(Ok(_))));
    assert_eq!(
        reader.next(),
        Some(Err(DecodeError::UnknownOpcode {
            offset: 1,
            byte: 0x24,
            prefix: "",
        }))
    );
    assert_eq!(reader.next(), None);
}

#[test]
fn truncated_operand() {
    let err = read_all(&[0x20, 0x01, 0x00], true, &tokens()).unwrap_err();

    assert_eq!(err, DecodeError::Truncated { offset: 0 });
}

#[test]
fn unknown_token() {
    let err = read_all(&[0x28, 0x09, 0x00, 0x00, 0x0A], true, &tokens()).unwrap_err();

    assert_eq!(
        err,
        DecodeError::Metadata {
            offset: 0,
            source: MetadataError::UnknownToken(0x0A00_0009),
        }
    );
}

#[test]
fn slot_indices_are_checked() {
    let table = tokens();
    let err = Reader::new(&[0x07], true, &table)
        .with_slots(0, 1)
        .collect::<Result<Vec<_>, _>>()
        .unwrap_err();

    assert_eq!(
        err,
        DecodeError::BadSlot {
            offset: 0,
            kind: "local",
            index: 1,
        }
    );
}
