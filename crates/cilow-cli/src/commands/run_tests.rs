use cilow_asm::{DataEntry, Literal, Program};
use cilow_vm::Value;

use super::run::{parse_assignment, parse_value};

#[test]
fn values_parse_by_declared_type() {
    assert_eq!(parse_value("SystemInt32", "-7"), Some(Value::Int32(-7)));
    assert_eq!(parse_value("SystemBoolean", "true"), Some(Value::Bool(true)));
    assert_eq!(parse_value("SystemDouble", "2.5"), Some(Value::Double(2.5)));
    assert_eq!(parse_value("SystemString", "hi"), Some(Value::str("hi")));
    assert_eq!(parse_value("SystemChar", "x"), Some(Value::Char('x')));
}

#[test]
fn malformed_values_rejected() {
    assert_eq!(parse_value("SystemInt32", "seven"), None);
    assert_eq!(parse_value("SystemChar", "xy"), None);
    assert_eq!(parse_value("UnityEngineTransform", "x"), None);
}

#[test]
fn assignment_uses_data_entry_type() {
    let mut program = Program::new();
    program
        .data
        .push(DataEntry::new("__F_arg0", "SystemInt64", Literal::Int(0)));

    let (name, value) = parse_assignment(&program, "__F_arg0=40").unwrap();
    assert_eq!(name, "__F_arg0");
    assert_eq!(value, Value::Int64(40));

    insta::assert_snapshot!(
        parse_assignment(&program, "__F_arg1=1").unwrap_err(),
        @"unknown variable '__F_arg1'"
    );
    assert_eq!(
        parse_assignment(&program, "__F_arg0").unwrap_err(),
        "expected NAME=VALUE, got '__F_arg0'"
    );
}
