use super::externs::{Builtin, Signature};
use super::*;

fn eval(id: &str, args: &[Value]) -> Result<Option<Value>, RuntimeError> {
    let sig = Signature::parse(id).unwrap();
    let builtin = Builtin::resolve(&sig).unwrap();
    builtin.eval(&sig, args)
}

#[test]
fn parse_with_parameters() {
    let sig = Signature::parse("SystemInt32.__op_Addition__SystemInt32_SystemInt32__SystemInt32")
        .unwrap();

    assert_eq!(sig.owner, "SystemInt32");
    assert_eq!(sig.member, "op_Addition");
    assert_eq!(sig.params, vec!["SystemInt32", "SystemInt32"]);
    assert_eq!(sig.ret, "SystemInt32");
    assert_eq!(sig.arity(true), 3);
}

#[test]
fn parse_without_parameters() {
    let sig = Signature::parse("SystemInt32Array.__get_Length__SystemInt32").unwrap();

    assert!(sig.params.is_empty());
    assert!(sig.returns());
    assert_eq!(sig.arity(false), 2);
}

#[test]
fn parse_void_return() {
    let sig = Signature::parse("SystemInt32Array.__Set__SystemInt32_SystemInt32__SystemVoid")
        .unwrap();

    assert!(!sig.returns());
    assert_eq!(sig.arity(false), 3);
}

#[test]
fn parse_rejects_malformed() {
    assert_eq!(Signature::parse("NoSeparator"), None);
    assert_eq!(Signature::parse(".__member__SystemVoid"), None);
    assert_eq!(Signature::parse("Owner.__a__b__c__d"), None);
}

#[test]
fn resolve_static_and_instance() {
    let parse = |id| Builtin::resolve(&Signature::parse(id).unwrap()).unwrap();

    assert!(parse("SystemObject.__ReferenceEquals__SystemObject_SystemObject__SystemBoolean").is_static());
    assert!(!parse("SystemObject.__GetType__SystemType").is_static());
    assert!(parse("SystemInt32Array.__ctor__SystemInt32__SystemInt32Array").is_static());
    assert!(!parse("SystemInt32Array.__Get__SystemInt32__SystemInt32").is_static());
}

#[test]
fn unknown_member_does_not_resolve() {
    let sig = Signature::parse("UnityEngineDebug.__Log__SystemObject__SystemVoid").unwrap();

    assert_eq!(Builtin::resolve(&sig), None);
    assert!(!ExternLibrary::new().contains("UnityEngineDebug.__Log__SystemObject__SystemVoid"));
}

#[test]
fn int32_addition_wraps() {
    let result = eval(
        "SystemInt32.__op_Addition__SystemInt32_SystemInt32__SystemInt32",
        &[Value::Int32(i32::MAX), Value::Int32(1)],
    );

    assert_eq!(result, Ok(Some(Value::Int32(i32::MIN))));
}

#[test]
fn integer_division_by_zero_faults() {
    let result = eval(
        "SystemInt32.__op_Division__SystemInt32_SystemInt32__SystemInt32",
        &[Value::Int32(7), Value::Int32(0)],
    );

    assert_eq!(result, Err(RuntimeError::DivideByZero));
}

#[test]
fn shifts_mask_count_and_respect_signedness() {
    let shl = eval(
        "SystemInt32.__op_LeftShift__SystemInt32_SystemInt32__SystemInt32",
        &[Value::Int32(1), Value::Int32(33)],
    );
    let sar = eval(
        "SystemInt32.__op_RightShift__SystemInt32_SystemInt32__SystemInt32",
        &[Value::Int32(-8), Value::Int32(1)],
    );
    let shr = eval(
        "SystemUInt32.__op_RightShift__SystemUInt32_SystemInt32__SystemUInt32",
        &[Value::UInt32(0x8000_0000), Value::Int32(31)],
    );

    assert_eq!(shl, Ok(Some(Value::Int32(2))));
    assert_eq!(sar, Ok(Some(Value::Int32(-4))));
    assert_eq!(shr, Ok(Some(Value::UInt32(1))));
}

#[test]
fn convert_wraps_integers_and_truncates_floats() {
    let byte = eval(
        "SystemConvert.__ToByte__SystemInt32__SystemByte",
        &[Value::Int32(300)],
    );
    let int = eval(
        "SystemConvert.__ToInt32__SystemDouble__SystemInt32",
        &[Value::Double(-2.7)],
    );
    let double = eval(
        "SystemConvert.__ToDouble__SystemInt64__SystemDouble",
        &[Value::Int64(3)],
    );

    assert_eq!(byte, Ok(Some(Value::Byte(44))));
    assert_eq!(int, Ok(Some(Value::Int32(-2))));
    assert_eq!(double, Ok(Some(Value::Double(3.0))));
}

#[test]
fn string_equality_compares_contents() {
    let result = eval(
        "SystemString.__op_Equality__SystemString_SystemString__SystemBoolean",
        &[Value::str("System.String"), Value::str("System.String")],
    );

    assert_eq!(result, Ok(Some(Value::Bool(true))));
}

#[test]
fn double_comparison() {
    let result = eval(
        "SystemDouble.__op_LessThan__SystemDouble_SystemDouble__SystemBoolean",
        &[Value::Double(1.5), Value::Double(2.0)],
    );

    assert_eq!(result, Ok(Some(Value::Bool(true))));
}

#[test]
fn array_access_checks_bounds() {
    let array = eval(
        "SystemInt32Array.__ctor__SystemInt32__SystemInt32Array",
        &[Value::Int32(2)],
    )
    .unwrap()
    .unwrap();

    let set = eval(
        "SystemInt32Array.__Set__SystemInt32_SystemInt32__SystemVoid",
        &[array.clone(), Value::Int32(1), Value::Int32(9)],
    );
    assert_eq!(set, Ok(None));

    let get = eval(
        "SystemInt32Array.__Get__SystemInt32__SystemInt32",
        &[array.clone(), Value::Int32(1)],
    );
    assert_eq!(get, Ok(Some(Value::Int32(9))));

    let out = eval(
        "SystemInt32Array.__Get__SystemInt32__SystemInt32",
        &[array.clone(), Value::Int32(2)],
    );
    assert_eq!(out, Err(RuntimeError::IndexOutOfRange { index: 2, len: 2 }));

    let len = eval("SystemInt32Array.__get_Length__SystemInt32", &[array]);
    assert_eq!(len, Ok(Some(Value::Int32(2))));
}

#[test]
fn type_full_name_of_value() {
    let ty = eval("SystemObject.__GetType__SystemType", &[Value::Int32(1)])
        .unwrap()
        .unwrap();
    let name = eval("SystemType.__get_FullName__SystemString", &[ty]);

    assert_eq!(name, Ok(Some(Value::str("System.Int32"))));
}

#[test]
fn full_name_maps_vm_names() {
    insta::assert_snapshot!(
        [
            "SystemInt32",
            "SystemInt32Array",
            "UnityEngineTransform",
            "VRCUdonUdonBehaviour",
        ]
        .map(full_name)
        .join("\n"),
        @r"
    System.Int32
    System.Int32[]
    UnityEngine.Transform
    VRCUdonUdonBehaviour
    "
    );
}
